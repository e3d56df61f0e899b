use std::fmt;
use std::io::Read;

use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePrivateKey;
use p256::SecretKey;
use rand::rngs::OsRng;

use crate::base64url;
use crate::error::WebPushError;

/// Length of an uncompressed SEC1 P-256 point: `0x04 ‖ x ‖ y`.
pub const PUBLIC_KEY_LENGTH: usize = 65;
const COORDINATE_LENGTH: usize = 32;

/// The P-256 key pair the application server signs VAPID tokens with.
///
/// The public half is what browsers receive as `applicationServerKey` when
/// subscribing, so the private half must always belong to it.
#[derive(Clone)]
pub struct VapidKey {
    secret: SecretKey,
    public_key: [u8; PUBLIC_KEY_LENGTH],
}

impl fmt::Debug for VapidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidKey")
            .field("public_key", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

impl VapidKey {
    /// Generates a fresh key pair.
    pub fn generate() -> VapidKey {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    /// Rebuilds the key pair from the raw 32 byte private scalar `d` and the
    /// 65 byte uncompressed public point. The point's x and y coordinates
    /// must be the ones derived from `d`.
    pub fn from_raw(private_key: &[u8], public_key: &[u8]) -> Result<VapidKey, WebPushError> {
        if public_key.len() != PUBLIC_KEY_LENGTH || public_key[0] != 0x04 {
            return Err(WebPushError::InvalidVapidKey);
        }

        let (x, y) = public_key[1..].split_at(COORDINATE_LENGTH);
        let key = Self::from_private_key(private_key)?;
        let derived = key.secret.public_key().to_encoded_point(false);

        if derived.x().map(|v| v.as_slice()) != Some(x) || derived.y().map(|v| v.as_slice()) != Some(y) {
            return Err(WebPushError::InvalidVapidKey);
        }

        Ok(key)
    }

    /// Rebuilds the key pair from base64url strings, the form the keys are
    /// configured in.
    pub fn from_base64(private_key: &str, public_key: &str) -> Result<VapidKey, WebPushError> {
        let private_key = base64url::decode(private_key.trim())?;
        let public_key = base64url::decode(public_key.trim())?;

        Self::from_raw(&private_key, &public_key)
    }

    /// Builds the key pair from the raw private scalar only, deriving the
    /// public key.
    pub fn from_private_key(private_key: &[u8]) -> Result<VapidKey, WebPushError> {
        if private_key.len() != COORDINATE_LENGTH {
            return Err(WebPushError::InvalidVapidKey);
        }

        let secret = SecretKey::from_slice(private_key).map_err(|_| WebPushError::InvalidVapidKey)?;

        Ok(Self::from_secret(secret))
    }

    /// Reads a PEM encoded private key, either SEC1 (`EC PRIVATE KEY`) as
    /// written by `openssl ecparam -genkey`, or PKCS#8 (`PRIVATE KEY`).
    pub fn from_pem<R: Read>(mut pk_pem: R) -> Result<VapidKey, WebPushError> {
        let mut pem_key = Vec::new();
        pk_pem.read_to_end(&mut pem_key)?;

        let parsed = pem::parse(&pem_key).map_err(|_| WebPushError::InvalidVapidKey)?;

        let secret = match parsed.tag() {
            "EC PRIVATE KEY" => SecretKey::from_sec1_der(parsed.contents()).ok(),
            "PRIVATE KEY" => SecretKey::from_pkcs8_der(parsed.contents()).ok(),
            tag => {
                debug!("Unsupported PEM block: {}", tag);
                None
            }
        }
        .ok_or(WebPushError::InvalidVapidKey)?;

        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> VapidKey {
        let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
        public_key.copy_from_slice(secret.public_key().to_encoded_point(false).as_bytes());

        VapidKey { secret, public_key }
    }

    /// Gets the uncompressed public key bytes.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    /// The public key as sent in the `k=` parameter and to browsers.
    pub fn public_key_base64(&self) -> String {
        base64url::encode(self.public_key)
    }

    /// The raw private scalar, base64url encoded.
    pub fn private_key_base64(&self) -> String {
        base64url::encode(self.secret.to_bytes())
    }

    pub(crate) fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }
}

use chrono::{DateTime, Duration, Utc};
use http::Uri;
use p256::ecdsa::{signature::Signer, Signature};

use crate::{base64url, error::WebPushError, vapid::VapidKey};

/// How long a signed token stays valid.
pub const TOKEN_VALIDITY_HOURS: i64 = 12;

#[derive(Serialize)]
struct JwtHeader {
    typ: &'static str,
    alg: &'static str,
}

const JWT_HEADER: JwtHeader = JwtHeader { typ: "JWT", alg: "ES256" };

/// The claims of a VAPID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Origin of the push service the token is good for.
    pub aud: String,
    /// Expiry as a unix timestamp in seconds.
    pub exp: i64,
    /// Contact of the application server operator, `mailto:` or `https:`.
    pub sub: String,
}

/// A struct representing a VAPID signature. Should be generated using
/// [`VapidSigner::sign`].
#[derive(Debug, Clone)]
pub struct VapidSignature {
    /// The signed token
    pub auth_t: String,
    /// The public key
    pub auth_k: String,
}

impl VapidSignature {
    /// The `Authorization` header value for the aes128gcm encoding.
    pub fn header_value(&self) -> String {
        format!("vapid t={}, k={}", self.auth_t, self.auth_k)
    }
}

impl<'a> From<&'a VapidSignature> for String {
    fn from(signature: &'a VapidSignature) -> String {
        signature.header_value()
    }
}

/// Origin (`scheme://host[:port]`) of a push endpoint, used as the token
/// audience.
pub fn audience_for(endpoint: &Uri) -> Result<String, WebPushError> {
    let scheme = endpoint.scheme_str().ok_or(WebPushError::InvalidUri)?;
    let host = endpoint.host().filter(|h| !h.is_empty()).ok_or(WebPushError::InvalidUri)?;

    Ok(match endpoint.port_u16() {
        Some(port) => format!("{}://{}:{}", scheme, host, port),
        None => format!("{}://{}", scheme, host),
    })
}

pub struct VapidSigner {}

impl VapidSigner {
    /// Create a signature with a given key for the given audience, expiring
    /// in twelve hours.
    pub fn sign(key: &VapidKey, audience: &str, subject: &str) -> Result<VapidSignature, WebPushError> {
        Self::sign_at(key, audience, subject, Utc::now())
    }

    /// Same as [`VapidSigner::sign`] with an explicit signing time.
    pub fn sign_at(
        key: &VapidKey,
        audience: &str,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<VapidSignature, WebPushError> {
        if audience.is_empty() || subject.is_empty() {
            return Err(WebPushError::InvalidClaims);
        }

        let claims = Claims {
            aud: audience.to_string(),
            exp: (now + Duration::hours(TOKEN_VALIDITY_HOURS)).timestamp(),
            sub: subject.to_string(),
        };

        let signing_input = format!(
            "{}.{}",
            base64url::encode(serde_json::to_vec(&JWT_HEADER).map_err(|_| WebPushError::InvalidClaims)?),
            base64url::encode(serde_json::to_vec(&claims).map_err(|_| WebPushError::InvalidClaims)?)
        );

        // Fixed size r ‖ s, push services do not accept DER.
        let signature: Signature = key
            .signing_key()
            .try_sign(signing_input.as_bytes())
            .map_err(|_| WebPushError::Signing)?;

        let auth_k = key.public_key_base64();

        trace!("Public key: {}", auth_k);

        let auth_t = format!("{}.{}", signing_input, base64url::encode(signature.to_bytes()));

        Ok(VapidSignature { auth_t, auth_k })
    }
}

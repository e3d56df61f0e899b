//! Payload encryption with the `aes128gcm` content encoding (RFC 8188) as
//! profiled for Web Push (RFC 8291).
//!
//! The output is a single record:
//!
//! ```text
//! salt (16) ‖ rs (4, big endian) ‖ idlen (1) ‖ keyid (65) ‖ ciphertext ‖ tag (16)
//! ```
//!
//! where `keyid` is the ephemeral public key of the application server.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use hkdf::Hkdf;
use p256::{ecdh, elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use crate::error::WebPushError;
use crate::vapid::PUBLIC_KEY_LENGTH;

/// The record size announced in the header.
pub const RECORD_SIZE: u32 = 4096;
pub const SALT_LENGTH: usize = 16;
pub const AUTH_SECRET_LENGTH: usize = 16;
/// `salt ‖ rs ‖ idlen`, without the key id.
pub const HEADER_LENGTH: usize = SALT_LENGTH + 4 + 1;
pub const TAG_LENGTH: usize = 16;
/// Push services only have to accept 4096 octets of message body.
pub const MAX_BODY_LENGTH: usize = 4096;
/// Largest plaintext whose encrypted body, header and key id included, stays
/// within [`MAX_BODY_LENGTH`].
pub const MAX_CONTENT_LENGTH: usize = MAX_BODY_LENGTH - HEADER_LENGTH - PUBLIC_KEY_LENGTH - TAG_LENGTH - 1;

const LAST_RECORD_DELIMITER: u8 = 0x02;
const IKM_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const IKM_LENGTH: usize = 32;
const KEY_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const KEY_LENGTH: usize = 16;
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";
const NONCE_LENGTH: usize = 12;

/// Struct for handling payload encryption towards one subscription.
pub struct HttpEce<'a> {
    peer_public_key: &'a [u8],
    peer_secret: &'a [u8],
}

impl<'a> HttpEce<'a> {
    /// Create a new encryptor.
    ///
    /// `peer_public_key` is the `p256dh` and `peer_secret` the `auth` from
    /// browser subscription info, both already decoded.
    pub fn new(peer_public_key: &'a [u8], peer_secret: &'a [u8]) -> HttpEce<'a> {
        HttpEce {
            peer_public_key,
            peer_secret,
        }
    }

    /// Encrypts a payload with a freshly generated ephemeral key and salt.
    pub fn encrypt(&self, content: &[u8]) -> Result<Vec<u8>, WebPushError> {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);

        let ephemeral = SecretKey::random(&mut OsRng);

        self.encrypt_with(content, &ephemeral, salt)
    }

    /// Encrypts with the given ephemeral key and salt. Both must be unique
    /// per message; [`encrypt`](#method.encrypt) takes care of that.
    pub fn encrypt_with(
        &self,
        content: &[u8],
        ephemeral: &SecretKey,
        salt: [u8; SALT_LENGTH],
    ) -> Result<Vec<u8>, WebPushError> {
        if content.len() > MAX_CONTENT_LENGTH {
            return Err(WebPushError::PayloadTooLarge);
        }

        if self.peer_public_key.len() != PUBLIC_KEY_LENGTH || self.peer_secret.len() != AUTH_SECRET_LENGTH {
            return Err(WebPushError::InvalidCryptoKeys);
        }

        let peer_public_key =
            PublicKey::from_sec1_bytes(self.peer_public_key).map_err(|_| WebPushError::InvalidCryptoKeys)?;

        let ephemeral_public = ephemeral.public_key().to_encoded_point(false);
        let key_id = ephemeral_public.as_bytes();

        let shared_secret = ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), peer_public_key.as_affine());

        let (key, nonce) = derive_key_and_nonce(
            self.peer_secret,
            shared_secret.raw_secret_bytes(),
            self.peer_public_key,
            key_id,
            &salt,
        )?;

        let mut plaintext = Vec::with_capacity(content.len() + 1);
        plaintext.extend_from_slice(content);
        plaintext.push(LAST_RECORD_DELIMITER);

        let ciphertext = Aes128Gcm::new_from_slice(&key)
            .map_err(|_| WebPushError::Encryption)?
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| WebPushError::Encryption)?;

        let mut output = Vec::with_capacity(HEADER_LENGTH + key_id.len() + ciphertext.len());
        output.extend_from_slice(&salt);
        output.extend_from_slice(&RECORD_SIZE.to_be_bytes());
        output.push(key_id.len() as u8);
        output.extend_from_slice(key_id);
        output.extend_from_slice(&ciphertext);

        Ok(output)
    }
}

/// Decrypts a single record body as the subscribing user agent would.
///
/// `user_agent_key` is the private half of the subscription's `p256dh` key
/// and `auth` its authentication secret.
pub fn decrypt(body: &[u8], user_agent_key: &SecretKey, auth: &[u8]) -> Result<Vec<u8>, WebPushError> {
    if body.len() < HEADER_LENGTH {
        return Err(WebPushError::InvalidRecord);
    }

    let (salt, rest) = body.split_at(SALT_LENGTH);
    let (rs, rest) = rest.split_at(4);
    let record_size = u32::from_be_bytes([rs[0], rs[1], rs[2], rs[3]]) as usize;
    let key_id_length = rest[0] as usize;
    let rest = &rest[1..];

    if key_id_length != PUBLIC_KEY_LENGTH || rest.len() < key_id_length + TAG_LENGTH + 1 {
        return Err(WebPushError::InvalidRecord);
    }

    let (key_id, ciphertext) = rest.split_at(key_id_length);

    if ciphertext.len() > record_size {
        return Err(WebPushError::InvalidRecord);
    }

    let sender_public_key = PublicKey::from_sec1_bytes(key_id).map_err(|_| WebPushError::InvalidRecord)?;
    let user_agent_public = user_agent_key.public_key().to_encoded_point(false);
    let shared_secret = ecdh::diffie_hellman(user_agent_key.to_nonzero_scalar(), sender_public_key.as_affine());

    let (key, nonce) = derive_key_and_nonce(
        auth,
        shared_secret.raw_secret_bytes(),
        user_agent_public.as_bytes(),
        key_id,
        salt,
    )?;

    let mut plaintext = Aes128Gcm::new_from_slice(&key)
        .map_err(|_| WebPushError::Encryption)?
        .decrypt(Nonce::from_slice(&nonce), ciphertext)
        .map_err(|_| WebPushError::Encryption)?;

    // Padding is zero bytes after the delimiter.
    while plaintext.last() == Some(&0) {
        plaintext.pop();
    }

    match plaintext.pop() {
        Some(LAST_RECORD_DELIMITER) => Ok(plaintext),
        _ => Err(WebPushError::InvalidRecord),
    }
}

fn derive_key_and_nonce(
    auth: &[u8],
    shared_secret: &[u8],
    user_agent_public: &[u8],
    server_public: &[u8],
    salt: &[u8],
) -> Result<([u8; KEY_LENGTH], [u8; NONCE_LENGTH]), WebPushError> {
    let mut ikm_info = Vec::with_capacity(IKM_INFO_PREFIX.len() + user_agent_public.len() + server_public.len());
    ikm_info.extend_from_slice(IKM_INFO_PREFIX);
    ikm_info.extend_from_slice(user_agent_public);
    ikm_info.extend_from_slice(server_public);

    let mut ikm = [0u8; IKM_LENGTH];
    hkdf_sha256(auth, shared_secret, &ikm_info, &mut ikm)?;

    let mut key = [0u8; KEY_LENGTH];
    hkdf_sha256(salt, &ikm, KEY_INFO, &mut key)?;

    let mut nonce = [0u8; NONCE_LENGTH];
    hkdf_sha256(salt, &ikm, NONCE_INFO, &mut nonce)?;

    Ok((key, nonce))
}

fn hkdf_sha256(salt: &[u8], secret: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), WebPushError> {
    Hkdf::<Sha256>::new(Some(salt), secret)
        .expand(info, okm)
        .map_err(|_| WebPushError::Encryption)
}

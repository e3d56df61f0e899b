//! Contains tooling for signing with VAPID.

pub use self::key::{VapidKey, PUBLIC_KEY_LENGTH};
pub use self::signer::{audience_for, Claims, VapidSignature, VapidSigner, TOKEN_VALIDITY_HOURS};

mod key;
mod signer;

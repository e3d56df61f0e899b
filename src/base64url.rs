//! The base64url text form of VAPID tokens and push key material.
//!
//! Encoding uses the url-safe alphabet without `=` padding. Decoding accepts
//! padded and unpadded input: the text is mapped back to the standard
//! alphabet and re-padded to a multiple of four before decoding.

use ct_codecs::{Base64, Base64UrlSafeNoPadding, Decoder, Encoder};

use crate::error::WebPushError;

/// Encodes bytes as unpadded base64url.
pub fn encode<T: AsRef<[u8]>>(bytes: T) -> String {
    // Encoding only fails when the output length would overflow `usize`.
    Base64UrlSafeNoPadding::encode_to_string(bytes).unwrap_or_default()
}

/// Decodes base64url text, with or without padding.
pub fn decode(text: &str) -> Result<Vec<u8>, WebPushError> {
    let mut standard: String = text
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();

    match standard.len() % 4 {
        0 => {}
        1 => return Err(WebPushError::Decode),
        rem => standard.push_str(&"=="[..4 - rem]),
    }

    Ok(Base64::decode_to_vec(&standard, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_length() {
        for len in 0..=300usize {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 151 + len) as u8).collect();
            let encoded = encode(&bytes);

            assert!(!encoded.contains('='));
            assert!(!encoded.contains('+'));
            assert!(!encoded.contains('/'));
            assert_eq!(bytes, decode(&encoded).unwrap(), "length {}", len);
        }
    }

    #[test]
    fn uses_the_url_safe_alphabet() {
        assert_eq!("-_8", encode([0xfb, 0xff]));
        assert_eq!(vec![0xfb, 0xff], decode("-_8").unwrap());
    }

    #[test]
    fn accepts_padded_input() {
        assert_eq!(b"hello".to_vec(), decode("aGVsbG8=").unwrap());
        assert_eq!(b"hello".to_vec(), decode("aGVsbG8").unwrap());
    }

    #[test]
    fn decodes_a_subscription_auth_secret() {
        assert_eq!(16, decode("xS03Fi5ErfTNH_l9WHE9Ig").unwrap().len());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(decode("a"), Err(WebPushError::Decode)));
        assert!(matches!(decode("ab$d"), Err(WebPushError::Decode)));
        assert!(matches!(decode("ab cd"), Err(WebPushError::Decode)));
    }
}

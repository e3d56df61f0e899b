use std::string::FromUtf8Error;
use std::time::{Duration, SystemTime};
use std::{convert::From, error::Error, fmt, io::Error as IoError};

use http::uri::InvalidUri;
use serde_json::error::Error as JsonError;

/// Diagnostic information returned by a push service when it refuses a
/// message. Mozilla's autopush answers with this exact JSON shape, other
/// services get the raw body stored in `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u16,
    pub errno: u16,
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "code {}, errno {}: {} ({})",
            self.code, self.errno, self.error, self.message
        )
    }
}

/// Errors of a single push message: building, signing, encrypting or
/// delivering it.
#[derive(Debug)]
pub enum WebPushError {
    /// An unknown error happened while encrypting or sending the message
    Unspecified,
    /// Please provide valid credentials to send the notification
    Unauthorized(ErrorInfo),
    /// Request was badly formed
    BadRequest(ErrorInfo),
    /// Contains an optional `Duration`, until the user can retry the request
    ServerError {
        retry_after: Option<Duration>,
        info: ErrorInfo,
    },
    /// The provided URI is invalid
    InvalidUri,
    /// The URL specified is no longer valid and should no longer be used
    EndpointNotValid(ErrorInfo),
    /// The URL specified is invalid and should not be used again
    EndpointNotFound(ErrorInfo),
    /// The encrypted body would exceed the 4096 octets push services accept
    PayloadTooLarge,
    /// The push service refused the body as too large (HTTP 413)
    PayloadRejected(ErrorInfo),
    /// Error in reading a file
    Io(IoError),
    /// Malformed base64url input
    Decode,
    /// The VAPID private key is malformed or does not match the public key
    InvalidVapidKey,
    /// One or more of the subscription's crypto key elements are invalid.
    InvalidCryptoKeys,
    /// A claim had invalid data
    InvalidClaims,
    /// ECDSA signing of the VAPID token failed
    Signing,
    /// Key agreement, key derivation or AES-GCM failed
    Encryption,
    /// An encrypted record could not be parsed
    InvalidRecord,
    /// The push service did not answer in time
    Timeout,
    /// Corrupted response data
    InvalidResponse,
    /// The response body exceeded the maximum allowed size
    ResponseTooLarge,
    Other(ErrorInfo),
}

impl Error for WebPushError {}

impl From<JsonError> for WebPushError {
    fn from(_: JsonError) -> WebPushError {
        WebPushError::InvalidResponse
    }
}

impl From<FromUtf8Error> for WebPushError {
    fn from(_: FromUtf8Error) -> WebPushError {
        WebPushError::InvalidResponse
    }
}

impl From<InvalidUri> for WebPushError {
    fn from(_: InvalidUri) -> WebPushError {
        WebPushError::InvalidUri
    }
}

impl From<http::Error> for WebPushError {
    fn from(_: http::Error) -> WebPushError {
        WebPushError::InvalidUri
    }
}

impl From<ct_codecs::Error> for WebPushError {
    fn from(_: ct_codecs::Error) -> WebPushError {
        WebPushError::Decode
    }
}

#[cfg(feature = "hyper-client")]
impl From<hyper::Error> for WebPushError {
    fn from(err: hyper::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Unspecified
        }
    }
}

#[cfg(feature = "isahc-client")]
impl From<isahc::Error> for WebPushError {
    fn from(err: isahc::Error) -> Self {
        match err.kind() {
            isahc::error::ErrorKind::Timeout => Self::Timeout,
            _ => Self::Unspecified,
        }
    }
}

impl From<IoError> for WebPushError {
    fn from(err: IoError) -> WebPushError {
        WebPushError::Io(err)
    }
}

impl WebPushError {
    pub fn short_description(&self) -> &'static str {
        match *self {
            WebPushError::Unspecified => "unspecified",
            WebPushError::Unauthorized(_) => "unauthorized",
            WebPushError::BadRequest(_) => "bad_request",
            WebPushError::ServerError { .. } => "server_error",
            WebPushError::InvalidUri => "invalid_uri",
            WebPushError::EndpointNotValid(_) => "endpoint_not_valid",
            WebPushError::EndpointNotFound(_) => "endpoint_not_found",
            WebPushError::PayloadTooLarge => "payload_too_large",
            WebPushError::PayloadRejected(_) => "payload_rejected",
            WebPushError::Io(_) => "io_error",
            WebPushError::Decode => "decode",
            WebPushError::InvalidVapidKey => "invalid_vapid_key",
            WebPushError::InvalidCryptoKeys => "invalid_crypto_keys",
            WebPushError::InvalidClaims => "invalid_claims",
            WebPushError::Signing => "signing",
            WebPushError::Encryption => "encryption",
            WebPushError::InvalidRecord => "invalid_record",
            WebPushError::Timeout => "timeout",
            WebPushError::InvalidResponse => "invalid_response",
            WebPushError::ResponseTooLarge => "response_too_large",
            WebPushError::Other(_) => "other",
        }
    }

    /// True when the push service reported the subscription as permanently
    /// gone (HTTP 404 or 410).
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            WebPushError::EndpointNotValid(_) | WebPushError::EndpointNotFound(_)
        )
    }
}

impl fmt::Display for WebPushError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WebPushError::Unspecified => write!(f, "unspecified error"),
            WebPushError::Unauthorized(info) => write!(f, "unauthorized: {}", info),
            WebPushError::BadRequest(info) => write!(f, "bad request: {}", info),
            WebPushError::ServerError { info, .. } => write!(f, "server error: {}", info),
            WebPushError::PayloadTooLarge => write!(f, "encrypted payload exceeds 4096 bytes"),
            WebPushError::PayloadRejected(info) => write!(f, "payload too large for the push service: {}", info),
            WebPushError::InvalidUri => write!(f, "invalid uri provided"),
            WebPushError::EndpointNotValid(info) => write!(f, "endpoint not valid: {}", info),
            WebPushError::EndpointNotFound(info) => write!(f, "endpoint not found: {}", info),
            WebPushError::Io(err) => write!(f, "i/o error: {}", err),
            WebPushError::Decode => write!(f, "malformed base64url input"),
            WebPushError::InvalidVapidKey => write!(f, "invalid or mismatched vapid key pair"),
            WebPushError::InvalidCryptoKeys => write!(f, "subscription has invalid cryptographic keys"),
            WebPushError::InvalidClaims => write!(f, "at least one jwt claim was invalid"),
            WebPushError::Signing => write!(f, "could not sign the vapid token"),
            WebPushError::Encryption => write!(f, "could not encrypt the payload"),
            WebPushError::InvalidRecord => write!(f, "malformed aes128gcm record"),
            WebPushError::Timeout => write!(f, "push service did not respond in time"),
            WebPushError::InvalidResponse => write!(f, "could not parse response data"),
            WebPushError::ResponseTooLarge => write!(f, "response from push endpoint was too large"),
            WebPushError::Other(info) => write!(f, "other: {}", info),
        }
    }
}

pub struct RetryAfter;
impl RetryAfter {
    pub fn from_str(header_value: &str) -> Option<Duration> {
        if let Ok(seconds) = header_value.parse::<u64>() {
            Some(Duration::from_secs(seconds))
        } else {
            chrono::DateTime::parse_from_rfc2822(header_value)
                .map(|date_time| {
                    let systime: SystemTime = date_time.into();

                    systime
                        .duration_since(SystemTime::now())
                        .unwrap_or_else(|_| Duration::new(0, 0))
                })
                .ok()
        }
    }
}

/// Errors of the subscription store.
#[derive(Debug)]
pub enum StoreError {
    /// The store could not be reached or queried
    Unavailable(String),
    /// The store refused the write
    Rejected(String),
}

impl Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "subscription store unavailable: {}", reason),
            StoreError::Rejected(reason) => write!(f, "subscription store rejected the write: {}", reason),
        }
    }
}

/// Errors of the identity provider.
#[derive(Debug, PartialEq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    Unavailable(String),
}

impl Error for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "missing bearer token"),
            AuthError::InvalidToken => write!(f, "invalid bearer token"),
            AuthError::Unavailable(reason) => write!(f, "auth provider unavailable: {}", reason),
        }
    }
}

/// Errors while loading the process-wide configuration. Always fatal.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// A required variable is not set or empty
    Missing(&'static str),
    /// A variable is set but cannot be used
    Invalid { name: &'static str, reason: String },
}

impl Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "missing configuration: {}", name),
            ConfigError::Invalid { name, reason } => write!(f, "invalid configuration {}: {}", name, reason),
        }
    }
}

/// Errors that abort a whole dispatch call. Failures of single subscriptions
/// never end up here.
#[derive(Debug)]
pub enum DispatchError {
    /// Subscriptions could not be loaded
    Storage(StoreError),
    /// The notification could not be serialized
    Payload(JsonError),
    /// No target user was given and broadcasting is disabled
    BroadcastDisabled,
}

impl Error for DispatchError {}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> DispatchError {
        DispatchError::Storage(err)
    }
}

impl From<JsonError> for DispatchError {
    fn from(err: JsonError) -> DispatchError {
        DispatchError::Payload(err)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DispatchError::Storage(err) => write!(f, "{}", err),
            DispatchError::Payload(err) => write!(f, "could not serialize notification: {}", err),
            DispatchError::BroadcastDisabled => write!(f, "a target user is required"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_parses_seconds() {
        assert_eq!(Some(Duration::from_secs(120)), RetryAfter::from_str("120"));
    }

    #[test]
    fn retry_after_in_the_past_is_zero() {
        assert_eq!(
            Some(Duration::new(0, 0)),
            RetryAfter::from_str("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn retry_after_rejects_garbage() {
        assert_eq!(None, RetryAfter::from_str("soon"));
    }

    #[test]
    fn only_404_and_410_are_gone() {
        let info = || ErrorInfo {
            code: 0,
            errno: 999,
            error: "unknown error".into(),
            message: "-".into(),
        };

        assert!(WebPushError::EndpointNotValid(info()).is_gone());
        assert!(WebPushError::EndpointNotFound(info()).is_gone());
        assert!(!WebPushError::ServerError {
            retry_after: None,
            info: info()
        }
        .is_gone());
        assert!(!WebPushError::Timeout.is_gone());
    }
}

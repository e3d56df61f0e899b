//! Process-wide configuration, read once at startup from the environment.

use std::time::Duration;

use crate::clients::DEFAULT_TIMEOUT;
use crate::error::ConfigError;
use crate::message::Urgency;
use crate::vapid::VapidKey;

pub const VAPID_SUBJECT: &str = "VAPID_SUBJECT";
pub const VAPID_PUBLIC_KEY: &str = "VAPID_PUBLIC_KEY";
pub const VAPID_PRIVATE_KEY: &str = "VAPID_PRIVATE_KEY";
pub const VAPID_PRIVATE_KEY_PEM: &str = "VAPID_PRIVATE_KEY_PEM";

pub const PUSH_TTL: &str = "PUSH_TTL";
pub const PUSH_URGENCY: &str = "PUSH_URGENCY";
pub const PUSH_ALLOW_BROADCAST: &str = "PUSH_ALLOW_BROADCAST";
pub const PUSH_TIMEOUT_SECS: &str = "PUSH_TIMEOUT_SECS";

/// The application server identity. Immutable once loaded, share it with an
/// `Arc`.
#[derive(Debug, Clone)]
pub struct VapidConfig {
    /// Contact URI placed in the `sub` claim, usually `mailto:` or `https:`.
    pub subject: String,
    pub key: VapidKey,
}

impl VapidConfig {
    pub fn new(subject: impl Into<String>, key: VapidKey) -> Result<VapidConfig, ConfigError> {
        let subject = subject.into();

        if subject.trim().is_empty() {
            return Err(ConfigError::Missing(VAPID_SUBJECT));
        }

        if !subject.starts_with("mailto:") && !subject.starts_with("https:") {
            warn!("VAPID subject {} is neither a mailto: nor an https: URI", subject);
        }

        Ok(VapidConfig { subject, key })
    }

    pub fn from_env() -> Result<VapidConfig, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through `lookup`. Either the base64url key
    /// pair (`VAPID_PRIVATE_KEY` and `VAPID_PUBLIC_KEY`) or a PEM encoded
    /// private key (`VAPID_PRIVATE_KEY_PEM`) must be present. When both a PEM
    /// key and a public key are given, they must belong together.
    pub fn from_lookup<F>(lookup: F) -> Result<VapidConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        let subject = var(VAPID_SUBJECT).ok_or(ConfigError::Missing(VAPID_SUBJECT))?;
        let public_key = var(VAPID_PUBLIC_KEY);

        let key = match (var(VAPID_PRIVATE_KEY), var(VAPID_PRIVATE_KEY_PEM)) {
            (Some(private_key), _) => {
                let public_key = public_key.ok_or(ConfigError::Missing(VAPID_PUBLIC_KEY))?;

                VapidKey::from_base64(private_key.trim(), public_key.trim()).map_err(|e| ConfigError::Invalid {
                    name: VAPID_PRIVATE_KEY,
                    reason: e.to_string(),
                })?
            }
            (None, Some(pem)) => {
                let key = VapidKey::from_pem(pem.as_bytes()).map_err(|e| ConfigError::Invalid {
                    name: VAPID_PRIVATE_KEY_PEM,
                    reason: e.to_string(),
                })?;

                if let Some(public_key) = public_key {
                    if public_key.trim() != key.public_key_base64() {
                        return Err(ConfigError::Invalid {
                            name: VAPID_PUBLIC_KEY,
                            reason: "does not match the private key".into(),
                        });
                    }
                }

                key
            }
            (None, None) => return Err(ConfigError::Missing(VAPID_PRIVATE_KEY)),
        };

        debug!("Loaded VAPID key {}", key.public_key_base64());

        Self::new(subject, key)
    }
}

/// Per-dispatch delivery settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOptions {
    /// Seconds the push service keeps an undelivered message.
    pub ttl: u32,
    pub urgency: Urgency,
    /// Whether a request without any target user reaches every subscription.
    pub allow_broadcast: bool,
    /// Upper bound for a single push service request.
    pub request_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions {
            ttl: 86_400,
            urgency: Urgency::Normal,
            allow_broadcast: false,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DispatchOptions {
    pub fn from_env() -> Result<DispatchOptions, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults, overridden by whichever `PUSH_*` variables are set.
    pub fn from_lookup<F>(lookup: F) -> Result<DispatchOptions, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = DispatchOptions::default();

        if let Some(ttl) = lookup(PUSH_TTL) {
            options.ttl = ttl.trim().parse().map_err(|_| ConfigError::Invalid {
                name: PUSH_TTL,
                reason: format!("`{}` is not a number of seconds", ttl),
            })?;
        }

        if let Some(urgency) = lookup(PUSH_URGENCY) {
            options.urgency = urgency
                .trim()
                .parse()
                .map_err(|reason| ConfigError::Invalid { name: PUSH_URGENCY, reason })?;
        }

        if let Some(allow) = lookup(PUSH_ALLOW_BROADCAST) {
            options.allow_broadcast = match allow.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: PUSH_ALLOW_BROADCAST,
                        reason: format!("`{}` is not a boolean", allow),
                    })
                }
            };
        }

        if let Some(timeout) = lookup(PUSH_TIMEOUT_SECS) {
            let secs: u64 = timeout.trim().parse().map_err(|_| ConfigError::Invalid {
                name: PUSH_TIMEOUT_SECS,
                reason: format!("`{}` is not a number of seconds", timeout),
            })?;

            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: PUSH_TIMEOUT_SECS,
                    reason: "must be at least one second".into(),
                });
            }

            options.request_timeout = Duration::from_secs(secs);
        }

        Ok(options)
    }
}

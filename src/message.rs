use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use http::uri::Uri;

use crate::{base64url, error::WebPushError, http_ece::HttpEce, vapid::VapidSignature};

/// Encryption keys from the client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionKeys {
    /// The public key
    pub p256dh: String,
    /// Authentication secret
    pub auth: String,
}

/// Client info for sending the notification. Maps the values from browser's
/// subscription info JSON data.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionInfo {
    /// The endpoint URI for sending the notification.
    pub endpoint: String,
    /// The encryption key and secret for payload encryption.
    pub keys: SubscriptionKeys,
}

impl SubscriptionInfo {
    /// A constructor function to create a new `SubscriptionInfo`, if not using
    /// Serde's serialization.
    pub fn new<S>(endpoint: S, p256dh: S, auth: S) -> SubscriptionInfo
    where
        S: Into<String>,
    {
        SubscriptionInfo {
            endpoint: endpoint.into(),
            keys: SubscriptionKeys {
                p256dh: p256dh.into(),
                auth: auth.into(),
            },
        }
    }
}

/// How urgently the push service should deliver the message, sent in the
/// `Urgency` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    VeryLow,
    Low,
    #[default]
    Normal,
    High,
}

impl Display for Urgency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let urgency = match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        };

        f.write_str(urgency)
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very-low" => Ok(Urgency::VeryLow),
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            other => Err(format!("unknown urgency `{}`", other)),
        }
    }
}

/// The push content payload, already in an encrypted form.
#[derive(Debug, PartialEq)]
pub struct WebPushPayload {
    /// Encrypted content data.
    pub content: Vec<u8>,
    /// Headers depending on the authorization scheme.
    pub crypto_headers: Vec<(&'static str, String)>,
    /// The encryption standard.
    pub content_encoding: &'static str,
}

/// Everything needed to send a push notification to the user.
#[derive(Debug)]
pub struct WebPushMessage {
    /// The endpoint URI where to send the payload.
    pub endpoint: Uri,
    /// Time to live, how long the message should wait in the server if user is
    /// not online.
    pub ttl: u32,
    /// Delivery urgency.
    pub urgency: Urgency,
    /// The encrypted request payload, if sending any data.
    pub payload: Option<WebPushPayload>,
}

/// The main class for creating a notification payload.
pub struct WebPushMessageBuilder<'a> {
    subscription_info: &'a SubscriptionInfo,
    payload: Option<&'a [u8]>,
    ttl: u32,
    urgency: Urgency,
    vapid_signature: Option<VapidSignature>,
}

impl<'a> fmt::Debug for WebPushMessageBuilder<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebPushMessageBuilder")
            .field("endpoint", &self.subscription_info.endpoint)
            .field("ttl", &self.ttl)
            .field("urgency", &self.urgency)
            .finish_non_exhaustive()
    }
}

impl<'a> WebPushMessageBuilder<'a> {
    /// Creates a builder for generating the web push payload.
    ///
    /// All parameters are from the subscription info given by browser when
    /// subscribing to push notifications.
    pub fn new(subscription_info: &'a SubscriptionInfo) -> WebPushMessageBuilder<'a> {
        WebPushMessageBuilder {
            subscription_info,
            ttl: 86_400,
            urgency: Urgency::default(),
            payload: None,
            vapid_signature: None,
        }
    }

    /// How long the server should keep the message if it cannot be delivered
    /// currently, in seconds.
    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    pub fn set_urgency(&mut self, urgency: Urgency) {
        self.urgency = urgency;
    }

    /// Add a VAPID signature to the request. To be generated with the
    /// [`VapidSigner`](crate::vapid::VapidSigner).
    pub fn set_vapid_signature(&mut self, vapid_signature: VapidSignature) {
        self.vapid_signature = Some(vapid_signature);
    }

    /// If set, the client will get content in the notification.
    pub fn set_payload(&mut self, payload: &'a [u8]) {
        self.payload = Some(payload);
    }

    /// Builds and if set, encrypts the payload.
    pub fn build(self) -> Result<WebPushMessage, WebPushError> {
        let endpoint: Uri = self.subscription_info.endpoint.parse()?;

        let payload = match self.payload {
            Some(content) => {
                let p256dh = base64url::decode(&self.subscription_info.keys.p256dh)
                    .map_err(|_| WebPushError::InvalidCryptoKeys)?;
                let auth = base64url::decode(&self.subscription_info.keys.auth)
                    .map_err(|_| WebPushError::InvalidCryptoKeys)?;

                let http_ece = HttpEce::new(&p256dh, &auth);

                let mut crypto_headers = Vec::new();
                if let Some(signature) = &self.vapid_signature {
                    crypto_headers.push(("Authorization", signature.header_value()));
                }

                Some(WebPushPayload {
                    content: http_ece.encrypt(content)?,
                    crypto_headers,
                    content_encoding: "aes128gcm",
                })
            }
            None => None,
        };

        Ok(WebPushMessage {
            endpoint,
            ttl: self.ttl,
            urgency: self.urgency,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use p256::{elliptic_curve::sec1::ToEncodedPoint, SecretKey};
    use rand::rngs::OsRng;

    use super::*;
    use crate::http_ece;

    #[test]
    fn deserializes_browser_subscription_json() {
        let info: SubscriptionInfo = serde_json::from_value(serde_json::json!({
            "endpoint": "https://fcm.googleapis.com/fcm/send/eKClHsXFm9E:APA91bH2x3gNOMv4dF1lQfCgIfOet8EngqKCAUS5",
            "expirationTime": null,
            "keys": {
                "p256dh": "BGa4N1PI79lboMR_YrwCiCsgp35DRvedt7opHcf0yM3iOBTSoQYqQLwWxAfRKE6tsDnReWmhsImkhDF_DBdkNSU",
                "auth": "EvcWjEgzr4rbvhfi3yds0A"
            }
        }))
        .unwrap();

        assert_eq!("EvcWjEgzr4rbvhfi3yds0A", info.keys.auth);
    }

    #[test]
    fn urgency_round_trips_through_its_header_form() {
        for urgency in [Urgency::VeryLow, Urgency::Low, Urgency::Normal, Urgency::High] {
            assert_eq!(urgency, urgency.to_string().parse().unwrap());
        }

        assert!("urgent".parse::<Urgency>().is_err());
    }

    #[test]
    fn builds_an_encrypted_message() {
        let secret = SecretKey::random(&mut OsRng);
        let p256dh = base64url::encode(secret.public_key().to_encoded_point(false).as_bytes());
        let auth = [3u8; 16];
        let encoded_auth = base64url::encode(auth);
        let info = SubscriptionInfo::new(
            "https://updates.push.services.mozilla.com/wpush/v2/gAAAAABaso4Vajy4STM25r5y5oFfyN451rUmES6mhQngxABxbZB5q",
            p256dh.as_str(),
            encoded_auth.as_str(),
        );

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_ttl(420);
        builder.set_urgency(Urgency::High);
        builder.set_vapid_signature(VapidSignature {
            auth_t: "foo".into(),
            auth_k: "bar".into(),
        });
        builder.set_payload(b"test");

        let message = builder.build().unwrap();
        let payload = message.payload.unwrap();

        assert_eq!(420, message.ttl);
        assert_eq!(Urgency::High, message.urgency);
        assert_eq!("aes128gcm", payload.content_encoding);
        assert_eq!(vec![("Authorization", "vapid t=foo, k=bar".to_string())], payload.crypto_headers);
        assert_eq!(b"test".to_vec(), http_ece::decrypt(&payload.content, &secret, &auth).unwrap());
    }

    #[test]
    fn rejects_undecodable_keys() {
        let info = SubscriptionInfo::new("https://push.example.com/abc", "not base64!", "xS03Fi5ErfTNH_l9WHE9Ig");

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(b"test");

        assert!(matches!(builder.build(), Err(WebPushError::InvalidCryptoKeys)));
    }

    #[test]
    fn rejects_an_invalid_endpoint() {
        let info = SubscriptionInfo::new("not a uri", "", "");

        assert!(matches!(
            WebPushMessageBuilder::new(&info).build(),
            Err(WebPushError::InvalidUri)
        ));
    }
}

//! # Fitpush
//!
//! Web Push notification dispatch for the fitness app: VAPID signed,
//! aes128gcm encrypted notifications delivered to every browser a user
//! subscribed with.
//!
//! The default client is built on [`isahc`](https://crates.io/crates/isahc);
//! enable the `hyper-client` feature for a Tokio only build.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! use fitpush::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let vapid = Arc::new(VapidConfig::from_env()?);
//! let options = DispatchOptions::from_env()?;
//! let dispatcher = Dispatcher::with_isahc_client(vapid, MemorySubscriptionStore::new(), options)?;
//!
//! let notification = NotificationPayload::new("Workout", "Leg day starts in 10 minutes")
//!     .with_tag("workout-reminder");
//!
//! let summary = dispatcher
//!     .dispatch(&notification, Target::User("alice".into()))
//!     .await?;
//!
//! println!("{} sent, {} failed", summary.sent, summary.failed);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub use crate::auth::{bearer_token, AuthProvider, AuthenticatedUser, StaticTokenAuth};
#[cfg(feature = "hyper-client")]
pub use crate::clients::hyper_client::HyperWebPushClient;
#[cfg(feature = "isahc-client")]
pub use crate::clients::isahc_client::IsahcWebPushClient;
pub use crate::clients::{request_builder, WebPushClient};
pub use crate::config::{DispatchOptions, VapidConfig};
pub use crate::dispatcher::{DeliveryFailure, DeliveryOutcome, DispatchSummary, Dispatcher, Target};
pub use crate::endpoint::{configuration_error, NotificationService, SendNotificationRequest};
pub use crate::error::{AuthError, ConfigError, DispatchError, ErrorInfo, StoreError, WebPushError};
pub use crate::http_ece::HttpEce;
pub use crate::message::{
    SubscriptionInfo, SubscriptionKeys, Urgency, WebPushMessage, WebPushMessageBuilder, WebPushPayload,
};
pub use crate::notification::NotificationPayload;
pub use crate::store::{MemorySubscriptionStore, PushSubscription, SubscriptionFilter, SubscriptionStore};
pub use crate::vapid::{VapidKey, VapidSignature, VapidSigner};

pub mod auth;
pub mod base64url;
pub mod clients;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
mod error;
pub mod http_ece;
mod message;
mod notification;
pub mod store;
#[cfg(test)]
mod testing;
pub mod vapid;

//! Contains implementations of web push clients.
//!
//! [`request_builder`] contains the functions used to send and consume push http messages.
//! This module should be consumed by each client, by using [`http`]'s flexible api.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::WebPushError;
use crate::message::WebPushMessage;

pub mod request_builder;

#[cfg(feature = "hyper-client")]
pub mod hyper_client;

#[cfg(feature = "isahc-client")]
pub mod isahc_client;

/// Responses larger than this are not read.
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// How long a push service may take to answer before the request is
/// abandoned.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An async client for sending the notification payload.
#[async_trait]
pub trait WebPushClient: Send + Sync {
    /// Sends a notification. Errors of the push service are classified by
    /// [`request_builder::parse_response`].
    async fn send(&self, message: WebPushMessage) -> Result<(), WebPushError>;
}

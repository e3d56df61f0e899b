//! The HTTP facing side: request bodies in, JSON responses out.
//!
//! The service is transport agnostic, it takes the `Authorization` header and
//! the raw body and answers with an [`http::Response`], so it can be mounted
//! into any server.

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode, Uri};
use serde_json::{json, Value};

use crate::auth::{bearer_token, AuthProvider, AuthenticatedUser};
use crate::base64url;
use crate::clients::WebPushClient;
use crate::dispatcher::{Dispatcher, Target};
use crate::error::{ConfigError, DispatchError};
use crate::http_ece::AUTH_SECRET_LENGTH;
use crate::message::SubscriptionKeys;
use crate::notification::NotificationPayload;
use crate::store::{PushSubscription, SubscriptionFilter, SubscriptionStore};
use crate::vapid::{audience_for, PUBLIC_KEY_LENGTH};

/// Body of a send request: the notification plus an optional target user.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    #[serde(flatten)]
    pub notification: NotificationPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Body of a subscribe request, the browser's `PushSubscription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

pub struct NotificationService<S, A, C> {
    dispatcher: Dispatcher<S, C>,
    auth: A,
}

impl<S, A, C> NotificationService<S, A, C>
where
    S: SubscriptionStore,
    A: AuthProvider,
    C: WebPushClient,
{
    pub fn new(dispatcher: Dispatcher<S, C>, auth: A) -> Self {
        NotificationService { dispatcher, auth }
    }

    pub fn dispatcher(&self) -> &Dispatcher<S, C> {
        &self.dispatcher
    }

    /// Sends a notification.
    ///
    /// The target is the `userId` of the body, otherwise the authenticated
    /// caller, otherwise everybody if broadcasting is enabled. A token that
    /// does not validate counts as no token.
    pub async fn send(&self, authorization: Option<&str>, body: &[u8]) -> Response<Vec<u8>> {
        let request: SendNotificationRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)),
        };

        let target = match request.user_id.filter(|id| !id.is_empty()) {
            Some(user_id) => Target::User(user_id),
            None => match self.caller(authorization).await {
                Some(user) => Target::User(user.user_id),
                None => Target::Broadcast,
            },
        };

        match self.dispatcher.dispatch(&request.notification, target).await {
            Ok(summary) if summary.total == 0 => json_response(
                StatusCode::OK,
                json!({ "message": "No subscriptions found", "sent": 0, "failed": 0, "total": 0 }),
            ),
            Ok(summary) => json_response(
                StatusCode::OK,
                json!({
                    "message": format!("Sent {} of {} notifications", summary.sent, summary.total),
                    "sent": summary.sent,
                    "failed": summary.failed,
                    "total": summary.total,
                }),
            ),
            Err(DispatchError::BroadcastDisabled) => {
                error_response(StatusCode::BAD_REQUEST, DispatchError::BroadcastDisabled.to_string())
            }
            Err(e) => {
                error!("Dispatch failed: {}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    /// Stores the caller's browser subscription, replacing an earlier one
    /// with the same endpoint.
    pub async fn subscribe(&self, authorization: Option<&str>, body: &[u8]) -> Response<Vec<u8>> {
        let user = match self.caller(authorization).await {
            Some(user) => user,
            None => return error_response(StatusCode::UNAUTHORIZED, "authentication required"),
        };

        let request: SubscribeRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)),
        };

        if let Err(reason) = validate_subscription(&request) {
            return error_response(StatusCode::BAD_REQUEST, reason);
        }

        let subscription = PushSubscription {
            endpoint: request.endpoint,
            p256dh_key: request.keys.p256dh,
            auth_secret: request.keys.auth,
            user_id: user.user_id,
            user_agent: request.user_agent,
        };

        match self.dispatcher.store().upsert(&subscription).await {
            Ok(()) => {
                info!("Stored subscription {} of {}", subscription.endpoint, subscription.user_id);
                json_response(StatusCode::CREATED, json!({ "message": "Subscribed" }))
            }
            Err(e) => {
                error!("Could not store subscription: {}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    /// Removes one of the caller's subscriptions.
    pub async fn unsubscribe(&self, authorization: Option<&str>, body: &[u8]) -> Response<Vec<u8>> {
        let user = match self.caller(authorization).await {
            Some(user) => user,
            None => return error_response(StatusCode::UNAUTHORIZED, "authentication required"),
        };

        let request: UnsubscribeRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)),
        };

        let store = self.dispatcher.store();

        let owned = match store.list(&SubscriptionFilter::user(user.user_id)).await {
            Ok(subscriptions) => subscriptions.iter().any(|s| s.endpoint == request.endpoint),
            Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        if !owned {
            return error_response(StatusCode::NOT_FOUND, "subscription not found");
        }

        match store.delete(&request.endpoint).await {
            Ok(()) => json_response(StatusCode::OK, json!({ "message": "Unsubscribed" })),
            Err(e) => {
                error!("Could not remove subscription {}: {}", request.endpoint, e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    /// The application server key browsers subscribe with.
    pub fn public_key(&self) -> Response<Vec<u8>> {
        json_response(
            StatusCode::OK,
            json!({ "publicKey": self.dispatcher.vapid().key.public_key_base64() }),
        )
    }

    async fn caller(&self, authorization: Option<&str>) -> Option<AuthenticatedUser> {
        let token = authorization.and_then(bearer_token)?;

        match self.auth.validate_token(token).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!("Ignoring bearer token: {}", e);
                None
            }
        }
    }
}

/// The answer for every request while the VAPID configuration could not be
/// loaded.
pub fn configuration_error(err: &ConfigError) -> Response<Vec<u8>> {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("push notifications are not configured: {}", err))
}

fn validate_subscription(request: &SubscribeRequest) -> Result<(), String> {
    let endpoint: Uri = request
        .endpoint
        .parse()
        .map_err(|_| "endpoint is not a valid URL".to_string())?;

    if endpoint.scheme_str() != Some("https") || audience_for(&endpoint).is_err() {
        return Err("endpoint must be an https URL".into());
    }

    match base64url::decode(&request.keys.p256dh) {
        Ok(key) if key.len() == PUBLIC_KEY_LENGTH && key[0] == 0x04 => {}
        _ => return Err("p256dh must be an uncompressed P-256 public key".into()),
    }

    match base64url::decode(&request.keys.auth) {
        Ok(auth) if auth.len() == AUTH_SECRET_LENGTH => Ok(()),
        _ => Err(format!("auth must be {} bytes", AUTH_SECRET_LENGTH)),
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response<Vec<u8>> {
    json_response(status, json!({ "error": message.into() }))
}

fn json_response(status: StatusCode, body: Value) -> Response<Vec<u8>> {
    let mut response = Response::new(serde_json::to_vec(&body).unwrap_or_default());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

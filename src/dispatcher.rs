//! Fans a notification out to every subscription of a target.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use http::Uri;

#[cfg(feature = "hyper-client")]
use crate::clients::hyper_client::HyperWebPushClient;
#[cfg(feature = "isahc-client")]
use crate::clients::isahc_client::IsahcWebPushClient;
use crate::clients::WebPushClient;
use crate::config::{DispatchOptions, VapidConfig};
use crate::error::{DispatchError, WebPushError};
use crate::message::WebPushMessageBuilder;
use crate::notification::NotificationPayload;
use crate::store::{PushSubscription, SubscriptionFilter, SubscriptionStore};
use crate::vapid::{audience_for, VapidSigner};

/// Who receives a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Every device of one user.
    User(String),
    /// Every stored subscription. Refused unless
    /// [`DispatchOptions::allow_broadcast`] is set.
    Broadcast,
}

/// Why a single subscription did not receive the notification.
#[derive(Debug)]
pub enum DeliveryFailure {
    Signing(WebPushError),
    Encryption(WebPushError),
    /// The push service answered 404 or 410, the subscription was removed.
    Gone(WebPushError),
    /// Any other refusal, timeout or transport error. The subscription is
    /// kept.
    Rejected(WebPushError),
}

impl DeliveryFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            DeliveryFailure::Signing(_) => "signing",
            DeliveryFailure::Encryption(_) => "encryption",
            DeliveryFailure::Gone(_) => "gone",
            DeliveryFailure::Rejected(_) => "delivery",
        }
    }

    pub fn error(&self) -> &WebPushError {
        match self {
            DeliveryFailure::Signing(err)
            | DeliveryFailure::Encryption(err)
            | DeliveryFailure::Gone(err)
            | DeliveryFailure::Rejected(err) => err,
        }
    }
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.reason(),
            self.error().short_description(),
            self.error()
        )
    }
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub endpoint: String,
    pub result: Result<(), DeliveryFailure>,
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate of one dispatch call, one outcome per subscription that existed
/// when the call started.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchSummary {
    pub fn from_outcomes(outcomes: Vec<DeliveryOutcome>) -> DispatchSummary {
        let sent = outcomes.iter().filter(|o| o.is_sent()).count();

        DispatchSummary {
            sent,
            failed: outcomes.len() - sent,
            total: outcomes.len(),
            outcomes,
        }
    }
}

/// Signs, encrypts and sends notifications to stored subscriptions.
///
/// The VAPID configuration is shared and never mutated. Per subscription work
/// runs concurrently and one failing subscription never affects the others.
pub struct Dispatcher<S, C> {
    vapid: Arc<VapidConfig>,
    store: S,
    client: C,
    options: DispatchOptions,
}

impl<S, C> Dispatcher<S, C>
where
    S: SubscriptionStore,
    C: WebPushClient,
{
    pub fn new(vapid: Arc<VapidConfig>, store: S, client: C) -> Self {
        Dispatcher {
            vapid,
            store,
            client,
            options: DispatchOptions::default(),
        }
    }

    /// Replaces the delivery options. The request timeout only takes effect
    /// through the constructors that build the client,
    /// [`with_isahc_client`](Dispatcher::with_isahc_client) and
    /// [`with_hyper_client`](Dispatcher::with_hyper_client).
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn vapid(&self) -> &VapidConfig {
        &self.vapid
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Sends the notification to every subscription of the target.
    ///
    /// Only a failing subscription query, an unserializable payload or a
    /// refused broadcast make the whole call fail. Everything that goes wrong
    /// for a single subscription is reported in its [`DeliveryOutcome`].
    pub async fn dispatch(
        &self,
        notification: &NotificationPayload,
        target: Target,
    ) -> Result<DispatchSummary, DispatchError> {
        let filter = match target {
            Target::User(user_id) => SubscriptionFilter::user(user_id),
            Target::Broadcast if self.options.allow_broadcast => SubscriptionFilter::default(),
            Target::Broadcast => return Err(DispatchError::BroadcastDisabled),
        };

        let subscriptions = self.store.list(&filter).await?;

        if subscriptions.is_empty() {
            debug!("No subscriptions for {:?}", filter);
            return Ok(DispatchSummary::default());
        }

        let payload = notification.to_payload()?;

        let deliveries = subscriptions.iter().map(|subscription| self.deliver(subscription, &payload));
        let summary = DispatchSummary::from_outcomes(join_all(deliveries).await);

        info!(
            "Dispatched notification to {} subscriptions, {} sent, {} failed",
            summary.total, summary.sent, summary.failed
        );

        Ok(summary)
    }

    async fn deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryOutcome {
        let result = match self.try_deliver(subscription, payload).await {
            Err(DeliveryFailure::Rejected(err)) if err.is_gone() => {
                info!("Subscription {} is gone, removing it", subscription.endpoint);

                if let Err(store_err) = self.store.delete(&subscription.endpoint).await {
                    error!("Could not remove subscription {}: {}", subscription.endpoint, store_err);
                }

                Err(DeliveryFailure::Gone(err))
            }
            Err(failure) => {
                warn!("Push to {} failed: {}", subscription.endpoint, failure);
                Err(failure)
            }
            Ok(()) => {
                debug!("Push to {} accepted", subscription.endpoint);
                Ok(())
            }
        };

        DeliveryOutcome {
            endpoint: subscription.endpoint.clone(),
            result,
        }
    }

    async fn try_deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<(), DeliveryFailure> {
        let info = subscription.subscription_info();

        let signature = info
            .endpoint
            .parse::<Uri>()
            .map_err(WebPushError::from)
            .and_then(|endpoint| audience_for(&endpoint))
            .and_then(|audience| VapidSigner::sign(&self.vapid.key, &audience, &self.vapid.subject))
            .map_err(DeliveryFailure::Signing)?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_ttl(self.options.ttl);
        builder.set_urgency(self.options.urgency);
        builder.set_vapid_signature(signature);
        builder.set_payload(payload);

        let message = builder.build().map_err(DeliveryFailure::Encryption)?;

        self.client.send(message).await.map_err(DeliveryFailure::Rejected)
    }
}

#[cfg(feature = "isahc-client")]
impl<S> Dispatcher<S, IsahcWebPushClient>
where
    S: SubscriptionStore,
{
    /// A dispatcher sending through isahc, with requests bounded by
    /// `options.request_timeout`.
    pub fn with_isahc_client(
        vapid: Arc<VapidConfig>,
        store: S,
        options: DispatchOptions,
    ) -> Result<Self, WebPushError> {
        let client = IsahcWebPushClient::with_timeout(options.request_timeout)?;

        Ok(Dispatcher::new(vapid, store, client).with_options(options))
    }
}

#[cfg(feature = "hyper-client")]
impl<S> Dispatcher<S, HyperWebPushClient>
where
    S: SubscriptionStore,
{
    /// A dispatcher sending through hyper, with requests bounded by
    /// `options.request_timeout`.
    pub fn with_hyper_client(vapid: Arc<VapidConfig>, store: S, options: DispatchOptions) -> Self {
        let client = HyperWebPushClient::with_timeout(options.request_timeout);

        Dispatcher::new(vapid, store, client).with_options(options)
    }
}

//! Persistence of browser push subscriptions.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{SubscriptionInfo, SubscriptionKeys};

/// A stored push subscription of one browser installation. The endpoint is
/// the unique key of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    /// Subscriber's uncompressed P-256 public key, base64url.
    pub p256dh_key: String,
    /// Subscriber's 16 byte auth secret, base64url.
    pub auth_secret: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl PushSubscription {
    /// The endpoint and keys in the shape the message builder consumes.
    pub fn subscription_info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            endpoint: self.endpoint.clone(),
            keys: SubscriptionKeys {
                p256dh: self.p256dh_key.clone(),
                auth: self.auth_secret.clone(),
            },
        }
    }
}

/// Restricts which subscriptions [`SubscriptionStore::list`] returns. The
/// default filter matches every subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionFilter {
    pub user_id: Option<String>,
}

impl SubscriptionFilter {
    pub fn user(user_id: impl Into<String>) -> Self {
        SubscriptionFilter {
            user_id: Some(user_id.into()),
        }
    }

    pub fn matches(&self, subscription: &PushSubscription) -> bool {
        match &self.user_id {
            Some(user_id) => &subscription.user_id == user_id,
            None => true,
        }
    }
}

/// Storage backend for subscriptions.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Subscriptions matching the filter, in no particular order.
    async fn list(&self, filter: &SubscriptionFilter) -> Result<Vec<PushSubscription>, StoreError>;

    /// Removes the subscription with the given endpoint. Deleting a missing
    /// endpoint is not an error.
    async fn delete(&self, endpoint: &str) -> Result<(), StoreError>;

    /// Inserts the subscription, replacing keys and owner of an existing
    /// record with the same endpoint.
    async fn upsert(&self, subscription: &PushSubscription) -> Result<(), StoreError>;
}

/// Keeps subscriptions in process memory.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Mutex<Vec<PushSubscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<PushSubscription>>, StoreError> {
        self.subscriptions
            .lock()
            .map_err(|_| StoreError::Unavailable("subscription table lock poisoned".into()))
    }
}

impl From<Vec<PushSubscription>> for MemorySubscriptionStore {
    fn from(subscriptions: Vec<PushSubscription>) -> Self {
        MemorySubscriptionStore {
            subscriptions: Mutex::new(subscriptions),
        }
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn list(&self, filter: &SubscriptionFilter) -> Result<Vec<PushSubscription>, StoreError> {
        Ok(self.lock()?.iter().filter(|s| filter.matches(s)).cloned().collect())
    }

    async fn delete(&self, endpoint: &str) -> Result<(), StoreError> {
        self.lock()?.retain(|s| s.endpoint != endpoint);
        Ok(())
    }

    async fn upsert(&self, subscription: &PushSubscription) -> Result<(), StoreError> {
        let mut subscriptions = self.lock()?;

        match subscriptions.iter_mut().find(|s| s.endpoint == subscription.endpoint) {
            Some(existing) => *existing = subscription.clone(),
            None => subscriptions.push(subscription.clone()),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(endpoint: &str, user_id: &str) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.into(),
            p256dh_key: concat!(
                "BGa4N1PI79lboMR_YrwCiCsgp35DRvedt7opHcf0yM3iOBTSoQYqQLwWxAfRKE6ts",
                "DnReWmhsImkhDF_DBdkNSU"
            )
            .into(),
            auth_secret: "EvcWjEgzr4rbvhfi3yds0A".into(),
            user_id: user_id.into(),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_endpoint() {
        let store = MemorySubscriptionStore::new();
        store.upsert(&subscription("https://push.example.com/a", "alice")).await.unwrap();

        let mut resubscribed = subscription("https://push.example.com/a", "alice");
        resubscribed.auth_secret = "AAAAAAAAAAAAAAAAAAAAAA".into();
        store.upsert(&resubscribed).await.unwrap();

        let all = store.list(&SubscriptionFilter::default()).await.unwrap();
        assert_eq!(vec![resubscribed], all);
    }

    #[tokio::test]
    async fn list_filters_by_user() {
        let store = MemorySubscriptionStore::from(vec![
            subscription("https://push.example.com/a", "alice"),
            subscription("https://push.example.com/b", "bob"),
            subscription("https://push.example.com/c", "alice"),
        ]);

        let alice = store.list(&SubscriptionFilter::user("alice")).await.unwrap();
        let everyone = store.list(&SubscriptionFilter::default()).await.unwrap();

        assert_eq!(2, alice.len());
        assert!(alice.iter().all(|s| s.user_id == "alice"));
        assert_eq!(3, everyone.len());
    }

    #[tokio::test]
    async fn delete_removes_only_the_endpoint() {
        let store = MemorySubscriptionStore::from(vec![
            subscription("https://push.example.com/a", "alice"),
            subscription("https://push.example.com/b", "alice"),
        ]);

        store.delete("https://push.example.com/a").await.unwrap();
        store.delete("https://push.example.com/missing").await.unwrap();

        let left = store.list(&SubscriptionFilter::default()).await.unwrap();
        assert_eq!(vec![subscription("https://push.example.com/b", "alice")], left);
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(subscription("https://push.example.com/a", "alice")).unwrap();

        assert_eq!("alice", value["userId"]);
        assert_eq!("EvcWjEgzr4rbvhfi3yds0A", value["authSecret"]);
        assert!(value.get("userAgent").is_none());
    }

    #[test]
    fn converts_into_subscription_info() {
        let info = subscription("https://push.example.com/a", "alice").subscription_info();

        assert_eq!("https://push.example.com/a", info.endpoint);
        assert_eq!("EvcWjEgzr4rbvhfi3yds0A", info.keys.auth);
    }
}

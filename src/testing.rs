//! Collaborator doubles shared by the unit tests.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::{Request, StatusCode};
use p256::{elliptic_curve::sec1::ToEncodedPoint, SecretKey};
use rand::rngs::OsRng;

use crate::base64url;
use crate::clients::request_builder::{build_request, parse_response};
use crate::clients::WebPushClient;
use crate::config::VapidConfig;
use crate::error::{StoreError, WebPushError};
use crate::message::WebPushMessage;
use crate::store::{MemorySubscriptionStore, PushSubscription, SubscriptionFilter, SubscriptionStore};
use crate::vapid::VapidKey;

pub fn vapid_config() -> Arc<VapidConfig> {
    Arc::new(VapidConfig::new("mailto:ops@example.com", VapidKey::generate()).unwrap())
}

/// A push endpoint that accepts connections and never answers.
pub fn silent_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let mut open = Vec::new();
        for stream in listener.incoming() {
            open.push(stream);
        }
    });

    format!("http://{}/wpush/v2/silent", address)
}

/// The browser side of a subscription, able to decrypt what it receives.
pub struct Subscriber {
    pub secret: SecretKey,
    pub auth: [u8; 16],
}

impl Subscriber {
    pub fn new() -> Subscriber {
        let mut auth = [0u8; 16];
        rand::RngCore::fill_bytes(&mut OsRng, &mut auth);

        Subscriber {
            secret: SecretKey::random(&mut OsRng),
            auth,
        }
    }

    pub fn subscription(&self, endpoint: &str, user_id: &str) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.into(),
            p256dh_key: base64url::encode(self.secret.public_key().to_encoded_point(false).as_bytes()),
            auth_secret: base64url::encode(self.auth),
            user_id: user_id.into(),
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".into()),
        }
    }
}

pub enum Reply {
    Status(StatusCode),
    Timeout,
}

/// Records every request and answers per endpoint. Unknown endpoints get
/// `201 Created`.
#[derive(Default)]
pub struct MockClient {
    replies: HashMap<String, Reply>,
    pub requests: Mutex<Vec<Request<Vec<u8>>>>,
}

impl MockClient {
    pub fn new() -> MockClient {
        Self::default()
    }

    pub fn reply(mut self, endpoint: &str, reply: Reply) -> MockClient {
        self.replies.insert(endpoint.into(), reply);
        self
    }

    pub fn sent(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request_to(&self, endpoint: &str) -> Option<Request<Vec<u8>>> {
        let requests = self.requests.lock().unwrap();
        let request = requests.iter().find(|r| r.uri() == endpoint)?;

        let mut copy = Request::new(request.body().clone());
        *copy.method_mut() = request.method().clone();
        *copy.uri_mut() = request.uri().clone();
        *copy.headers_mut() = request.headers().clone();
        Some(copy)
    }
}

#[async_trait]
impl WebPushClient for MockClient {
    async fn send(&self, message: WebPushMessage) -> Result<(), WebPushError> {
        let request = build_request::<Vec<u8>>(message)?;
        let endpoint = request.uri().to_string();
        self.requests.lock().unwrap().push(request);

        match self.replies.get(&endpoint) {
            Some(Reply::Status(status)) => parse_response(*status, b"{}".to_vec()),
            Some(Reply::Timeout) => Err(WebPushError::Timeout),
            None => parse_response(StatusCode::CREATED, vec![]),
        }
    }
}

/// Wraps a memory store and fails the operations it is told to.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemorySubscriptionStore,
    pub fail_list: bool,
    pub fail_delete: bool,
}

#[async_trait]
impl SubscriptionStore for FlakyStore {
    async fn list(&self, filter: &SubscriptionFilter) -> Result<Vec<PushSubscription>, StoreError> {
        if self.fail_list {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.list(filter).await
    }

    async fn delete(&self, endpoint: &str) -> Result<(), StoreError> {
        if self.fail_delete {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.delete(endpoint).await
    }

    async fn upsert(&self, subscription: &PushSubscription) -> Result<(), StoreError> {
        self.inner.upsert(subscription).await
    }
}

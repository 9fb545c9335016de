//! Shared helpers for mockpay-gateway integration tests.
//!
//! Webhook receivers are wiremock servers with responders that record every
//! request (body, headers, arrival time) so tests can assert attempt counts,
//! signatures and backoff gaps.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mockpay::{InMemoryPaymentStore, NewPayment, PaymentStore, Signer};
use mockpay_gateway::webhook::{RetryPolicy, WebhookDispatcher};
use mockpay_gateway::PaymentLifecycle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const SECRET: &str = "whsec_test_secret_key_12345";
pub const WEBHOOK_PATH: &str = "/api/orders/payment/webhook/v2";

/// A captured webhook request.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub received_at: Instant,
}

impl CapturedRequest {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("webhook body is JSON")
    }

    /// Header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Records every request and answers with a scripted sequence of statuses.
/// The last status repeats once the script runs out.
#[derive(Clone)]
pub struct ScriptedResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    statuses: Arc<Vec<u16>>,
    delay: Option<Duration>,
}

impl ScriptedResponder {
    pub fn with_status(status: u16) -> Self {
        Self::with_sequence(&[status])
    }

    pub fn with_sequence(statuses: &[u16]) -> Self {
        assert!(!statuses.is_empty());
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            statuses: Arc::new(statuses.to_vec()),
            delay: None,
        }
    }

    /// Delay every response (for timeout tests).
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Time between consecutive requests.
    pub fn gaps(&self) -> Vec<Duration> {
        let requests = self.requests();
        requests
            .windows(2)
            .map(|w| w[1].received_at.duration_since(w[0].received_at))
            .collect()
    }
}

impl Respond for ScriptedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
            received_at: Instant::now(),
        });

        let status = *self
            .statuses
            .get(index)
            .unwrap_or_else(|| self.statuses.last().unwrap());
        let template = ResponseTemplate::new(status).set_body_string(format!("status {status}"));
        match self.delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}

/// Start a webhook receiver answering with `responder`.
pub async fn receiver(responder: ScriptedResponder) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .respond_with(responder)
        .mount(&server)
        .await;
    server
}

pub fn callback_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), WEBHOOK_PATH)
}

/// A URL on a local port nothing listens on.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}{WEBHOOK_PATH}")
}

pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_delay: Duration::from_millis(20),
        timeout: Duration::from_secs(2),
    }
}

pub fn dispatcher(policy: RetryPolicy) -> WebhookDispatcher {
    WebhookDispatcher::new(reqwest::Client::new(), Signer::new(SECRET), policy)
}

pub fn lifecycle(policy: RetryPolicy) -> (PaymentLifecycle, Arc<InMemoryPaymentStore>) {
    let store = Arc::new(InMemoryPaymentStore::new());
    let lifecycle = PaymentLifecycle::new(
        store.clone() as Arc<dyn PaymentStore>,
        dispatcher(policy),
        Duration::from_millis(10),
    );
    (lifecycle, store)
}

pub fn new_payment(tx_id: &str, callback_url: &str) -> NewPayment {
    NewPayment {
        version: Some("v2".to_string()),
        tx_id: tx_id.to_string(),
        order_id: 12345,
        user_id: 1,
        amount: 10_000,
        callback_url: callback_url.to_string(),
    }
}

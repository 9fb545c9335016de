use std::time::{Duration, Instant};

use mockpay::{DeliveryError, PaymentError, Signer, HEADER_EVENT, HEADER_SIGNATURE};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use url::Url;

use crate::metrics;

/// Longest response-body excerpt kept in a failure cause.
const MAX_DETAIL_CHARS: usize = 512;

/// How many times to attempt a webhook and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; the wait after attempt `n` is `retry_delay * 2^n`.
    pub retry_delay: Duration,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: mockpay::DEFAULT_MAX_RETRIES,
            retry_delay: mockpay::DEFAULT_RETRY_DELAY,
            timeout: mockpay::DEFAULT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait between 0-based attempt `attempt` and the next one.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.retry_delay.checked_mul(factor).unwrap_or(Duration::MAX)
    }
}

/// Classified result of a single HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Status below 400. Stop, delivered.
    Success(u16),
    /// 5xx, timeout or transport failure. Try again if attempts remain.
    Retryable { kind: RetryKind, cause: String },
    /// 4xx. Stop, never retried.
    Terminal { status: u16, detail: String },
}

/// Why a retryable attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    ServerError,
    Timeout,
    Transport,
}

impl RetryKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            RetryKind::ServerError => "server_error",
            RetryKind::Timeout => "timeout",
            RetryKind::Transport => "transport_error",
        }
    }
}

/// Classify an HTTP status (and the response body, for the failure cause).
pub fn classify_status(status: u16, body: &str) -> AttemptOutcome {
    match status {
        s if s < 400 => AttemptOutcome::Success(s),
        s if s < 500 => AttemptOutcome::Terminal {
            status: s,
            detail: truncate(body),
        },
        s => AttemptOutcome::Retryable {
            kind: RetryKind::ServerError,
            cause: format!("HTTP {s}: {}", truncate(body)),
        },
    }
}

fn classify_transport_error(e: &reqwest::Error) -> AttemptOutcome {
    let (kind, cause) = if e.is_timeout() {
        (RetryKind::Timeout, format!("timeout: {e}"))
    } else if e.is_connect() {
        (RetryKind::Transport, format!("connection failed: {e}"))
    } else {
        (RetryKind::Transport, format!("request error: {e}"))
    };
    AttemptOutcome::Retryable { kind, cause }
}

/// Whole milliseconds for log fields, saturating at `u64::MAX`.
fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_DETAIL_CHARS).collect()
}

/// Successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Status code of the accepted response.
    pub status: u16,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// HTTP client shared by all deliveries. Redirects are not followed, so a
/// 3xx answer counts as accepted.
pub fn webhook_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("mockpay-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Check that a callback URL is an absolute http(s) URL with a host.
///
/// Plain HTTP is accepted (operators commonly run the receiver locally) but
/// logged, since the payload then travels in cleartext.
pub fn validate_callback_url(raw: &str) -> Result<Url, PaymentError> {
    let url = Url::parse(raw)
        .map_err(|e| PaymentError::InvalidRequest(format!("invalid callback_url: {e}")))?;

    match url.scheme() {
        "https" => {}
        "http" => {
            tracing::warn!(
                url = %raw,
                "callback URL does not use HTTPS, webhook payloads will be sent in cleartext"
            );
        }
        other => {
            return Err(PaymentError::InvalidRequest(format!(
                "callback_url must use http or https, got '{other}'"
            )));
        }
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(PaymentError::InvalidRequest(
            "callback_url must have a host".to_string(),
        ));
    }
    Ok(url)
}

/// Sends signed webhooks and retries transient failures.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    signer: Signer,
    auth_token: Option<String>,
    policy: RetryPolicy,
}

impl WebhookDispatcher {
    pub fn new(client: reqwest::Client, signer: Signer, policy: RetryPolicy) -> Self {
        Self {
            client,
            signer,
            auth_token: None,
            policy,
        }
    }

    /// Send `Authorization: Bearer <token>` with every webhook.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver `payload` to `url`.
    ///
    /// The payload is serialized and signed once; every attempt sends the
    /// same bytes with the same signature. Returns after the first attempt
    /// answered below 400, fails immediately on a 4xx, and otherwise retries
    /// with exponential backoff until the policy's attempts are used up.
    pub async fn deliver<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
        event_type: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let body = serde_json::to_vec(payload)?;
        let signature = match self.signer.sign(&body) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "cannot sign webhook");
                metrics::WEBHOOK_DELIVERIES
                    .with_label_values(&["misconfigured"])
                    .inc();
                return Err(e);
            }
        };

        let start = Instant::now();
        let result = self.run_attempts(url, &body, &signature, event_type).await;

        let outcome = match &result {
            Ok(_) => "delivered",
            Err(DeliveryError::ClientRejected { .. }) => "rejected",
            Err(_) => "exhausted",
        };
        metrics::WEBHOOK_DELIVERIES
            .with_label_values(&[outcome])
            .inc();
        metrics::WEBHOOK_LATENCY
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn run_attempts(
        &self,
        url: &str,
        body: &[u8],
        signature: &str,
        event_type: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let total = self.policy.total_attempts();
        let mut last_cause: Option<String> = None;

        for attempt in 0..total {
            match self.attempt(url, body, signature, event_type, attempt).await {
                AttemptOutcome::Success(status) => {
                    tracing::info!(
                        url = %url,
                        event = %event_type,
                        attempt,
                        status,
                        "webhook delivered"
                    );
                    return Ok(DeliveryReceipt {
                        status,
                        attempts: attempt + 1,
                    });
                }
                AttemptOutcome::Terminal { status, detail } => {
                    tracing::error!(
                        url = %url,
                        event = %event_type,
                        attempt,
                        status,
                        detail = %detail,
                        "webhook rejected by receiver, not retrying"
                    );
                    return Err(DeliveryError::ClientRejected { status, detail });
                }
                AttemptOutcome::Retryable { cause, .. } => {
                    tracing::warn!(
                        url = %url,
                        event = %event_type,
                        attempt,
                        cause = %cause,
                        "webhook attempt failed"
                    );
                    last_cause = Some(cause);

                    if attempt + 1 < total {
                        let delay = self.policy.backoff_for(attempt);
                        tracing::info!(
                            url = %url,
                            next_attempt = attempt + 1,
                            delay_ms = delay_millis(delay),
                            "scheduling webhook retry"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        match last_cause {
            Some(last_cause) => {
                tracing::error!(
                    url = %url,
                    event = %event_type,
                    attempts = total,
                    last_cause = %last_cause,
                    "webhook delivery exhausted all attempts"
                );
                Err(DeliveryError::Exhausted {
                    attempts: total,
                    last_cause,
                })
            }
            None => Err(DeliveryError::Unknown),
        }
    }

    async fn attempt(
        &self,
        url: &str,
        body: &[u8],
        signature: &str,
        event_type: &str,
        attempt: u32,
    ) -> AttemptOutcome {
        let mut req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_EVENT, event_type)
            .header(HEADER_SIGNATURE, signature)
            .timeout(self.policy.timeout);

        if let Some(ref token) = self.auth_token {
            req = req.bearer_auth(token);
        }

        let outcome = match req.body(body.to_vec()).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                tracing::debug!(url = %url, attempt, status, "webhook response");
                if status < 400 {
                    AttemptOutcome::Success(status)
                } else {
                    let text = resp.text().await.unwrap_or_default();
                    classify_status(status, &text)
                }
            }
            Err(e) => classify_transport_error(&e),
        };

        let label = match &outcome {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::Terminal { .. } => "client_error",
            AttemptOutcome::Retryable { kind, .. } => kind.as_label(),
        };
        metrics::WEBHOOK_ATTEMPTS.with_label_values(&[label]).inc();

        outcome
    }
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("signer", &self.signer)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("policy", &self.policy)
            .finish()
    }
}

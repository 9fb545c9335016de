use std::sync::Arc;

use mockpay::{InMemoryPaymentStore, PaymentStore, Signer};

use crate::config::GatewayConfig;
use crate::lifecycle::PaymentLifecycle;
use crate::webhook::{self, WebhookDispatcher};

/// Shared application state for the gateway server.
pub struct AppState {
    pub lifecycle: PaymentLifecycle,
    /// Bearer token for /metrics.
    pub metrics_token: Option<Vec<u8>>,
}

impl AppState {
    pub fn new(lifecycle: PaymentLifecycle, metrics_token: Option<Vec<u8>>) -> Self {
        Self {
            lifecycle,
            metrics_token,
        }
    }

    /// Wire the in-memory store, the webhook dispatcher and the lifecycle
    /// from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let dispatcher = WebhookDispatcher::new(
            webhook::webhook_client()?,
            Signer::new(config.webhook_secret.clone()),
            config.retry,
        )
        .with_auth_token(config.service_auth_token.clone());

        let store: Arc<dyn PaymentStore> = Arc::new(InMemoryPaymentStore::new());
        let lifecycle = PaymentLifecycle::new(store, dispatcher, config.settlement_delay);

        Ok(Self::new(
            lifecycle,
            config.metrics_token.clone().map(String::into_bytes),
        ))
    }
}

//! mockpay gateway: payment lifecycle, webhook delivery, and the HTTP server.
//!
//! New payments start `PENDING`, settle after a simulated delay (or on explicit
//! confirmation), and the operator system is notified with a signed webhook.
//! A webhook that cannot be delivered cancels the payment.
//!
//! # Modules
//!
//! - [`webhook`]: signed delivery with classification-driven retries and backoff
//! - [`lifecycle`]: the payment state machine and completion protocol
//! - [`routes`]: HTTP endpoints (create, confirm, lookup, listing, health, metrics)
//! - [`cors`]: CORS middleware for the server
//! - [`config`]: environment-sourced [`GatewayConfig`](config::GatewayConfig)
//! - [`state`]: shared [`AppState`](state::AppState)
//! - [`metrics`]: Prometheus metrics for deliveries and payments

pub mod config;
pub mod cors;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod webhook;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use lifecycle::PaymentLifecycle;
pub use state::AppState;
pub use webhook::{RetryPolicy, WebhookDispatcher};

//! Core types for the mockpay payment gateway.
//!
//! A payment is created `PENDING`, completed either automatically after a
//! simulated settlement delay or by an explicit confirmation, and the operator
//! system is told about the completion through a signed webhook. If that
//! webhook cannot be delivered the payment is cancelled.
//!
//! This crate holds the parts that do not touch the network:
//!
//! - [`payment`]: payment records, the status lifecycle and the webhook payload
//! - [`hmac`]: the webhook [`Signer`](hmac::Signer) (HMAC-SHA256, base64)
//! - [`store`]: the [`PaymentStore`](store::PaymentStore) trait and its in-memory implementation
//! - [`security`]: constant-time comparison for bearer tokens
//! - [`error`]: delivery and payment error taxonomy
//!
//! Delivery, retries and the HTTP server live in `mockpay-gateway`.

pub mod constants;
pub mod error;
pub mod hmac;
pub mod payment;
pub mod security;
pub mod store;

pub use constants::*;
pub use error::{DeliveryError, PaymentError};
pub use self::hmac::Signer;
pub use payment::{
    payment_id_for, NewPayment, PaymentRecord, PaymentStatus, StatusCounts, WebhookPayload,
};
pub use store::{InMemoryPaymentStore, PaymentStore};

use thiserror::Error;

use crate::payment::PaymentStatus;

/// Terminal outcome of a webhook delivery that did not succeed.
///
/// Every variant is final: the delivery engine has already stopped retrying
/// by the time one of these is returned.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The signing secret is missing. Not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The receiver answered with a 4xx status. Not retried.
    #[error("webhook rejected with HTTP {status}: {detail}")]
    ClientRejected { status: u16, detail: String },

    /// Every attempt hit a 5xx status or a transport failure.
    #[error("webhook delivery failed after {attempts} attempts: {last_cause}")]
    Exhausted { attempts: u32, last_cause: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook delivery failed for an unknown reason")]
    Unknown,
}

impl DeliveryError {
    /// The cause carried by this failure, for logs and API responses.
    pub fn cause(&self) -> String {
        match self {
            DeliveryError::ClientRejected { status, detail } => format!("HTTP {status}: {detail}"),
            DeliveryError::Exhausted { last_cause, .. } => last_cause.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors from payment record operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment not found: {0}")]
    NotFound(String),

    #[error("payment {payment_id} is already {status}")]
    InvalidState {
        payment_id: String,
        status: PaymentStatus,
    },

    #[error("payment already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

use actix_web::{HttpResponse, ResponseError};
use mockpay::PaymentError;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    /// Unknown payment id
    NotFound(String),
    /// Payment is not in a state that allows the operation
    InvalidState(String),
    /// Payment id already taken
    Conflict(String),
    /// Malformed request
    BadRequest(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "not found: {}", msg),
            ApiError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            ApiError::Conflict(msg) => write!(f, "conflict: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "bad request: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::NotFound(id) => ApiError::NotFound(id),
            e @ PaymentError::InvalidState { .. } => ApiError::InvalidState(e.to_string()),
            PaymentError::AlreadyExists(id) => ApiError::Conflict(id),
            PaymentError::InvalidRequest(msg) => ApiError::BadRequest(msg),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::NotFound(id) => HttpResponse::NotFound().json(serde_json::json!({
                "ok": false,
                "error": "payment_not_found",
                "message": format!("Payment '{}' not found", id)
            })),
            ApiError::InvalidState(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "ok": false,
                "error": "invalid_state",
                "message": msg
            })),
            ApiError::Conflict(id) => HttpResponse::Conflict().json(serde_json::json!({
                "ok": false,
                "error": "payment_exists",
                "message": format!("Payment '{}' already exists", id)
            })),
            ApiError::BadRequest(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "ok": false,
                "error": "invalid_request",
                "message": msg
            })),
        }
    }
}

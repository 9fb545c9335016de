use actix_web::{get, post, web, HttpRequest, HttpResponse};
use mockpay::NewPayment;
use serde::Deserialize;

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub payment_id: String,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "service": "mockpay-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Usage hint for clients that GET the create endpoint.
#[get("/api/v2/payments")]
pub async fn payments_hint() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "hint": "Use POST /api/v2/payments with callback_url (webhook v2).",
        "webhook_target_example": "/api/orders/payment/webhook/v2/{tx_id}",
        "dev_list": "/api/v2/pending-payments",
        "manual_confirm": "/api/v2/confirm-payment",
    }))
}

/// Create a payment. Blocks through the settlement delay and the completion
/// webhook, then reports the resulting status.
#[post("/api/v2/payments")]
pub async fn create_payment(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let request: NewPayment = parse_body(&body)?;
    let outcome = state.lifecycle.create_and_settle(request).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "tx_id": outcome.tx_id,
        "payment_id": outcome.payment_id,
        "status": outcome.status,
    })))
}

#[post("/api/v2/confirm-payment")]
pub async fn confirm_payment(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let request: ConfirmRequest = parse_body(&body)?;
    let outcome = state.lifecycle.confirm(&request.payment_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "payment_id": outcome.payment_id,
        "status": outcome.status,
        "confirmed_at": outcome.confirmed_at,
    })))
}

#[get("/api/v2/payments/{payment_id}")]
pub async fn get_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let record = state.lifecycle.get(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(record))
}

/// Development listing of every stored payment.
#[get("/api/v2/pending-payments")]
pub async fn list_payments(state: web::Data<AppState>) -> HttpResponse {
    let summary = state.lifecycle.summary();
    HttpResponse::Ok().json(serde_json::json!({
        "pending_count": summary.counts.pending,
        "completed_count": summary.counts.completed,
        "cancelled_count": summary.counts.cancelled,
        "payments": summary.payments,
    }))
}

#[get("/metrics")]
pub async fn metrics_endpoint(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match &state.metrics_token {
        Some(token) => {
            let header = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok());
            if !mockpay::security::bearer_matches(header, token) {
                return HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            let public_metrics = std::env::var("MOCKPAY_PUBLIC_METRICS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false);
            if !public_metrics {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or MOCKPAY_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}

/// Register every route on an actix `App`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(metrics_endpoint)
        .service(payments_hint)
        .service(create_payment)
        .service(confirm_payment)
        .service(list_payments)
        .service(get_payment);
}

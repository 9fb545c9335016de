//! Payment state machine.
//!
//! Both ways a payment completes (auto-completion after the settlement delay,
//! and explicit confirmation) run the same protocol:
//!
//! 1. atomically move the record `PENDING → PAYMENT_COMPLETED` and stamp
//!    `confirmed_at`, before anything is sent;
//! 2. build the webhook payload from the updated record and deliver it to the
//!    record's callback URL;
//! 3. keep `PAYMENT_COMPLETED` if the webhook was accepted, otherwise revert
//!    to `PAYMENT_CANCELLED` (`confirmed_at` stays set).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockpay::{
    NewPayment, PaymentError, PaymentRecord, PaymentStatus, PaymentStore, StatusCounts,
    WebhookPayload, EVENT_PAYMENT_COMPLETED,
};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::metrics;
use crate::webhook::{self, WebhookDispatcher};

/// Result of the create call once the auto-completion has resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub payment_id: String,
    pub tx_id: String,
    pub status: PaymentStatus,
}

/// Result of an explicit confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmOutcome {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Listing used by the development endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub counts: StatusCounts,
    pub payments: Vec<PaymentRecord>,
}

#[derive(Clone)]
pub struct PaymentLifecycle {
    store: Arc<dyn PaymentStore>,
    dispatcher: WebhookDispatcher,
    settlement_delay: Duration,
}

impl PaymentLifecycle {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        dispatcher: WebhookDispatcher,
        settlement_delay: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            settlement_delay,
        }
    }

    pub fn settlement_delay(&self) -> Duration {
        self.settlement_delay
    }

    /// Validate the request and store a `PENDING` record.
    pub fn initiate(&self, mut request: NewPayment) -> Result<PaymentRecord, PaymentError> {
        request.validate()?;
        request.callback_url = webhook::validate_callback_url(&request.callback_url)?.to_string();

        let record = PaymentRecord::new_pending(request, Utc::now());
        self.store.create(record.clone())?;
        metrics::PAYMENTS.with_label_values(&["pending"]).inc();

        tracing::info!(
            payment_id = %record.payment_id,
            order_id = record.order_id,
            amount = record.amount,
            "payment created"
        );
        Ok(record)
    }

    /// Run the completion protocol after the settlement delay on its own task.
    ///
    /// The task runs to completion even if the handle is dropped.
    pub fn schedule_auto_complete(
        &self,
        payment_id: String,
    ) -> JoinHandle<Result<PaymentRecord, PaymentError>> {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(lifecycle.settlement_delay).await;
            tracing::info!(payment_id = %payment_id, "settlement delay elapsed, auto-completing");
            lifecycle.complete_and_notify(&payment_id).await
        })
    }

    /// Create a payment and wait for its auto-completion to resolve.
    ///
    /// The reported status is the stored one: `PAYMENT_COMPLETED` when the
    /// webhook was accepted, `PAYMENT_CANCELLED` when delivery failed.
    pub async fn create_and_settle(
        &self,
        request: NewPayment,
    ) -> Result<CreateOutcome, PaymentError> {
        let record = self.initiate(request)?;
        let payment_id = record.payment_id.clone();

        match self.schedule_auto_complete(payment_id.clone()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                // e.g. confirmed explicitly while the settlement delay was running
                tracing::info!(payment_id = %payment_id, reason = %e, "auto-completion skipped");
            }
            Err(e) => {
                tracing::error!(payment_id = %payment_id, error = %e, "auto-completion task failed");
            }
        }

        let status = self
            .store
            .get(&payment_id)
            .map(|r| r.status)
            .ok_or_else(|| PaymentError::NotFound(payment_id.clone()))?;

        Ok(CreateOutcome {
            payment_id,
            tx_id: record.tx_id,
            status,
        })
    }

    /// Explicitly confirm a `PENDING` payment.
    ///
    /// Fails with `NotFound` for an unknown id and `InvalidState` when the
    /// payment already left `PENDING`; neither case sends a webhook. The
    /// returned status is the stored status after delivery, so a failed
    /// webhook is reported as `PAYMENT_CANCELLED`.
    pub async fn confirm(&self, payment_id: &str) -> Result<ConfirmOutcome, PaymentError> {
        let current = self
            .store
            .get(payment_id)
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;

        if current.status != PaymentStatus::Pending {
            return Err(PaymentError::InvalidState {
                payment_id: payment_id.to_string(),
                status: current.status,
            });
        }

        let record = self.complete_and_notify(payment_id).await?;
        Ok(ConfirmOutcome {
            payment_id: record.payment_id,
            status: record.status,
            confirmed_at: record.confirmed_at,
        })
    }

    /// The completion protocol shared by both entry points.
    pub async fn complete_and_notify(
        &self,
        payment_id: &str,
    ) -> Result<PaymentRecord, PaymentError> {
        let completed =
            self.store
                .update_status(payment_id, PaymentStatus::Completed, Some(Utc::now()))?;
        metrics::PAYMENTS.with_label_values(&["completed"]).inc();

        let payload = WebhookPayload::from_record(&completed);
        tracing::info!(
            payment_id = %payment_id,
            url = %completed.callback_url,
            "sending completion webhook"
        );

        match self
            .dispatcher
            .deliver(&completed.callback_url, &payload, EVENT_PAYMENT_COMPLETED)
            .await
        {
            Ok(receipt) => {
                tracing::info!(
                    payment_id = %payment_id,
                    attempts = receipt.attempts,
                    status = receipt.status,
                    "payment completed"
                );
                Ok(completed)
            }
            Err(e) => {
                tracing::error!(
                    payment_id = %payment_id,
                    error = %e,
                    "completion webhook failed, cancelling payment"
                );
                let cancelled =
                    self.store
                        .update_status(payment_id, PaymentStatus::Cancelled, None)?;
                metrics::PAYMENTS.with_label_values(&["cancelled"]).inc();
                Ok(cancelled)
            }
        }
    }

    pub fn get(&self, payment_id: &str) -> Result<PaymentRecord, PaymentError> {
        self.store
            .get(payment_id)
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))
    }

    pub fn summary(&self) -> PaymentSummary {
        PaymentSummary {
            counts: self.store.count_by_status(),
            payments: self.store.list(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{PAYLOAD_VERSION, PAYMENT_ID_PREFIX};
use crate::error::PaymentError;

/// Lifecycle state of a payment.
///
/// ```text
/// PENDING ──► PAYMENT_COMPLETED ──(webhook failed)──► PAYMENT_CANCELLED
///    └──────────────────────────────────────────────► PAYMENT_CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PAYMENT_COMPLETED")]
    Completed,
    #[serde(rename = "PAYMENT_CANCELLED")]
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "PAYMENT_COMPLETED",
            PaymentStatus::Cancelled => "PAYMENT_CANCELLED",
        }
    }

    /// Whether a record in this state may move to `next`.
    ///
    /// `PAYMENT_COMPLETED → PAYMENT_CANCELLED` exists only so a completion
    /// whose webhook could not be delivered can be reverted.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Cancelled)
                | (PaymentStatus::Completed, PaymentStatus::Cancelled)
        )
    }

    /// No longer accepts confirmation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the payment id for a transaction id.
pub fn payment_id_for(tx_id: &str) -> String {
    format!("{PAYMENT_ID_PREFIX}{tx_id}")
}

/// Inbound payment-initiation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub tx_id: String,
    pub order_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub callback_url: String,
}

impl NewPayment {
    /// Field checks that do not need the network. The callback URL is
    /// validated by the gateway.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if let Some(version) = &self.version {
            if version != PAYLOAD_VERSION {
                return Err(PaymentError::InvalidRequest(format!(
                    "unsupported version '{version}', expected '{PAYLOAD_VERSION}'"
                )));
            }
        }
        if self.tx_id.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("tx_id must not be empty".into()));
        }
        Ok(())
    }
}

/// A stored payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub order_id: i64,
    pub user_id: i64,
    pub tx_id: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub callback_url: String,
}

impl PaymentRecord {
    pub fn new_pending(request: NewPayment, created_at: DateTime<Utc>) -> Self {
        Self {
            payment_id: payment_id_for(&request.tx_id),
            order_id: request.order_id,
            user_id: request.user_id,
            tx_id: request.tx_id,
            amount: request.amount,
            status: PaymentStatus::Pending,
            created_at,
            confirmed_at: None,
            callback_url: request.callback_url,
        }
    }
}

/// Body of the completion webhook. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub version: String,
    pub payment_id: String,
    pub order_id: i64,
    pub tx_id: String,
    pub user_id: i64,
    pub amount: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl WebhookPayload {
    pub fn from_record(record: &PaymentRecord) -> Self {
        Self {
            version: PAYLOAD_VERSION.to_string(),
            payment_id: record.payment_id.clone(),
            order_id: record.order_id,
            tx_id: record.tx_id.clone(),
            user_id: record.user_id,
            amount: record.amount,
            status: record.status,
            created_at: record.created_at,
            confirmed_at: record.confirmed_at,
        }
    }
}

/// Number of stored payments in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: PaymentStatus) {
        match status {
            PaymentStatus::Pending => self.pending += 1,
            PaymentStatus::Completed => self.completed += 1,
            PaymentStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(tx_id: &str) -> NewPayment {
        NewPayment {
            version: None,
            tx_id: tx_id.to_string(),
            order_id: 12345,
            user_id: 1,
            amount: 10_000,
            callback_url: "https://ops.example.com/webhook".to_string(),
        }
    }

    #[test]
    fn payment_id_is_derived_from_tx_id() {
        assert_eq!(payment_id_for("abc"), "pay_abc");
        assert_eq!(payment_id_for("abc"), payment_id_for("abc"));
    }

    #[test]
    fn legal_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Cancelled));

        assert!(!Completed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn status_serializes_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Completed).unwrap(),
            "\"PAYMENT_COMPLETED\""
        );
        let parsed: PaymentStatus = serde_json::from_str("\"PAYMENT_CANCELLED\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Cancelled);
        assert_eq!(PaymentStatus::Pending.to_string(), "PENDING");
    }

    #[test]
    fn new_pending_record_has_no_confirmation() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = PaymentRecord::new_pending(request("t1"), created);
        assert_eq!(record.payment_id, "pay_t1");
        assert_eq!(record.status, PaymentStatus::Pending);
        assert_eq!(record.created_at, created);
        assert!(record.confirmed_at.is_none());
    }

    #[test]
    fn webhook_payload_field_order_and_format() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = PaymentRecord::new_pending(request("test_123"), created);
        record.status = PaymentStatus::Completed;
        record.confirmed_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 2).unwrap());

        let body = serde_json::to_string(&WebhookPayload::from_record(&record)).unwrap();
        assert_eq!(
            body,
            "{\"version\":\"v2\",\"payment_id\":\"pay_test_123\",\"order_id\":12345,\
             \"tx_id\":\"test_123\",\"user_id\":1,\"amount\":10000,\
             \"status\":\"PAYMENT_COMPLETED\",\"created_at\":\"2024-01-01T00:00:00Z\",\
             \"confirmed_at\":\"2024-01-01T00:00:02Z\"}"
        );
    }

    #[test]
    fn pending_payload_has_null_confirmation() {
        let record = PaymentRecord::new_pending(request("t2"), Utc::now());
        let value = serde_json::to_value(WebhookPayload::from_record(&record)).unwrap();
        assert!(value["confirmed_at"].is_null());
        assert_eq!(value["status"], "PENDING");
    }

    #[test]
    fn validate_rejects_wrong_version_and_empty_tx() {
        let mut req = request("t3");
        req.version = Some("v1".into());
        assert!(matches!(req.validate(), Err(PaymentError::InvalidRequest(_))));

        let mut req = request("  ");
        req.version = Some("v2".into());
        assert!(matches!(req.validate(), Err(PaymentError::InvalidRequest(_))));

        assert!(request("ok").validate().is_ok());
    }

    #[test]
    fn counts_accumulate() {
        let mut counts = StatusCounts::default();
        counts.add(PaymentStatus::Pending);
        counts.add(PaymentStatus::Cancelled);
        counts.add(PaymentStatus::Cancelled);
        assert_eq!(
            counts,
            StatusCounts {
                pending: 1,
                completed: 0,
                cancelled: 2
            }
        );
    }
}

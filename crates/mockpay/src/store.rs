use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::PaymentError;
use crate::payment::{PaymentRecord, PaymentStatus, StatusCounts};

/// Storage for payment records.
///
/// Implementations must be thread-safe (`Send + Sync`) and must apply
/// [`update_status`](PaymentStore::update_status) atomically per payment id:
/// the status check and the write cannot interleave with another update to
/// the same record. No cross-record transactions are required.
pub trait PaymentStore: Send + Sync {
    /// Insert a new record. Fails with [`PaymentError::AlreadyExists`] if a
    /// record with the same payment id is already stored.
    fn create(&self, record: PaymentRecord) -> Result<(), PaymentError>;

    /// Snapshot of a record.
    fn get(&self, payment_id: &str) -> Option<PaymentRecord>;

    /// Move a record to `next`, stamping `confirmed_at` when one is given.
    ///
    /// Returns the updated snapshot, [`PaymentError::NotFound`] for an unknown
    /// id, or [`PaymentError::InvalidState`] when the current status does not
    /// allow the transition.
    fn update_status(
        &self,
        payment_id: &str,
        next: PaymentStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<PaymentRecord, PaymentError>;

    /// All records, oldest first.
    fn list(&self) -> Vec<PaymentRecord>;

    fn count_by_status(&self) -> StatusCounts;
}

/// In-memory store backed by DashMap. Records live for the process lifetime.
pub struct InMemoryPaymentStore {
    payments: DashMap<String, PaymentRecord>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self {
            payments: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }
}

impl Default for InMemoryPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentStore for InMemoryPaymentStore {
    fn create(&self, record: PaymentRecord) -> Result<(), PaymentError> {
        match self.payments.entry(record.payment_id.clone()) {
            Entry::Occupied(_) => Err(PaymentError::AlreadyExists(record.payment_id)),
            Entry::Vacant(v) => {
                tracing::info!(
                    payment_id = %record.payment_id,
                    order_id = record.order_id,
                    "payment record created"
                );
                v.insert(record);
                Ok(())
            }
        }
    }

    fn get(&self, payment_id: &str) -> Option<PaymentRecord> {
        self.payments.get(payment_id).map(|r| r.value().clone())
    }

    fn update_status(
        &self,
        payment_id: &str,
        next: PaymentStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<PaymentRecord, PaymentError> {
        // get_mut holds the shard write lock until the guard drops
        let mut record = self
            .payments
            .get_mut(payment_id)
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;

        if !record.status.can_transition_to(next) {
            return Err(PaymentError::InvalidState {
                payment_id: payment_id.to_string(),
                status: record.status,
            });
        }

        let previous = record.status;
        record.status = next;
        if confirmed_at.is_some() {
            record.confirmed_at = confirmed_at;
        }

        tracing::info!(
            payment_id = %payment_id,
            from = %previous,
            to = %next,
            "payment status updated"
        );
        Ok(record.clone())
    }

    fn list(&self) -> Vec<PaymentRecord> {
        let mut records: Vec<PaymentRecord> =
            self.payments.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.payment_id.cmp(&b.payment_id))
        });
        records
    }

    fn count_by_status(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.payments.iter() {
            counts.add(record.status);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::NewPayment;

    fn pending(tx_id: &str) -> PaymentRecord {
        PaymentRecord::new_pending(
            NewPayment {
                version: None,
                tx_id: tx_id.to_string(),
                order_id: 7,
                user_id: 3,
                amount: 500,
                callback_url: "http://127.0.0.1:9/webhook".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn create_then_get() {
        let store = InMemoryPaymentStore::new();
        store.create(pending("a")).unwrap();
        let record = store.get("pay_a").unwrap();
        assert_eq!(record.tx_id, "a");
        assert!(store.get("pay_b").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_create_is_rejected_and_original_kept() {
        let store = InMemoryPaymentStore::new();
        store.create(pending("dup")).unwrap();
        let mut second = pending("dup");
        second.amount = 999;
        assert_eq!(
            store.create(second),
            Err(PaymentError::AlreadyExists("pay_dup".into()))
        );
        assert_eq!(store.get("pay_dup").unwrap().amount, 500);
    }

    #[test]
    fn update_status_stamps_confirmation() {
        let store = InMemoryPaymentStore::new();
        store.create(pending("c")).unwrap();
        let now = Utc::now();
        let updated = store
            .update_status("pay_c", PaymentStatus::Completed, Some(now))
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Completed);
        assert_eq!(updated.confirmed_at, Some(now));
    }

    #[test]
    fn revert_keeps_confirmation_timestamp() {
        let store = InMemoryPaymentStore::new();
        store.create(pending("r")).unwrap();
        let now = Utc::now();
        store
            .update_status("pay_r", PaymentStatus::Completed, Some(now))
            .unwrap();
        let reverted = store
            .update_status("pay_r", PaymentStatus::Cancelled, None)
            .unwrap();
        assert_eq!(reverted.status, PaymentStatus::Cancelled);
        assert_eq!(reverted.confirmed_at, Some(now));
    }

    #[test]
    fn illegal_transition_is_invalid_state() {
        let store = InMemoryPaymentStore::new();
        store.create(pending("i")).unwrap();
        store
            .update_status("pay_i", PaymentStatus::Cancelled, None)
            .unwrap();
        assert_eq!(
            store.update_status("pay_i", PaymentStatus::Completed, Some(Utc::now())),
            Err(PaymentError::InvalidState {
                payment_id: "pay_i".into(),
                status: PaymentStatus::Cancelled,
            })
        );
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = InMemoryPaymentStore::new();
        assert_eq!(
            store.update_status("pay_missing", PaymentStatus::Completed, None),
            Err(PaymentError::NotFound("pay_missing".into()))
        );
    }

    #[test]
    fn counts_and_listing() {
        let store = InMemoryPaymentStore::new();
        for tx in ["1", "2", "3"] {
            store.create(pending(tx)).unwrap();
        }
        store
            .update_status("pay_2", PaymentStatus::Completed, Some(Utc::now()))
            .unwrap();
        store
            .update_status("pay_3", PaymentStatus::Cancelled, None)
            .unwrap();

        let counts = store.count_by_status();
        assert_eq!((counts.pending, counts.completed, counts.cancelled), (1, 1, 1));
        assert_eq!(store.list().len(), 3);
    }
}

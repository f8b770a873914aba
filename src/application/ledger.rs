use crate::domain::ledger::{LedgerEntry, NewLedgerEntry};
use crate::domain::payout::PayoutMethod;
use crate::domain::ports::LedgerStoreRef;
use crate::error::Result;
use chrono::Utc;
use uuid::Uuid;

/// Appends double-entry records for completed payouts.
///
/// Exposes no update or delete: every call is a single atomic append with a
/// freshly generated id and timestamp.
#[derive(Clone)]
pub struct LedgerWriter {
    store: LedgerStoreRef,
    cash_account: String,
}

impl LedgerWriter {
    pub fn new(store: LedgerStoreRef, cash_account: impl Into<String>) -> Self {
        Self {
            store,
            cash_account: cash_account.into(),
        }
    }

    pub async fn append(&self, new_entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let entry = LedgerEntry {
            id: Uuid::now_v7(),
            offer_id: new_entry.offer_id,
            debit_account: new_entry.debit_account,
            credit_account: new_entry.credit_account,
            amount: new_entry.amount,
            currency: new_entry.currency,
            description: new_entry.description,
            transaction_type: new_entry.transaction_type,
            reference_id: new_entry.reference_id,
            timestamp: Utc::now(),
        };
        self.store.append(entry.clone()).await?;

        tracing::info!(
            entry_id = %entry.id,
            offer_id = %entry.offer_id,
            transaction_type = %entry.transaction_type,
            "ledger_entry_created"
        );
        Ok(entry)
    }

    /// Debits cash and credits the payable account of the provider that paid.
    pub async fn record_payout(
        &self,
        offer_id: Uuid,
        method: PayoutMethod,
        amount: i64,
        currency: &str,
        reference_id: &str,
    ) -> Result<LedgerEntry> {
        let suffix = currency.to_lowercase();
        self.append(NewLedgerEntry {
            offer_id,
            debit_account: format!("{}_{}", self.cash_account, suffix),
            credit_account: format!("{}_payouts_payable_{}", method, suffix),
            amount,
            currency: currency.to_string(),
            reference_id: reference_id.to_string(),
            description: format!("{} payout for offer {}", capitalize(method.as_str()), offer_id),
            transaction_type: format!("{}_payout", method),
        })
        .await
    }

    pub async fn entries_for_offer(&self, offer_id: Uuid) -> Result<Vec<LedgerEntry>> {
        self.store.entries_for_offer(offer_id).await
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_record_payout_accounts() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let writer = LedgerWriter::new(store.clone(), "cash_on_hand");
        let offer_id = Uuid::new_v4();

        let entry = writer
            .record_payout(offer_id, PayoutMethod::Primary, 50000, "EUR", "tx1")
            .await
            .unwrap();

        assert_eq!(entry.debit_account, "cash_on_hand_eur");
        assert_eq!(entry.credit_account, "primary_payouts_payable_eur");
        assert_eq!(entry.amount, 50000);
        assert_eq!(entry.reference_id, "tx1");
        assert_eq!(entry.transaction_type, "primary_payout");
        assert_eq!(entry.description, format!("Primary payout for offer {offer_id}"));

        let stored = writer.entries_for_offer(offer_id).await.unwrap();
        assert_eq!(stored, vec![entry]);
    }

    #[tokio::test]
    async fn test_append_generates_distinct_ids() {
        let writer = LedgerWriter::new(Arc::new(InMemoryLedgerStore::new()), "cash_on_hand");
        let offer_id = Uuid::new_v4();

        let first = writer
            .record_payout(offer_id, PayoutMethod::Primary, 100, "EUR", "a")
            .await
            .unwrap();
        let second = writer
            .record_payout(offer_id, PayoutMethod::Secondary, 100, "EUR", "b")
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(writer.entries_for_offer(offer_id).await.unwrap().len(), 2);
    }
}

use crate::domain::offer::{OfferStatus, StatusWrite};
use crate::domain::ports::{LedgerStoreRef, OfferStoreRef};
use crate::error::Result;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Result of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    /// Offers that had a ledger entry but were not marked paid, now repaired.
    pub repaired: Vec<Uuid>,
    /// Offers with ledger entries that no longer exist in the offer store.
    pub orphaned: Vec<Uuid>,
}

/// Repairs offers left unpaid after their ledger entry was committed.
///
/// The ledger and offer stores are written in separate operations, so a crash
/// or a failed status write between them leaves a paid entry against an
/// unpaid offer. The ledger is authoritative; entries are never modified.
pub struct Reconciler {
    offers: OfferStoreRef,
    ledger: LedgerStoreRef,
}

impl Reconciler {
    pub fn new(offers: OfferStoreRef, ledger: LedgerStoreRef) -> Self {
        Self { offers, ledger }
    }

    pub async fn run(&self) -> Result<ReconcileReport> {
        let offer_ids: BTreeSet<Uuid> = self
            .ledger
            .all_entries()
            .await?
            .into_iter()
            .map(|entry| entry.offer_id)
            .collect();

        let mut report = ReconcileReport {
            checked: offer_ids.len(),
            ..Default::default()
        };

        for offer_id in offer_ids {
            match self.offers.read(offer_id).await? {
                Some(offer) if offer.status.is_paid() => {}
                Some(_) => match self.offers.write_status(offer_id, OfferStatus::PaidOut).await? {
                    StatusWrite::Updated => {
                        tracing::warn!(offer_id = %offer_id, "reconcile_offer_marked_paid");
                        report.repaired.push(offer_id);
                    }
                    StatusWrite::NotFound => report.orphaned.push(offer_id),
                },
                None => report.orphaned.push(offer_id),
            }
        }

        for offer_id in &report.orphaned {
            tracing::error!(offer_id = %offer_id, "reconcile_orphaned_ledger_entry");
        }
        Ok(report)
    }
}

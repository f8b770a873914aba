use crate::domain::ledger::LedgerEntry;
use crate::domain::offer::{Offer, OfferStatus, StatusWrite};
use crate::domain::ports::{LedgerStore, OfferStore};
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory offer store.
///
/// Uses `Arc<RwLock<HashMap<Uuid, Offer>>>` to allow shared concurrent access.
/// Seeded from the offers CSV by the CLI and used throughout the tests.
#[derive(Default, Clone)]
pub struct InMemoryOfferStore {
    offers: Arc<RwLock<HashMap<Uuid, Offer>>>,
}

impl InMemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an offer record.
    pub async fn insert(&self, offer: Offer) {
        self.offers.write().await.insert(offer.id, offer);
    }
}

#[async_trait]
impl OfferStore for InMemoryOfferStore {
    async fn read(&self, offer_id: Uuid) -> Result<Option<Offer>> {
        Ok(self.offers.read().await.get(&offer_id).cloned())
    }

    async fn write_status(&self, offer_id: Uuid, status: OfferStatus) -> Result<StatusWrite> {
        let mut offers = self.offers.write().await;
        match offers.get_mut(&offer_id) {
            Some(offer) => {
                offer.status = status;
                Ok(StatusWrite::Updated)
            }
            None => Ok(StatusWrite::NotFound),
        }
    }
}

/// A thread-safe, append-only in-memory ledger.
///
/// Entries are kept in insertion order.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|existing| existing.id == entry.id) {
            return Err(PayoutError::Storage(format!(
                "ledger entry {} already exists",
                entry.id
            )));
        }
        entries.push(entry);
        Ok(())
    }

    async fn entries_for_offer(&self, offer_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.offer_id == offer_id)
            .cloned()
            .collect())
    }

    async fn all_entries(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.entries.read().await.clone())
    }
}

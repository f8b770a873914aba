use crate::domain::ledger::LedgerEntry;
use crate::domain::offer::{Offer, OfferStatus, StatusWrite};
use crate::domain::ports::{LedgerStore, OfferStore};
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Column Family holding ledger entries keyed by entry id.
pub const CF_LEDGER_ENTRIES: &str = "ledger_entries";
/// Column Family indexing entry ids by `offer_id ++ entry_id`.
pub const CF_LEDGER_BY_OFFER: &str = "ledger_by_offer";
/// Column Family holding offer records keyed by offer id.
pub const CF_OFFERS: &str = "offers";

/// A persistent ledger and offer store backed by RocksDB.
///
/// A ledger append writes the entry and its offer index in one `WriteBatch`,
/// so a crash never leaves a half-indexed entry. Entry ids are UUIDv7, which
/// keeps the entry column family in creation order.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path` with all column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_LEDGER_ENTRIES, CF_LEDGER_BY_OFFER, CF_OFFERS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Writes an offer record, replacing any previous version.
    pub fn seed_offer(&self, offer: &Offer) -> Result<()> {
        let cf = self.cf(CF_OFFERS)?;
        self.db
            .put_cf(cf, offer.id.as_bytes(), serde_json::to_vec(offer)?)?;
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PayoutError::Storage(format!("column family '{}' not found", name)))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let entries = self.cf(CF_LEDGER_ENTRIES)?;
        let by_offer = self.cf(CF_LEDGER_BY_OFFER)?;

        if self.db.get_pinned_cf(entries, entry.id.as_bytes())?.is_some() {
            return Err(PayoutError::Storage(format!(
                "ledger entry {} already exists",
                entry.id
            )));
        }

        let mut index_key = Vec::with_capacity(32);
        index_key.extend_from_slice(entry.offer_id.as_bytes());
        index_key.extend_from_slice(entry.id.as_bytes());

        let mut batch = WriteBatch::default();
        batch.put_cf(entries, entry.id.as_bytes(), serde_json::to_vec(&entry)?);
        batch.put_cf(by_offer, index_key, entry.id.as_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    async fn entries_for_offer(&self, offer_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let by_offer = self.cf(CF_LEDGER_BY_OFFER)?;
        let prefix = offer_id.as_bytes();

        let mut entries = Vec::new();
        for item in self.db.prefix_iterator_cf(by_offer, prefix) {
            let (key, entry_id) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            let entry = self
                .get_json::<LedgerEntry>(CF_LEDGER_ENTRIES, &entry_id)?
                .ok_or_else(|| {
                    PayoutError::Storage(format!(
                        "ledger index for offer {} points at a missing entry",
                        offer_id
                    ))
                })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn all_entries(&self) -> Result<Vec<LedgerEntry>> {
        let cf = self.cf(CF_LEDGER_ENTRIES)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl OfferStore for RocksDBStore {
    async fn read(&self, offer_id: Uuid) -> Result<Option<Offer>> {
        self.get_json(CF_OFFERS, offer_id.as_bytes())
    }

    async fn write_status(&self, offer_id: Uuid, status: OfferStatus) -> Result<StatusWrite> {
        match self.read(offer_id).await? {
            Some(mut offer) => {
                offer.status = status;
                self.seed_offer(&offer)?;
                Ok(StatusWrite::Updated)
            }
            None => Ok(StatusWrite::NotFound),
        }
    }
}

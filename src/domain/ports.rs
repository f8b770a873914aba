use super::ledger::LedgerEntry;
use super::offer::{Offer, OfferStatus, StatusWrite};
use super::payout::{Disbursement, PayoutMethod, PayoutTask};
use crate::error::{BrokerError, ProviderError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Externally owned offer records.
#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn read(&self, offer_id: Uuid) -> Result<Option<Offer>>;
    async fn write_status(&self, offer_id: Uuid, status: OfferStatus) -> Result<StatusWrite>;
}

/// Append-only ledger persistence.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists a new entry. Fails if an entry with the same id already exists.
    async fn append(&self, entry: LedgerEntry) -> Result<()>;
    async fn entries_for_offer(&self, offer_id: Uuid) -> Result<Vec<LedgerEntry>>;
    async fn all_entries(&self) -> Result<Vec<LedgerEntry>>;
}

/// A payment provider able to move funds to the seller.
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    fn name(&self) -> &str;
    fn method(&self) -> PayoutMethod;
    /// Returns the provider's reference id for the transfer.
    async fn disburse(&self, disbursement: &Disbursement) -> std::result::Result<String, ProviderError>;
}

/// A record fetched from a topic partition.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// One poll result.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Message(BrokerMessage),
    PartitionEof { topic: String, partition: i32 },
}

/// A subscription to one topic under a consumer group, with manual commits.
#[async_trait]
pub trait MessageConsumer: Send {
    /// Waits up to `timeout` for the next delivery. `Ok(None)` means nothing arrived.
    async fn poll(&mut self, timeout: Duration) -> std::result::Result<Option<Delivery>, BrokerError>;
    async fn commit(&mut self, message: &BrokerMessage) -> std::result::Result<(), BrokerError>;
    async fn close(&mut self);
}

#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn produce(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> std::result::Result<(), BrokerError>;
}

/// Hands payout tasks to the worker pool.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: PayoutTask) -> Result<()>;
}

pub type OfferStoreRef = Arc<dyn OfferStore>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type ProviderRef = Arc<dyn PayoutProvider>;
pub type ProducerRef = Arc<dyn MessageProducer>;
pub type ConsumerBox = Box<dyn MessageConsumer>;

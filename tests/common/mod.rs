#![allow(dead_code)]

use async_trait::async_trait;
use payout_engine::application::circuit_breaker::CircuitBreaker;
use payout_engine::application::executor::PayoutExecutor;
use payout_engine::application::ledger::LedgerWriter;
use payout_engine::application::publisher::OutcomePublisher;
use payout_engine::config::BreakerConfig;
use payout_engine::domain::offer::Offer;
use payout_engine::domain::payout::{Disbursement, PayoutMethod, PayoutOutcomeEvent, PayoutTask};
use payout_engine::domain::ports::{
    BrokerMessage, Delivery, MessageConsumer, PayoutProvider, TaskQueue,
};
use payout_engine::error::{BrokerError, PayoutError, ProviderError, Result};
use payout_engine::infrastructure::broker::InMemoryBroker;
use payout_engine::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryOfferStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const OUTCOME_TOPIC: &str = "payout.completed";

/// A provider whose responses are queued up front. When the script runs out
/// it keeps returning the fallback response.
pub struct ScriptedProvider {
    name: String,
    method: PayoutMethod,
    script: Mutex<VecDeque<std::result::Result<String, ProviderError>>>,
    fallback: std::result::Result<String, ProviderError>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(
        method: PayoutMethod,
        fallback: std::result::Result<String, ProviderError>,
    ) -> Arc<Self> {
        let name = match method {
            PayoutMethod::Primary => "stripe",
            PayoutMethod::Secondary => "wise",
        };
        Arc::new(Self {
            name: name.to_string(),
            method,
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn succeeding(method: PayoutMethod, reference_id: &str) -> Arc<Self> {
        Self::new(method, Ok(reference_id.to_string()))
    }

    pub fn failing(method: PayoutMethod, error: ProviderError) -> Arc<Self> {
        Self::new(method, Err(error))
    }

    pub fn push(&self, response: std::result::Result<String, ProviderError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PayoutProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn method(&self) -> PayoutMethod {
        self.method
    }

    async fn disburse(
        &self,
        _disbursement: &Disbursement,
    ) -> std::result::Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn transient(provider: &str) -> ProviderError {
    ProviderError::Api {
        provider: provider.to_string(),
        code: "http_503".to_string(),
        message: "service unavailable".to_string(),
        retryable: true,
    }
}

pub fn rejection(provider: &str) -> ProviderError {
    ProviderError::Api {
        provider: provider.to_string(),
        code: "account_invalid".to_string(),
        message: "destination rejected".to_string(),
        retryable: false,
    }
}

/// Everything an executor test needs to drive and inspect one payout.
pub struct Harness {
    pub offers: Arc<InMemoryOfferStore>,
    pub ledger: Arc<InMemoryLedgerStore>,
    pub broker: InMemoryBroker,
    pub primary: Arc<ScriptedProvider>,
    pub secondary: Arc<ScriptedProvider>,
    pub executor: Arc<PayoutExecutor>,
}

impl Harness {
    pub fn new(primary: Arc<ScriptedProvider>, secondary: Arc<ScriptedProvider>) -> Self {
        Self::with_breaker(
            primary,
            secondary,
            BreakerConfig {
                failure_threshold: 3,
                reset_timeout_ms: 180_000,
            },
        )
    }

    pub fn with_breaker(
        primary: Arc<ScriptedProvider>,
        secondary: Arc<ScriptedProvider>,
        breaker: BreakerConfig,
    ) -> Self {
        let offers = Arc::new(InMemoryOfferStore::new());
        let ledger = Arc::new(InMemoryLedgerStore::new());
        let broker = InMemoryBroker::new();
        let executor = Arc::new(PayoutExecutor::new(
            offers.clone(),
            LedgerWriter::new(ledger.clone(), "cash_on_hand"),
            primary.clone(),
            secondary.clone(),
            Arc::new(CircuitBreaker::new("stripe", &breaker)),
            Arc::new(OutcomePublisher::new(Arc::new(broker.clone()), OUTCOME_TOPIC)),
        ));
        Self {
            offers,
            ledger,
            broker,
            primary,
            secondary,
            executor,
        }
    }

    pub async fn seed(&self, amount: Option<i64>) -> Offer {
        let offer = Offer::new(Uuid::new_v4(), amount, "EUR");
        self.offers.insert(offer.clone()).await;
        offer
    }

    pub fn events(&self) -> Vec<PayoutOutcomeEvent> {
        self.broker
            .messages(OUTCOME_TOPIC)
            .iter()
            .map(|message| serde_json::from_slice(&message.payload).unwrap())
            .collect()
    }
}

/// Records enqueued tasks; can be switched to reject them, either for good
/// (`closed`) or for the next `rejections` attempts.
#[derive(Default)]
pub struct RecordingQueue {
    pub tasks: Mutex<Vec<PayoutTask>>,
    pub closed: AtomicBool,
    pub rejections: AtomicUsize,
}

impl RecordingQueue {
    pub fn tasks(&self) -> Vec<PayoutTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, task: PayoutTask) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PayoutError::QueueClosed);
        }
        let rejected = self
            .rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(PayoutError::QueueClosed);
        }
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

/// Shared view of what a [`ScriptedConsumer`] did.
#[derive(Default)]
pub struct ConsumerLog {
    pub commits: Mutex<Vec<i64>>,
    pub closed: AtomicBool,
}

/// Replays a fixed sequence of poll results, then reports an idle partition.
pub struct ScriptedConsumer {
    script: VecDeque<std::result::Result<Option<Delivery>, BrokerError>>,
    log: Arc<ConsumerLog>,
}

impl ScriptedConsumer {
    pub fn new(
        script: Vec<std::result::Result<Option<Delivery>, BrokerError>>,
    ) -> (Self, Arc<ConsumerLog>) {
        let log = Arc::new(ConsumerLog::default());
        (
            Self {
                script: script.into(),
                log: log.clone(),
            },
            log,
        )
    }
}

#[async_trait]
impl MessageConsumer for ScriptedConsumer {
    async fn poll(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<Delivery>, BrokerError> {
        match self.script.pop_front() {
            Some(next) => next,
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn commit(&mut self, message: &BrokerMessage) -> std::result::Result<(), BrokerError> {
        self.log.commits.lock().unwrap().push(message.offset);
        Ok(())
    }

    async fn close(&mut self) {
        self.log.closed.store(true, Ordering::SeqCst);
    }
}

pub fn message(offset: i64, payload: &[u8]) -> Delivery {
    Delivery::Message(BrokerMessage {
        topic: "payout.requested".to_string(),
        partition: 0,
        offset,
        key: None,
        payload: payload.to_vec(),
    })
}

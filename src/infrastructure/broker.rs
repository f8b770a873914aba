use crate::domain::ports::{BrokerMessage, Delivery, MessageConsumer, MessageProducer};
use crate::error::BrokerError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

const PARTITION: i32 = 0;

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<BrokerMessage>>,
    /// Next offset to deliver, per `(group, topic)`.
    committed: HashMap<(String, String), i64>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<BrokerState>,
    appended: Notify,
}

/// A single-partition, in-process message broker.
///
/// Topics are append-only logs; consumer groups track committed offsets so an
/// uncommitted message is redelivered to the next consumer of that group.
#[derive(Default, Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribes to `topic`, resuming from the group's committed offset.
    pub fn consumer(&self, group: impl Into<String>, topic: impl Into<String>) -> InMemoryConsumer {
        let group = group.into();
        let topic = topic.into();
        let position = self
            .state()
            .committed
            .get(&(group.clone(), topic.clone()))
            .copied()
            .unwrap_or(0);
        InMemoryConsumer {
            broker: self.clone(),
            group,
            topic,
            position,
            at_eof: false,
            closed: false,
        }
    }

    /// Snapshot of every message appended to `topic`.
    pub fn messages(&self, topic: &str) -> Vec<BrokerMessage> {
        self.state().topics.get(topic).cloned().unwrap_or_default()
    }

    /// Messages in `topic` not yet committed by `group`.
    pub fn lag(&self, group: &str, topic: &str) -> i64 {
        let state = self.state();
        let end = state.topics.get(topic).map_or(0, |log| log.len() as i64);
        let committed = state
            .committed
            .get(&(group.to_string(), topic.to_string()))
            .copied()
            .unwrap_or(0);
        end - committed
    }

    fn append(&self, topic: &str, key: Option<&str>, payload: &[u8]) {
        {
            let mut state = self.state();
            let log = state.topics.entry(topic.to_string()).or_default();
            let offset = log.len() as i64;
            log.push(BrokerMessage {
                topic: topic.to_string(),
                partition: PARTITION,
                offset,
                key: key.map(str::to_string),
                payload: payload.to_vec(),
            });
        }
        self.inner.appended.notify_waiters();
    }
}

#[async_trait]
impl MessageProducer for InMemoryBroker {
    async fn produce(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<(), BrokerError> {
        self.append(topic, key, payload);
        Ok(())
    }
}

/// A consumer-group member reading one topic of an [`InMemoryBroker`].
pub struct InMemoryConsumer {
    broker: InMemoryBroker,
    group: String,
    topic: String,
    position: i64,
    at_eof: bool,
    closed: bool,
}

impl InMemoryConsumer {
    fn next_message(&self) -> Option<BrokerMessage> {
        self.broker
            .state()
            .topics
            .get(&self.topic)
            .and_then(|log| log.get(self.position as usize))
            .cloned()
    }
}

#[async_trait]
impl MessageConsumer for InMemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Delivery>, BrokerError> {
        if self.closed {
            return Err(BrokerError("consumer is closed".into()));
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.broker.inner.appended.notified();
            if let Some(message) = self.next_message() {
                self.position += 1;
                self.at_eof = false;
                return Ok(Some(Delivery::Message(message)));
            }
            if !self.at_eof {
                self.at_eof = true;
                return Ok(Some(Delivery::PartitionEof {
                    topic: self.topic.clone(),
                    partition: PARTITION,
                }));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn commit(&mut self, message: &BrokerMessage) -> Result<(), BrokerError> {
        if self.closed {
            return Err(BrokerError("consumer is closed".into()));
        }
        let mut state = self.broker.state();
        let committed = state
            .committed
            .entry((self.group.clone(), self.topic.clone()))
            .or_insert(0);
        *committed = (*committed).max(message.offset + 1);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

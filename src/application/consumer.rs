use crate::config::BrokerConfig;
use crate::domain::payout::{PayoutRequest, PayoutTask};
use crate::domain::ports::{BrokerMessage, ConsumerBox, Delivery, TaskQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Counters reported when the consumer loop exits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub dispatched: u64,
    pub malformed: u64,
    pub broker_errors: u64,
    pub partition_eofs: u64,
    pub enqueue_failures: u64,
    pub commit_failures: u64,
}

/// Pulls payout requests from the request topic and hands them to the worker pool.
///
/// Offsets are committed only after a successful enqueue, giving at-least-once
/// dispatch. A request whose enqueue fails is retried in place until it is
/// queued or the consumer shuts down; later messages are not consumed past it.
/// Malformed payloads are committed without dispatch.
pub struct RequestConsumer {
    consumer: ConsumerBox,
    queue: Arc<dyn TaskQueue>,
    poll_timeout: Duration,
    error_backoff: Duration,
    stats: ConsumerStats,
}

impl RequestConsumer {
    pub fn new(consumer: ConsumerBox, queue: Arc<dyn TaskQueue>, config: &BrokerConfig) -> Self {
        Self {
            consumer,
            queue,
            poll_timeout: config.poll_timeout(),
            error_backoff: config.error_backoff(),
            stats: ConsumerStats::default(),
        }
    }

    /// Polls until `shutdown` is cancelled, then closes the broker connection.
    /// In-flight dispatches are left to the worker pool.
    pub async fn run(mut self, shutdown: CancellationToken) -> ConsumerStats {
        tracing::info!(poll_timeout_ms = self.poll_timeout.as_millis() as u64, "request_consumer_started");

        while !shutdown.is_cancelled() {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.consumer.poll(self.poll_timeout) => polled,
            };

            match polled {
                Ok(None) => {}
                Ok(Some(Delivery::PartitionEof { topic, partition })) => {
                    self.stats.partition_eofs += 1;
                    tracing::debug!(topic = %topic, partition, "partition_eof");
                }
                Ok(Some(Delivery::Message(message))) => {
                    if !self.handle(message, &shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    self.stats.broker_errors += 1;
                    tracing::error!(error = %e, backoff_ms = self.error_backoff.as_millis() as u64, "consume_error");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        self.consumer.close().await;
        tracing::info!(stats = ?self.stats, "request_consumer_stopped");
        self.stats
    }

    /// Returns `false` when shutdown interrupted the dispatch. The message is
    /// then left uncommitted for redelivery.
    async fn handle(&mut self, message: BrokerMessage, shutdown: &CancellationToken) -> bool {
        let request = match serde_json::from_slice::<PayoutRequest>(&message.payload) {
            Ok(request) => request,
            Err(e) => {
                self.stats.malformed += 1;
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "malformed_payout_request"
                );
                self.commit(&message).await;
                return true;
            }
        };

        let offer_id = request.offer_id;
        let task = PayoutTask::from(request);
        loop {
            let enqueued = tokio::select! {
                _ = shutdown.cancelled() => return false,
                enqueued = self.queue.enqueue(task.clone()) => enqueued,
            };
            match enqueued {
                Ok(()) => {
                    self.stats.dispatched += 1;
                    tracing::info!(offer_id = %offer_id, offset = message.offset, "payout_dispatched");
                    self.commit(&message).await;
                    return true;
                }
                Err(e) => {
                    self.stats.enqueue_failures += 1;
                    tracing::error!(
                        offer_id = %offer_id,
                        offset = message.offset,
                        error = %e,
                        backoff_ms = self.error_backoff.as_millis() as u64,
                        "payout_enqueue_failed"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return false,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }
    }

    async fn commit(&mut self, message: &BrokerMessage) {
        if let Err(e) = self.consumer.commit(message).await {
            self.stats.commit_failures += 1;
            tracing::error!(offset = message.offset, error = %e, "offset_commit_failed");
        }
    }
}

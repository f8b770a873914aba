use crate::domain::payout::{OutcomeStatus, PayoutMethod, PayoutOutcomeEvent};
use crate::domain::ports::ProducerRef;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Fields describing the result of one payout attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub offer_id: Uuid,
    pub method: Option<PayoutMethod>,
    pub reference_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: String,
    pub status: OutcomeStatus,
    pub failure_reason: Option<String>,
}

/// Emits payout-completed events keyed by offer id.
///
/// Publishing is best-effort relative to the ledger and offer state: a failed
/// send is logged and counted, never propagated.
pub struct OutcomePublisher {
    producer: ProducerRef,
    topic: String,
    published: AtomicU64,
    failures: AtomicU64,
}

impl OutcomePublisher {
    pub fn new(producer: ProducerRef, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
            published: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Returns the event that was sent, or `None` if it could not be delivered.
    pub async fn publish(&self, outcome: Outcome) -> Option<PayoutOutcomeEvent> {
        let event = PayoutOutcomeEvent {
            event_id: Uuid::new_v4(),
            offer_id: outcome.offer_id,
            payout_method: outcome.method,
            reference_id: outcome.reference_id,
            amount_cents: outcome.amount,
            currency_code: outcome.currency,
            status: outcome.status,
            failure_reason: outcome.failure_reason,
            completed_at: Utc::now(),
        };

        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(offer_id = %event.offer_id, error = %e, "outcome_serialize_failed");
                return None;
            }
        };

        let key = event.offer_id.to_string();
        match self.producer.produce(&self.topic, Some(&key), &payload).await {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    topic = %self.topic,
                    offer_id = %event.offer_id,
                    status = ?event.status,
                    method = ?event.payout_method,
                    reference_id = ?event.reference_id,
                    "outcome_published"
                );
                Some(event)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    topic = %self.topic,
                    offer_id = %event.offer_id,
                    error = %e,
                    "outcome_publish_failed"
                );
                None
            }
        }
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

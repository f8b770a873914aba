mod common;

use common::{Harness, ScriptedProvider, rejection, transient};
use payout_engine::application::retry::RetryPolicy;
use payout_engine::application::worker::{RetryAccepted, WorkerPool};
use payout_engine::config::WorkerConfig;
use payout_engine::domain::offer::OfferStatus;
use payout_engine::domain::payout::{OutcomeStatus, PayoutMethod};
use payout_engine::domain::ports::{LedgerStore, OfferStore};
use std::time::Duration;

fn workers() -> WorkerConfig {
    WorkerConfig {
        concurrency: 2,
        queue_capacity: 16,
    }
}

fn fast_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(5))
}

#[tokio::test]
async fn test_transient_failure_is_retried_until_success() {
    let h = Harness::new(
        ScriptedProvider::failing(PayoutMethod::Primary, transient("stripe")),
        ScriptedProvider::succeeding(PayoutMethod::Secondary, "w_ok"),
    );
    h.secondary.push(Err(transient("wise")));
    let offer = h.seed(Some(2500)).await;

    let pool = WorkerPool::spawn(h.executor.clone(), fast_retries(3), &workers());
    let accepted = pool.queue().retry_payout(offer.id).await.unwrap();
    assert_eq!(accepted, RetryAccepted { offer_id: offer.id });
    pool.shutdown().await;

    assert_eq!(h.secondary.calls(), 2);
    assert_eq!(h.ledger.entries_for_offer(offer.id).await.unwrap().len(), 1);
    let stored = h.offers.read(offer.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OfferStatus::PaidOut);

    let statuses: Vec<OutcomeStatus> = h.events().iter().map(|event| event.status).collect();
    assert_eq!(statuses, vec![OutcomeStatus::Failure, OutcomeStatus::Success]);
}

#[tokio::test]
async fn test_retries_stop_at_max_attempts() {
    let h = Harness::new(
        ScriptedProvider::failing(PayoutMethod::Primary, transient("stripe")),
        ScriptedProvider::failing(PayoutMethod::Secondary, transient("wise")),
    );
    let offer = h.seed(Some(2500)).await;

    let pool = WorkerPool::spawn(h.executor.clone(), fast_retries(3), &workers());
    pool.queue().retry_payout(offer.id).await.unwrap();
    pool.shutdown().await;

    assert_eq!(h.secondary.calls(), 3);
    assert_eq!(h.events().len(), 3);
    assert!(h.ledger.all_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejection_is_not_retried() {
    let h = Harness::new(
        ScriptedProvider::failing(PayoutMethod::Primary, rejection("stripe")),
        ScriptedProvider::failing(PayoutMethod::Secondary, rejection("wise")),
    );
    let offer = h.seed(Some(2500)).await;

    let pool = WorkerPool::spawn(h.executor.clone(), fast_retries(3), &workers());
    pool.queue().retry_payout(offer.id).await.unwrap();
    pool.shutdown().await;

    assert_eq!(h.secondary.calls(), 1);
    assert_eq!(h.events().len(), 1);
}

#[tokio::test]
async fn test_manual_retry_after_failure_pays_out_once() {
    let h = Harness::new(
        ScriptedProvider::succeeding(PayoutMethod::Primary, "tr_late"),
        ScriptedProvider::failing(PayoutMethod::Secondary, rejection("wise")),
    );
    h.primary.push(Err(rejection("stripe")));
    let offer = h.seed(Some(9900)).await;

    let pool = WorkerPool::spawn(h.executor.clone(), fast_retries(1), &workers());
    let queue = pool.queue();
    queue.retry_payout(offer.id).await.unwrap();
    // Repeated triggers for an offer that ends up paid must not disburse again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.retry_payout(offer.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.retry_payout(offer.id).await.unwrap();
    drop(queue);
    pool.shutdown().await;

    assert_eq!(h.primary.calls(), 2);
    let entries = h.ledger.entries_for_offer(offer.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reference_id, "tr_late");
}

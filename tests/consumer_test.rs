mod common;

use async_trait::async_trait;
use common::{RecordingQueue, ScriptedConsumer, message};
use payout_engine::application::consumer::RequestConsumer;
use payout_engine::config::BrokerConfig;
use payout_engine::domain::payout::{PayoutRequest, PayoutTask, TaskSource};
use payout_engine::domain::ports::{Delivery, MessageProducer, TaskQueue};
use payout_engine::error::{BrokerError, Result};
use payout_engine::infrastructure::broker::InMemoryBroker;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn fast_config() -> BrokerConfig {
    BrokerConfig {
        poll_timeout_ms: 5,
        error_backoff_ms: 5,
        ..BrokerConfig::default()
    }
}

fn request_payload(offer_id: Uuid) -> Vec<u8> {
    serde_json::to_vec(&PayoutRequest::new(offer_id, 50000, "EUR")).unwrap()
}

async fn run_for(consumer: RequestConsumer, duration: Duration) -> payout_engine::application::consumer::ConsumerStats {
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(consumer.run(shutdown.clone()));
    tokio::time::sleep(duration).await;
    shutdown.cancel();
    handle.await.unwrap()
}

#[tokio::test]
async fn test_dispatches_then_commits_and_skips_malformed() {
    let offer_id = Uuid::new_v4();
    let (consumer, log) = ScriptedConsumer::new(vec![
        Ok(Some(message(0, &request_payload(offer_id)))),
        Ok(Some(message(1, b"{not json"))),
        Ok(Some(Delivery::PartitionEof {
            topic: "payout.requested".into(),
            partition: 0,
        })),
        Err(BrokerError("broker transport failure".into())),
        Ok(None),
    ]);
    let queue = Arc::new(RecordingQueue::default());

    let stats = run_for(
        RequestConsumer::new(Box::new(consumer), queue.clone(), &fast_config()),
        Duration::from_millis(100),
    )
    .await;

    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.partition_eofs, 1);
    assert_eq!(stats.broker_errors, 1);

    let tasks = queue.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].offer_id, offer_id);
    assert_eq!(tasks[0].requested_amount, Some(50000));
    assert_eq!(tasks[0].source, TaskSource::Broker);

    assert_eq!(*log.commits.lock().unwrap(), vec![0, 1]);
    assert!(log.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failed_enqueue_is_not_committed() {
    let (consumer, log) =
        ScriptedConsumer::new(vec![Ok(Some(message(0, &request_payload(Uuid::new_v4()))))]);
    let queue = Arc::new(RecordingQueue::default());
    queue.closed.store(true, Ordering::SeqCst);

    let stats = run_for(
        RequestConsumer::new(Box::new(consumer), queue.clone(), &fast_config()),
        Duration::from_millis(50),
    )
    .await;

    assert!(stats.enqueue_failures >= 1);
    assert_eq!(stats.dispatched, 0);
    assert!(log.commits.lock().unwrap().is_empty());
    assert!(log.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failed_enqueue_is_retried_before_next_message() {
    let broker = InMemoryBroker::new();
    let config = fast_config();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    for offer_id in [first, second] {
        broker
            .produce(&config.request_topic, None, &request_payload(offer_id))
            .await
            .unwrap();
    }

    let queue = Arc::new(RecordingQueue::default());
    queue.rejections.store(1, Ordering::SeqCst);
    let consumer = RequestConsumer::new(
        Box::new(broker.consumer(config.consumer_group.clone(), config.request_topic.clone())),
        queue.clone(),
        &config,
    );
    let stats = run_for(consumer, Duration::from_millis(100)).await;

    assert_eq!(stats.enqueue_failures, 1);
    assert_eq!(stats.dispatched, 2);
    let dispatched: Vec<Uuid> = queue.tasks().iter().map(|task| task.offer_id).collect();
    assert_eq!(dispatched, vec![first, second]);
    assert_eq!(broker.lag(&config.consumer_group, &config.request_topic), 0);
}

struct StalledQueue;

#[async_trait]
impl TaskQueue for StalledQueue {
    async fn enqueue(&self, _task: PayoutTask) -> Result<()> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_cancellation_interrupts_blocked_enqueue() {
    let (consumer, log) =
        ScriptedConsumer::new(vec![Ok(Some(message(0, &request_payload(Uuid::new_v4()))))]);

    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        run_for(
            RequestConsumer::new(Box::new(consumer), Arc::new(StalledQueue), &fast_config()),
            Duration::from_millis(20),
        ),
    )
    .await
    .expect("consumer did not stop while enqueue was blocked");

    assert_eq!(stats.dispatched, 0);
    assert!(log.commits.lock().unwrap().is_empty());
    assert!(log.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancellation_interrupts_backoff() {
    let (consumer, log) = ScriptedConsumer::new(vec![Err(BrokerError("down".into()))]);
    let config = BrokerConfig {
        poll_timeout_ms: 5,
        error_backoff_ms: 60_000,
        ..BrokerConfig::default()
    };

    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        run_for(
            RequestConsumer::new(Box::new(consumer), Arc::new(RecordingQueue::default()), &config),
            Duration::from_millis(20),
        ),
    )
    .await
    .expect("consumer did not stop during backoff");

    assert_eq!(stats.broker_errors, 1);
    assert!(log.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_in_memory_broker_lag_drains() {
    let broker = InMemoryBroker::new();
    let config = fast_config();
    for _ in 0..3 {
        broker
            .produce(&config.request_topic, None, &request_payload(Uuid::new_v4()))
            .await
            .unwrap();
    }
    broker.produce(&config.request_topic, None, b"garbage").await.unwrap();
    assert_eq!(broker.lag(&config.consumer_group, &config.request_topic), 4);

    let queue = Arc::new(RecordingQueue::default());
    let consumer = RequestConsumer::new(
        Box::new(broker.consumer(config.consumer_group.clone(), config.request_topic.clone())),
        queue.clone(),
        &config,
    );
    let stats = run_for(consumer, Duration::from_millis(100)).await;

    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.malformed, 1);
    assert_eq!(queue.tasks().len(), 3);
    assert_eq!(broker.lag(&config.consumer_group, &config.request_topic), 0);
}

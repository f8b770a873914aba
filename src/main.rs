use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payout_engine::application::circuit_breaker::CircuitBreaker;
use payout_engine::application::consumer::RequestConsumer;
use payout_engine::application::executor::PayoutExecutor;
use payout_engine::application::ledger::LedgerWriter;
use payout_engine::application::publisher::OutcomePublisher;
use payout_engine::application::reconcile::Reconciler;
use payout_engine::application::retry::RetryPolicy;
use payout_engine::application::worker::WorkerPool;
use payout_engine::config::Settings;
use payout_engine::domain::offer::Offer;
use payout_engine::domain::ports::{LedgerStoreRef, MessageProducer, OfferStoreRef, ProviderRef};
use payout_engine::infrastructure::broker::InMemoryBroker;
use payout_engine::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryOfferStore};
use payout_engine::infrastructure::providers::{StripeTransferProvider, WiseTransferProvider};
use payout_engine::interfaces::csv::ledger_writer::LedgerCsvWriter;
use payout_engine::interfaces::csv::offer_reader::OfferReader;
use payout_engine::interfaces::request_feed::read_request_lines;
use payout_engine::logging::init_tracing;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const DRAIN_CHECK_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Payout requests, one JSON object per line
    input: PathBuf,

    /// Offers CSV file (id, status, payable_amount, currency)
    #[arg(long)]
    offers: PathBuf,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Manually re-trigger the payout of an offer (repeatable)
    #[arg(long = "retry-offer")]
    retry_offers: Vec<Uuid>,

    /// Write outcome events as JSON lines to this file
    #[arg(long)]
    outcomes: Option<PathBuf>,

    /// Repair offers whose ledger entry exists but status is not paid
    #[arg(long)]
    reconcile: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).into_diagnostic()?;
    init_tracing(&settings.logging).into_diagnostic()?;

    let offers = read_offers(&cli.offers)?;
    let (offer_store, ledger_store) = open_stores(cli.db_path.as_deref(), offers).await?;

    let broker = InMemoryBroker::new();
    let publisher = Arc::new(OutcomePublisher::new(
        Arc::new(broker.clone()),
        settings.broker.outcome_topic.clone(),
    ));
    let primary: ProviderRef = Arc::new(StripeTransferProvider::new(settings.providers.stripe.clone()));
    let secondary: ProviderRef = Arc::new(WiseTransferProvider::new(settings.providers.wise.clone()));
    let breaker = Arc::new(CircuitBreaker::new(primary.name(), &settings.breaker));

    let executor = Arc::new(PayoutExecutor::new(
        offer_store.clone(),
        LedgerWriter::new(ledger_store.clone(), settings.ledger.cash_account.clone()),
        primary,
        secondary,
        breaker,
        publisher.clone(),
    ));
    let pool = WorkerPool::spawn(executor, RetryPolicy::from(&settings.retry), &settings.workers);

    let input = File::open(&cli.input).into_diagnostic()?;
    for line in read_request_lines(BufReader::new(input)).into_diagnostic()? {
        broker
            .produce(&settings.broker.request_topic, None, &line)
            .await
            .into_diagnostic()?;
    }

    let shutdown = CancellationToken::new();
    let consumer = RequestConsumer::new(
        Box::new(broker.consumer(
            settings.broker.consumer_group.clone(),
            settings.broker.request_topic.clone(),
        )),
        Arc::new(pool.queue()),
        &settings.broker,
    );
    let consumer_handle = tokio::spawn(consumer.run(shutdown.clone()));

    let queue = pool.queue();
    for offer_id in &cli.retry_offers {
        queue.retry_payout(*offer_id).await.into_diagnostic()?;
    }
    drop(queue);

    tokio::select! {
        _ = wait_for_drain(&broker, &settings.broker.consumer_group, &settings.broker.request_topic) => {}
        _ = tokio::signal::ctrl_c() => tracing::warn!("interrupted, shutting down"),
    }
    shutdown.cancel();
    let stats = consumer_handle.await.into_diagnostic()?;
    pool.shutdown().await;
    tracing::info!(
        dispatched = stats.dispatched,
        malformed = stats.malformed,
        published = publisher.published_count(),
        publish_failures = publisher.failure_count(),
        "run_complete"
    );

    if cli.reconcile {
        let report = Reconciler::new(offer_store, ledger_store.clone())
            .run()
            .await
            .into_diagnostic()?;
        eprintln!(
            "reconciled {} offers: {} repaired, {} orphaned",
            report.checked,
            report.repaired.len(),
            report.orphaned.len()
        );
    }

    if let Some(path) = cli.outcomes {
        let mut file = File::create(path).into_diagnostic()?;
        for message in broker.messages(&settings.broker.outcome_topic) {
            file.write_all(&message.payload).into_diagnostic()?;
            file.write_all(b"\n").into_diagnostic()?;
        }
    }

    let entries = ledger_store.all_entries().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = LedgerCsvWriter::new(stdout.lock());
    writer.write_entries(&entries).into_diagnostic()?;

    Ok(())
}

fn read_offers(path: &Path) -> Result<Vec<Offer>> {
    let file = File::open(path).into_diagnostic()?;
    let mut offers = Vec::new();
    for offer in OfferReader::new(file).offers() {
        match offer {
            Ok(offer) => offers.push(offer),
            Err(e) => eprintln!("Error reading offer: {}", e),
        }
    }
    Ok(offers)
}

#[cfg(feature = "storage-rocksdb")]
async fn open_stores(
    db_path: Option<&Path>,
    offers: Vec<Offer>,
) -> Result<(OfferStoreRef, LedgerStoreRef)> {
    use payout_engine::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            for offer in &offers {
                store.seed_offer(offer).into_diagnostic()?;
            }
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        None => Ok(in_memory_stores(offers).await),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
async fn open_stores(
    db_path: Option<&Path>,
    offers: Vec<Offer>,
) -> Result<(OfferStoreRef, LedgerStoreRef)> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(in_memory_stores(offers).await)
}

async fn in_memory_stores(offers: Vec<Offer>) -> (OfferStoreRef, LedgerStoreRef) {
    let offer_store = InMemoryOfferStore::new();
    for offer in offers {
        offer_store.insert(offer).await;
    }
    (Arc::new(offer_store), Arc::new(InMemoryLedgerStore::new()))
}

async fn wait_for_drain(broker: &InMemoryBroker, group: &str, topic: &str) {
    while broker.lag(group, topic) > 0 {
        tokio::time::sleep(DRAIN_CHECK_INTERVAL).await;
    }
}

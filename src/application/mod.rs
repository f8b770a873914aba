//! Application layer containing the payout orchestration.
//!
//! The `RequestConsumer` feeds a `WorkerPool` through a tokio channel; each
//! worker runs the `PayoutExecutor` under a `RetryPolicy`. The executor owns
//! the provider fallback, the ledger write and the outcome event.

pub mod circuit_breaker;
pub mod consumer;
pub mod executor;
pub mod ledger;
pub mod publisher;
pub mod reconcile;
pub mod retry;
pub mod worker;

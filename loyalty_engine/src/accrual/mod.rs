//! Accrual reconciliation.
//!
//! Newly submitted order numbers go onto a bounded [`ReconciliationQueue`]. A single [`ReconciliationWorker`] drains
//! the queue, asks the [`AccrualOracle`] about each order and applies the decision to the ledger. Transient failures
//! (rate limiting, oracle outages, malformed replies, storage hiccups) are retried from a worker-owned
//! [`RetrySchedule`] with bounded exponential backoff; they never re-enter the queue. Orders that exhaust their retry
//! budget are reported as stuck.
mod oracle;
mod queue;
mod retry;
mod worker;

pub use oracle::{parse_retry_after, AccrualOracle, HttpAccrualOracle, OracleError, OracleOrderReport, OracleOrderStatus};
pub use queue::{QueueError, QueueReceiver, ReconciliationQueue};
pub use retry::{RetryPolicy, RetrySchedule};
pub use worker::{ReconciliationHandle, ReconciliationWorker, WorkerConfig, WorkerStats, WorkerStatsSnapshot};

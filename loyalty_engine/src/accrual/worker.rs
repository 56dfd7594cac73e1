use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use loyalty_common::OrderNumber;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{sleep_until, Instant},
};

use crate::{
    accrual::{AccrualOracle, QueueReceiver, ReconciliationQueue, RetryPolicy, RetrySchedule},
    db::traits::{AccrualOutcome, LedgerDatabase},
    db_types::{AccrualDecision, OrderStatusType},
    events::{EventProducers, OrderAccruedEvent, OrderStuckEvent},
    LedgerApiError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { queue_capacity: 100, retry: RetryPolicy::default() }
    }
}

/// Live counters, updated by the worker as it goes.
#[derive(Debug, Default)]
pub struct WorkerStats {
    applied: AtomicU64,
    requeued: AtomicU64,
    stuck: AtomicU64,
    scheduled: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    /// Decisions written to the ledger, including intermediate ones.
    pub applied: u64,
    /// Failed attempts that were put back on the retry schedule.
    pub requeued: u64,
    /// Orders given up on after exhausting their retry budget.
    pub stuck: u64,
    /// Orders currently waiting on the retry schedule.
    pub scheduled: usize,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            applied: self.applied.load(Ordering::SeqCst),
            requeued: self.requeued.load(Ordering::SeqCst),
            stuck: self.stuck.load(Ordering::SeqCst),
            scheduled: self.scheduled.load(Ordering::SeqCst),
        }
    }
}

/// A handle on a running reconciliation worker.
pub struct ReconciliationHandle {
    queue: ReconciliationQueue,
    stats: Arc<WorkerStats>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ReconciliationHandle {
    /// A producer for the worker's queue.
    pub fn queue(&self) -> ReconciliationQueue {
        self.queue.clone()
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Closes the queue, waits for the worker to drain what is left in it and stop. Orders still waiting on the retry
    /// schedule are discarded; they remain pending in the ledger. Returns the final statistics.
    pub async fn shutdown(self) -> WorkerStatsSnapshot {
        info!("🔁️ Shutting down the reconciliation worker");
        // The worker may already have stopped, in which case there is nobody left to tell.
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!("🔁️ The reconciliation worker did not shut down cleanly: {e}");
        }
        self.stats.snapshot()
    }
}

/// The single consumer of the reconciliation queue.
///
/// For each order number it asks the oracle for a decision and applies it to the ledger. Failures are retried from
/// the worker's own [`RetrySchedule`], never by pushing back onto the queue, so the worker cannot block on itself.
/// A `429` pauses all oracle calls until the requested delay has passed.
pub struct ReconciliationWorker<B, O> {
    db: B,
    oracle: O,
    producers: EventProducers,
    schedule: RetrySchedule,
    stats: Arc<WorkerStats>,
    paused_until: Option<Instant>,
}

impl<B, O> ReconciliationWorker<B, O>
where
    B: LedgerDatabase,
    O: AccrualOracle,
{
    pub fn new(db: B, oracle: O, producers: EventProducers, retry: RetryPolicy) -> Self {
        Self {
            db,
            oracle,
            producers,
            schedule: RetrySchedule::new(retry),
            stats: Arc::new(WorkerStats::default()),
            paused_until: None,
        }
    }

    /// Creates the queue and spawns the worker on the current tokio runtime.
    pub fn start(db: B, oracle: O, producers: EventProducers, config: WorkerConfig) -> ReconciliationHandle {
        let (queue, receiver) = ReconciliationQueue::new(config.queue_capacity);
        let worker = Self::new(db, oracle, producers, config.retry);
        worker.spawn(queue, receiver)
    }

    /// Spawns the worker on an existing queue.
    pub fn spawn(self, queue: ReconciliationQueue, receiver: QueueReceiver) -> ReconciliationHandle {
        let stats = Arc::clone(&self.stats);
        let (shutdown, signal) = oneshot::channel();
        let task = tokio::spawn(self.run(receiver, signal));
        ReconciliationHandle { queue, stats, shutdown, task }
    }

    async fn run(mut self, mut receiver: QueueReceiver, mut shutdown: oneshot::Receiver<()>) {
        info!("🔁️ Reconciliation worker started");
        loop {
            let wake_at = self.next_wake();
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = wait_until(wake_at) => self.process_due().await,
                next = receiver.recv() => match next {
                    Some(number) => self.handle_queued(number).await,
                    None => break,
                },
            }
            self.publish_schedule_size();
        }
        self.drain(receiver).await;
    }

    fn next_wake(&self) -> Option<Instant> {
        let next = self.schedule.next_due()?;
        Some(match self.paused_until {
            Some(until) if until > next => until,
            _ => next,
        })
    }

    async fn process_due(&mut self) {
        let now = Instant::now();
        while let Some(number) = self.schedule.pop_due(now) {
            trace!("🔁️ Retrying order {number}");
            self.attempt(number).await;
        }
    }

    async fn handle_queued(&mut self, number: OrderNumber) {
        if self.schedule.is_scheduled(&number) {
            debug!("🔁️ Order {number} is already scheduled. Ignoring the duplicate entry");
            return;
        }
        self.attempt(number).await;
    }

    /// One unit of work: ask the oracle and apply the answer, or schedule a retry.
    async fn attempt(&mut self, number: OrderNumber) {
        if let Some(until) = self.paused_until {
            if until > Instant::now() {
                trace!("🔁️ Oracle calls are paused. Deferring order {number}");
                self.schedule.defer(number, until);
                return;
            }
            self.paused_until = None;
        }
        match self.oracle.query_order(&number).await {
            Ok(decision) => self.apply(decision).await,
            Err(e) => {
                let hint = e.retry_after();
                let rate_limited = e.is_rate_limit();
                if let Some(delay) = self.retry(number, LedgerApiError::from(e), hint).await {
                    if rate_limited {
                        info!("🔁️ Oracle is rate limiting. Pausing all oracle calls for {}ms", delay.as_millis());
                        self.paused_until = Some(Instant::now() + delay);
                    }
                }
            },
        }
    }

    async fn apply(&mut self, decision: AccrualDecision) {
        let number = decision.number.clone();
        match self.db.apply_accrual(&decision).await {
            Ok(AccrualOutcome::Applied(order)) => {
                self.stats.applied.fetch_add(1, Ordering::SeqCst);
                if order.status.is_terminal() {
                    self.schedule.forget(&number);
                    info!("🔁️ Order {number} is {}. Accrual: {:?}", order.status, order.accrual);
                    if order.status == OrderStatusType::Processed {
                        self.producers.publish_order_accrued(OrderAccruedEvent::new(order)).await;
                    }
                } else {
                    let delay = self.schedule.schedule_poll(number.clone(), Instant::now());
                    debug!("🔁️ Order {number} is {}. Asking again in {}ms", order.status, delay.as_millis());
                }
            },
            Ok(AccrualOutcome::Unchanged(order)) => {
                let delay = self.schedule.schedule_recheck(number.clone(), Instant::now());
                debug!(
                    "🔁️ Oracle says {} for order {number}, which is already {}. Asking again in {}ms",
                    decision.status,
                    order.status,
                    delay.as_millis()
                );
            },
            Ok(AccrualOutcome::AlreadyTerminal(order)) => {
                self.schedule.forget(&number);
                debug!("🔁️ Order {number} was already {}. Ignoring the duplicate decision", order.status);
            },
            Ok(AccrualOutcome::OrderNotFound) => {
                self.schedule.forget(&number);
                warn!("🔁️ The oracle decided on order {number}, but it is not in the ledger. Ignoring it");
            },
            Err(e) => {
                let _ = self.retry(number, LedgerApiError::StorageFailure(e.to_string()), None).await;
            },
        }
    }

    /// Puts the order on the retry schedule, or declares it stuck if its retry budget is spent.
    async fn retry(&mut self, number: OrderNumber, reason: LedgerApiError, hint: Option<Duration>) -> Option<Duration> {
        let failures = self.schedule.failures(&number) + 1;
        match self.schedule.schedule_retry(number.clone(), Instant::now(), hint) {
            Some(delay) => {
                self.stats.requeued.fetch_add(1, Ordering::SeqCst);
                debug!("🔁️ Attempt {failures} on order {number} failed: {reason}. Retrying in {}ms", delay.as_millis());
                Some(delay)
            },
            None => {
                self.stats.stuck.fetch_add(1, Ordering::SeqCst);
                error!(
                    "🔁️ Order {number} is stuck after {failures} failed attempts. Last error: {reason}. It stays \
                     pending and will be picked up again on restart"
                );
                let event = OrderStuckEvent::new(number, failures, reason.to_string());
                self.producers.publish_order_stuck(event).await;
                None
            },
        }
    }

    async fn drain(mut self, mut receiver: QueueReceiver) {
        receiver.close();
        let mut drained = 0usize;
        while let Some(number) = receiver.recv().await {
            drained += 1;
            self.handle_queued(number).await;
        }
        if drained > 0 {
            info!("🔁️ Drained {drained} orders from the closed queue");
        }
        let discarded = self.schedule.drain();
        if !discarded.is_empty() {
            warn!(
                "🔁️ Discarding {} orders awaiting retry. They remain pending in the ledger: {}",
                discarded.len(),
                discarded.iter().map(|n| n.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
        self.publish_schedule_size();
        info!("🔁️ Reconciliation worker stopped");
    }

    fn publish_schedule_size(&self) {
        self.stats.scheduled.store(self.schedule.len(), Ordering::SeqCst);
    }
}

async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

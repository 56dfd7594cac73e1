use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, HashSet},
    time::Duration,
};

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use loyalty_common::OrderNumber;
use tokio::time::Instant;

/// Bounds on how the worker retries an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry. Each further failure doubles it.
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Failed attempts allowed per order before it is declared stuck.
    pub max_attempts: usize,
    /// How long to wait before asking again about an order the oracle has not finished with.
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            max_attempts: 20,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts)
            .build()
    }
}

struct BackoffState {
    backoff: ExponentialBackoff,
    failures: usize,
}

/// Worker-owned delay schedule: a min-heap of (due time, order number).
///
/// An order is in the schedule at most once. Each order that has failed at least once carries its own backoff,
/// which is only reset when the oracle makes progress on it.
pub struct RetrySchedule {
    policy: RetryPolicy,
    due: BinaryHeap<Reverse<(Instant, u64, OrderNumber)>>,
    scheduled: HashSet<OrderNumber>,
    backoffs: HashMap<OrderNumber, BackoffState>,
    seq: u64,
}

impl RetrySchedule {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, due: BinaryHeap::new(), scheduled: HashSet::new(), backoffs: HashMap::new(), seq: 0 }
    }

    pub fn is_scheduled(&self, number: &OrderNumber) -> bool {
        self.scheduled.contains(number)
    }

    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    /// Records a failed attempt. Returns the delay until the next attempt, or `None` once the retry budget is spent,
    /// in which case the order is forgotten. `hint` (e.g. a `Retry-After` value) can lengthen the delay, but never
    /// shorten it.
    pub fn schedule_retry(&mut self, number: OrderNumber, now: Instant, hint: Option<Duration>) -> Option<Duration> {
        let policy = self.policy;
        let state = self
            .backoffs
            .entry(number.clone())
            .or_insert_with(|| BackoffState { backoff: policy.backoff(), failures: 0 });
        state.failures += 1;
        match state.backoff.next() {
            Some(step) => {
                let delay = hint.map_or(step, |h| h.max(step));
                self.push(number, now + delay);
                Some(delay)
            },
            None => {
                self.backoffs.remove(&number);
                None
            },
        }
    }

    /// Schedules a follow-up poll for an order the oracle is still working on. Progress resets the backoff.
    pub fn schedule_poll(&mut self, number: OrderNumber, now: Instant) -> Duration {
        self.backoffs.remove(&number);
        let delay = self.policy.poll_interval;
        self.push(number, now + delay);
        delay
    }

    /// Schedules a follow-up poll for an order whose status the oracle only repeated. Failures recorded so far still
    /// count against the retry budget.
    pub fn schedule_recheck(&mut self, number: OrderNumber, now: Instant) -> Duration {
        let delay = self.policy.poll_interval;
        self.push(number, now + delay);
        delay
    }

    /// Puts the order back at `at` without consuming a retry step. Used while calls to the oracle are paused.
    pub fn defer(&mut self, number: OrderNumber, at: Instant) {
        self.push(number, at);
    }

    /// Number of failed attempts recorded for the order since it last made progress.
    pub fn failures(&self, number: &OrderNumber) -> usize {
        self.backoffs.get(number).map(|s| s.failures).unwrap_or(0)
    }

    /// Drops all retry state for an order that has been settled.
    pub fn forget(&mut self, number: &OrderNumber) {
        self.backoffs.remove(number);
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.due.peek().map(|Reverse((at, _, _))| *at)
    }

    /// Removes and returns the earliest order that is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<OrderNumber> {
        match self.due.peek() {
            Some(Reverse((at, _, _))) if *at <= now => {},
            _ => return None,
        }
        let Reverse((_, _, number)) = self.due.pop()?;
        self.scheduled.remove(&number);
        Some(number)
    }

    /// Empties the schedule, returning everything that was still waiting.
    pub fn drain(&mut self) -> Vec<OrderNumber> {
        self.backoffs.clear();
        self.scheduled.clear();
        let mut pending = std::mem::take(&mut self.due).into_sorted_vec();
        pending.reverse();
        pending.into_iter().map(|Reverse((_, _, n))| n).collect()
    }

    fn push(&mut self, number: OrderNumber, at: Instant) {
        if !self.scheduled.insert(number.clone()) {
            return;
        }
        self.seq += 1;
        self.due.push(Reverse((at, self.seq, number)));
    }
}

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use loyalty_common::{OrderNumber, Points};
use tokio::time::Instant;

use crate::{
    accrual::{AccrualOracle, OracleError},
    db_types::{AccrualDecision, OrderStatusType},
};

type Reply = Result<AccrualDecision, OracleError>;

#[derive(Default)]
struct Script {
    replies: HashMap<OrderNumber, VecDeque<Reply>>,
    fallback: Option<Reply>,
    calls: Vec<(OrderNumber, Instant)>,
}

/// An in-process oracle that answers from a per-order script.
///
/// Replies queued for an order are handed out in order. Once they run out, the fallback reply is used, and without
/// a fallback the oracle claims not to know the order (as a `204` would).
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(self, reply: Reply) -> Self {
        self.lock().fallback = Some(reply);
        self
    }

    pub fn push_reply(&self, number: &OrderNumber, reply: Reply) -> &Self {
        self.lock().replies.entry(number.clone()).or_default().push_back(reply);
        self
    }

    pub fn push_processed(&self, number: &OrderNumber, accrual: Points) -> &Self {
        self.push_reply(number, Ok(AccrualDecision::processed(number.clone(), accrual)))
    }

    pub fn push_status(&self, number: &OrderNumber, status: OrderStatusType) -> &Self {
        self.push_reply(number, Ok(AccrualDecision::pending(number.clone(), status)))
    }

    pub fn push_error(&self, number: &OrderNumber, error: OracleError) -> &Self {
        self.push_reply(number, Err(error))
    }

    /// Total number of queries made so far.
    pub fn calls(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls_for(&self, number: &OrderNumber) -> usize {
        self.lock().calls.iter().filter(|(n, _)| n == number).count()
    }

    /// The instants at which every query was made, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.lock().calls.iter().map(|(_, at)| *at).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AccrualOracle for ScriptedOracle {
    async fn query_order(&self, number: &OrderNumber) -> Result<AccrualDecision, OracleError> {
        let mut script = self.lock();
        script.calls.push((number.clone(), Instant::now()));
        let scripted = script.replies.get_mut(number).and_then(|replies| replies.pop_front());
        scripted.or_else(|| script.fallback.clone()).unwrap_or(Err(OracleError::NotRegistered))
    }
}

use loyalty_common::Points;
use serde::Serialize;

use crate::db_types::{Order, UserAccount};

/// What happened to a submitted order number. Both outcomes are successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The number is new. It has been stored and queued for reconciliation.
    Accepted(Order),
    /// The caller submitted this number before. Nothing was changed.
    AlreadyOwnedBySelf(Order),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub current: Points,
    pub withdrawn: Points,
}

impl From<&UserAccount> for Balance {
    fn from(account: &UserAccount) -> Self {
        Self { current: account.balance, withdrawn: account.withdrawn }
    }
}

/// A user's order or withdrawal history. An empty history is its own outcome, so callers cannot mistake it for a
/// failed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum History<T> {
    NoContent,
    Records(Vec<T>),
}

impl<T> From<Vec<T>> for History<T> {
    fn from(records: Vec<T>) -> Self {
        if records.is_empty() {
            History::NoContent
        } else {
            History::Records(records)
        }
    }
}

impl<T> History<T> {
    pub fn len(&self) -> usize {
        match self {
            History::NoContent => 0,
            History::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, History::NoContent)
    }

    pub fn into_records(self) -> Vec<T> {
        match self {
            History::NoContent => vec![],
            History::Records(records) => records,
        }
    }
}

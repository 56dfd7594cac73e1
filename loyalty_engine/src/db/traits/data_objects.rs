use loyalty_common::Points;

use crate::db_types::{Order, OrderStatusType, UserAccount, Withdrawal};

#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    Inserted(Order),
    /// The number was already known. The existing order is returned unchanged; check `user_id` for ownership.
    AlreadyExists(Order),
}

#[derive(Debug, Clone)]
pub enum InsertUserResult {
    Inserted(UserAccount),
    AlreadyExists,
}

/// The result of applying an oracle decision to the ledger.
#[derive(Debug, Clone)]
pub enum AccrualOutcome {
    /// The decision was recorded. If the new status is `PROCESSED`, the owner has been credited.
    Applied(Order),
    /// The order reached a terminal state earlier. Nothing was written.
    AlreadyTerminal(Order),
    /// The decision repeats the current status or would move the order backwards (e.g. `PROCESSING` to `NEW`).
    /// Nothing was written.
    Unchanged(Order),
    OrderNotFound,
}

#[derive(Debug, Clone)]
pub enum WithdrawalOutcome {
    Completed(Withdrawal),
    InsufficientBalance { available: Points },
    AccountNotFound,
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub user_id: Option<i64>,
    pub statuses: Vec<OrderStatusType>,
}

impl OrderQueryFilter {
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    /// Orders that still await a final decision from the oracle.
    pub fn pending() -> Self {
        Self::default().with_status(OrderStatusType::New).with_status(OrderStatusType::Processing)
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.statuses.is_empty()
    }
}

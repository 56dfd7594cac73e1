use loyalty_common::OrderNumber;
use serde::Serialize;

use crate::db_types::{Order, Withdrawal};

/// An order reached `PROCESSED` and its accrual has been credited to the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAccruedEvent {
    pub order: Order,
}

impl OrderAccruedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// The reconciliation worker gave up on an order after exhausting its retry budget. The order is still pending in
/// the ledger and is picked up again on the next start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderStuckEvent {
    pub number: OrderNumber,
    pub attempts: usize,
    pub last_error: String,
}

impl OrderStuckEvent {
    pub fn new(number: OrderNumber, attempts: usize, last_error: String) -> Self {
        Self { number, attempts, last_error }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalEvent {
    pub withdrawal: Withdrawal,
}

impl WithdrawalEvent {
    pub fn new(withdrawal: Withdrawal) -> Self {
        Self { withdrawal }
    }
}

use std::fmt::Display;

use chrono::{DateTime, Utc};
use loyalty_common::{OrderNumber, Points};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been submitted, and the oracle has not started working on it yet.
    New,
    /// The oracle is still deciding on the accrual for this order.
    Processing,
    /// The oracle has rejected the order. No points will be credited. Terminal.
    Invalid,
    /// The oracle has decided on the accrual, and it has been credited to the owner. Terminal.
    Processed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Invalid | OrderStatusType::Processed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusType::New => "NEW",
            OrderStatusType::Processing => "PROCESSING",
            OrderStatusType::Invalid => "INVALID",
            OrderStatusType::Processed => "PROCESSED",
        }
    }

    /// The statuses an order may be in for a transition to `self` to be allowed. Terminal orders never move, and
    /// an order never moves backwards from `PROCESSING` to `NEW`.
    pub fn allowed_predecessors(&self) -> &'static [OrderStatusType] {
        match self {
            OrderStatusType::New => &[],
            OrderStatusType::Processing => &[OrderStatusType::New],
            OrderStatusType::Invalid | OrderStatusType::Processed => {
                &[OrderStatusType::New, OrderStatusType::Processing]
            },
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub number: OrderNumber,
    pub user_id: i64,
    pub status: OrderStatusType,
    pub accrual: Option<Points>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: OrderNumber,
    pub user_id: i64,
}

impl NewOrder {
    pub fn new(number: OrderNumber, user_id: i64) -> Self {
        Self { number, user_id }
    }
}

//--------------------------------------     UserAccount     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserAccount {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    /// Spendable points. Never negative.
    pub balance: Points,
    /// Lifetime total of all withdrawals.
    pub withdrawn: Points,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    /// A PHC-formatted password hash. Plaintext passwords never reach the database layer.
    pub password_hash: String,
}

//--------------------------------------     Withdrawal      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Withdrawal {
    pub id: i64,
    pub order_number: OrderNumber,
    pub user_id: i64,
    pub sum: Points,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    /// Caller-supplied identifier. It is Luhn-valid, but need not refer to a known order.
    pub order_number: OrderNumber,
    pub user_id: i64,
    pub sum: Points,
}

//--------------------------------------   AccrualDecision   ---------------------------------------------------------
/// The oracle's verdict on a single order. `accrual` is only ever set when `status` is `PROCESSED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualDecision {
    pub number: OrderNumber,
    pub status: OrderStatusType,
    pub accrual: Option<Points>,
}

impl AccrualDecision {
    pub fn processed(number: OrderNumber, accrual: Points) -> Self {
        Self { number, status: OrderStatusType::Processed, accrual: Some(accrual) }
    }

    pub fn pending(number: OrderNumber, status: OrderStatusType) -> Self {
        Self { number, status, accrual: None }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

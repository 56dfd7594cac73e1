use chrono::{DateTime, SecondsFormat, Utc};
use loyalty_common::Points;
use loyalty_engine::db_types::{Order, OrderStatusType, Withdrawal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// The order identifier is kept as a string here so that a bad checksum is reported as `422`, not as a malformed body.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Points,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: OrderStatusType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
    pub created_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            number: order.number.into_inner(),
            status: order.status,
            accrual: order.accrual,
            created_at: rfc3339(&order.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: Points,
    pub created_at: String,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            order: withdrawal.order_number.into_inner(),
            sum: withdrawal.sum,
            created_at: rfc3339(&withdrawal.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: message.into() }
    }
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

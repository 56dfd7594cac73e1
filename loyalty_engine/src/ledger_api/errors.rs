use loyalty_common::{OrderNumber, OrderNumberError, Points, PointsConversionError};
use thiserror::Error;

use crate::accrual::{OracleError, QueueError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Order {0} has already been submitted by another user")]
    Conflict(OrderNumber),
    #[error("{0} was not found")]
    NotFound(String),
    #[error("Insufficient balance. Requested {requested}, but only {available} is available")]
    InsufficientBalance { requested: Points, available: Points },
    #[error("The accrual service is unavailable: {0}")]
    TransientUpstream(String),
    #[error("Storage failure: {0}")]
    StorageFailure(String),
    #[error("Order {0} was saved, but the reconciliation queue is closed. It will be processed after a restart")]
    QueueClosed(OrderNumber),
    #[error("Login '{0}' is already taken")]
    LoginTaken(String),
    #[error("Invalid login or password")]
    InvalidCredentials,
}

impl LedgerApiError {
    pub fn storage<E: std::error::Error>(e: E) -> Self {
        Self::StorageFailure(e.to_string())
    }
}

impl From<OrderNumberError> for LedgerApiError {
    fn from(e: OrderNumberError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<PointsConversionError> for LedgerApiError {
    fn from(e: PointsConversionError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<OracleError> for LedgerApiError {
    fn from(e: OracleError) -> Self {
        Self::TransientUpstream(e.to_string())
    }
}

impl From<QueueError> for LedgerApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Closed(number) => Self::QueueClosed(number),
        }
    }
}

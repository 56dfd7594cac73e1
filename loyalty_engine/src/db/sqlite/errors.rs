use loyalty_common::OrderNumber;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Account not found: {0}")]
    AccountNotFound(i64),
    #[error("Order {0} was not found")]
    OrderNotFound(OrderNumber),
}

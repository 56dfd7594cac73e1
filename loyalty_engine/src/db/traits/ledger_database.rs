use std::future::Future;

use crate::{
    db::traits::{AccrualOutcome, InsertOrderResult, WithdrawalOutcome},
    db_types::{AccrualDecision, NewOrder, NewWithdrawal, Order},
};

/// This trait defines the write paths of the ledger.
///
/// * Submitting orders (idempotently: a known number is returned, never duplicated).
/// * Applying oracle decisions, crediting owners when an order is `PROCESSED`.
/// * Debiting balances for withdrawals, never letting a balance go negative.
///
/// The methods return `Send` futures so that a backend can be driven from a spawned reconciliation worker.
pub trait LedgerDatabase: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order with status `NEW`, unless an order with the same number already exists, in which case the
    /// existing order is returned as-is. Two racing calls for the same number create exactly one row.
    fn insert_order(&self, order: NewOrder) -> impl Future<Output = Result<InsertOrderResult, Self::Error>> + Send;

    /// In a single atomic transaction,
    /// * moves the order to the decided status, provided it is not terminal yet and the move is not backwards,
    /// * stores the accrual if the new status is `PROCESSED`,
    /// * credits the accrual to the owner's balance if the new status is `PROCESSED`.
    ///
    /// Applying a decision to an order that is already terminal writes nothing and returns
    /// [`AccrualOutcome::AlreadyTerminal`].
    fn apply_accrual(
        &self,
        decision: &AccrualDecision,
    ) -> impl Future<Output = Result<AccrualOutcome, Self::Error>> + Send;

    /// In a single atomic transaction, debits `sum` from the user's balance (adding it to their lifetime `withdrawn`
    /// total) and records the withdrawal. If the balance is smaller than `sum`, nothing is written.
    fn withdraw(&self, withdrawal: NewWithdrawal) -> impl Future<Output = Result<WithdrawalOutcome, Self::Error>> + Send;

    /// All orders that are not terminal yet, oldest first.
    fn fetch_pending_orders(&self) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send;

    /// Closes the database connection.
    fn close(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async { Ok(()) }
    }
}

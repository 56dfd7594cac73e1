//! Loyalty Ledger Engine
//!
//! The engine keeps the loyalty points ledger: users submit order numbers, an external accrual oracle decides how many
//! points each order earns, and users withdraw what they have accumulated.
//!
//! The library is divided into these sections:
//! 1. Database management ([`mod@db`]). SQLite is the supported backend. You should not need to touch the database
//!    directly; use the public API instead. The data types stored in the database live in [`mod@db_types`].
//! 2. The public ledger API ([`mod@ledger_api`]): order submission, balances and history, withdrawals and
//!    authentication.
//! 3. Accrual reconciliation ([`mod@accrual`]): the oracle client, the bounded reconciliation queue and the worker
//!    that drains it, retrying transient failures on its own delayed schedule.
//!
//! The engine also emits events (an order was credited, an order got stuck, a withdrawal went through) that you can
//! subscribe to via [`events::EventHooks`].
mod db;

pub mod accrual;
pub mod db_types;
pub mod events;
mod ledger_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{db_url, SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    AccountManagement,
    AccrualOutcome,
    AuthManagement,
    InsertOrderResult,
    InsertUserResult,
    LedgerDatabase,
    OrderQueryFilter,
    WithdrawalOutcome,
};
pub use ledger_api::{
    accounts_api::AccountApi,
    auth_api::AuthApi,
    errors::LedgerApiError,
    ledger_objects,
    order_flow_api::OrderFlowApi,
    withdrawal_api::WithdrawalApi,
};

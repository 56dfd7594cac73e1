//! #  Database management and control.
//!
//! This module provides the interface contracts that ledger database *backends* must fulfil.
//!
//! ## Ledger
//! Every user has a running balance. The balance only moves in two places: an order that the accrual oracle marks as
//! `PROCESSED` credits its owner, and a withdrawal debits it. Both moves are single atomic units together with the
//! order status change or the withdrawal record.
//!
//! ## Traits
//! * [`LedgerDatabase`] defines the write paths: order submission, accrual application and withdrawals.
//! * [`AccountManagement`] provides read-only queries over users, orders and withdrawals.
//! * [`AuthManagement`] creates users and looks up their credentials.
mod account_management;
mod auth_management;
mod data_objects;
mod ledger_database;

pub use account_management::AccountManagement;
pub use auth_management::AuthManagement;
pub use data_objects::{AccrualOutcome, InsertOrderResult, InsertUserResult, OrderQueryFilter, WithdrawalOutcome};
pub use ledger_database::LedgerDatabase;

//! # Loyalty ledger public API
//!
//! The `ledger_api` module exposes the programmatic API of the ledger. The API is modular, so clients can pick the
//! parts they need.
//!
//! * [`order_flow_api`] admits new order numbers, persists them and hands them to the reconciliation queue.
//! * [`accounts_api`] answers balance and history queries.
//! * [`withdrawal_api`] spends points.
//! * [`auth_api`] registers users and checks their passwords.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs:
//!
//! ```rust,ignore
//! use loyalty_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements AccountManagement
//! let api = AccountApi::new(db);
//! let balance = api.balance(user_id).await?;
//! ```
pub mod accounts_api;
pub mod auth_api;
pub mod errors;
pub mod ledger_objects;
pub mod order_flow_api;
pub mod withdrawal_api;

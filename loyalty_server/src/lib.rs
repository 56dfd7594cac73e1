//! # Loyalty points server
//! This crate hosts the HTTP front end of the loyalty ledger. It is responsible for:
//! * Registering users and issuing signed session cookies.
//! * Accepting order numbers and handing them to the reconciliation worker.
//! * Serving balances, order and withdrawal histories, and taking withdrawals.
//!
//! ## Configuration
//! The server is configured via environment variables and a few command-line flags. See
//! [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/user/register`, `/api/user/login`: account creation and login.
//! * `/api/user/orders`: submit an order number (POST) or list your orders (GET).
//! * `/api/user/balance`, `/api/user/balance/withdraw`, `/api/user/balance/withdrawals`.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;

//! Helpers for tests that need a real database and a controllable accrual oracle.
pub mod fixtures;
pub mod oracle;
pub mod prepare_env;

pub use fixtures::{create_test_user, credit_user, fast_worker_config};
pub use oracle::ScriptedOracle;
pub use prepare_env::{eventually, prepare_test_env, random_db_path, teardown};

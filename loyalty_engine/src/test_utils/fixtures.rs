use std::time::Duration;

use loyalty_common::{OrderNumber, Points};

use crate::{
    accrual::{RetryPolicy, WorkerConfig},
    db_types::{AccrualDecision, NewOrder, NewUser, UserAccount},
    AccrualOutcome,
    AuthManagement,
    InsertUserResult,
    LedgerDatabase,
    SqliteDatabase,
};

/// Creates a user directly in the store, skipping password hashing.
pub async fn create_test_user(db: &SqliteDatabase, login: &str) -> UserAccount {
    let user = NewUser { login: login.to_string(), password_hash: "$argon2id$not-a-real-hash".to_string() };
    match db.create_user(user).await.expect("Error creating user") {
        InsertUserResult::Inserted(account) => account,
        InsertUserResult::AlreadyExists => panic!("User {login} already exists"),
    }
}

/// Stores `number` for the user and marks it `PROCESSED` with the given accrual, crediting the balance.
pub async fn credit_user(db: &SqliteDatabase, user_id: i64, number: &str, accrual: Points) {
    let number = number.parse::<OrderNumber>().expect("Invalid order number");
    db.insert_order(NewOrder::new(number.clone(), user_id)).await.expect("Error inserting order");
    let outcome = db.apply_accrual(&AccrualDecision::processed(number, accrual)).await.expect("Error applying accrual");
    assert!(matches!(outcome, AccrualOutcome::Applied(_)), "Expected accrual to apply, got {outcome:?}");
}

/// Worker settings with millisecond delays, so that retry tests finish quickly.
pub fn fast_worker_config(max_attempts: usize) -> WorkerConfig {
    WorkerConfig {
        queue_capacity: 100,
        retry: RetryPolicy {
            min_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_attempts,
            poll_interval: Duration::from_millis(5),
        },
    }
}

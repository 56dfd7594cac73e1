use std::fmt::Debug;

use log::*;
use loyalty_common::OrderNumber;
use sqlx::{migrate, SqlitePool};

use super::{new_pool, orders, users, withdrawals, SqliteDatabaseError};
use crate::{
    db::traits::{
        AccountManagement,
        AccrualOutcome,
        AuthManagement,
        InsertOrderResult,
        InsertUserResult,
        LedgerDatabase,
        OrderQueryFilter,
        WithdrawalOutcome,
    },
    db_types::{AccrualDecision, NewOrder, NewUser, NewWithdrawal, Order, OrderStatusType, UserAccount, Withdrawal},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl LedgerDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn apply_accrual(&self, decision: &AccrualDecision) -> Result<AccrualOutcome, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::transition_order(decision, &mut tx).await? {
            Some(order) => order,
            None => {
                // Nothing was written, so dropping the transaction rolls back a no-op.
                let outcome = match orders::fetch_order_by_number(&decision.number, &mut tx).await? {
                    None => AccrualOutcome::OrderNotFound,
                    Some(order) if order.status.is_terminal() => AccrualOutcome::AlreadyTerminal(order),
                    Some(order) => AccrualOutcome::Unchanged(order),
                };
                return Ok(outcome);
            },
        };
        if order.status == OrderStatusType::Processed {
            let amount = order.accrual.unwrap_or_default();
            users::credit_balance(order.user_id, amount, &mut tx).await?;
            debug!("🗃️ Order {} processed. {amount} credited to user #{}", order.number, order.user_id);
        }
        tx.commit().await?;
        Ok(AccrualOutcome::Applied(order))
    }

    async fn withdraw(&self, withdrawal: NewWithdrawal) -> Result<WithdrawalOutcome, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let user_id = withdrawal.user_id;
        if !users::debit_balance(user_id, withdrawal.sum, &mut tx).await? {
            let outcome = match users::fetch_user_by_id(user_id, &mut tx).await? {
                None => WithdrawalOutcome::AccountNotFound,
                Some(account) => WithdrawalOutcome::InsufficientBalance { available: account.balance },
            };
            debug!("🗃️ Withdrawal of {} for user #{user_id} rejected: {outcome:?}", withdrawal.sum);
            return Ok(outcome);
        }
        let record = withdrawals::insert_withdrawal(withdrawal, &mut tx).await?;
        tx.commit().await?;
        Ok(WithdrawalOutcome::Completed(record))
    }

    async fn fetch_pending_orders(&self) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders(OrderQueryFilter::pending(), &mut conn).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl AccountManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_id(user_id, &mut conn).await
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_number(number, &mut conn).await
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, Self::Error> {
        self.search_orders(OrderQueryFilter::default().with_user_id(user_id)).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders(query, &mut conn).await
    }

    async fn fetch_withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        withdrawals::fetch_withdrawals_for_user(user_id, &mut conn).await
    }
}

impl AuthManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn create_user(&self, user: NewUser) -> Result<InsertUserResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(user, &mut conn).await
    }

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<UserAccount>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_login(login, &mut conn).await
    }
}

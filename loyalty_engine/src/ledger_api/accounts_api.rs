//! Unifies API for accessing accounts.

use std::fmt::Debug;

use log::trace;

use crate::{
    db::traits::AccountManagement,
    db_types::{Order, UserAccount, Withdrawal},
    ledger_api::{
        errors::LedgerApiError,
        ledger_objects::{Balance, History},
    },
};

/// The `AccountApi` answers read-only questions about a user's ledger.
pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches the user account for the given id. If no account exists, `None` is returned.
    pub async fn account_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, LedgerApiError> {
        self.db.fetch_user_account(user_id).await.map_err(LedgerApiError::storage)
    }

    pub async fn balance(&self, user_id: i64) -> Result<Balance, LedgerApiError> {
        let account = self
            .account_by_id(user_id)
            .await?
            .ok_or_else(|| LedgerApiError::NotFound(format!("User #{user_id}")))?;
        Ok(Balance::from(&account))
    }

    /// The user's orders, oldest first.
    pub async fn orders(&self, user_id: i64) -> Result<History<Order>, LedgerApiError> {
        let orders = self.db.fetch_orders_for_user(user_id).await.map_err(LedgerApiError::storage)?;
        trace!("💻️ User #{user_id} has {} orders", orders.len());
        Ok(History::from(orders))
    }

    /// The user's withdrawals, oldest first.
    pub async fn withdrawals(&self, user_id: i64) -> Result<History<Withdrawal>, LedgerApiError> {
        let withdrawals = self.db.fetch_withdrawals_for_user(user_id).await.map_err(LedgerApiError::storage)?;
        trace!("💻️ User #{user_id} has {} withdrawals", withdrawals.len());
        Ok(History::from(withdrawals))
    }
}

use loyalty_common::OrderNumber;

use crate::{
    db::traits::OrderQueryFilter,
    db_types::{Order, UserAccount, Withdrawal},
};

/// The `AccountManagement` trait provides read-only queries over user accounts, their orders and their withdrawals.
///
/// Lists are always returned oldest first.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    type Error: std::error::Error;

    /// Fetches the user account with the given id. If no account exists, `None` is returned.
    async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, Self::Error>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, Self::Error>;

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, Self::Error>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, Self::Error>;

    async fn fetch_withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, Self::Error>;
}

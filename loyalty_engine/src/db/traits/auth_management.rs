use crate::{
    db::traits::InsertUserResult,
    db_types::{NewUser, UserAccount},
};

/// Storage for user credentials. Password hashing happens before anything reaches this trait.
#[allow(async_fn_in_trait)]
pub trait AuthManagement {
    type Error: std::error::Error;

    /// Creates a user with a zero balance. If the login is taken, [`InsertUserResult::AlreadyExists`] is returned and
    /// nothing is written.
    async fn create_user(&self, user: NewUser) -> Result<InsertUserResult, Self::Error>;

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<UserAccount>, Self::Error>;
}

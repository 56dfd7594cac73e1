use std::fmt::Debug;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2,
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
};
use log::*;

use crate::{
    db::traits::{AuthManagement, InsertUserResult},
    db_types::{NewUser, UserAccount},
    ledger_api::errors::LedgerApiError,
};

/// Registers users and checks their credentials. Passwords are stored as Argon2id PHC strings.
pub struct AuthApi<B> {
    db: B,
}

impl<B> Debug for AuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi")
    }
}

impl<B> AuthApi<B>
where B: AuthManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn register(&self, login: &str, password: &str) -> Result<UserAccount, LedgerApiError> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(LedgerApiError::InvalidInput("login and password must not be empty".into()));
        }
        let password_hash = hash_password(password)?;
        let user = NewUser { login: login.to_string(), password_hash };
        match self.db.create_user(user).await.map_err(LedgerApiError::storage)? {
            InsertUserResult::Inserted(account) => {
                info!("🔑️ Registered user #{} ({})", account.id, account.login);
                Ok(account)
            },
            InsertUserResult::AlreadyExists => Err(LedgerApiError::LoginTaken(login.to_string())),
        }
    }

    /// Returns the account if the password matches. An unknown login and a wrong password are indistinguishable to
    /// the caller.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<UserAccount, LedgerApiError> {
        let account = self
            .db
            .fetch_user_by_login(login.trim())
            .await
            .map_err(LedgerApiError::storage)?
            .ok_or(LedgerApiError::InvalidCredentials)?;
        if verify_password(password, &account.password_hash) {
            debug!("🔑️ User #{} logged in", account.id);
            Ok(account)
        } else {
            debug!("🔑️ Failed login attempt for '{}'", account.login);
            Err(LedgerApiError::InvalidCredentials)
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, LedgerApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| LedgerApiError::StorageFailure(format!("could not hash password: {e}")))
}

pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!("🔑️ Stored password hash is not a valid PHC string: {e}");
            false
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let phc = hash_password("hunter2").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &phc));
        assert!(!verify_password("hunter3", &phc));
        assert!(!verify_password("hunter2", "not a hash"));
    }
}

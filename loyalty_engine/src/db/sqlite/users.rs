use chrono::Utc;
use log::{debug, trace};
use loyalty_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertUserResult},
    db_types::{NewUser, UserAccount},
};

const USER_COLUMNS: &str = "id, login, password_hash, balance, withdrawn, created_at";

/// Inserts a new user with a zero balance. A taken login is reported as [`InsertUserResult::AlreadyExists`] rather
/// than as an error.
pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<InsertUserResult, SqliteDatabaseError> {
    let sql = format!(
        "INSERT INTO users (login, password_hash, created_at) VALUES ($1, $2, $3) ON CONFLICT(login) DO NOTHING \
         RETURNING {USER_COLUMNS}"
    );
    let account = sqlx::query_as::<_, UserAccount>(&sql)
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(Utc::now())
        .fetch_optional(conn)
        .await?;
    let result = match account {
        Some(account) => {
            debug!("🗃️ Created user account #{} for '{}'", account.id, account.login);
            InsertUserResult::Inserted(account)
        },
        None => {
            debug!("🗃️ Login '{}' is already taken", user.login);
            InsertUserResult::AlreadyExists
        },
    };
    Ok(result)
}

pub async fn fetch_user_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<UserAccount>, SqliteDatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let account = sqlx::query_as::<_, UserAccount>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn fetch_user_by_login(
    login: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, SqliteDatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE login = $1");
    let account = sqlx::query_as::<_, UserAccount>(&sql).bind(login).fetch_optional(conn).await?;
    Ok(account)
}

/// Adds `amount` to the user's balance. This is not atomic on its own; run it inside the transaction that justifies
/// the credit.
pub async fn credit_balance(user_id: i64, amount: Points, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let rows = sqlx::query("UPDATE users SET balance = balance + $1 WHERE id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(conn)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(SqliteDatabaseError::AccountNotFound(user_id));
    }
    trace!("🗃️ Credited {amount} to user #{user_id}");
    Ok(())
}

/// Compare-and-set debit: subtracts `amount` from the balance and adds it to `withdrawn`, but only if the balance
/// covers it. Returns `false` (and changes nothing) if the balance is too small or the user does not exist.
pub async fn debit_balance(user_id: i64, amount: Points, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let rows = sqlx::query(
        "UPDATE users SET balance = balance - $1, withdrawn = withdrawn + $1 WHERE id = $2 AND balance >= $1",
    )
    .bind(amount)
    .bind(user_id)
    .execute(conn)
    .await?
    .rows_affected();
    trace!("🗃️ Debit of {amount} from user #{user_id} matched {rows} rows");
    Ok(rows == 1)
}

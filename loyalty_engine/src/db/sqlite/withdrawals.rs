use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewWithdrawal, Withdrawal},
};

const WITHDRAWAL_COLUMNS: &str = "id, order_number, user_id, sum, created_at";

/// Records a withdrawal. This does not touch the balance: call it in the same transaction as
/// [`super::users::debit_balance`], and only if the debit succeeded.
pub async fn insert_withdrawal(
    withdrawal: NewWithdrawal,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, SqliteDatabaseError> {
    let sql = format!(
        "INSERT INTO withdrawals (order_number, user_id, sum, created_at) VALUES ($1, $2, $3, $4) RETURNING \
         {WITHDRAWAL_COLUMNS}"
    );
    let record = sqlx::query_as::<_, Withdrawal>(&sql)
        .bind(&withdrawal.order_number)
        .bind(withdrawal.user_id)
        .bind(withdrawal.sum)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;
    debug!("🗃️ Withdrawal #{} of {} recorded for user #{}", record.id, record.sum, record.user_id);
    Ok(record)
}

/// All withdrawals for the user, oldest first.
pub async fn fetch_withdrawals_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Withdrawal>, SqliteDatabaseError> {
    let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE user_id = $1 ORDER BY created_at ASC, id ASC");
    let withdrawals = sqlx::query_as::<_, Withdrawal>(&sql).bind(user_id).fetch_all(conn).await?;
    Ok(withdrawals)
}

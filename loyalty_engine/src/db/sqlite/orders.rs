use chrono::Utc;
use log::{debug, trace};
use loyalty_common::OrderNumber;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db::{
        sqlite::SqliteDatabaseError,
        traits::{InsertOrderResult, OrderQueryFilter},
    },
    db_types::{AccrualDecision, NewOrder, Order, OrderStatusType},
};

const ORDER_COLUMNS: &str = "id, number, user_id, status, accrual, created_at, updated_at";

/// Inserts the order with status `NEW` if the number is unknown, otherwise returns the stored order. The insert is a
/// single statement, so concurrent submissions of the same number cannot both create a row. Embed this call inside a
/// transaction and pass `&mut tx` as the connection so that the follow-up lookup sees a consistent view.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO orders (number, user_id, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $4) ON \
         CONFLICT(number) DO NOTHING RETURNING {ORDER_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Order>(&sql)
        .bind(&order.number)
        .bind(order.user_id)
        .bind(OrderStatusType::New)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(order) = inserted {
        debug!("🗃️ Order {} inserted for user #{}", order.number, order.user_id);
        return Ok(InsertOrderResult::Inserted(order));
    }
    let existing = fetch_order_by_number(&order.number, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::OrderNotFound(order.number.clone()))?;
    trace!("🗃️ Order {} already exists (owner #{})", existing.number, existing.user_id);
    Ok(InsertOrderResult::AlreadyExists(existing))
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(number).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        let mut statuses = where_clause;
        for (i, status) in query.statuses.into_iter().enumerate() {
            if i > 0 {
                statuses.push_unseparated(", ");
            }
            statuses.push_bind_unseparated(status);
        }
        statuses.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {} rows", orders.len());
    Ok(orders)
}

/// Compare-and-set status transition. The row is only updated if its current status is one of the decided status'
/// allowed predecessors, so terminal orders are never touched twice. Returns the updated order, or `None` if no row
/// matched (unknown number, terminal order or a backwards move).
///
/// The accrual is stored only for `PROCESSED` decisions. This does not credit the owner; see
/// [`super::users::credit_balance`].
pub async fn transition_order(
    decision: &AccrualDecision,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let predecessors = decision.status.allowed_predecessors();
    if predecessors.is_empty() {
        trace!("🗃️ Nothing moves an order to {}. Order {} is left alone", decision.status, decision.number);
        return Ok(None);
    }
    let accrual = match decision.status {
        OrderStatusType::Processed => decision.accrual,
        _ => None,
    };
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(decision.status);
    builder.push(", accrual = ");
    builder.push_bind(accrual);
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(" WHERE number = ");
    builder.push_bind(&decision.number);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in predecessors {
        statuses.push_bind(*status);
    }
    builder.push(format!(") RETURNING {ORDER_COLUMNS}"));
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    match &order {
        Some(o) => debug!("🗃️ Order {} is now {}", o.number, o.status),
        None => trace!("🗃️ No transition to {} for order {}", decision.status, decision.number),
    }
    Ok(order)
}

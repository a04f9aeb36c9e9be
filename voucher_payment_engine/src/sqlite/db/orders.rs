use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};
use vpg_common::Cedi;

use crate::{
    db_types::{NewOrder, Order, OrderReference, OrderStatusType, VoucherType},
    order_objects::OrderQueryFilter,
    traits::AllocationError,
};

/// Inserts the order into the ledger in the `initiated` state, returning `false` in the second parameter if a row
/// for the reference already exists. The existing row is returned untouched in that case: the ledger is the single
/// trusted source of order details, and a second insert never overwrites it.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), AllocationError> {
    let reference = order.reference.clone();
    let result = sqlx::query(
        r#"
            INSERT INTO orders (
                reference,
                phone,
                customer_name,
                voucher_type,
                quantity,
                amount,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, 'initiated')
            ON CONFLICT (reference) DO NOTHING
        "#,
    )
    .bind(order.reference)
    .bind(order.phone)
    .bind(order.customer_name)
    .bind(order.voucher_type)
    .bind(order.quantity)
    .bind(order.amount)
    .execute(&mut *conn)
    .await?;
    let inserted = result.rows_affected() > 0;
    let order = fetch_order_by_reference(&reference, conn)
        .await?
        .ok_or_else(|| AllocationError::OrderNotFound(reference))?;
    if inserted {
        debug!("📝️ Order [{}] inserted with id {}", order.reference, order.id);
    }
    Ok((order, inserted))
}

pub async fn fetch_order_by_reference(
    reference: &OrderReference,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE reference = $1")
        .bind(reference.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Transitions the order to `success`, guarded so that only `initiated` or `backlogged` orders qualify. Returns
/// `None` when the guard fails, i.e. another channel has already resolved the order. The caller decides whether
/// that is the duplicate-fulfilment case (`success`) or the terminal-failure case.
pub async fn try_mark_success(
    reference: &OrderReference,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, AllocationError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders
        SET status = 'success', updated_at = CURRENT_TIMESTAMP, resolved_at = CURRENT_TIMESTAMP
        WHERE reference = $1 AND status IN ('initiated', 'backlogged')
        RETURNING *
        "#,
    )
    .bind(reference.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Moves the order into the backlog. A no-op for orders already backlogged; the second return value is true only
/// on the transition, so that backlog notifications fire exactly once per order.
pub async fn mark_backlogged(
    reference: &OrderReference,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), AllocationError> {
    let existing = fetch_order_by_reference(reference, conn)
        .await?
        .ok_or_else(|| AllocationError::OrderNotFound(reference.clone()))?;
    if existing.status == OrderStatusType::Backlogged {
        return Ok((existing, false));
    }
    let result: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders
        SET status = 'backlogged', updated_at = CURRENT_TIMESTAMP
        WHERE reference = $1 AND status = 'initiated'
        RETURNING *
        "#,
    )
    .bind(reference.as_str())
    .fetch_optional(conn)
    .await?;
    match result {
        Some(order) => Ok((order, true)),
        None => Err(AllocationError::OrderStatusUpdateError(format!(
            "Order {reference} cannot move to the backlog from status {}",
            existing.status
        ))),
    }
}

/// Marks an `initiated` order as `failed` (payment declined). Terminal states and `backlogged` orders never fail.
pub async fn mark_failed(reference: &OrderReference, conn: &mut SqliteConnection) -> Result<Order, AllocationError> {
    let existing = fetch_order_by_reference(reference, conn)
        .await?
        .ok_or_else(|| AllocationError::OrderNotFound(reference.clone()))?;
    let result: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders
        SET status = 'failed', updated_at = CURRENT_TIMESTAMP, resolved_at = CURRENT_TIMESTAMP
        WHERE reference = $1 AND status = 'initiated'
        RETURNING *
        "#,
    )
    .bind(reference.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| {
        AllocationError::OrderStatusUpdateError(format!(
            "Order {reference} cannot fail from status {}",
            existing.status
        ))
    })
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(reference) = query.reference {
        where_clause.push("reference = ");
        where_clause.push_bind_unseparated(reference.as_str().to_string());
    }
    if let Some(phone) = query.phone {
        where_clause.push("phone = ");
        where_clause.push_bind_unseparated(phone);
    }
    if let Some(voucher_type) = query.voucher_type {
        where_clause.push("voucher_type = ");
        where_clause.push_bind_unseparated(voucher_type.as_str());
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
    }

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// The drain queue: backlogged orders for the type, strictly oldest-first.
pub async fn fetch_backlog(
    voucher_type: VoucherType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        "SELECT * FROM orders WHERE status = 'backlogged' AND voucher_type = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(voucher_type)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn count_backlog(voucher_type: VoucherType, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = 'backlogged' AND voucher_type = $1")
            .bind(voucher_type)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

pub async fn total_revenue(conn: &mut SqliteConnection) -> Result<Cedi, sqlx::Error> {
    let (total,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM orders WHERE status = 'success'").fetch_one(conn).await?;
    Ok(Cedi::from(total))
}

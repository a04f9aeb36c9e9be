use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewVoucher, OrderReference, Voucher, VoucherHandout, VoucherStatus, VoucherType},
    order_objects::VoucherQueryFilter,
    traits::{AllocationError, VoucherCounts},
};

/// The atomic claim at the heart of the allocation engine.
///
/// A single statement selects the `quantity` oldest available vouchers of the type and binds them to the order
/// reference, returning the serial/PIN pairs ascending by internal id. The `status = 'available'` guard inside the
/// subselect means a voucher can only be claimed once no matter how many transactions race; losers simply see fewer
/// rows come back. On Postgres the subselect would carry `FOR UPDATE SKIP LOCKED`; SQLite serializes the write
/// instead, and the single short statement keeps the contention window to one storage round-trip.
///
/// Callers MUST run this inside a transaction and roll back when fewer than `quantity` rows are returned: a partial
/// claim must never commit.
pub async fn claim_available(
    voucher_type: VoucherType,
    quantity: i64,
    reference: &OrderReference,
    phone: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<VoucherHandout>, AllocationError> {
    let claimed: Vec<VoucherHandout> = sqlx::query_as(
        r#"
        UPDATE vouchers
        SET status = 'sold', sold_to = $1, order_ref = $2, sold_at = CURRENT_TIMESTAMP
        WHERE id IN (
            SELECT id FROM vouchers
            WHERE voucher_type = $3 AND status = 'available'
            ORDER BY id ASC
            LIMIT $4
        )
        RETURNING serial, pin
        "#,
    )
    .bind(phone)
    .bind(reference.as_str())
    .bind(voucher_type)
    .bind(quantity)
    .fetch_all(conn)
    .await?;
    trace!("🎫️ Claimed {}/{quantity} {voucher_type} voucher(s) for {reference}", claimed.len());
    Ok(claimed)
}

/// The vouchers previously bound to the given reference, in the same stable order the claim produced them.
pub async fn fetch_for_order(
    reference: &OrderReference,
    conn: &mut SqliteConnection,
) -> Result<Vec<VoucherHandout>, sqlx::Error> {
    let vouchers = sqlx::query_as("SELECT serial, pin FROM vouchers WHERE order_ref = $1 ORDER BY id ASC")
        .bind(reference.as_str())
        .fetch_all(conn)
        .await?;
    Ok(vouchers)
}

/// Inserts one voucher from a stock upload. Returns false if the serial already exists (skipped, not an error).
pub async fn idempotent_insert(voucher: &NewVoucher, conn: &mut SqliteConnection) -> Result<bool, AllocationError> {
    let result = sqlx::query(
        r#"
        INSERT INTO vouchers (voucher_type, serial, pin, status)
        VALUES ($1, $2, $3, 'available')
        ON CONFLICT (serial) DO NOTHING
        "#,
    )
    .bind(voucher.voucher_type)
    .bind(voucher.serial.as_str())
    .bind(voucher.pin.as_str())
    .execute(conn)
    .await?;
    let inserted = result.rows_affected() > 0;
    if !inserted {
        debug!("🎫️ Duplicate serial {} skipped during stock upload", voucher.serial);
    }
    Ok(inserted)
}

pub async fn count_available(voucher_type: VoucherType, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM vouchers WHERE voucher_type = $1 AND status = 'available'")
            .bind(voucher_type)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

/// Per-type status breakdown for the admin dashboard.
pub async fn counts_by_type(conn: &mut SqliteConnection) -> Result<Vec<VoucherCounts>, sqlx::Error> {
    let counts = sqlx::query_as(
        r#"
        SELECT
            voucher_type,
            COUNT(*) as total,
            COUNT(CASE WHEN status = 'available' THEN 1 END) as available,
            COUNT(CASE WHEN status = 'sold' THEN 1 END) as sold,
            COUNT(CASE WHEN status = 'used' THEN 1 END) as used
        FROM vouchers
        GROUP BY voucher_type
        ORDER BY voucher_type
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(counts)
}

pub async fn fetch_for_phone(phone: &str, limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Voucher>, sqlx::Error> {
    let vouchers = sqlx::query_as("SELECT * FROM vouchers WHERE sold_to = $1 ORDER BY sold_at DESC, id DESC LIMIT $2")
        .bind(phone)
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(vouchers)
}

/// The admin voucher listing. Most recent first, capped at 50 rows unless the filter says otherwise.
pub async fn search(filter: VoucherQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Voucher>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM vouchers
    "#,
    );
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(voucher_type) = filter.voucher_type {
        where_clause.push("voucher_type = ");
        where_clause.push_bind_unseparated(voucher_type.as_str());
    }
    if let Some(status) = filter.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(search) = filter.search {
        let pattern = format!("%{search}%");
        where_clause.push("(serial LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR pin LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR sold_to LIKE ");
        where_clause.push_bind_unseparated(pattern);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(filter.limit.unwrap_or(50));
    if let Some(offset) = filter.offset {
        builder.push(" OFFSET ");
        builder.push_bind(offset);
    }
    trace!("🎫️ Executing query: {}", builder.sql());
    let vouchers = builder.build_query_as::<Voucher>().fetch_all(conn).await?;
    Ok(vouchers)
}

/// Admin status override for one or more serials. Does not touch order state.
pub async fn set_status(
    serials: &[String],
    status: VoucherStatus,
    conn: &mut SqliteConnection,
) -> Result<usize, AllocationError> {
    let mut updated = 0usize;
    for serial in serials {
        let result = sqlx::query("UPDATE vouchers SET status = $1 WHERE serial = $2")
            .bind(status)
            .bind(serial.as_str())
            .execute(&mut *conn)
            .await?;
        updated += result.rows_affected() as usize;
    }
    Ok(updated)
}

pub async fn delete_by_serial(serial: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM vouchers WHERE serial = $1").bind(serial).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

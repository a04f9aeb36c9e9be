//! `SqliteDatabase` is a concrete implementation of a voucher payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;
use vpg_common::Cedi;

use super::db::{db_url, new_pool, orders, sessions, settings, vouchers};
use crate::{
    db_types::{
        NewOrder,
        NewVoucher,
        Order,
        OrderReference,
        OrderStatusType,
        UssdSession,
        Voucher,
        VoucherHandout,
        VoucherStatus,
        VoucherType,
    },
    order_objects::{OrderQueryFilter, VoucherQueryFilter},
    traits::{AllocationDatabase, AllocationError, AllocationOutcome, UploadSummary, VoucherCounts},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool using the database URL from the environment (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl AllocationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    /// The allocation engine's single atomic unit.
    ///
    /// Inside one transaction:
    /// 1. Ensure the ledger row exists (idempotent insert; the stored row wins over caller-supplied details).
    /// 2. Transition `initiated`/`backlogged` to `success` with a guarded update. A failed guard means another
    ///    channel already resolved the order; the previously bound vouchers are returned without touching stock.
    /// 3. Claim the vouchers. A full claim commits everything together; a short claim rolls the whole transaction
    ///    back and records the backlog entry in a fresh transaction instead.
    async fn allocate_vouchers(&self, order: NewOrder) -> Result<AllocationOutcome, AllocationError> {
        let mut tx = self.pool.begin().await?;
        let (ledger, _) = orders::idempotent_insert(order, &mut tx).await?;
        if ledger.status == OrderStatusType::Failed {
            tx.rollback().await?;
            return Err(AllocationError::OrderNotFulfillable(ledger.reference));
        }
        let won = orders::try_mark_success(&ledger.reference, &mut tx).await?;
        let Some(updated) = won else {
            // Lost the race (or this is a retry): the order is already fulfilled.
            let vouchers = vouchers::fetch_for_order(&ledger.reference, &mut tx).await?;
            tx.commit().await?;
            debug!("🎫️ Order {} already fulfilled. Returning {} bound voucher(s).", ledger.reference, vouchers.len());
            return Ok(AllocationOutcome::AlreadyFulfilled { order: ledger, vouchers });
        };
        let claimed = vouchers::claim_available(
            updated.voucher_type,
            updated.quantity,
            &updated.reference,
            &updated.phone,
            &mut tx,
        )
        .await?;
        if (claimed.len() as i64) < updated.quantity {
            // Insufficient stock. Release the partial claim in full, then record the backlog entry.
            trace!(
                "🎫️ Only {}/{} {} voucher(s) claimable for {}. Rolling back.",
                claimed.len(),
                updated.quantity,
                updated.voucher_type,
                updated.reference
            );
            tx.rollback().await?;
            let rebuilt = NewOrder::from(&updated);
            let mut tx = self.pool.begin().await?;
            // The rollback may have discarded a first-contact insert, so re-establish the row before moving it.
            let (current, _) = orders::idempotent_insert(rebuilt, &mut tx).await?;
            if current.status == OrderStatusType::Success {
                // Another channel fulfilled the order between the rollback and this transaction.
                let vouchers = vouchers::fetch_for_order(&current.reference, &mut tx).await?;
                tx.commit().await?;
                debug!(
                    "🎫️ Order {} was fulfilled elsewhere during the restock check. Returning {} bound voucher(s).",
                    current.reference,
                    vouchers.len()
                );
                return Ok(AllocationOutcome::AlreadyFulfilled { order: current, vouchers });
            }
            let (order, newly_backlogged) = orders::mark_backlogged(&updated.reference, &mut tx).await?;
            tx.commit().await?;
            info!("🎫️ Order {} is backlogged (new entry: {newly_backlogged})", order.reference);
            return Ok(AllocationOutcome::Backlogged { order, newly_backlogged });
        }
        tx.commit().await?;
        debug!(
            "🎫️ Order {} fulfilled with {} {} voucher(s)",
            updated.reference,
            claimed.len(),
            updated.voucher_type
        );
        Ok(AllocationOutcome::Fulfilled { order: updated, vouchers: claimed })
    }

    async fn fetch_vouchers_for_order(
        &self,
        reference: &OrderReference,
    ) -> Result<Vec<VoucherHandout>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let vouchers = vouchers::fetch_for_order(reference, &mut conn).await?;
        Ok(vouchers)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), AllocationError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order(&self, reference: &OrderReference) -> Result<Option<Order>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_reference(reference, &mut conn).await?;
        Ok(order)
    }

    async fn mark_order_failed(&self, reference: &OrderReference) -> Result<Order, AllocationError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::mark_failed(reference, &mut tx).await?;
        tx.commit().await?;
        info!("📝️ Order {} marked as failed (payment declined)", order.reference);
        Ok(order)
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(filter, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_backlog(&self, voucher_type: VoucherType) -> Result<Vec<Order>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let backlog = orders::fetch_backlog(voucher_type, &mut conn).await?;
        Ok(backlog)
    }

    async fn count_backlog(&self, voucher_type: VoucherType) -> Result<usize, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let count = orders::count_backlog(voucher_type, &mut conn).await?;
        Ok(count as usize)
    }

    async fn total_revenue(&self) -> Result<Cedi, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let total = orders::total_revenue(&mut conn).await?;
        Ok(total)
    }

    async fn upload_vouchers(&self, batch: &[NewVoucher]) -> Result<UploadSummary, AllocationError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = UploadSummary::default();
        for voucher in batch {
            if vouchers::idempotent_insert(voucher, &mut tx).await? {
                summary.inserted += 1;
            } else {
                summary.skipped += 1;
            }
        }
        tx.commit().await?;
        info!("🎫️ Stock upload complete: {} inserted, {} duplicate(s) skipped", summary.inserted, summary.skipped);
        Ok(summary)
    }

    async fn count_available(&self, voucher_type: VoucherType) -> Result<i64, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let count = vouchers::count_available(voucher_type, &mut conn).await?;
        Ok(count)
    }

    async fn voucher_counts(&self) -> Result<Vec<VoucherCounts>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let counts = vouchers::counts_by_type(&mut conn).await?;
        Ok(counts)
    }

    async fn fetch_vouchers_for_phone(&self, phone: &str, limit: i64) -> Result<Vec<Voucher>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let vouchers = vouchers::fetch_for_phone(phone, limit, &mut conn).await?;
        Ok(vouchers)
    }

    async fn search_vouchers(&self, filter: VoucherQueryFilter) -> Result<Vec<Voucher>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let vouchers = vouchers::search(filter, &mut conn).await?;
        Ok(vouchers)
    }

    async fn set_voucher_status(&self, serials: &[String], status: VoucherStatus) -> Result<usize, AllocationError> {
        let mut tx = self.pool.begin().await?;
        let updated = vouchers::set_status(serials, status, &mut tx).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_voucher(&self, serial: &str) -> Result<bool, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = vouchers::delete_by_serial(serial, &mut conn).await?;
        Ok(deleted)
    }

    async fn fetch_session(&self, session_id: &str) -> Result<UssdSession, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let session = sessions::fetch_session(session_id, &mut conn).await?;
        Ok(session.unwrap_or_else(|| UssdSession::new(session_id)))
    }

    async fn save_session(&self, session: &UssdSession) -> Result<(), AllocationError> {
        let mut conn = self.pool.acquire().await?;
        sessions::upsert_session(session, &mut conn).await?;
        Ok(())
    }

    async fn clear_session(&self, session_id: &str) -> Result<(), AllocationError> {
        let mut conn = self.pool.acquire().await?;
        sessions::delete_session(session_id, &mut conn).await?;
        Ok(())
    }

    async fn fetch_setting(&self, key: &str) -> Result<Option<String>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let value = settings::fetch_setting(key, &mut conn).await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), AllocationError> {
        let mut conn = self.pool.acquire().await?;
        settings::upsert_setting(key, value, &mut conn).await?;
        Ok(())
    }

    async fn fetch_all_settings(&self) -> Result<Vec<(String, String)>, AllocationError> {
        let mut conn = self.pool.acquire().await?;
        let all = settings::fetch_all(&mut conn).await?;
        Ok(all)
    }

    async fn close(&mut self) -> Result<(), AllocationError> {
        self.pool.close().await;
        Ok(())
    }
}

use thiserror::Error;
use vpg_common::Cedi;

use crate::{
    db_types::{NewOrder, NewVoucher, Order, OrderReference, UssdSession, Voucher, VoucherHandout, VoucherStatus, VoucherType},
    order_objects::{OrderQueryFilter, VoucherQueryFilter},
    traits::{AllocationOutcome, UploadSummary, VoucherCounts},
};

/// This trait defines the storage behaviour needed by the voucher payment engine.
///
/// This behaviour includes:
/// * The atomic voucher claim at the heart of the allocation engine.
/// * Order ledger writes, with the state machine enforced by guarded updates.
/// * Inventory management: stock upload, counts, admin status overrides.
/// * Durable USSD session state and operator settings.
#[allow(async_fn_in_trait)]
pub trait AllocationDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    //------------------------------------- Allocation engine -------------------------------------

    /// Attempt to fulfil the purchase identified by `order.reference` in a single atomic transaction.
    ///
    /// If a ledger row already exists for the reference, its stored details are authoritative and the fields of
    /// `order` are ignored. Otherwise the row is created from `order` first, so that the attempt is recorded even
    /// when stock is insufficient.
    ///
    /// Either all voucher mutations and the order status transition commit together, or none do. Stock
    /// insufficiency rolls back any partial claim and lands the order in the backlog instead.
    async fn allocate_vouchers(&self, order: NewOrder) -> Result<AllocationOutcome, AllocationError>;

    /// Fetch the vouchers previously bound to the given reference, ascending by internal id.
    async fn fetch_vouchers_for_order(&self, reference: &OrderReference) -> Result<Vec<VoucherHandout>, AllocationError>;

    //------------------------------------- Order ledger -------------------------------------

    /// Record a new purchase attempt in the `initiated` state. Idempotent: returns the existing row and `false`
    /// if the reference has been seen before.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), AllocationError>;

    /// Fetch the ledger row for the given reference.
    async fn fetch_order(&self, reference: &OrderReference) -> Result<Option<Order>, AllocationError>;

    /// Transition an order from `initiated` to `failed` (payment declined). Any other current status is an error:
    /// `success` and `failed` are terminal, and a `backlogged` order has confirmed payment and may never fail.
    async fn mark_order_failed(&self, reference: &OrderReference) -> Result<Order, AllocationError>;

    /// Fetch orders matching the filter, ordered oldest-first by creation time.
    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, AllocationError>;

    /// All `backlogged` orders for the given type, oldest-first. This is the drain queue.
    async fn fetch_backlog(&self, voucher_type: VoucherType) -> Result<Vec<Order>, AllocationError>;

    /// Number of `backlogged` orders for the given type.
    async fn count_backlog(&self, voucher_type: VoucherType) -> Result<usize, AllocationError>;

    /// Total revenue over fulfilled orders.
    async fn total_revenue(&self) -> Result<Cedi, AllocationError>;

    //------------------------------------- Inventory -------------------------------------

    /// Bulk-insert a stock upload batch. Duplicate serials are skipped and counted, not errors.
    async fn upload_vouchers(&self, batch: &[NewVoucher]) -> Result<UploadSummary, AllocationError>;

    /// Number of `available` vouchers of the given type.
    async fn count_available(&self, voucher_type: VoucherType) -> Result<i64, AllocationError>;

    /// Per-type status breakdown for the admin dashboard.
    async fn voucher_counts(&self) -> Result<Vec<VoucherCounts>, AllocationError>;

    /// Fetch vouchers sold to the given phone, most recent first, capped at `limit`.
    async fn fetch_vouchers_for_phone(&self, phone: &str, limit: i64) -> Result<Vec<Voucher>, AllocationError>;

    /// Fetch vouchers matching the filter, most recent first. Backs the admin voucher listing.
    async fn search_vouchers(&self, filter: VoucherQueryFilter) -> Result<Vec<Voucher>, AllocationError>;

    /// Admin override of a voucher's status (e.g. marking a sold voucher `used`). Does not touch order state.
    async fn set_voucher_status(&self, serials: &[String], status: VoucherStatus) -> Result<usize, AllocationError>;

    /// Admin deletion of a voucher by serial.
    async fn delete_voucher(&self, serial: &str) -> Result<bool, AllocationError>;

    //------------------------------------- USSD sessions -------------------------------------

    /// Fetch the session for the given id, or a fresh menu-stage session if none exists.
    async fn fetch_session(&self, session_id: &str) -> Result<UssdSession, AllocationError>;

    /// Upsert the session state.
    async fn save_session(&self, session: &UssdSession) -> Result<(), AllocationError>;

    /// Delete the session. Called when a USSD interaction ends.
    async fn clear_session(&self, session_id: &str) -> Result<(), AllocationError>;

    //------------------------------------- Settings -------------------------------------

    /// Fetch a setting value by key.
    async fn fetch_setting(&self, key: &str) -> Result<Option<String>, AllocationError>;

    /// Upsert a setting.
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), AllocationError>;

    /// Fetch all settings as key/value pairs.
    async fn fetch_all_settings(&self) -> Result<Vec<(String, String)>, AllocationError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), AllocationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AllocationError {
    /// The caller's fault. Not retried.
    #[error("Invalid allocation request: {0}")]
    Validation(String),
    /// Payment was confirmed but there is no ledger row and the caller could not supply complete order details.
    /// Callers must alert an operator rather than guess.
    #[error("Cannot resolve order details for {0}. A ledger row is missing and the supplied hints are incomplete.")]
    UnresolvableOrder(OrderReference),
    /// The order has terminally failed; fulfilment attempts against it are rejected.
    #[error("Order {0} is not fulfillable: payment was declined")]
    OrderNotFulfillable(OrderReference),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderReference),
    #[error("Illegal order status change. {0}")]
    OrderStatusUpdateError(String),
    /// Transient. The attempted transaction rolled back fully; callers may retry safely.
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AllocationError {
    fn from(e: sqlx::Error) -> Self {
        AllocationError::DatabaseError(e.to_string())
    }
}

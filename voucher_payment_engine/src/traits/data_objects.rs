use serde::Serialize;

use crate::db_types::{Order, VoucherHandout, VoucherType};

/// The result of a single allocation attempt. Stock insufficiency is a first-class outcome here, never an error.
#[derive(Debug, Clone)]
pub enum AllocationOutcome {
    /// The order transitioned to `success` in this call and the vouchers were bound by it.
    Fulfilled { order: Order, vouchers: Vec<VoucherHandout> },
    /// Another channel already fulfilled this reference. The previously bound vouchers are returned unchanged and
    /// inventory was not touched.
    AlreadyFulfilled { order: Order, vouchers: Vec<VoucherHandout> },
    /// Stock was insufficient. `newly_backlogged` is true only on the transition into the backlog, so that buyer
    /// notifications fire exactly once.
    Backlogged { order: Order, newly_backlogged: bool },
}

impl AllocationOutcome {
    pub fn order(&self) -> &Order {
        match self {
            AllocationOutcome::Fulfilled { order, .. } => order,
            AllocationOutcome::AlreadyFulfilled { order, .. } => order,
            AllocationOutcome::Backlogged { order, .. } => order,
        }
    }

    pub fn vouchers(&self) -> &[VoucherHandout] {
        match self {
            AllocationOutcome::Fulfilled { vouchers, .. } => vouchers,
            AllocationOutcome::AlreadyFulfilled { vouchers, .. } => vouchers,
            AllocationOutcome::Backlogged { .. } => &[],
        }
    }
}

/// Summary of one backlog drain pass, reported to the operator after every stock upload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainSummary {
    pub fulfilled_count: usize,
    pub remaining_backlog: usize,
}

/// Summary of one stock upload batch. Duplicate serials are skipped, not errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadSummary {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockLevel {
    pub voucher_type: VoucherType,
    pub available: i64,
}

/// Per-type voucher counts for the admin dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VoucherCounts {
    pub voucher_type: VoucherType,
    pub total: i64,
    pub available: i64,
    pub sold: i64,
    pub used: i64,
}

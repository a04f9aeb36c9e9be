use std::fmt::Debug;

use vpg_common::Cedi;

use crate::{
    db_types::{NewOrder, Order, OrderReference, VoucherHandout},
    traits::{AllocationDatabase, AllocationError},
    vpe_api::order_objects::OrderQueryFilter,
};

/// Read and bookkeeping access to the order ledger.
pub struct OrderApi<B> {
    db: B,
}

impl<B> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi")
    }
}

impl<B> OrderApi<B>
where B: AllocationDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Record a purchase attempt before payment completes. Returns the ledger row and whether it was newly created.
    pub async fn record_initiated_order(&self, order: NewOrder) -> Result<(Order, bool), AllocationError> {
        self.db.insert_order(order).await
    }

    pub async fn fetch_order(&self, reference: &OrderReference) -> Result<Option<Order>, AllocationError> {
        self.db.fetch_order(reference).await
    }

    /// The vouchers bound to a fulfilled order, in the order they were claimed.
    pub async fn vouchers_for_order(&self, reference: &OrderReference) -> Result<Vec<VoucherHandout>, AllocationError> {
        self.db.fetch_vouchers_for_order(reference).await
    }

    pub async fn search(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, AllocationError> {
        self.db.search_orders(filter).await
    }

    pub async fn total_revenue(&self) -> Result<Cedi, AllocationError> {
        self.db.total_revenue().await
    }
}

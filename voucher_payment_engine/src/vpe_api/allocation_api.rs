use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderReference, VoucherHandout, VoucherType},
    events::{EventProducers, OrderBackloggedEvent, OrderFulfilledEvent, StockLowEvent},
    traits::{AllocationDatabase, AllocationError, AllocationOutcome, DrainSummary},
    vpe_api::settings_api::{self, DEFAULT_LOW_STOCK_THRESHOLD},
};

/// `AllocationApi` is the primary API of the engine. Every channel that learns of a confirmed payment, whether the
/// browser verify endpoint, the webhook, a USSD poll, or an admin action, funnels through [`Self::allocate`]. The
/// idempotent ledger plus the atomic claim underneath make it safe to call any number of times per order.
pub struct AllocationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for AllocationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllocationApi")
    }
}

impl<B> AllocationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> AllocationApi<B>
where B: AllocationDatabase
{
    /// Attempt to fulfil a paid order.
    ///
    /// The call is idempotent on `order.reference`. The first caller to reach the database wins the claim; every
    /// later caller gets [`AllocationOutcome::AlreadyFulfilled`] with the same vouchers and inventory untouched.
    /// Insufficient stock lands the order in the backlog rather than failing.
    ///
    /// Notification hooks fire only on state transitions that happened in this call, after the transaction has
    /// committed.
    pub async fn allocate(&self, order: NewOrder) -> Result<AllocationOutcome, AllocationError> {
        Self::validate(&order)?;
        let outcome = self.db.allocate_vouchers(order).await?;
        match &outcome {
            AllocationOutcome::Fulfilled { order, vouchers } => {
                self.call_order_fulfilled_hook(order, vouchers).await;
                self.check_stock_level(order.voucher_type).await;
            },
            AllocationOutcome::Backlogged { order, newly_backlogged: true } => {
                self.call_order_backlogged_hook(order).await;
            },
            _ => {},
        }
        Ok(outcome)
    }

    /// Fulfil an order that already exists in the ledger, using the stored details. Used by admins to resolve a
    /// backlogged order by hand, and by reconciliation paths that hold only a reference.
    pub async fn fulfil_order(&self, reference: &OrderReference) -> Result<AllocationOutcome, AllocationError> {
        let order = self
            .db
            .fetch_order(reference)
            .await?
            .ok_or_else(|| AllocationError::OrderNotFound(reference.clone()))?;
        self.allocate(NewOrder::from(&order)).await
    }

    /// Drain the backlog for one voucher type, oldest order first.
    ///
    /// Draining is strictly FIFO: the pass stops at the first order the current stock cannot cover in full, even if
    /// a smaller order behind it would fit. Called once after every stock upload; running it again is harmless.
    pub async fn drain_backlog(&self, voucher_type: VoucherType) -> Result<DrainSummary, AllocationError> {
        let queue = self.db.fetch_backlog(voucher_type).await?;
        debug!("🚰️ Draining backlog for {voucher_type}: {} order(s) queued", queue.len());
        let mut fulfilled_count = 0usize;
        for order in &queue {
            match self.db.allocate_vouchers(NewOrder::from(order)).await? {
                AllocationOutcome::Fulfilled { order, vouchers } => {
                    self.call_order_fulfilled_hook(&order, &vouchers).await;
                    fulfilled_count += 1;
                },
                AllocationOutcome::AlreadyFulfilled { order, .. } => {
                    // Another channel got there first. Not ours to count, but the queue position is free.
                    trace!("🚰️ Backlogged order {} was already fulfilled elsewhere", order.reference);
                },
                AllocationOutcome::Backlogged { order, .. } => {
                    debug!("🚰️ Stock exhausted at order {}. Stopping the drain pass.", order.reference);
                    break;
                },
            }
        }
        let remaining_backlog = self.db.count_backlog(voucher_type).await?;
        if fulfilled_count > 0 {
            self.check_stock_level(voucher_type).await;
        }
        info!("🚰️ Drain pass for {voucher_type} complete. {fulfilled_count} fulfilled, {remaining_backlog} remaining");
        Ok(DrainSummary { fulfilled_count, remaining_backlog })
    }

    /// Record that the provider declined payment for this order. Only `initiated` orders can fail.
    pub async fn mark_order_failed(&self, reference: &OrderReference) -> Result<Order, AllocationError> {
        self.db.mark_order_failed(reference).await
    }

    fn validate(order: &NewOrder) -> Result<(), AllocationError> {
        if order.reference.as_str().trim().is_empty() {
            return Err(AllocationError::Validation("An order reference is required".to_string()));
        }
        if order.quantity < 1 {
            return Err(AllocationError::Validation(format!(
                "Quantity must be at least 1, got {}",
                order.quantity
            )));
        }
        if order.phone.trim().is_empty() {
            return Err(AllocationError::Validation("Buyer phone number is required".to_string()));
        }
        Ok(())
    }

    async fn call_order_fulfilled_hook(&self, order: &Order, vouchers: &[VoucherHandout]) {
        for emitter in &self.producers.order_fulfilled_producer {
            debug!("🎫️📬️ Notifying order fulfilled hook subscribers for {}", order.reference);
            let event = OrderFulfilledEvent { order: order.clone(), vouchers: vouchers.to_vec() };
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_backlogged_hook(&self, order: &Order) {
        for emitter in &self.producers.order_backlogged_producer {
            debug!("🎫️📬️ Notifying order backlogged hook subscribers for {}", order.reference);
            let event = OrderBackloggedEvent { order: order.clone() };
            emitter.publish_event(event).await;
        }
    }

    /// Fires the low-stock hook when remaining stock for the type is at or below the operator threshold. A hook
    /// failure here must never affect the allocation result, so errors are logged and swallowed.
    async fn check_stock_level(&self, voucher_type: VoucherType) {
        if self.producers.stock_low_producer.is_empty() {
            return;
        }
        let threshold = match settings_api::low_stock_threshold(&self.db).await {
            Ok(threshold) => threshold,
            Err(e) => {
                warn!("🎫️📬️ Could not read low stock threshold: {e}");
                DEFAULT_LOW_STOCK_THRESHOLD
            },
        };
        let remaining = match self.db.count_available(voucher_type).await {
            Ok(n) => n,
            Err(e) => {
                warn!("🎫️📬️ Could not count remaining {voucher_type} stock: {e}");
                return;
            },
        };
        if remaining <= threshold {
            for emitter in &self.producers.stock_low_producer {
                let event = StockLowEvent { voucher_type, remaining };
                emitter.publish_event(event).await;
            }
        }
    }
}

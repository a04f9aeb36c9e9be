//! The shared reconciliation step.
//!
//! Four channels learn about payments: the browser's verify poll, the provider webhook, USSD status checks and
//! admin actions. They all run the same sequence here: ask the provider for the payment status, resolve the order
//! details (ledger first, caller hints second), then hand over to the engine's idempotent allocation. Which channel
//! reports first is irrelevant; the engine makes duplicates harmless.
use log::*;
use voucher_payment_engine::{
    db_types::{NewOrder, Order, OrderReference, VoucherHandout},
    traits::{AllocationError, AllocationOutcome},
    AllocationApi,
    OrderApi,
};
use voucher_payment_engine::traits::AllocationDatabase;

use crate::{
    errors::ServerError,
    integrations::{PaymentGateway, PaymentStatus},
};

/// What a reconciliation attempt produced, from the caller's point of view.
#[derive(Debug)]
pub enum ReconcileResult {
    Fulfilled { order: Order, vouchers: Vec<VoucherHandout> },
    Backlogged { order: Order },
    Pending,
    Declined,
}

/// Verifies the payment with the provider and, when it has cleared, runs the allocation.
///
/// `hints` are only consulted when the ledger has no row for the reference, which happens when the webhook beats
/// the channel that created the order. A paid reference with neither a ledger row nor usable hints is an
/// [`ServerError::UnresolvableOrder`]: the caller must alert an operator rather than guess quantities.
pub async fn reconcile_payment<B: AllocationDatabase>(
    reference: &OrderReference,
    hints: Option<NewOrder>,
    gateway: &dyn PaymentGateway,
    allocations: &AllocationApi<B>,
    orders: &OrderApi<B>,
) -> Result<ReconcileResult, ServerError> {
    let status = gateway
        .status(reference)
        .await
        .map_err(|e| ServerError::PaymentProviderError(e.to_string()))?;
    match status {
        PaymentStatus::Pending => {
            trace!("💳️ Payment for {reference} is still pending");
            Ok(ReconcileResult::Pending)
        },
        PaymentStatus::Declined => {
            // Best effort: a reference we have never seen has nothing to mark.
            match allocations.mark_order_failed(reference).await {
                Ok(order) => debug!("💳️ Order {} marked as failed", order.reference),
                Err(AllocationError::OrderNotFound(_)) => {
                    debug!("💳️ Declined payment for unknown reference {reference}. Nothing to record.");
                },
                Err(e) => warn!("💳️ Could not record declined payment for {reference}: {e}"),
            }
            Ok(ReconcileResult::Declined)
        },
        PaymentStatus::Paid => {
            let details = resolve_order_details(reference, hints, orders).await?;
            let outcome = allocations.allocate(details).await?;
            match outcome {
                AllocationOutcome::Fulfilled { order, vouchers } |
                AllocationOutcome::AlreadyFulfilled { order, vouchers } => {
                    Ok(ReconcileResult::Fulfilled { order, vouchers })
                },
                AllocationOutcome::Backlogged { order, .. } => Ok(ReconcileResult::Backlogged { order }),
            }
        },
    }
}

async fn resolve_order_details<B: AllocationDatabase>(
    reference: &OrderReference,
    hints: Option<NewOrder>,
    orders: &OrderApi<B>,
) -> Result<NewOrder, ServerError> {
    if let Some(order) = orders.fetch_order(reference).await? {
        return Ok(NewOrder::from(&order));
    }
    hints.ok_or_else(|| {
        error!("💳️ Paid reference {reference} has no ledger row and the channel supplied no usable details.");
        ServerError::UnresolvableOrder(reference.to_string())
    })
}

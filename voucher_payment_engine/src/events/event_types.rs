use crate::db_types::{Order, VoucherHandout, VoucherType};

/// Fired exactly once per order, on the transition into `success`. Subscribers deliver the vouchers to the buyer.
#[derive(Debug, Clone)]
pub struct OrderFulfilledEvent {
    pub order: Order,
    pub vouchers: Vec<VoucherHandout>,
}

/// Fired exactly once per order, on the transition into `backlogged`. Subscribers notify the buyer that the order
/// is queued and alert an operator to restock.
#[derive(Debug, Clone)]
pub struct OrderBackloggedEvent {
    pub order: Order,
}

/// Fired after a fulfilment leaves stock at or below the operator's threshold. `remaining == 0` means out of stock.
#[derive(Debug, Clone)]
pub struct StockLowEvent {
    pub voucher_type: VoucherType,
    pub remaining: i64,
}

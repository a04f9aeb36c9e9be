use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use vpg_common::Cedi;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(pub String);

//--------------------------------------    VoucherType      ---------------------------------------------------------
/// The fixed set of goods sold by the gateway. Anything else arriving at the boundary is a validation error, never a
/// silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum VoucherType {
    Wassce,
    Bece,
    Cssps,
}

impl VoucherType {
    pub const ALL: [VoucherType; 3] = [VoucherType::Wassce, VoucherType::Bece, VoucherType::Cssps];

    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherType::Wassce => "WASSCE",
            VoucherType::Bece => "BECE",
            VoucherType::Cssps => "CSSPS",
        }
    }
}

impl Display for VoucherType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VoucherType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WASSCE" => Ok(Self::Wassce),
            "BECE" => Ok(Self::Bece),
            "CSSPS" => Ok(Self::Cssps),
            s => Err(ConversionError(format!("Unknown voucher type: {s}"))),
        }
    }
}

//--------------------------------------   VoucherStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatus {
    /// In stock and claimable by the allocation engine.
    Available,
    /// Bound to an order reference. A voucher is sold exactly once.
    Sold,
    /// Redeemed on the checker portal. Set by an admin, unrelated to allocation.
    Used,
}

impl Display for VoucherStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoucherStatus::Available => write!(f, "available"),
            VoucherStatus::Sold => write!(f, "sold"),
            VoucherStatus::Used => write!(f, "used"),
        }
    }
}

impl FromStr for VoucherStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "sold" => Ok(Self::Sold),
            "used" => Ok(Self::Used),
            s => Err(ConversionError(format!("Invalid voucher status: {s}"))),
        }
    }
}

//--------------------------------------  OrderStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The purchase attempt has been recorded but no payment confirmation is trusted yet.
    Initiated,
    /// Fulfilled. Terminal: no entry point may revert or re-process the order.
    Success,
    /// Payment confirmed, stock insufficient. Leaves only via the backlog drainer, to `Success`.
    Backlogged,
    /// Payment declined. Terminal.
    Failed,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Initiated => write!(f, "initiated"),
            OrderStatusType::Success => write!(f, "success"),
            OrderStatusType::Backlogged => write!(f, "backlogged"),
            OrderStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "success" => Ok(Self::Success),
            "backlogged" => Ok(Self::Backlogged),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------   OrderReference    ---------------------------------------------------------
/// The caller-supplied idempotency key for a purchase attempt. Generated once per attempt and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderReference(pub String);

impl FromStr for OrderReference {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConversionError("Order reference must not be empty".to_string()));
        }
        Ok(Self(s.trim().to_string()))
    }
}

impl From<String> for OrderReference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      Voucher        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Voucher {
    pub id: i64,
    pub voucher_type: VoucherType,
    pub serial: String,
    pub pin: String,
    pub status: VoucherStatus,
    pub sold_to: Option<String>,
    pub order_ref: Option<OrderReference>,
    pub created_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
}

//--------------------------------------    NewVoucher       ---------------------------------------------------------
/// One line of a stock upload: a serial/PIN pair for a given type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVoucher {
    pub voucher_type: VoucherType,
    pub serial: String,
    pub pin: String,
}

impl NewVoucher {
    pub fn new(voucher_type: VoucherType, serial: impl Into<String>, pin: impl Into<String>) -> Self {
        Self { voucher_type, serial: serial.into(), pin: pin.into() }
    }
}

//--------------------------------------  VoucherHandout     ---------------------------------------------------------
/// The serial/PIN pair handed to a buyer on fulfilment. This is the only shape in which PINs leave the engine.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VoucherHandout {
    pub serial: String,
    pub pin: String,
}

//--------------------------------------       Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub reference: OrderReference,
    pub phone: String,
    pub customer_name: Option<String>,
    pub voucher_type: VoucherType,
    pub quantity: i64,
    pub amount: Cedi,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
/// The details of a purchase attempt as supplied by a caller. Where a ledger row already exists for the reference,
/// the stored row wins and these fields are treated as untrusted hints.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub reference: OrderReference,
    pub phone: String,
    pub customer_name: Option<String>,
    pub voucher_type: VoucherType,
    pub quantity: i64,
    pub amount: Cedi,
}

impl NewOrder {
    pub fn new(reference: OrderReference, phone: impl Into<String>, voucher_type: VoucherType, quantity: i64, amount: Cedi) -> Self {
        Self { reference, phone: phone.into(), customer_name: None, voucher_type, quantity, amount }
    }

    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }
}

impl From<&Order> for NewOrder {
    fn from(order: &Order) -> Self {
        Self {
            reference: order.reference.clone(),
            phone: order.phone.clone(),
            customer_name: order.customer_name.clone(),
            voucher_type: order.voucher_type,
            quantity: order.quantity,
            amount: order.amount,
        }
    }
}

//--------------------------------------    UssdSession      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UssdStage {
    Menu,
    SelectQty,
    Confirm,
    AwaitPayment,
}

impl Display for UssdStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UssdStage::Menu => write!(f, "menu"),
            UssdStage::SelectQty => write!(f, "select_qty"),
            UssdStage::Confirm => write!(f, "confirm"),
            UssdStage::AwaitPayment => write!(f, "await_payment"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UssdSession {
    pub session_id: String,
    pub stage: UssdStage,
    pub voucher_type: Option<VoucherType>,
    pub quantity: Option<i64>,
    pub amount: Option<Cedi>,
    pub order_ref: Option<OrderReference>,
    pub updated_at: DateTime<Utc>,
}

impl UssdSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            stage: UssdStage::Menu,
            voucher_type: None,
            quantity: None,
            amount: None,
            order_ref: None,
            updated_at: Utc::now(),
        }
    }
}

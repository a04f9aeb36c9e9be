use serde::{Deserialize, Serialize};
use vpg_common::Cedi;
use voucher_payment_engine::db_types::{VoucherHandout, VoucherStatus, VoucherType};

#[derive(Debug, Clone, Serialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Body of `POST /init-payment`: a buyer starting a purchase from the web shop.
#[derive(Debug, Clone, Deserialize)]
pub struct InitPaymentRequest {
    pub phone: String,
    pub customer_name: Option<String>,
    pub voucher_type: VoucherType,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitPaymentResponse {
    pub reference: String,
    pub amount: Cedi,
    /// The hosted Moolre payment page the buyer is sent to.
    pub payment_url: String,
}

/// Body of `POST /verify-payment`: the browser asking whether its payment has landed yet.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub reference: String,
}

/// The outcome of a fulfilment attempt, as returned to buyers.
#[derive(Debug, Clone, Serialize)]
pub struct FulfilmentResponse {
    pub reference: String,
    pub status: String,
    pub vouchers: Vec<VoucherHandout>,
    pub message: String,
}

/// A Moolre payment webhook post. Field names follow the provider's payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MoolreWebhookPayload {
    pub secret: Option<String>,
    pub txstatus: i32,
    pub externalref: String,
    pub payer: Option<String>,
    pub amount: Option<String>,
}

/// Body of `POST /retrieve`: a buyer recovering previously purchased vouchers.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveRequest {
    pub phone: String,
}

/// One line of an admin stock upload.
#[derive(Debug, Clone, Deserialize)]
pub struct StockLine {
    pub serial: String,
    pub pin: String,
}

/// Body of `POST /api/stock`.
#[derive(Debug, Clone, Deserialize)]
pub struct StockUploadRequest {
    pub voucher_type: VoucherType,
    pub vouchers: Vec<StockLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacklogFulfilRequest {
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoucherStatusUpdateRequest {
    pub serials: Vec<String>,
    pub status: VoucherStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingUpdateRequest {
    pub key: String,
    pub value: String,
}

/// A Moolre USSD gateway callback. One post per menu step; `message` holds what the buyer typed.
#[derive(Debug, Clone, Deserialize)]
pub struct UssdRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "new")]
    pub new_session: bool,
    pub msisdn: String,
    pub network: Option<i32>,
    #[serde(default)]
    pub message: String,
}

/// `reply: true` keeps the USSD session open for another input; `false` ends it.
#[derive(Debug, Clone, Serialize)]
pub struct UssdResponse {
    pub message: String,
    pub reply: bool,
}

impl UssdResponse {
    pub fn prompt(message: impl Into<String>) -> Self {
        Self { message: message.into(), reply: true }
    }

    pub fn end(message: impl Into<String>) -> Self {
        Self { message: message.into(), reply: false }
    }
}

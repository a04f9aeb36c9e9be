//! Moolre open-banking client.
//!
//! The server makes two calls against the provider: creating a hosted payment link when a purchase starts, and
//! the transaction status lookup afterwards. Webhooks come the other way and are handled in the routes. Both
//! calls sit behind the [`PaymentGateway`] trait so that endpoint tests can run against a mock provider.
use futures::future::BoxFuture;
use log::*;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use voucher_payment_engine::db_types::{NewOrder, OrderReference};
use vpg_common::GHS_CURRENCY_CODE;

use crate::config::MoolreConfig;

/// The provider's view of one payment, collapsed from Moolre's `txstatus` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// `txstatus = 1`. The money is in the merchant account.
    Paid,
    /// `txstatus = 0`. The buyer has not approved the charge yet.
    Pending,
    /// `txstatus = 2`. The charge was rejected or timed out.
    Declined,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("The payment provider could not be reached: {0}")]
    Unreachable(String),
    #[error("The payment provider returned an unexpected response: {0}")]
    BadResponse(String),
}

/// The provider calls the server depends on, behind a trait so tests can substitute a scripted provider.
#[cfg_attr(test, mockall::automock)]
pub trait PaymentGateway: Send + Sync {
    /// The current status of the payment for the given order reference.
    fn status(&self, reference: &OrderReference) -> BoxFuture<'static, Result<PaymentStatus, ProviderError>>;

    /// Create a hosted payment page for the order and return its URL.
    fn payment_link(&self, order: &NewOrder) -> BoxFuture<'static, Result<String, ProviderError>>;
}

#[derive(Clone)]
pub struct MoolreClient {
    config: MoolreConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    data: Option<StatusData>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    txstatus: i32,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    status: i32,
    message: Option<String>,
    data: Option<LinkData>,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    authorization_url: Option<String>,
}

impl MoolreClient {
    pub fn new(config: MoolreConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }
}

impl PaymentGateway for MoolreClient {
    fn status(&self, reference: &OrderReference) -> BoxFuture<'static, Result<PaymentStatus, ProviderError>> {
        let url = format!("{}/open/transact/status", self.config.api_url);
        // idtype 1 means "look up by external reference", i.e. our order reference.
        let body = json!({
            "type": 1,
            "idtype": 1,
            "id": reference.as_str(),
            "accountnumber": self.config.account_number,
        });
        let request = self
            .client
            .post(url)
            .header("X-API-USER", self.config.api_user.clone())
            .header("X-API-PUBKEY", self.config.api_pubkey.clone())
            .json(&body);
        let reference = reference.clone();
        Box::pin(async move {
            let response = request.send().await.map_err(|e| ProviderError::Unreachable(e.to_string()))?;
            let status: StatusResponse =
                response.json().await.map_err(|e| ProviderError::BadResponse(e.to_string()))?;
            let txstatus = status
                .data
                .map(|d| d.txstatus)
                .ok_or_else(|| ProviderError::BadResponse("Status response carried no data".to_string()))?;
            let result = match txstatus {
                1 => PaymentStatus::Paid,
                0 => PaymentStatus::Pending,
                2 => PaymentStatus::Declined,
                other => {
                    return Err(ProviderError::BadResponse(format!("Unknown txstatus {other} for {reference}")));
                },
            };
            trace!("💳️ Payment status for {reference}: {result:?}");
            Ok(result)
        })
    }

    fn payment_link(&self, order: &NewOrder) -> BoxFuture<'static, Result<String, ProviderError>> {
        let url = format!("{}/embed/link", self.config.api_url);
        let base = self.config.public_base_url.trim_end_matches('/');
        let body = json!({
            "type": 1,
            "amount": order.amount.to_decimal_string(),
            "email": "customer@waeccheckers.com",
            "externalref": order.reference.as_str(),
            "callback": format!("{base}/moolre/webhook"),
            "redirect": format!("{base}/thank-you?ref={}", order.reference.as_str()),
            "reusable": "0",
            "currency": GHS_CURRENCY_CODE,
            "accountnumber": self.config.account_number,
            "metadata": {
                "phone": order.phone,
                "quantity": order.quantity.to_string(),
                "voucher_type": order.voucher_type,
                "customer_name": order.customer_name.clone().unwrap_or_default(),
            },
        });
        let request = self
            .client
            .post(url)
            .header("X-API-USER", self.config.api_user.clone())
            .header("X-API-PUBKEY", self.config.api_pubkey.clone())
            .json(&body);
        let reference = order.reference.clone();
        Box::pin(async move {
            let response = request.send().await.map_err(|e| ProviderError::Unreachable(e.to_string()))?;
            let link: LinkResponse = response.json().await.map_err(|e| ProviderError::BadResponse(e.to_string()))?;
            if link.status != 1 {
                let message = link.message.unwrap_or_else(|| "no message".to_string());
                return Err(ProviderError::BadResponse(format!(
                    "Payment link for {reference} was refused: {message}"
                )));
            }
            let url = link
                .data
                .and_then(|d| d.authorization_url)
                .ok_or_else(|| ProviderError::BadResponse("Link response carried no authorization URL".to_string()))?;
            debug!("💳️ Payment link created for {reference}");
            Ok(url)
        })
    }
}

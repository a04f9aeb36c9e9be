//! Public request handlers.
//!
//! Handlers that are more than a line or two go into a separate module (`moolre_routes`, `ussd_routes`,
//! `admin_routes`). Keep this module neat and tidy 🙏
use actix_web::{get, post, web, HttpResponse, Responder};
use log::*;
use voucher_payment_engine::{
    db_types::VoucherType,
    helpers::normalize_msisdn,
    SettingsApi,
    SqliteDatabase,
    StockApi,
};

use crate::{data_objects::RetrieveRequest, errors::ServerError};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Stock   ----------------------------------------------------
/// Available voucher counts and current prices per type. Public, so the shop front can grey out sold-out types.
#[get("/stock")]
pub async fn stock_levels(
    stock: web::Data<StockApi<SqliteDatabase>>,
    settings: web::Data<SettingsApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let levels = stock.stock_levels().await?;
    let mut prices = serde_json::Map::new();
    for voucher_type in VoucherType::ALL {
        if let Some(price) = settings.price_for(voucher_type).await? {
            prices.insert(voucher_type.to_string(), price.to_decimal_string().into());
        }
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "stock": levels, "prices": prices })))
}

// ----------------------------------------------  Retrieve  ----------------------------------------------------
/// Lost-voucher recovery: returns the vouchers previously sold to a phone number.
#[post("/retrieve")]
pub async fn retrieve_vouchers(
    body: web::Json<RetrieveRequest>,
    stock: web::Data<StockApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let phone = normalize_msisdn(&body.phone).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let vouchers = stock.vouchers_for_phone(&phone, 20).await?;
    debug!("💻️ Retrieve request for {phone}: {} voucher(s) found", vouchers.len());
    let result = vouchers
        .into_iter()
        .map(|v| {
            serde_json::json!({
                "voucher_type": v.voucher_type,
                "serial": v.serial,
                "pin": v.pin,
                "sold_at": v.sold_at,
            })
        })
        .collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(result))
}

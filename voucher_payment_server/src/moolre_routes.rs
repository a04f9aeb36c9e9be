//! Handlers for the Moolre payment flows: starting a purchase, the browser's verify poll and the asynchronous
//! webhook. The verify and webhook paths race each other routinely; both funnel into
//! [`crate::reconcile::reconcile_payment`] and let the engine sort out who wins.
use actix_web::{post, web, HttpResponse};
use log::*;
use voucher_payment_engine::{
    db_types::{NewOrder, OrderReference},
    helpers::normalize_msisdn,
    AllocationApi,
    OrderApi,
    SettingsApi,
    SqliteDatabase,
};

use crate::{
    data_objects::{
        FulfilmentResponse,
        InitPaymentRequest,
        InitPaymentResponse,
        JsonResponse,
        MoolreWebhookPayload,
        VerifyPaymentRequest,
    },
    errors::ServerError,
    integrations::{PaymentGateway, SmsClient},
    reconcile::{reconcile_payment, ReconcileResult},
};

const MAX_QUANTITY_PER_ORDER: i64 = 20;

/// Starts a purchase: records the order in the `initiated` state and hands back a hosted payment page URL. The
/// ledger row created here is what makes later webhook posts resolvable even when they arrive with mangled
/// metadata.
#[post("/init-payment")]
pub async fn init_payment(
    body: web::Json<InitPaymentRequest>,
    orders: web::Data<OrderApi<SqliteDatabase>>,
    settings: web::Data<SettingsApi<SqliteDatabase>>,
    gateway: web::Data<dyn PaymentGateway>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let phone = normalize_msisdn(&req.phone).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    if !(1..=MAX_QUANTITY_PER_ORDER).contains(&req.quantity) {
        return Err(ServerError::InvalidRequestBody(format!(
            "Quantity must be between 1 and {MAX_QUANTITY_PER_ORDER}"
        )));
    }
    let price = settings.price_for(req.voucher_type).await?.ok_or_else(|| {
        error!("🪛️ No price configured for {}. Set the price_{} setting.", req.voucher_type, req.voucher_type);
        ServerError::ConfigurationError(format!("No price configured for {}", req.voucher_type))
    })?;
    let amount = price * req.quantity;
    let reference = OrderReference::from(format!("waec_{:016x}", rand::random::<u64>()));
    let mut order = NewOrder::new(reference.clone(), phone, req.voucher_type, req.quantity, amount);
    if let Some(name) = req.customer_name {
        order = order.with_customer_name(name);
    }
    let (order, _) = orders.record_initiated_order(order).await?;
    info!("💳️ Order {} initiated: {} x{} for {}", order.reference, order.voucher_type, order.quantity, amount);
    let payment_url = gateway
        .payment_link(&NewOrder::from(&order))
        .await
        .map_err(|e| ServerError::PaymentProviderError(e.to_string()))?;
    let response =
        InitPaymentResponse { reference: order.reference.as_str().to_string(), amount, payment_url };
    Ok(HttpResponse::Ok().json(response))
}

/// The browser's polling endpoint after payment. Safe to call any number of times: once the order is fulfilled,
/// retries return the same vouchers.
#[post("/verify-payment")]
pub async fn verify_payment(
    body: web::Json<VerifyPaymentRequest>,
    gateway: web::Data<dyn PaymentGateway>,
    allocations: web::Data<AllocationApi<SqliteDatabase>>,
    orders: web::Data<OrderApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let reference = OrderReference::from(body.into_inner().reference);
    let result = reconcile_payment(&reference, None, gateway.get_ref(), &allocations, &orders).await?;
    let response = match result {
        ReconcileResult::Pending => HttpResponse::Accepted()
            .json(JsonResponse::success("Payment is still being processed. Try again shortly.")),
        ReconcileResult::Declined => {
            HttpResponse::PaymentRequired().json(JsonResponse::failure("Payment failed or was rejected."))
        },
        ReconcileResult::Fulfilled { order, vouchers } => HttpResponse::Ok().json(FulfilmentResponse {
            reference: order.reference.as_str().to_string(),
            status: order.status.to_string(),
            vouchers,
            message: "Your vouchers have also been sent to you by SMS.".to_string(),
        }),
        ReconcileResult::Backlogged { order } => HttpResponse::Ok().json(FulfilmentResponse {
            reference: order.reference.as_str().to_string(),
            status: order.status.to_string(),
            vouchers: Vec::new(),
            message: "Payment received but vouchers are currently out of stock. You will receive them via SMS once \
                      restocked."
                .to_string(),
        }),
    };
    Ok(response)
}

/// The provider's asynchronous payment notification.
///
/// Always answers 200, whatever happens: any other status makes Moolre retry forever. Failures are logged, and an
/// unresolvable paid reference pages the operator instead of guessing order details.
#[post("/moolre/webhook")]
pub async fn moolre_webhook(
    body: web::Json<serde_json::Value>,
    moolre_config: web::Data<crate::config::MoolreConfig>,
    gateway: web::Data<dyn PaymentGateway>,
    allocations: web::Data<AllocationApi<SqliteDatabase>>,
    orders: web::Data<OrderApi<SqliteDatabase>>,
    sms: web::Data<SmsClient>,
) -> HttpResponse {
    let payload: MoolreWebhookPayload = match serde_json::from_value(body.into_inner().get("data").cloned().unwrap_or_default()) {
        Ok(p) => p,
        Err(e) => {
            warn!("💳️ Webhook post with no usable data field: {e}");
            return HttpResponse::Ok().finish();
        },
    };
    let expected = moolre_config.webhook_secret.reveal();
    if expected.is_empty() || payload.secret.as_deref() != Some(expected.as_str()) {
        warn!("💳️ Webhook secret mismatch. Ignoring the post.");
        return HttpResponse::Ok().finish();
    }
    if payload.txstatus != 1 {
        trace!("💳️ Ignoring webhook with txstatus {}", payload.txstatus);
        return HttpResponse::Ok().finish();
    }
    if payload.externalref.trim().is_empty() {
        warn!("💳️ Webhook post carried no reference. Ignoring.");
        return HttpResponse::Ok().finish();
    }
    let reference = OrderReference::from(payload.externalref.clone());
    // The payer field is the only hint a webhook can offer; without quantity and type it cannot build a full
    // order, so resolution relies on the ledger row created at init time.
    match reconcile_payment(&reference, None, gateway.get_ref(), &allocations, &orders).await {
        Ok(result) => {
            debug!("💳️ Webhook reconciliation for {reference} complete: {result:?}");
        },
        Err(ServerError::UnresolvableOrder(r)) => {
            let payer = payload.payer.as_deref().unwrap_or("unknown payer");
            let amount = payload.amount.as_deref().unwrap_or("?");
            sms.alert_operator(&format!(
                "Manual action needed: paid reference {r} (GHS {amount} from {payer}) has no matching order."
            ))
            .await;
        },
        Err(e) => {
            error!("💳️ Webhook reconciliation for {reference} failed: {e}");
        },
    }
    HttpResponse::Ok().finish()
}

//! The USSD purchase flow.
//!
//! The gateway posts one request per menu step, so the conversation state lives in the database between callbacks.
//! Unlike the web flow, USSD buyers cannot receive a JSON response; the order is created at the confirm step and
//! fulfilment arrives by SMS once the payment clears, either through the buyer's status check here or through the
//! provider webhook, whichever lands first.
use actix_web::{post, web, HttpResponse};
use log::*;
use vpg_common::Cedi;
use voucher_payment_engine::{
    db_types::{NewOrder, OrderReference, UssdStage, VoucherType},
    AllocationApi,
    OrderApi,
    SessionApi,
    SettingsApi,
    SqliteDatabase,
};

use crate::{
    data_objects::{UssdRequest, UssdResponse},
    errors::ServerError,
    integrations::PaymentGateway,
    reconcile::{reconcile_payment, ReconcileResult},
};

const MAX_USSD_QUANTITY: i64 = 5;

#[post("/ussd")]
pub async fn ussd_callback(
    body: web::Json<UssdRequest>,
    sessions: web::Data<SessionApi<SqliteDatabase>>,
    settings: web::Data<SettingsApi<SqliteDatabase>>,
    gateway: web::Data<dyn PaymentGateway>,
    allocations: web::Data<AllocationApi<SqliteDatabase>>,
    orders: web::Data<OrderApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    if req.session_id.trim().is_empty() {
        return Ok(HttpResponse::Ok().json(UssdResponse::end("Invalid request.")));
    }
    let response = if req.new_session {
        let mut session = sessions.fetch(&req.session_id).await?;
        session.stage = UssdStage::Menu;
        sessions.save(&session).await?;
        UssdResponse::prompt(main_menu(&settings).await?)
    } else {
        let mut session = sessions.fetch(&req.session_id).await?;
        let choice = req.message.trim().to_string();
        match session.stage {
            UssdStage::Menu => {
                let selected = match choice.as_str() {
                    "0" => {
                        sessions.clear(&req.session_id).await?;
                        return Ok(HttpResponse::Ok().json(UssdResponse::end("Thank you. Goodbye!")));
                    },
                    "1" => Some(VoucherType::Wassce),
                    "2" => Some(VoucherType::Bece),
                    "3" => Some(VoucherType::Cssps),
                    _ => None,
                };
                match selected {
                    Some(voucher_type) => {
                        let price = price_for(&settings, voucher_type).await?;
                        session.stage = UssdStage::SelectQty;
                        session.voucher_type = Some(voucher_type);
                        sessions.save(&session).await?;
                        UssdResponse::prompt(format!(
                            "{voucher_type} @ GHS {} each.\nHow many? (1-{MAX_USSD_QUANTITY})",
                            price.to_decimal_string()
                        ))
                    },
                    None => UssdResponse::prompt(format!("Invalid choice.\n{}", main_menu(&settings).await?)),
                }
            },
            UssdStage::SelectQty => {
                let Some(voucher_type) = session.voucher_type else {
                    sessions.clear(&req.session_id).await?;
                    return Ok(HttpResponse::Ok().json(UssdResponse::end("Session expired. Please dial again.")));
                };
                match choice.parse::<i64>() {
                    Ok(qty) if (1..=MAX_USSD_QUANTITY).contains(&qty) => {
                        let price = price_for(&settings, voucher_type).await?;
                        let total = price * qty;
                        session.stage = UssdStage::Confirm;
                        session.quantity = Some(qty);
                        session.amount = Some(total);
                        sessions.save(&session).await?;
                        UssdResponse::prompt(format!(
                            "{qty}x {voucher_type} = GHS {}\nMoMo: {}\n\n1. Confirm & Pay\n2. Cancel",
                            total.to_decimal_string(),
                            req.msisdn
                        ))
                    },
                    _ => UssdResponse::prompt(format!("Enter a number between 1 and {MAX_USSD_QUANTITY}:")),
                }
            },
            UssdStage::Confirm => match choice.as_str() {
                "2" => {
                    sessions.clear(&req.session_id).await?;
                    UssdResponse::end("Cancelled. Goodbye!")
                },
                "1" => {
                    let (Some(voucher_type), Some(quantity), Some(amount)) =
                        (session.voucher_type, session.quantity, session.amount)
                    else {
                        sessions.clear(&req.session_id).await?;
                        return Ok(HttpResponse::Ok().json(UssdResponse::end("Session expired. Please dial again.")));
                    };
                    let reference = OrderReference::from(format!("ussd_{}_{:08x}", req.session_id, rand::random::<u32>()));
                    let order = NewOrder::new(reference.clone(), req.msisdn.clone(), voucher_type, quantity, amount);
                    orders.record_initiated_order(order).await?;
                    info!("📱️ USSD order {reference} initiated: {voucher_type} x{quantity}");
                    session.stage = UssdStage::AwaitPayment;
                    session.order_ref = Some(reference);
                    sessions.save(&session).await?;
                    UssdResponse::prompt(format!(
                        "Approve the GHS {} MoMo prompt on your phone.\n\n1. I have paid\n2. Cancel",
                        amount.to_decimal_string()
                    ))
                },
                _ => UssdResponse::prompt("Press 1 to confirm or 2 to cancel:"),
            },
            UssdStage::AwaitPayment => {
                let Some(reference) = session.order_ref.clone() else {
                    sessions.clear(&req.session_id).await?;
                    return Ok(HttpResponse::Ok().json(UssdResponse::end("Session expired. Please dial again.")));
                };
                match choice.as_str() {
                    "1" => {
                        let result =
                            reconcile_payment(&reference, None, gateway.get_ref(), &allocations, &orders).await?;
                        match result {
                            ReconcileResult::Fulfilled { order, vouchers } => {
                                sessions.clear(&req.session_id).await?;
                                UssdResponse::end(format!(
                                    "Payment received! Your {} voucher(s) ({}) have been sent to you by SMS. Ref: {}",
                                    order.voucher_type,
                                    vouchers.len(),
                                    short_ref(&order.reference)
                                ))
                            },
                            ReconcileResult::Backlogged { order } => {
                                sessions.clear(&req.session_id).await?;
                                UssdResponse::end(format!(
                                    "Payment received but vouchers are out of stock. You will get them by SMS once \
                                     restocked. Ref: {}",
                                    short_ref(&order.reference)
                                ))
                            },
                            ReconcileResult::Pending => {
                                UssdResponse::prompt("Payment not seen yet.\n\n1. Check again\n2. Cancel")
                            },
                            ReconcileResult::Declined => {
                                sessions.clear(&req.session_id).await?;
                                UssdResponse::end("Payment failed or was rejected. Please dial again to retry.")
                            },
                        }
                    },
                    _ => {
                        sessions.clear(&req.session_id).await?;
                        UssdResponse::end(format!(
                            "Goodbye. If you completed payment, your vouchers will arrive by SMS. Ref: {}",
                            short_ref(&reference)
                        ))
                    },
                }
            },
        }
    };
    Ok(HttpResponse::Ok().json(response))
}

async fn main_menu(settings: &SettingsApi<SqliteDatabase>) -> Result<String, ServerError> {
    let mut lines = vec!["Welcome to WAEC GH Checkers".to_string()];
    for (i, voucher_type) in VoucherType::ALL.into_iter().enumerate() {
        let price = price_for(settings, voucher_type).await?;
        lines.push(format!("{}. {voucher_type} (GHS {})", i + 1, price.to_decimal_string()));
    }
    lines.push("0. Exit".to_string());
    Ok(lines.join("\n"))
}

async fn price_for(settings: &SettingsApi<SqliteDatabase>, voucher_type: VoucherType) -> Result<Cedi, ServerError> {
    settings
        .price_for(voucher_type)
        .await?
        .ok_or_else(|| ServerError::ConfigurationError(format!("No price configured for {voucher_type}")))
}

/// The last characters of the reference, short enough to read off a USSD screen.
fn short_ref(reference: &OrderReference) -> String {
    let s = reference.as_str();
    s.chars().rev().take(8).collect::<Vec<_>>().into_iter().rev().collect()
}

//! Arkesel SMS gateway client and the notification hooks built on it.
//!
//! Voucher delivery, backlog notices and operator alerts all go out as SMS. The hooks subscribe to engine events,
//! so a slow or failing gateway can never hold up an allocation transaction.
use std::sync::Arc;

use log::*;
use serde_json::json;
use voucher_payment_engine::{
    db_types::{Order, VoucherHandout},
    events::EventHooks,
    helpers::display_local,
};

use crate::config::SmsConfig;

#[derive(Clone)]
pub struct SmsClient {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsClient {
    pub fn new(config: SmsConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    /// Sends one SMS. Delivery failures are logged, not propagated: by the time we are here the sale has already
    /// committed and the buyer can still recover vouchers through the retrieve endpoint.
    pub async fn send(&self, recipient: &str, message: &str) {
        if !self.config.is_enabled() {
            debug!("📨️ SMS delivery disabled. Would have sent to {recipient}: {message}");
            return;
        }
        let body = json!({
            "sender": self.config.sender_id,
            "message": message,
            "recipients": [recipient],
        });
        let result = self
            .client
            .post(&self.config.api_url)
            .header("api-key", self.config.api_key.reveal().clone())
            .json(&body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!("📨️ SMS sent to {recipient}");
            },
            Ok(response) => {
                warn!("📨️ SMS gateway returned {} for {recipient}", response.status());
            },
            Err(e) => {
                warn!("📨️ Could not send SMS to {recipient}: {e}");
            },
        }
    }

    pub async fn alert_operator(&self, message: &str) {
        match &self.config.operator_phone {
            Some(phone) => self.send(phone, message).await,
            None => warn!("📨️ No operator phone configured. Dropping alert: {message}"),
        }
    }
}

pub fn voucher_message(order: &Order, vouchers: &[VoucherHandout]) -> String {
    let lines = vouchers
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{}. Serial: {} PIN: {}", i + 1, v.serial, v.pin))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Your WAEC {} checker voucher(s):\n{lines}\nVisit waecgh.org to check results. Thank you!",
        order.voucher_type
    )
}

pub fn backlog_message(order: &Order) -> String {
    format!(
        "Payment received for your {} x{} order ({}). Vouchers are temporarily out of stock; you will receive them \
         by SMS as soon as they arrive.",
        order.voucher_type, order.quantity, order.reference
    )
}

/// Wires the engine's events to SMS delivery. Returns hooks ready to hand to `EventHandlers::new`.
pub fn notification_hooks(sms: SmsClient) -> EventHooks {
    let mut hooks = EventHooks::default();
    let client = Arc::new(sms);

    let on_fulfilled = Arc::clone(&client);
    hooks.on_order_fulfilled(move |ev| {
        let client = Arc::clone(&on_fulfilled);
        Box::pin(async move {
            let message = voucher_message(&ev.order, &ev.vouchers);
            client.send(&ev.order.phone, &message).await;
        })
    });

    let on_backlogged = Arc::clone(&client);
    hooks.on_order_backlogged(move |ev| {
        let client = Arc::clone(&on_backlogged);
        Box::pin(async move {
            client.send(&ev.order.phone, &backlog_message(&ev.order)).await;
            let alert = format!(
                "Backlogged order: {} x{} for {} ({}). Stock exhausted, please upload vouchers.",
                ev.order.voucher_type,
                ev.order.quantity,
                display_local(&ev.order.phone),
                ev.order.reference
            );
            client.alert_operator(&alert).await;
        })
    });

    let on_stock_low = Arc::clone(&client);
    hooks.on_stock_low(move |ev| {
        let client = Arc::clone(&on_stock_low);
        Box::pin(async move {
            let alert = format!("Stock alert: only {} {} voucher(s) left.", ev.remaining, ev.voucher_type);
            client.alert_operator(&alert).await;
        })
    });

    hooks
}

//! Shared scaffolding for endpoint tests: a fresh database per test, a scripted payment provider, and an app
//! wired the same way as `create_server_instance`.
use std::sync::Arc;

use vpg_common::{Cedi, Secret};
use voucher_payment_engine::{
    db_types::{NewOrder, NewVoucher, OrderReference, VoucherType},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::AllocationDatabase,
    SqliteDatabase,
};

use crate::{
    config::MoolreConfig,
    integrations::{MockPaymentGateway, PaymentGateway, PaymentStatus},
};

pub const TEST_ADMIN_KEY: &str = "test-admin-key";
pub const TEST_WEBHOOK_SECRET: &str = "c80b20ce-test-secret";

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn test_moolre_config() -> MoolreConfig {
    MoolreConfig { webhook_secret: Secret::new(TEST_WEBHOOK_SECRET.to_string()), ..Default::default() }
}

/// A provider that always reports the given status and hands out a fixed payment link.
pub fn scripted_gateway(status: PaymentStatus) -> Arc<dyn PaymentGateway> {
    let mut mock = MockPaymentGateway::new();
    mock.expect_status().returning(move |_| Box::pin(async move { Ok(status) }));
    mock.expect_payment_link()
        .returning(|_| Box::pin(async { Ok("https://pay.moolre.test/checkout".to_string()) }));
    Arc::new(mock)
}

pub async fn seed_vouchers(db: &SqliteDatabase, voucher_type: VoucherType, count: usize) {
    let batch = (0..count)
        .map(|i| NewVoucher::new(voucher_type, format!("{voucher_type}-{i:04}"), format!("PIN{i:06}")))
        .collect::<Vec<_>>();
    db.upload_vouchers(&batch).await.expect("Error uploading vouchers");
}

pub async fn seed_order(db: &SqliteDatabase, reference: &str, quantity: i64) {
    let order = NewOrder::new(
        OrderReference::from(reference.to_string()),
        "233241234567",
        VoucherType::Wassce,
        quantity,
        Cedi::from_cedis(25) * quantity,
    );
    db.insert_order(order).await.expect("Error inserting order");
}

/// Builds a test service with the same app data and routes as the production server.
#[macro_export]
macro_rules! init_test_app {
    ($db:expr, $gateway:expr) => {{
        use actix_web::{test, web, App};
        use vpg_common::Secret;
        use voucher_payment_engine::{
            events::EventProducers,
            AllocationApi,
            OrderApi,
            SessionApi,
            SettingsApi,
            StockApi,
        };

        use $crate::{
            config::SmsConfig,
            endpoint_tests::helpers::{test_moolre_config, TEST_ADMIN_KEY},
            integrations::SmsClient,
            server::ADMIN_KEY_HEADER,
        };

        let db = $db.clone();
        let sms = SmsClient::new(SmsConfig::default());
        let admin_key = Secret::new(TEST_ADMIN_KEY.to_string());
        let app = App::new()
            .app_data(web::Data::new(AllocationApi::new(db.clone(), EventProducers::default())))
            .app_data(web::Data::new(OrderApi::new(db.clone())))
            .app_data(web::Data::new(StockApi::new(db.clone())))
            .app_data(web::Data::new(SessionApi::new(db.clone())))
            .app_data(web::Data::new(SettingsApi::new(db.clone())))
            .app_data(web::Data::new(test_moolre_config()))
            .app_data(web::Data::new(sms))
            .app_data(web::Data::from($gateway.clone()))
            .service($crate::routes::health)
            .service($crate::routes::stock_levels)
            .service($crate::routes::retrieve_vouchers)
            .service($crate::moolre_routes::init_payment)
            .service($crate::moolre_routes::verify_payment)
            .service($crate::moolre_routes::moolre_webhook)
            .service($crate::ussd_routes::ussd_callback)
            .service(
                web::scope("/api")
                    .wrap_fn(move |req, srv| {
                        use actix_web::dev::Service;
                        use futures::FutureExt;
                        let expected = admin_key.reveal();
                        let provided = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok());
                        if !expected.is_empty() && provided == Some(expected.as_str()) {
                            srv.call(req)
                        } else {
                            let err = match provided {
                                None => $crate::errors::AuthError::MissingApiKey,
                                Some(_) => $crate::errors::AuthError::InvalidApiKey,
                            };
                            futures::future::ok(
                                req.error_response($crate::errors::ServerError::AuthenticationError(err)),
                            )
                            .boxed_local()
                        }
                    })
                    .service($crate::admin_routes::upload_stock)
                    .service($crate::admin_routes::stats)
                    .service($crate::admin_routes::search_orders)
                    .service($crate::admin_routes::list_vouchers)
                    .service($crate::admin_routes::order_vouchers)
                    .service($crate::admin_routes::fulfil_backlogged)
                    .service($crate::admin_routes::set_voucher_status)
                    .service($crate::admin_routes::delete_voucher)
                    .service($crate::admin_routes::list_settings)
                    .service($crate::admin_routes::update_setting),
            );
        test::init_service(app).await
    }};
}

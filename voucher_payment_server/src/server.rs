use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use log::*;
use voucher_payment_engine::{
    events::{EventHandlers, EventProducers},
    AllocationApi,
    OrderApi,
    SessionApi,
    SettingsApi,
    SqliteDatabase,
    StockApi,
};

use crate::{
    admin_routes,
    config::ServerConfig,
    errors::{AuthError, ServerError},
    integrations::{arkesel::notification_hooks, MoolreClient, PaymentGateway, SmsClient},
    moolre_routes::{init_payment, moolre_webhook, verify_payment},
    routes::{health, retrieve_vouchers, stock_levels},
    ussd_routes::ussd_callback,
};

/// The header admins present their shared secret in.
pub const ADMIN_KEY_HEADER: &str = "vpg-admin-key";

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let sms = SmsClient::new(config.sms.clone());
    let handlers = EventHandlers::new(50, notification_hooks(sms.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let gateway: Arc<dyn PaymentGateway> = Arc::new(MoolreClient::new(config.moolre.clone()));
    let srv = create_server_instance(config, db, producers, gateway, sms)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    gateway: Arc<dyn PaymentGateway>,
    sms: SmsClient,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let allocations = AllocationApi::new(db.clone(), producers.clone());
        let orders = OrderApi::new(db.clone());
        let stock = StockApi::new(db.clone());
        let sessions = SessionApi::new(db.clone());
        let settings = SettingsApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("vps::access_log"))
            .app_data(web::Data::new(allocations))
            .app_data(web::Data::new(orders))
            .app_data(web::Data::new(stock))
            .app_data(web::Data::new(sessions))
            .app_data(web::Data::new(settings))
            .app_data(web::Data::new(config.moolre.clone()))
            .app_data(web::Data::new(sms.clone()))
            .app_data(web::Data::from(gateway.clone()));
        let admin_key = config.admin_api_key.clone();
        let admin_scope = web::scope("/api")
            .wrap_fn(move |req, srv| {
                let expected = admin_key.reveal();
                let provided = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok());
                let authorized = !expected.is_empty() && provided == Some(expected.as_str());
                if authorized {
                    srv.call(req)
                } else {
                    let err = match provided {
                        None => AuthError::MissingApiKey,
                        Some(_) => {
                            warn!("💻️ Rejected admin request with a bad API key");
                            AuthError::InvalidApiKey
                        },
                    };
                    ok(req.error_response(ServerError::AuthenticationError(err))).boxed_local()
                }
            })
            .service(admin_routes::upload_stock)
            .service(admin_routes::stats)
            .service(admin_routes::search_orders)
            .service(admin_routes::list_vouchers)
            .service(admin_routes::order_vouchers)
            .service(admin_routes::fulfil_backlogged)
            .service(admin_routes::set_voucher_status)
            .service(admin_routes::delete_voucher)
            .service(admin_routes::list_settings)
            .service(admin_routes::update_setting);
        app.service(health)
            .service(stock_levels)
            .service(retrieve_vouchers)
            .service(init_payment)
            .service(verify_payment)
            .service(moolre_webhook)
            .service(ussd_callback)
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

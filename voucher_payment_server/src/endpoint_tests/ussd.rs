use actix_web::test;
use serde_json::json;
use voucher_payment_engine::{
    db_types::{OrderStatusType, UssdStage, VoucherType},
    order_objects::OrderQueryFilter,
    traits::AllocationDatabase,
};

use crate::{
    endpoint_tests::helpers::{new_test_db, scripted_gateway, seed_vouchers},
    init_test_app,
    integrations::PaymentStatus,
};

const BUYER: &str = "233241234567";

/// One USSD gateway callback. Returns the parsed response body.
macro_rules! ussd_step {
    ($app:expr, $session:expr, $new:expr, $msg:expr) => {{
        let req = test::TestRequest::post()
            .uri("/ussd")
            .set_json(json!({ "sessionId": $session, "new": $new, "msisdn": BUYER, "network": 1, "message": $msg }))
            .to_request();
        let res = test::call_service(&$app, req).await;
        assert_eq!(res.status(), actix_web::http::StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(res).await;
        body
    }};
}

async fn seed_prices(db: &voucher_payment_engine::SqliteDatabase) {
    db.set_setting("price_WASSCE", "25.00").await.unwrap();
    db.set_setting("price_BECE", "15.00").await.unwrap();
    db.set_setting("price_CSSPS", "10.00").await.unwrap();
}

#[actix_web::test]
async fn ussd_purchase_walks_the_whole_menu() {
    let db = new_test_db().await;
    seed_prices(&db).await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;
    let gateway = scripted_gateway(PaymentStatus::Paid);
    let app = init_test_app!(db, gateway);

    let body = ussd_step!(app, "sess-1", true, "");
    assert!(body["message"].as_str().unwrap().contains("WASSCE"));
    assert_eq!(body["reply"], true);

    let body = ussd_step!(app, "sess-1", false, "1");
    assert!(body["message"].as_str().unwrap().contains("How many"));

    let body = ussd_step!(app, "sess-1", false, "2");
    assert!(body["message"].as_str().unwrap().contains("2x WASSCE = GHS 50.00"));

    let body = ussd_step!(app, "sess-1", false, "1");
    assert!(body["message"].as_str().unwrap().contains("1. I have paid"));

    // The order is on the ledger before any payment is seen.
    let pending = db.search_orders(OrderQueryFilter::default().with_phone(BUYER.to_string())).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, OrderStatusType::Initiated);
    assert_eq!(pending[0].quantity, 2);

    let body = ussd_step!(app, "sess-1", false, "1");
    assert_eq!(body["reply"], false);
    assert!(body["message"].as_str().unwrap().contains("Payment received"));

    let order = db.fetch_order(&pending[0].reference).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Success);
    assert_eq!(db.fetch_vouchers_for_order(&order.reference).await.unwrap().len(), 2);
}

#[actix_web::test]
async fn ussd_session_state_survives_between_callbacks() {
    let db = new_test_db().await;
    seed_prices(&db).await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    ussd_step!(app, "sess-2", true, "");
    ussd_step!(app, "sess-2", false, "3");

    // Each callback is a separate request; the stage machine must live in the database.
    let session = db.fetch_session("sess-2").await.unwrap();
    assert_eq!(session.stage, UssdStage::SelectQty);
    assert_eq!(session.voucher_type, Some(VoucherType::Cssps));
}

#[actix_web::test]
async fn ussd_pending_payment_keeps_the_session_open() {
    let db = new_test_db().await;
    seed_prices(&db).await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    ussd_step!(app, "sess-3", true, "");
    ussd_step!(app, "sess-3", false, "1");
    ussd_step!(app, "sess-3", false, "1");
    ussd_step!(app, "sess-3", false, "1");
    let body = ussd_step!(app, "sess-3", false, "1");
    assert_eq!(body["reply"], true);
    assert!(body["message"].as_str().unwrap().contains("Payment not seen yet"));

    let session = db.fetch_session("sess-3").await.unwrap();
    assert_eq!(session.stage, UssdStage::AwaitPayment);
}

#[actix_web::test]
async fn ussd_rejects_nonsense_menu_choices() {
    let db = new_test_db().await;
    seed_prices(&db).await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    ussd_step!(app, "sess-4", true, "");
    let body = ussd_step!(app, "sess-4", false, "9");
    assert_eq!(body["reply"], true);
    assert!(body["message"].as_str().unwrap().contains("Invalid choice"));

    ussd_step!(app, "sess-4", false, "2");
    let body = ussd_step!(app, "sess-4", false, "99");
    assert!(body["message"].as_str().unwrap().contains("between 1 and"));
}

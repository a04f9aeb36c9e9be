use actix_web::{http::StatusCode, test};
use serde_json::json;
use voucher_payment_engine::{
    db_types::{OrderStatusType, VoucherType},
    traits::AllocationDatabase,
};

use crate::{
    endpoint_tests::helpers::{new_test_db, scripted_gateway, seed_order, seed_vouchers, TEST_WEBHOOK_SECRET},
    init_test_app,
    integrations::PaymentStatus,
};

#[actix_web::test]
async fn health_check() {
    let db = new_test_db().await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);
    let req = test::TestRequest::get().uri("/health").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[actix_web::test]
async fn public_stock_reports_counts_and_prices() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Bece, 4).await;
    db.set_setting("price_BECE", "15.00").await.unwrap();
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    let req = test::TestRequest::get().uri("/stock").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    let bece = body["stock"]
        .as_array()
        .unwrap()
        .iter()
        .find(|level| level["voucher_type"] == "BECE")
        .unwrap();
    assert_eq!(bece["available"], 4);
    assert_eq!(body["prices"]["BECE"], "15.00");
}

#[actix_web::test]
async fn pending_payment_returns_accepted() {
    let db = new_test_db().await;
    seed_order(&db, "waec_pending", 1).await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    let req = test::TestRequest::post()
        .uri("/verify-payment")
        .set_json(json!({ "reference": "waec_pending" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let order = db.fetch_order(&"waec_pending".to_string().into()).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Initiated);
}

#[actix_web::test]
async fn declined_payment_fails_the_order() {
    let db = new_test_db().await;
    seed_order(&db, "waec_declined", 1).await;
    let gateway = scripted_gateway(PaymentStatus::Declined);
    let app = init_test_app!(db, gateway);

    let req = test::TestRequest::post()
        .uri("/verify-payment")
        .set_json(json!({ "reference": "waec_declined" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let order = db.fetch_order(&"waec_declined".to_string().into()).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Failed);
}

#[actix_web::test]
async fn paid_order_is_fulfilled_and_retries_return_the_same_vouchers() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;
    seed_order(&db, "waec_paid", 2).await;
    let gateway = scripted_gateway(PaymentStatus::Paid);
    let app = init_test_app!(db, gateway);

    let req = test::TestRequest::post()
        .uri("/verify-payment")
        .set_json(json!({ "reference": "waec_paid" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    let first = body["vouchers"].as_array().unwrap().clone();
    assert_eq!(first.len(), 2);

    // The browser polls again. Nothing new may be claimed.
    let req = test::TestRequest::post()
        .uri("/verify-payment")
        .set_json(json!({ "reference": "waec_paid" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["vouchers"].as_array().unwrap(), &first);
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 3);
}

#[actix_web::test]
async fn paid_order_without_stock_is_backlogged() {
    let db = new_test_db().await;
    seed_order(&db, "waec_oos", 3).await;
    let gateway = scripted_gateway(PaymentStatus::Paid);
    let app = init_test_app!(db, gateway);

    let req = test::TestRequest::post()
        .uri("/verify-payment")
        .set_json(json!({ "reference": "waec_oos" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "backlogged");
    assert!(body["vouchers"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn webhook_with_bad_secret_is_ignored() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;
    seed_order(&db, "waec_hook1", 1).await;
    let gateway = scripted_gateway(PaymentStatus::Paid);
    let app = init_test_app!(db, gateway);

    let payload = json!({ "data": {
        "secret": "wrong-secret", "txstatus": 1, "externalref": "waec_hook1", "payer": "233241234567", "amount": "25.00"
    }});
    let req = test::TestRequest::post().uri("/moolre/webhook").set_json(payload).to_request();
    let res = test::call_service(&app, req).await;
    // Always 200 so the provider stops retrying, but nothing may be fulfilled.
    assert_eq!(res.status(), StatusCode::OK);
    let order = db.fetch_order(&"waec_hook1".to_string().into()).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Initiated);
}

#[actix_web::test]
async fn webhook_fulfils_a_ledger_backed_order() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;
    seed_order(&db, "waec_hook2", 2).await;
    let gateway = scripted_gateway(PaymentStatus::Paid);
    let app = init_test_app!(db, gateway);

    let payload = json!({ "data": {
        "secret": TEST_WEBHOOK_SECRET, "txstatus": 1, "externalref": "waec_hook2", "payer": "233241234567", "amount": "50.00"
    }});
    let req = test::TestRequest::post().uri("/moolre/webhook").set_json(payload).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let order = db.fetch_order(&"waec_hook2".to_string().into()).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Success);
    assert_eq!(db.fetch_vouchers_for_order(&order.reference).await.unwrap().len(), 2);
}

#[actix_web::test]
async fn init_payment_records_an_initiated_order() {
    let db = new_test_db().await;
    db.set_setting("price_WASSCE", "25.00").await.unwrap();
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    let req = test::TestRequest::post()
        .uri("/init-payment")
        .set_json(json!({ "phone": "0241234567", "voucher_type": "WASSCE", "quantity": 2 }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    let reference = body["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("waec_"));
    assert_eq!(body["payment_url"], "https://pay.moolre.test/checkout");
    let order = db.fetch_order(&reference.into()).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Initiated);
    assert_eq!(order.phone, "233241234567");
    assert_eq!(order.amount.value(), 5000);
}

#[actix_web::test]
async fn retrieve_returns_previously_sold_vouchers() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 3).await;
    seed_order(&db, "waec_retr", 2).await;
    let gateway = scripted_gateway(PaymentStatus::Paid);
    let app = init_test_app!(db, gateway);

    // Fulfil via the verify flow so the vouchers carry the buyer's phone.
    let req = test::TestRequest::post()
        .uri("/verify-payment")
        .set_json(json!({ "reference": "waec_retr" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Same number, typed the local way.
    let req = test::TestRequest::post().uri("/retrieve").set_json(json!({ "phone": "0241234567" })).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let req = test::TestRequest::post().uri("/retrieve").set_json(json!({ "phone": "0249998877" })).to_request();
    let res = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(res).await;
    assert!(body.as_array().unwrap().is_empty(), "No vouchers were sold to this phone");
}

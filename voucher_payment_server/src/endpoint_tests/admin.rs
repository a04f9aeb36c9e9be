use actix_web::{http::StatusCode, test};
use serde_json::json;
use voucher_payment_engine::{
    db_types::{OrderStatusType, VoucherType},
    traits::AllocationDatabase,
};

use crate::{
    endpoint_tests::helpers::{new_test_db, scripted_gateway, seed_order, TEST_ADMIN_KEY},
    init_test_app,
    integrations::PaymentStatus,
    server::ADMIN_KEY_HEADER,
};

#[actix_web::test]
async fn admin_endpoints_require_the_api_key() {
    let db = new_test_db().await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    let req = test::TestRequest::get().uri("/api/stats").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/api/stats").insert_header((ADMIN_KEY_HEADER, "wrong")).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get().uri("/api/stats").insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[actix_web::test]
async fn stock_upload_drains_the_backlog() {
    let db = new_test_db().await;
    // Two buyers paid against an empty shelf.
    seed_order(&db, "waec_bl1", 1).await;
    seed_order(&db, "waec_bl2", 1).await;
    let gateway = scripted_gateway(PaymentStatus::Paid);
    let app = init_test_app!(db, gateway);
    for reference in ["waec_bl1", "waec_bl2"] {
        let req = test::TestRequest::post()
            .uri("/verify-payment")
            .set_json(json!({ "reference": reference }))
            .to_request();
        test::call_service(&app, req).await;
    }
    assert_eq!(db.count_backlog(VoucherType::Wassce).await.unwrap(), 2);

    let payload = json!({
        "voucher_type": "WASSCE",
        "vouchers": [
            { "serial": "WSC-9001", "pin": "101010" },
            { "serial": "WSC-9002", "pin": "202020" },
            { "serial": "WSC-9003", "pin": "303030" },
        ],
    });
    let req = test::TestRequest::post()
        .uri("/api/stock")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .set_json(payload)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["upload"]["inserted"], 3);
    assert_eq!(body["drain"]["fulfilled_count"], 2);
    assert_eq!(body["drain"]["remaining_backlog"], 0);

    for reference in ["waec_bl1", "waec_bl2"] {
        let order = db.fetch_order(&reference.to_string().into()).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Success);
    }
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 1);
}

#[actix_web::test]
async fn duplicate_serials_in_an_upload_are_skipped() {
    let db = new_test_db().await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    let payload = json!({
        "voucher_type": "BECE",
        "vouchers": [
            { "serial": "BEC-0001", "pin": "111111" },
            { "serial": "BEC-0001", "pin": "111111" },
            { "serial": "BEC-0002", "pin": "222222" },
        ],
    });
    let req = test::TestRequest::post()
        .uri("/api/stock")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .set_json(payload)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["upload"]["inserted"], 2);
    assert_eq!(body["upload"]["skipped"], 1);
}

#[actix_web::test]
async fn settings_round_trip() {
    let db = new_test_db().await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    let req = test::TestRequest::post()
        .uri("/api/settings")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .set_json(json!({ "key": "price_WASSCE", "value": "27.50" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/settings")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .to_request();
    let res = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["price_WASSCE"], "27.50");
}

#[actix_web::test]
async fn voucher_override_listing_and_deletion() {
    let db = new_test_db().await;
    let gateway = scripted_gateway(PaymentStatus::Pending);
    let app = init_test_app!(db, gateway);

    let payload = json!({
        "voucher_type": "CSSPS",
        "vouchers": [
            { "serial": "CSS-0001", "pin": "121212" },
            { "serial": "CSS-0002", "pin": "343434" },
        ],
    });
    let req = test::TestRequest::post()
        .uri("/api/stock")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .set_json(payload)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    // A buyer scratched CSS-0001, so the operator retires it by hand.
    let req = test::TestRequest::post()
        .uri("/api/vouchers/status")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .set_json(json!({ "serials": ["CSS-0001"], "status": "used" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/vouchers?status=used")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .to_request();
    let res = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(res).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["serial"], "CSS-0001");

    let req = test::TestRequest::delete()
        .uri("/api/vouchers/CSS-0002")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(db.count_available(VoucherType::Cssps).await.unwrap(), 0);

    let req = test::TestRequest::delete()
        .uri("/api/vouchers/CSS-0002")
        .insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

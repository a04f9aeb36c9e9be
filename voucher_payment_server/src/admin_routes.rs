//! Operator endpoints, mounted under `/api` behind the shared-secret header check in `server.rs`.
use actix_web::{delete, get, post, web, HttpResponse};
use log::*;
use serde_json::json;
use voucher_payment_engine::{
    db_types::{NewVoucher, OrderReference, OrderStatusType, VoucherType},
    order_objects::{OrderQueryFilter, VoucherQueryFilter},
    traits::AllocationOutcome,
    AllocationApi,
    OrderApi,
    SettingsApi,
    SqliteDatabase,
    StockApi,
};

use crate::{
    data_objects::{BacklogFulfilRequest, JsonResponse, SettingUpdateRequest, StockUploadRequest, VoucherStatusUpdateRequest},
    errors::ServerError,
};

/// Stock upload. Inserts the batch, then immediately runs one backlog drain pass for the type so waiting buyers
/// get their vouchers without further operator action.
#[post("/stock")]
pub async fn upload_stock(
    body: web::Json<StockUploadRequest>,
    stock: web::Data<StockApi<SqliteDatabase>>,
    allocations: web::Data<AllocationApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let batch = req
        .vouchers
        .into_iter()
        .map(|line| NewVoucher::new(req.voucher_type, line.serial, line.pin))
        .collect::<Vec<_>>();
    let upload = stock.upload(&batch).await?;
    let drain = allocations.drain_backlog(req.voucher_type).await?;
    info!(
        "🗃️ Stock upload for {}: {} inserted, {} skipped. Drain: {} fulfilled, {} still backlogged.",
        req.voucher_type, upload.inserted, upload.skipped, drain.fulfilled_count, drain.remaining_backlog
    );
    Ok(HttpResponse::Ok().json(json!({ "upload": upload, "drain": drain })))
}

/// Dashboard stats: per-type voucher counts, backlog depth and total revenue.
#[get("/stats")]
pub async fn stats(
    stock: web::Data<StockApi<SqliteDatabase>>,
    orders: web::Data<OrderApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let counts = stock.voucher_counts().await?;
    let mut backlog = Vec::with_capacity(VoucherType::ALL.len());
    for voucher_type in VoucherType::ALL {
        let queued = orders
            .search(OrderQueryFilter::default().with_voucher_type(voucher_type).with_status(OrderStatusType::Backlogged))
            .await?;
        backlog.push(json!({ "voucher_type": voucher_type, "queued": queued.len() }));
    }
    let revenue = orders.total_revenue().await?;
    Ok(HttpResponse::Ok().json(json!({ "vouchers": counts, "backlog": backlog, "total_revenue": revenue })))
}

/// Order ledger search. All filter fields are optional query parameters.
#[get("/orders")]
pub async fn search_orders(
    query: web::Query<OrderQueryFilter>,
    orders: web::Data<OrderApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let filter = query.into_inner();
    trace!("💻️ Order search: {filter}");
    let result = orders.search(filter).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Voucher listing for the dashboard. Optional filters on type, status, and a serial/PIN/phone substring.
#[get("/vouchers")]
pub async fn list_vouchers(
    query: web::Query<VoucherQueryFilter>,
    stock: web::Data<StockApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let vouchers = stock.search(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(vouchers))
}

/// The vouchers bound to one order.
#[get("/orders/{reference}/vouchers")]
pub async fn order_vouchers(
    path: web::Path<String>,
    orders: web::Data<OrderApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let reference = OrderReference::from(path.into_inner());
    let vouchers = orders.vouchers_for_order(&reference).await?;
    Ok(HttpResponse::Ok().json(vouchers))
}

/// Manually fulfil a backlogged order after a restock, without waiting for a drain pass.
#[post("/backlog/fulfil")]
pub async fn fulfil_backlogged(
    body: web::Json<BacklogFulfilRequest>,
    allocations: web::Data<AllocationApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let reference = OrderReference::from(body.into_inner().reference);
    let outcome = allocations.fulfil_order(&reference).await?;
    let response = match outcome {
        AllocationOutcome::Fulfilled { order, vouchers } | AllocationOutcome::AlreadyFulfilled { order, vouchers } => {
            json!({ "order": order, "vouchers": vouchers })
        },
        AllocationOutcome::Backlogged { order, .. } => {
            json!({ "order": order, "message": "Still insufficient stock for this order." })
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Admin override of voucher statuses, e.g. marking handed-out serials as used.
#[post("/vouchers/status")]
pub async fn set_voucher_status(
    body: web::Json<VoucherStatusUpdateRequest>,
    stock: web::Data<StockApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let updated = stock.set_status(&req.serials, req.status).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{updated} voucher(s) updated"))))
}

#[delete("/vouchers/{serial}")]
pub async fn delete_voucher(
    path: web::Path<String>,
    stock: web::Data<StockApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let serial = path.into_inner();
    if stock.delete(&serial).await? {
        Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Voucher {serial} deleted"))))
    } else {
        Err(ServerError::NoRecordFound(format!("Voucher {serial}")))
    }
}

#[get("/settings")]
pub async fn list_settings(settings: web::Data<SettingsApi<SqliteDatabase>>) -> Result<HttpResponse, ServerError> {
    let all = settings.all().await?;
    let map = all.into_iter().collect::<std::collections::BTreeMap<_, _>>();
    Ok(HttpResponse::Ok().json(map))
}

#[post("/settings")]
pub async fn update_setting(
    body: web::Json<SettingUpdateRequest>,
    settings: web::Data<SettingsApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    if req.key.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("Setting key must not be empty".to_string()));
    }
    settings.set(&req.key, &req.value).await?;
    info!("🪛️ Setting {} updated", req.key);
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Setting {} updated", req.key))))
}

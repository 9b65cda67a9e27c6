pub mod handlers;

pub use handlers::*;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::service::BillingService;

/// 全部路由
pub fn router(service: Arc<BillingService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/bills", get(list_bills))
        .route("/api/bills/export", get(export_bills))
        .route("/api/bills/print", post(print_bulk))
        .route("/api/bills/:bill_id/amount", put(set_bill_amount))
        .route("/api/bills/:bill_id/finalize", post(finalize_bill))
        .route("/api/bills/:bill_id/print", post(print_bill))
        .route("/api/bills/:bill_id/items/:item_id/price", put(update_item_price))
        .route("/api/orders/:order_id/amount", put(set_order_amount))
        .route("/api/doctors", get(list_doctors))
        .route("/api/consolidated", post(print_monthly))
        .with_state(service)
}

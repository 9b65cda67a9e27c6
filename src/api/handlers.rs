use crate::error::BillingError;
use crate::models::lenient;
use crate::service::pricing::parse_amount;
use crate::service::{BillingFilter, BillingService, StatusFilter};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// 统一响应体
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn success<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    let response = ApiResponse {
        success: true,
        message: message.into(),
        data: Some(data),
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn failure(err: BillingError) -> Response {
    let status = match &err {
        BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
        BillingError::InconsistentPricing(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BillingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => {
            tracing::error!("request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let response: ApiResponse<()> = ApiResponse {
        success: false,
        message: format!("Error: {}", err),
        data: None,
    };
    (status, Json(response)).into_response()
}

/// 列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct BillQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub doctor: Option<String>,
    pub serial: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl BillQuery {
    fn filter(&self) -> BillingFilter {
        BillingFilter {
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            status: self
                .status
                .as_deref()
                .map(StatusFilter::from)
                .unwrap_or_default(),
            doctor_substring: self.doctor.clone(),
            serial_substring: self.serial.clone(),
        }
    }
}

/// 金额请求体，金额可为数字或字符串
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    #[serde(default, deserialize_with = "lenient::amount", alias = "price")]
    pub amount: Option<BigDecimal>,
}

impl AmountRequest {
    fn require(self) -> Result<BigDecimal, BillingError> {
        self.amount
            .ok_or_else(|| BillingError::InvalidRequest("amount must be a number".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkPrintRequest {
    pub bill_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyRequestBody {
    pub doctor: String,
    pub month: String,
    /// 工单 ID -> 价格，非数值的条目忽略
    #[serde(default)]
    pub prices: HashMap<String, Value>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 账单列表（过滤 + 分页）
pub async fn list_bills(
    State(service): State<Arc<BillingService>>,
    Query(query): Query<BillQuery>,
) -> Response {
    let filter = query.filter();
    match service
        .list_bills(&filter, query.page.unwrap_or(1), query.page_size)
        .await
    {
        Ok(page) => {
            let message = if page.is_empty {
                "No bills match the current filter".to_string()
            } else {
                format!(
                    "Page {}/{} of {} bills",
                    page.window.current_page, page.window.total_pages, page.window.total_items
                )
            };
            success(message, page)
        }
        Err(e) => failure(e),
    }
}

/// 导出 CSV
pub async fn export_bills(
    State(service): State<Arc<BillingService>>,
    Query(query): Query<BillQuery>,
) -> Response {
    let mut body = Vec::new();
    match service.export_csv(&query.filter(), &mut body).await {
        Ok(_) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"bills.csv\""),
            ],
            body,
        )
            .into_response(),
        Err(e) => failure(e),
    }
}

pub async fn set_bill_amount(
    State(service): State<Arc<BillingService>>,
    Path(bill_id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Response {
    let result = match req.require() {
        Ok(amount) => service.set_bill_amount(&bill_id, amount).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => success(format!("Bill {} priced", bill_id), bill_id),
        Err(e) => failure(e),
    }
}

pub async fn finalize_bill(
    State(service): State<Arc<BillingService>>,
    Path(bill_id): Path<String>,
) -> Response {
    match service.finalize_itemized(&bill_id).await {
        Ok(total) => success(format!("Bill {} finalized", bill_id), total),
        Err(e) => failure(e),
    }
}

pub async fn update_item_price(
    State(service): State<Arc<BillingService>>,
    Path((bill_id, item_id)): Path<(String, String)>,
    Json(req): Json<AmountRequest>,
) -> Response {
    let result = match req.require() {
        Ok(price) => service.update_item_price(&bill_id, &item_id, price).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(update) => success(format!("Item {} updated", item_id), update),
        Err(e) => failure(e),
    }
}

pub async fn set_order_amount(
    State(service): State<Arc<BillingService>>,
    Path(order_id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Response {
    let result = match req.require() {
        Ok(amount) => service.set_order_amount(&order_id, amount).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => success(format!("Work order {} priced", order_id), order_id),
        Err(e) => failure(e),
    }
}

pub async fn print_bill(
    State(service): State<Arc<BillingService>>,
    Path(bill_id): Path<String>,
) -> Response {
    match service.print_bill(&bill_id).await {
        Ok(outcome) => success(format!("Bill {} sent to printer", bill_id), outcome),
        Err(e) => failure(e),
    }
}

/// 批量打印，未定价账单被跳过并计数
pub async fn print_bulk(
    State(service): State<Arc<BillingService>>,
    Json(req): Json<BulkPrintRequest>,
) -> Response {
    match service.print_bulk(&req.bill_ids).await {
        Ok(outcome) => {
            let message = format!(
                "Printed {} bills, skipped {} unpriced",
                outcome.outcome.rows, outcome.skipped
            );
            success(message, outcome)
        }
        Err(e) => failure(e),
    }
}

/// 医生月结单
pub async fn print_monthly(
    State(service): State<Arc<BillingService>>,
    Json(req): Json<MonthlyRequestBody>,
) -> Response {
    let prices: HashMap<String, BigDecimal> = req
        .prices
        .iter()
        .filter_map(|(id, raw)| parse_amount(raw).map(|p| (id.clone(), p)))
        .collect();
    match service.print_monthly(&req.doctor, &req.month, &prices).await {
        Ok(outcome) => {
            let message = if outcome.printed {
                format!("Monthly statement for {} printed ({} orders)", req.doctor, outcome.rows)
            } else {
                format!("No completed work for {} in {}", req.doctor, req.month)
            };
            success(message, outcome)
        }
        Err(e) => failure(e),
    }
}

pub async fn list_doctors(State(service): State<Arc<BillingService>>) -> Response {
    match service.doctors().await {
        Ok(doctors) => success(format!("{} doctors", doctors.len()), doctors),
        Err(e) => failure(e),
    }
}

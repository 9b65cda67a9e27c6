use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;

use super::store::{BillStore, WorkOrderStore};
use crate::error::{BillingError, BillingResult};
use crate::models::{Bill, BillItem, BillStatus, WorkOrder, WorkOrderStatus};

/// 工单行 (work_orders)
#[derive(Debug, Clone, FromRow)]
struct WorkOrderRow {
    id: String,
    serial_number: Option<String>,
    doctor_name: Option<String>,
    patient_name: Option<String>,
    product_quality: Option<String>,
    product_shade: Option<String>,
    tooth_selection: Option<Value>,
    order_date: Option<String>,
    expected_complete_date: Option<String>,
    completion_date: Option<String>,
    status: Option<String>,
    batch_id: Option<String>,
    amount: Option<BigDecimal>,
    is_urgent: Option<bool>,
}

impl From<WorkOrderRow> for WorkOrder {
    fn from(row: WorkOrderRow) -> Self {
        Self {
            id: row.id,
            serial_number: row.serial_number.unwrap_or_default(),
            doctor_name: row.doctor_name.unwrap_or_default(),
            patient_name: row.patient_name.unwrap_or_default(),
            product_quality: row.product_quality.unwrap_or_default(),
            product_shade: row.product_shade.unwrap_or_default(),
            tooth_selection: row.tooth_selection.unwrap_or(Value::Null),
            order_date: row.order_date.unwrap_or_default(),
            expected_complete_date: row.expected_complete_date,
            completion_date: row.completion_date,
            status: WorkOrderStatus::parse(row.status.as_deref().unwrap_or_default()),
            batch_id: row.batch_id,
            amount: row.amount,
            is_urgent: row.is_urgent.unwrap_or(false),
        }
    }
}

/// 账单行 (bills)
#[derive(Debug, Clone, FromRow)]
struct BillRow {
    id: String,
    serial_number: Option<String>,
    doctor_name: Option<String>,
    patient_name: Option<String>,
    work_description: Option<String>,
    bill_date: Option<String>,
    is_grouped: Option<bool>,
    batch_id: Option<String>,
    amount: Option<BigDecimal>,
    status: Option<String>,
}

impl From<BillRow> for Bill {
    fn from(row: BillRow) -> Self {
        Self {
            id: row.id,
            serial_number: row.serial_number.unwrap_or_default(),
            doctor_name: row.doctor_name.unwrap_or_default(),
            patient_name: row.patient_name.unwrap_or_default(),
            work_description: row.work_description.unwrap_or_default(),
            bill_date: row.bill_date.unwrap_or_default(),
            is_grouped: row.is_grouped.unwrap_or(false),
            batch_id: row.batch_id,
            amount: row.amount,
            status: row.status.map(BillStatus::from).unwrap_or_default(),
            items: Vec::new(),
        }
    }
}

/// 账单明细行 (bill_items)
#[derive(Debug, Clone, FromRow)]
struct BillItemRow {
    id: String,
    bill_id: String,
    serial_number: Option<String>,
    item_description: Option<String>,
    product_quality: Option<String>,
    product_shade: Option<String>,
    unit_price: Option<BigDecimal>,
    total_price: Option<BigDecimal>,
    notes: Option<String>,
}

impl From<BillItemRow> for BillItem {
    fn from(row: BillItemRow) -> Self {
        Self {
            id: row.id,
            bill_id: row.bill_id,
            serial_number: row.serial_number.unwrap_or_default(),
            item_description: row.item_description.unwrap_or_default(),
            product_quality: row.product_quality.unwrap_or_default(),
            product_shade: row.product_shade.filter(|s| !s.trim().is_empty()),
            unit_price: row.unit_price,
            total_price: row.total_price,
            notes: row.notes,
        }
    }
}

const WORK_ORDER_COLUMNS: &str = r#"
    id::text AS id,
    serial_number,
    doctor_name,
    patient_name,
    product_quality,
    product_shade,
    to_jsonb(tooth_selection) AS tooth_selection,
    to_char(order_date, 'YYYY-MM-DD') AS order_date,
    to_char(expected_complete_date, 'YYYY-MM-DD') AS expected_complete_date,
    to_char(completion_date, 'YYYY-MM-DD') AS completion_date,
    status::text AS status,
    batch_id::text AS batch_id,
    amount,
    is_urgent
"#;

const BILL_COLUMNS: &str = r#"
    id::text AS id,
    serial_number,
    doctor_name,
    patient_name,
    work_description,
    to_char(bill_date, 'YYYY-MM-DD') AS bill_date,
    is_grouped,
    batch_id::text AS batch_id,
    amount,
    status::text AS status
"#;

const BILL_ITEM_COLUMNS: &str = r#"
    id::text AS id,
    bill_id::text AS bill_id,
    serial_number,
    item_description,
    product_quality,
    product_shade,
    unit_price,
    total_price,
    notes
"#;

/// Postgres 存储
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 批量查询多个账单的明细
    async fn list_items_for(&self, bill_ids: &[String]) -> Result<Vec<BillItem>, sqlx::Error> {
        if bill_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {BILL_ITEM_COLUMNS} FROM bill_items WHERE bill_id::text = ANY($1) ORDER BY serial_number, id"
        );
        let rows = sqlx::query_as::<_, BillItemRow>(&sql)
            .bind(bill_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(BillItem::from).collect())
    }

    async fn attach_items(&self, bills: &mut [Bill]) -> Result<(), sqlx::Error> {
        let ids: Vec<String> = bills.iter().map(|b| b.id.clone()).collect();
        // 每 1000 个账单分块查询
        let mut by_bill: HashMap<String, Vec<BillItem>> = HashMap::new();
        for chunk in ids.chunks(1000) {
            for item in self.list_items_for(chunk).await? {
                by_bill.entry(item.bill_id.clone()).or_default().push(item);
            }
        }
        for bill in bills.iter_mut() {
            bill.items = by_bill.remove(&bill.id).unwrap_or_default();
        }
        Ok(())
    }
}

fn ensure_updated(rows_affected: u64, entity: &'static str, id: &str) -> BillingResult<()> {
    if rows_affected == 0 {
        return Err(BillingError::not_found(entity, id));
    }
    Ok(())
}

#[async_trait]
impl WorkOrderStore for PgStore {
    async fn list_work_orders(&self) -> BillingResult<Vec<WorkOrder>> {
        let sql = format!(
            "SELECT {WORK_ORDER_COLUMNS} FROM work_orders ORDER BY order_date ASC, serial_number ASC"
        );
        let rows = sqlx::query_as::<_, WorkOrderRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        tracing::debug!("loaded {} work orders", rows.len());
        Ok(rows.into_iter().map(WorkOrder::from).collect())
    }

    async fn update_amount(&self, id: &str, amount: &BigDecimal) -> BillingResult<()> {
        let result = sqlx::query("UPDATE work_orders SET amount = $2 WHERE id::text = $1")
            .bind(id)
            .bind(amount.clone())
            .execute(&self.pool)
            .await?;
        ensure_updated(result.rows_affected(), "work order", id)
    }
}

#[async_trait]
impl BillStore for PgStore {
    async fn list_bills(&self, with_items: bool) -> BillingResult<Vec<Bill>> {
        let sql = format!(
            "SELECT {BILL_COLUMNS} FROM bills ORDER BY bill_date DESC, serial_number ASC"
        );
        let rows = sqlx::query_as::<_, BillRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        let mut bills: Vec<Bill> = rows.into_iter().map(Bill::from).collect();
        if with_items {
            self.attach_items(&mut bills).await?;
        }
        tracing::debug!("loaded {} bills (items: {})", bills.len(), with_items);
        Ok(bills)
    }

    async fn get_bill(&self, id: &str, with_items: bool) -> BillingResult<Option<Bill>> {
        let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE id::text = $1");
        let row = sqlx::query_as::<_, BillRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut bills = vec![Bill::from(row)];
        if with_items {
            self.attach_items(&mut bills).await?;
        }
        Ok(bills.pop())
    }

    async fn update_bill_amount(&self, id: &str, amount: &BigDecimal) -> BillingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bills
            SET amount = $2,
                status = CASE WHEN status = 'pending' THEN 'priced' ELSE status END
            WHERE id::text = $1
            "#,
        )
        .bind(id)
        .bind(amount.clone())
        .execute(&self.pool)
        .await?;
        ensure_updated(result.rows_affected(), "bill", id)
    }

    async fn update_item_price(&self, item_id: &str, price: &BigDecimal) -> BillingResult<()> {
        let result = sqlx::query(
            "UPDATE bill_items SET unit_price = $2, total_price = $2 WHERE id::text = $1",
        )
        .bind(item_id)
        .bind(price.clone())
        .execute(&self.pool)
        .await?;
        ensure_updated(result.rows_affected(), "bill item", item_id)
    }

    async fn mark_printed(&self, id: &str) -> BillingResult<()> {
        let result = sqlx::query("UPDATE bills SET status = 'printed' WHERE id::text = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        ensure_updated(result.rows_affected(), "bill", id)
    }
}

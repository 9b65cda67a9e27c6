//! 外部存储契约
//!
//! 本核心只读取工单/账单快照，并回写少量价格字段。并发写入不做协调，
//! 后完成的调用生效。

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::error::BillingResult;
use crate::models::{Bill, WorkOrder};

#[async_trait]
pub trait WorkOrderStore: Send + Sync {
    /// 全部工单，按下单日期、流水号升序
    async fn list_work_orders(&self) -> BillingResult<Vec<WorkOrder>>;

    async fn update_amount(&self, id: &str, amount: &BigDecimal) -> BillingResult<()>;
}

#[async_trait]
pub trait BillStore: Send + Sync {
    /// 全部账单，按账单日期降序、流水号升序
    async fn list_bills(&self, with_items: bool) -> BillingResult<Vec<Bill>>;

    async fn get_bill(&self, id: &str, with_items: bool) -> BillingResult<Option<Bill>>;

    /// 写入金额；存储状态仍为 pending 时一并改为 priced
    async fn update_bill_amount(&self, id: &str, amount: &BigDecimal) -> BillingResult<()>;

    /// 同时写入单价与总价
    async fn update_item_price(&self, item_id: &str, price: &BigDecimal) -> BillingResult<()>;

    async fn mark_printed(&self, id: &str) -> BillingResult<()>;
}

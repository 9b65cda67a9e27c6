//! 内存存储（本地演示与测试用）

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use dashmap::DashMap;

use super::store::{BillStore, WorkOrderStore};
use crate::error::{BillingError, BillingResult};
use crate::models::{Bill, BillStatus, WorkOrder};

#[derive(Debug, Default)]
pub struct MemoryStore {
    work_orders: DashMap<String, WorkOrder>,
    bills: DashMap<String, Bill>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(work_orders: Vec<WorkOrder>, bills: Vec<Bill>) -> Self {
        let store = Self::new();
        for order in work_orders {
            store.insert_work_order(order);
        }
        for bill in bills {
            store.insert_bill(bill);
        }
        store
    }

    pub fn insert_work_order(&self, order: WorkOrder) {
        self.work_orders.insert(order.id.clone(), order);
    }

    /// 明细的 bill_id 以所属账单为准
    pub fn insert_bill(&self, mut bill: Bill) {
        for item in bill.items.iter_mut() {
            item.bill_id = bill.id.clone();
        }
        self.bills.insert(bill.id.clone(), bill);
    }
}

fn without_items(mut bill: Bill) -> Bill {
    bill.items.clear();
    bill
}

#[async_trait]
impl WorkOrderStore for MemoryStore {
    async fn list_work_orders(&self) -> BillingResult<Vec<WorkOrder>> {
        let mut orders: Vec<WorkOrder> = self.work_orders.iter().map(|e| e.value().clone()).collect();
        orders.sort_by(|a, b| {
            a.order_date
                .cmp(&b.order_date)
                .then_with(|| a.serial_number.cmp(&b.serial_number))
        });
        Ok(orders)
    }

    async fn update_amount(&self, id: &str, amount: &BigDecimal) -> BillingResult<()> {
        let mut order = self
            .work_orders
            .get_mut(id)
            .ok_or_else(|| BillingError::not_found("work order", id))?;
        order.amount = Some(amount.clone());
        Ok(())
    }
}

#[async_trait]
impl BillStore for MemoryStore {
    async fn list_bills(&self, with_items: bool) -> BillingResult<Vec<Bill>> {
        let mut bills: Vec<Bill> = self
            .bills
            .iter()
            .map(|e| e.value().clone())
            .map(|b| if with_items { b } else { without_items(b) })
            .collect();
        bills.sort_by(|a, b| {
            b.bill_date
                .cmp(&a.bill_date)
                .then_with(|| a.serial_number.cmp(&b.serial_number))
        });
        Ok(bills)
    }

    async fn get_bill(&self, id: &str, with_items: bool) -> BillingResult<Option<Bill>> {
        Ok(self
            .bills
            .get(id)
            .map(|e| e.value().clone())
            .map(|b| if with_items { b } else { without_items(b) }))
    }

    async fn update_bill_amount(&self, id: &str, amount: &BigDecimal) -> BillingResult<()> {
        let mut bill = self
            .bills
            .get_mut(id)
            .ok_or_else(|| BillingError::not_found("bill", id))?;
        bill.amount = Some(amount.clone());
        if bill.status == BillStatus::Pending {
            bill.status = BillStatus::Priced;
        }
        Ok(())
    }

    async fn update_item_price(&self, item_id: &str, price: &BigDecimal) -> BillingResult<()> {
        for mut bill in self.bills.iter_mut() {
            if let Some(item) = bill.items.iter_mut().find(|i| i.id == item_id) {
                item.set_unit_price(Some(price.clone()));
                return Ok(());
            }
        }
        Err(BillingError::not_found("bill item", item_id))
    }

    async fn mark_printed(&self, id: &str) -> BillingResult<()> {
        let mut bill = self
            .bills
            .get_mut(id)
            .ok_or_else(|| BillingError::not_found("bill", id))?;
        bill.status = BillStatus::Printed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        let bills: Vec<Bill> = serde_json::from_value(json!([
            {"id": "b1", "serial_number": "S-2", "bill_date": "2024-03-01",
             "items": [{"id": "i1", "unit_price": 5, "total_price": 5}]},
            {"id": "b2", "serial_number": "S-1", "bill_date": "2024-03-01"},
            {"id": "b3", "serial_number": "S-0", "bill_date": "2024-02-01"}
        ]))
        .unwrap();
        MemoryStore::with_data(Vec::new(), bills)
    }

    #[tokio::test]
    async fn lists_newest_first_then_by_serial() {
        let bills = store().list_bills(false).await.unwrap();
        let ids: Vec<&str> = bills.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b2", "b1", "b3"]);
        assert!(bills.iter().all(|b| b.items.is_empty()));
    }

    #[tokio::test]
    async fn item_price_update_syncs_total() {
        let store = store();
        store.update_item_price("i1", &BigDecimal::from(70)).await.unwrap();
        let bill = store.get_bill("b1", true).await.unwrap().unwrap();
        assert_eq!(bill.items[0].bill_id, "b1");
        assert_eq!(bill.items[0].total_price, Some(BigDecimal::from(70)));
    }

    #[tokio::test]
    async fn amount_update_promotes_pending_status() {
        let store = store();
        store.update_bill_amount("b2", &BigDecimal::from(10)).await.unwrap();
        let bill = store.get_bill("b2", false).await.unwrap().unwrap();
        assert_eq!(bill.status, BillStatus::Priced);

        store.mark_printed("b2").await.unwrap();
        store.update_bill_amount("b2", &BigDecimal::from(12)).await.unwrap();
        let bill = store.get_bill("b2", false).await.unwrap().unwrap();
        assert_eq!(bill.status, BillStatus::Printed);
    }

    #[tokio::test]
    async fn missing_records_report_not_found() {
        let store = store();
        assert!(matches!(
            store.mark_printed("nope").await,
            Err(BillingError::NotFound { entity: "bill", .. })
        ));
        assert!(store.update_item_price("nope", &BigDecimal::from(1)).await.is_err());
        assert!(store.update_amount("nope", &BigDecimal::from(1)).await.is_err());
    }
}

use bigdecimal::{BigDecimal, Zero};
use chrono::Local;
use indexmap::IndexSet;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use super::document::{
    BillingMonth, ConsolidatedDocumentBuilder, Document, DocumentKind, DocumentOptions,
    DocumentSource, MonthlyRequest,
};
use super::doctor::DoctorDirectory;
use super::filter::{self, BillingFilter};
use super::paginator::{self, PageButton, PageWindow};
use super::pricing;
use super::status::{self, DisplayStatus};
use super::export;
use crate::config::BillingConfig;
use crate::db::{BillStore, WorkOrderStore};
use crate::error::{BillingError, BillingResult};
use crate::models::Bill;
use crate::print::{PrintJob, PrintSink};

/// 列表中的一行：账单 + 推导出的显示状态
#[derive(Debug, Clone, Serialize)]
pub struct BillRow {
    #[serde(flatten)]
    pub bill: Bill,
    pub display_status: DisplayStatus,
    pub status_class: &'static str,
}

impl BillRow {
    fn new(bill: Bill) -> Self {
        let display_status = status::resolve(&bill);
        let status_class = display_status.tag.css_class();
        Self {
            bill,
            display_status,
            status_class,
        }
    }
}

/// 一页账单列表
#[derive(Debug, Clone, Serialize)]
pub struct BillPage {
    pub rows: Vec<BillRow>,
    pub window: PageWindow,
    pub pages: Vec<PageButton>,
    /// 过滤结果（全部页）的金额合计
    pub filtered_total: BigDecimal,
    /// 过滤后没有任何账单
    pub is_empty: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrintOutcome {
    pub kind: DocumentKind,
    pub name: String,
    pub rows: usize,
    pub total: BigDecimal,
    /// 空单据不会提交到打印出口
    pub printed: bool,
}

impl PrintOutcome {
    fn from_document(document: &Document, printed: bool) -> Self {
        Self {
            kind: document.kind,
            name: document.slug(),
            rows: document.rows.len(),
            total: document.total.clone(),
            printed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkPrintOutcome {
    #[serde(flatten)]
    pub outcome: PrintOutcome,
    /// 未定价或不存在而被跳过的账单数
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemPriceUpdate {
    pub bill_id: String,
    pub item_id: String,
    pub items_total: BigDecimal,
}

/// 计费服务：在存储快照上做推导，并把价格修改与打印结果回写
pub struct BillingService {
    work_orders: Arc<dyn WorkOrderStore>,
    bills: Arc<dyn BillStore>,
    sink: Arc<dyn PrintSink>,
    settings: BillingConfig,
}

fn reject_non_positive(amount: &BigDecimal, what: &str) -> BillingResult<()> {
    if *amount <= BigDecimal::zero() {
        return Err(BillingError::InconsistentPricing(format!(
            "{} must be greater than zero (got {})",
            what,
            pricing::format_amount(amount)
        )));
    }
    Ok(())
}

fn reject_negative(amount: &BigDecimal, what: &str) -> BillingResult<()> {
    if *amount < BigDecimal::zero() {
        return Err(BillingError::InconsistentPricing(format!(
            "{} cannot be negative (got {})",
            what,
            pricing::format_amount(amount)
        )));
    }
    Ok(())
}

impl BillingService {
    pub fn new(
        work_orders: Arc<dyn WorkOrderStore>,
        bills: Arc<dyn BillStore>,
        sink: Arc<dyn PrintSink>,
        settings: BillingConfig,
    ) -> Self {
        Self {
            work_orders,
            bills,
            sink,
            settings,
        }
    }

    fn document_options(&self) -> DocumentOptions {
        DocumentOptions::new(&self.settings.lab_name, &self.settings.currency_symbol)
            .generated_at(Local::now().format("%d-%m-%Y %H:%M").to_string())
    }

    async fn require_bill(&self, id: &str, with_items: bool) -> BillingResult<Bill> {
        self.bills
            .get_bill(id, with_items)
            .await?
            .ok_or_else(|| BillingError::not_found("bill", id))
    }

    /// 过滤 + 分页。页码越界回到第 1 页
    pub async fn list_bills(
        &self,
        filter: &BillingFilter,
        page: usize,
        page_size: Option<usize>,
    ) -> BillingResult<BillPage> {
        let bills = self.bills.list_bills(false).await?;
        let filtered = filter::apply(&bills, filter);
        let window = paginator::window(
            filtered.len(),
            page_size.unwrap_or(self.settings.page_size),
            page,
        );
        let rows = paginator::slice(&filtered, &window)
            .iter()
            .map(|bill| BillRow::new((*bill).clone()))
            .collect();
        let filtered_total = pricing::total(filtered.iter().copied());

        tracing::debug!(
            "bill listing: {} of {} bills match, page {}/{}",
            filtered.len(),
            bills.len(),
            window.current_page,
            window.total_pages
        );

        Ok(BillPage {
            rows,
            pages: paginator::page_numbers(&window),
            window,
            filtered_total,
            is_empty: filtered.is_empty(),
        })
    }

    /// 导出过滤后的全部账单（不分页）
    pub async fn export_csv<W: Write + Send>(
        &self,
        filter: &BillingFilter,
        writer: W,
    ) -> BillingResult<usize> {
        let bills = self.bills.list_bills(false).await?;
        let filtered = filter::apply(&bills, filter);
        let written = export::bills_to_csv(&filtered, writer)?;
        tracing::info!("exported {} bills to csv", written);
        Ok(written)
    }

    /// 去重后的医生列表（保留首次出现的写法）
    pub async fn doctors(&self) -> BillingResult<Vec<String>> {
        let orders = self.work_orders.list_work_orders().await?;
        let directory = DoctorDirectory::from_names(orders.iter().map(|o| o.doctor_name.as_str()));
        Ok(directory.names().map(str::to_string).collect())
    }

    pub async fn set_order_amount(&self, order_id: &str, amount: BigDecimal) -> BillingResult<()> {
        reject_negative(&amount, "Order amount")?;
        self.work_orders.update_amount(order_id, &amount).await?;
        tracing::info!("work order {} priced at {}", order_id, pricing::format_amount(&amount));
        Ok(())
    }

    /// 直接设定账单金额（定稿），金额必须 > 0
    pub async fn set_bill_amount(&self, bill_id: &str, amount: BigDecimal) -> BillingResult<()> {
        reject_non_positive(&amount, "Bill amount")?;
        self.bills.update_bill_amount(bill_id, &amount).await?;
        tracing::info!("bill {} amount set to {}", bill_id, pricing::format_amount(&amount));
        Ok(())
    }

    /// 修改明细单价，返回重新计算的明细合计
    pub async fn update_item_price(
        &self,
        bill_id: &str,
        item_id: &str,
        price: BigDecimal,
    ) -> BillingResult<ItemPriceUpdate> {
        reject_negative(&price, "Item price")?;
        let mut bill = self.require_bill(bill_id, true).await?;
        if !pricing::set_unit_price(&mut bill.items, item_id, Some(price.clone())) {
            return Err(BillingError::not_found("bill item", item_id));
        }
        self.bills.update_item_price(item_id, &price).await?;

        let items_total = pricing::items_total(&bill.items);
        tracing::debug!("bill {} items total now {}", bill_id, items_total);
        Ok(ItemPriceUpdate {
            bill_id: bill_id.to_string(),
            item_id: item_id.to_string(),
            items_total,
        })
    }

    /// 明细合计写回账单金额；合计 <= 0 时拒绝，不做任何修改
    pub async fn finalize_itemized(&self, bill_id: &str) -> BillingResult<BigDecimal> {
        let bill = self.require_bill(bill_id, true).await?;
        if bill.items.is_empty() {
            return Err(BillingError::InconsistentPricing(format!(
                "Bill {} has no items to finalize",
                bill.serial_number
            )));
        }
        let total = pricing::items_total(&bill.items);
        reject_non_positive(&total, "Bill total")?;
        self.bills.update_bill_amount(bill_id, &total).await?;
        tracing::info!(
            "bill {} finalized from {} items: {}",
            bill.serial_number,
            bill.items.len(),
            pricing::format_amount(&total)
        );
        Ok(total)
    }

    async fn submit(&self, document: &Document) -> BillingResult<()> {
        self.sink.submit(PrintJob::from_document(document)).await?;
        Ok(())
    }

    /// 打印单张账单：有明细的合并账单按明细出行，否则单行
    pub async fn print_bill(&self, bill_id: &str) -> BillingResult<PrintOutcome> {
        let (bill, orders) = futures::try_join!(
            self.require_bill(bill_id, true),
            self.work_orders.list_work_orders()
        )?;
        // 合并账单的明细合计在定稿前不算定价
        if !status::has_amount(bill.amount.as_ref()) {
            return Err(BillingError::InconsistentPricing(format!(
                "Bill {} has no price yet; price it before printing",
                bill.serial_number
            )));
        }

        let builder = ConsolidatedDocumentBuilder::new(self.document_options()).with_work_orders(&orders);
        let source = if bill.is_grouped && !bill.items.is_empty() {
            DocumentSource::Grouped(&bill)
        } else {
            DocumentSource::Single(&bill)
        };
        let document = builder.build(source);
        if document.total <= BigDecimal::zero() {
            return Err(BillingError::InconsistentPricing(format!(
                "Bill {} has no price yet; price it before printing",
                bill.serial_number
            )));
        }

        self.submit(&document).await?;
        self.bills.mark_printed(bill_id).await?;
        tracing::info!("bill {} printed ({})", bill.serial_number, document.kind);
        Ok(PrintOutcome::from_document(&document, true))
    }

    /// 批量打印：跳过未定价账单并报告数量
    pub async fn print_bulk(&self, bill_ids: &[String]) -> BillingResult<BulkPrintOutcome> {
        let (bills, orders) = futures::try_join!(
            self.bills.list_bills(false),
            self.work_orders.list_work_orders()
        )?;
        let by_id: HashMap<&str, &Bill> = bills.iter().map(|b| (b.id.as_str(), b)).collect();

        // 重复的 ID 只打印一次
        let requested: IndexSet<&str> = bill_ids.iter().map(String::as_str).collect();

        let mut priced: Vec<Bill> = Vec::with_capacity(requested.len());
        let mut skipped = 0usize;
        for id in &requested {
            match by_id.get(id) {
                Some(bill) if status::has_amount(bill.amount.as_ref()) => priced.push((*bill).clone()),
                Some(_) => skipped += 1,
                None => {
                    tracing::warn!("Bill {} not found, skipping", id);
                    skipped += 1;
                }
            }
        }
        if priced.is_empty() {
            return Err(BillingError::InconsistentPricing(format!(
                "None of the {} selected bills are priced",
                requested.len()
            )));
        }

        let builder = ConsolidatedDocumentBuilder::new(self.document_options()).with_work_orders(&orders);
        let document = builder.build(DocumentSource::Bulk(&priced));
        self.submit(&document).await?;
        for (done, bill) in priced.iter().enumerate() {
            if let Err(e) = self.bills.mark_printed(&bill.id).await {
                let unmarked: Vec<&str> = priced[done..].iter().map(|b| b.id.as_str()).collect();
                tracing::error!(
                    "bulk print spooled but {} bills left unmarked: {:?} ({})",
                    unmarked.len(),
                    unmarked,
                    e
                );
                return Err(e);
            }
        }

        tracing::info!("bulk print: {} bills printed, {} skipped", priced.len(), skipped);
        Ok(BulkPrintOutcome {
            outcome: PrintOutcome::from_document(&document, true),
            skipped,
        })
    }

    /// 医生月结单，价格取自调用方给出的表（可包含未保存的编辑）
    pub async fn print_monthly(
        &self,
        doctor: &str,
        month: &str,
        prices: &HashMap<String, BigDecimal>,
    ) -> BillingResult<PrintOutcome> {
        let month = BillingMonth::parse(month).ok_or_else(|| {
            BillingError::InvalidRequest(format!("Invalid month {:?}, expected YYYY-MM", month))
        })?;
        let orders = self.work_orders.list_work_orders().await?;

        let builder = ConsolidatedDocumentBuilder::new(self.document_options());
        let document = builder.build(DocumentSource::Monthly(MonthlyRequest {
            orders: &orders,
            doctor,
            month,
            prices,
        }));
        if document.is_empty() {
            tracing::info!("no completed work for {} in {}, nothing to print", doctor, month);
            return Ok(PrintOutcome::from_document(&document, false));
        }

        self.submit(&document).await?;
        tracing::info!(
            "monthly statement for {} ({}) printed: {} orders, total {}",
            document.doctor_name,
            month,
            document.rows.len(),
            document.formatted_total()
        );
        Ok(PrintOutcome::from_document(&document, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::MemoryStore;
    use crate::models::{BillStatus, WorkOrder};
    use crate::print::MemorySink;
    use crate::service::filter::StatusFilter;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn fixture_store() -> Arc<MemoryStore> {
        let orders: Vec<WorkOrder> = serde_json::from_value(json!([
            {"id": "o1", "serial_number": "S-1", "doctor_name": "Dr. Smith", "order_date": "2024-03-01",
             "tooth_selection": "11, 14", "completion_date": "2024-03-05", "status": "completed"},
            {"id": "o2", "serial_number": "S-2", "doctor_name": "smith", "order_date": "2024-03-02",
             "tooth_selection": [21], "completion_date": "2024-03-06", "status": "completed"},
            {"id": "o3", "serial_number": "S-3", "doctor_name": "Dr. Patel", "order_date": "2024-03-03"}
        ]))
        .unwrap();
        let bills: Vec<Bill> = serde_json::from_value(json!([
            {"id": "b1", "serial_number": "S-1", "doctor_name": "Dr. Smith", "bill_date": "2024-03-10",
             "amount": 150, "status": "priced"},
            {"id": "b2", "serial_number": "S-2", "doctor_name": "smith", "bill_date": "2024-03-09",
             "status": "pending"},
            {"id": "b3", "serial_number": "S-3", "doctor_name": "Dr. Patel", "bill_date": "2024-03-08",
             "amount": 0, "status": "sent"},
            {"id": "g1", "serial_number": "G-1", "doctor_name": "Dr. Smith", "bill_date": "2024-03-07",
             "is_grouped": true, "status": "pending",
             "items": [
                {"id": "i1", "serial_number": "S-1", "item_description": "Crown"},
                {"id": "i2", "serial_number": "S-2", "item_description": "Bridge"}
             ]}
        ]))
        .unwrap();

        Arc::new(MemoryStore::with_data(orders, bills))
    }

    fn settings() -> BillingConfig {
        let mut settings = AppConfig::default().billing;
        settings.page_size = 2;
        settings
    }

    fn fixture() -> (BillingService, Arc<MemoryStore>, Arc<MemorySink>) {
        let store = fixture_store();
        let sink = Arc::new(MemorySink::new());
        let service = BillingService::new(store.clone(), store.clone(), sink.clone(), settings());
        (service, store, sink)
    }

    /// 指定账单标记打印时失败，其余委托给内存存储
    struct FailingMarkStore {
        inner: Arc<MemoryStore>,
        fail_on: &'static str,
    }

    #[async_trait::async_trait]
    impl BillStore for FailingMarkStore {
        async fn list_bills(&self, with_items: bool) -> BillingResult<Vec<Bill>> {
            self.inner.list_bills(with_items).await
        }

        async fn get_bill(&self, id: &str, with_items: bool) -> BillingResult<Option<Bill>> {
            self.inner.get_bill(id, with_items).await
        }

        async fn update_bill_amount(&self, id: &str, amount: &BigDecimal) -> BillingResult<()> {
            self.inner.update_bill_amount(id, amount).await
        }

        async fn update_item_price(&self, item_id: &str, price: &BigDecimal) -> BillingResult<()> {
            self.inner.update_item_price(item_id, price).await
        }

        async fn mark_printed(&self, id: &str) -> BillingResult<()> {
            if id == self.fail_on {
                return Err(BillingError::not_found("bill", id));
            }
            self.inner.mark_printed(id).await
        }
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let (service, _, _) = fixture();
        let filter = BillingFilter {
            status: StatusFilter::Pending,
            ..Default::default()
        };
        let page = service.list_bills(&filter, 1, None).await.unwrap();
        let ids: Vec<&str> = page.rows.iter().map(|r| r.bill.id.as_str()).collect();
        assert_eq!(ids, vec!["b2", "b3"]);
        assert_eq!(page.window.total_items, 3);
        assert_eq!(page.window.total_pages, 2);
        assert!(page.rows.iter().all(|r| r.display_status.is_pending()));

        // 越界页回到第一页
        let page = service.list_bills(&filter, 7, None).await.unwrap();
        assert_eq!(page.window.current_page, 1);
    }

    #[tokio::test]
    async fn empty_listing_is_flagged() {
        let (service, _, _) = fixture();
        let filter = BillingFilter {
            doctor_substring: Some("nobody".into()),
            ..Default::default()
        };
        let page = service.list_bills(&filter, 1, Some(10)).await.unwrap();
        assert!(page.is_empty);
        assert!(page.rows.is_empty());
        assert!(page.pages.is_empty());
    }

    #[tokio::test]
    async fn itemized_pricing_then_finalize() {
        let (service, store, _) = fixture();
        let err = service.finalize_itemized("g1").await.unwrap_err();
        assert!(matches!(err, BillingError::InconsistentPricing(_)));
        // 拒绝时不修改
        assert_eq!(store.get_bill("g1", false).await.unwrap().unwrap().amount, None);

        service.update_item_price("g1", "i1", dec("1200")).await.unwrap();
        let update = service.update_item_price("g1", "i2", dec("800.5")).await.unwrap();
        assert_eq!(update.items_total, dec("2000.5"));

        let total = service.finalize_itemized("g1").await.unwrap();
        assert_eq!(total, dec("2000.5"));
        let bill = store.get_bill("g1", true).await.unwrap().unwrap();
        assert_eq!(bill.amount, Some(dec("2000.5")));
        assert_eq!(bill.status, BillStatus::Priced);
        assert_eq!(bill.items[1].unit_price, Some(dec("800.5")));
    }

    #[tokio::test]
    async fn price_edits_reject_bad_values() {
        let (service, _, _) = fixture();
        assert!(matches!(
            service.set_bill_amount("b2", dec("0")).await,
            Err(BillingError::InconsistentPricing(_))
        ));
        assert!(matches!(
            service.update_item_price("g1", "i1", dec("-1")).await,
            Err(BillingError::InconsistentPricing(_))
        ));
        assert!(matches!(
            service.update_item_price("g1", "zz", dec("1")).await,
            Err(BillingError::NotFound { .. })
        ));
        assert!(matches!(
            service.set_bill_amount("missing", dec("10")).await,
            Err(BillingError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn printing_requires_a_price() {
        let (service, store, sink) = fixture();
        assert!(matches!(
            service.print_bill("b2").await,
            Err(BillingError::InconsistentPricing(_))
        ));
        assert!(sink.jobs().is_empty());

        let outcome = service.print_bill("b1").await.unwrap();
        assert_eq!(outcome.kind, DocumentKind::Single);
        assert!(outcome.printed);
        assert_eq!(sink.jobs().len(), 1);
        assert!(sink.jobs()[0].html.contains("₹150.00"));
        let bill = store.get_bill("b1", false).await.unwrap().unwrap();
        assert_eq!(bill.status, BillStatus::Printed);
    }

    #[tokio::test]
    async fn grouped_bill_prints_item_rows() {
        let (service, _, sink) = fixture();
        service.update_item_price("g1", "i1", dec("100")).await.unwrap();
        service.finalize_itemized("g1").await.unwrap();
        let outcome = service.print_bill("g1").await.unwrap();
        assert_eq!(outcome.kind, DocumentKind::Grouped);
        assert_eq!(outcome.rows, 2);
        assert_eq!(outcome.total, dec("100"));
        assert_eq!(sink.jobs()[0].name, "grouped-g-1");
    }

    #[tokio::test]
    async fn bulk_print_skips_unpriced_bills() {
        let (service, store, sink) = fixture();
        let ids: Vec<String> = ["b1", "b2", "b3", "ghost"].iter().map(|s| s.to_string()).collect();
        let outcome = service.print_bulk(&ids).await.unwrap();
        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.outcome.rows, 1);
        assert_eq!(outcome.outcome.total, dec("150"));
        assert_eq!(sink.jobs().len(), 1);
        assert_eq!(store.get_bill("b3", false).await.unwrap().unwrap().status, BillStatus::Sent);

        let none_priced = vec!["b2".to_string(), "b3".to_string()];
        assert!(matches!(
            service.print_bulk(&none_priced).await,
            Err(BillingError::InconsistentPricing(_))
        ));
    }

    #[tokio::test]
    async fn monthly_print_uses_supplied_prices() {
        let (service, _, sink) = fixture();
        let prices = HashMap::from([
            ("o1".to_string(), dec("300")),
            ("o2".to_string(), dec("200")),
        ]);
        let outcome = service.print_monthly("DOCTOR smith", "2024-03", &prices).await.unwrap();
        assert!(outcome.printed);
        assert_eq!(outcome.rows, 2);
        assert_eq!(outcome.total, dec("500"));
        assert_eq!(sink.jobs()[0].kind, DocumentKind::Monthly);

        let empty = service.print_monthly("Dr. Smith", "2023-01", &prices).await.unwrap();
        assert!(!empty.printed);
        assert_eq!(sink.jobs().len(), 1);

        assert!(matches!(
            service.print_monthly("Dr. Smith", "March", &prices).await,
            Err(BillingError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn doctors_are_deduplicated() {
        let (service, _, _) = fixture();
        assert_eq!(service.doctors().await.unwrap(), vec!["Dr. Smith", "Dr. Patel"]);
    }

    #[tokio::test]
    async fn csv_export_covers_all_pages() {
        let (service, _, _) = fixture();
        let mut out = Vec::new();
        let written = service.export_csv(&BillingFilter::default(), &mut out).await.unwrap();
        assert_eq!(written, 4);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 5);
    }

    #[tokio::test]
    async fn grouped_bill_with_priced_items_needs_finalize_before_printing() {
        let (service, store, sink) = fixture();
        service.update_item_price("g1", "i1", dec("100")).await.unwrap();

        assert!(matches!(
            service.print_bill("g1").await,
            Err(BillingError::InconsistentPricing(_))
        ));
        assert!(sink.jobs().is_empty());
        let bill = store.get_bill("g1", false).await.unwrap().unwrap();
        assert_eq!(bill.status, BillStatus::Pending);
        assert_eq!(bill.amount, None);
    }

    #[tokio::test]
    async fn bulk_print_ignores_repeated_ids() {
        let (service, _, sink) = fixture();
        let ids: Vec<String> = ["b1", "b1", "b2", "b2"].iter().map(|s| s.to_string()).collect();
        let outcome = service.print_bulk(&ids).await.unwrap();
        assert_eq!(outcome.outcome.rows, 1);
        assert_eq!(outcome.outcome.total, dec("150"));
        assert_eq!(outcome.skipped, 1);
        assert_eq!(sink.jobs().len(), 1);
    }

    #[tokio::test]
    async fn bulk_print_stops_at_first_failed_status_update() {
        let store = fixture_store();
        store.update_bill_amount("b2", &dec("75")).await.unwrap();
        let failing = Arc::new(FailingMarkStore {
            inner: store.clone(),
            fail_on: "b2",
        });
        let sink = Arc::new(MemorySink::new());
        let service = BillingService::new(store.clone(), failing, sink.clone(), settings());

        let ids = vec!["b1".to_string(), "b2".to_string()];
        assert!(matches!(
            service.print_bulk(&ids).await,
            Err(BillingError::NotFound { .. })
        ));
        assert_eq!(sink.jobs().len(), 1);
        assert_eq!(store.get_bill("b1", false).await.unwrap().unwrap().status, BillStatus::Printed);
        assert_eq!(store.get_bill("b2", false).await.unwrap().unwrap().status, BillStatus::Priced);
    }
}

use dental_lab_billing::config::StorageBackend;
use dental_lab_billing::db::{BillStore, MemoryStore, PgStore, WorkOrderStore};
use dental_lab_billing::print::SpoolDirSink;
use dental_lab_billing::{api, create_pool, AppConfig, BillingService};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 存储后端
    let (work_orders, bills): (Arc<dyn WorkOrderStore>, Arc<dyn BillStore>) =
        match config.storage.backend {
            StorageBackend::Postgres => {
                let pool = create_pool(&config.database).await?;
                let store = Arc::new(PgStore::new(pool));
                (store.clone() as Arc<dyn WorkOrderStore>, store as Arc<dyn BillStore>)
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage, data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn WorkOrderStore>, store as Arc<dyn BillStore>)
            }
        };

    let sink = Arc::new(SpoolDirSink::new(config.print.spool_dir.clone()));
    info!("Print jobs spool to {}", config.print.spool_dir.display());

    let service = Arc::new(BillingService::new(
        work_orders,
        bills,
        sink,
        config.billing.clone(),
    ));

    let app = api::router(service).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /api/bills                - filtered, paginated bill list");
    info!("  GET  /api/bills/export         - filtered bill list as CSV");
    info!("  POST /api/bills/:id/print      - print a single or grouped bill");
    info!("  POST /api/bills/print          - bulk print priced bills");
    info!("  PUT  /api/bills/:id/amount     - set bill amount");
    info!("  POST /api/bills/:id/finalize   - finalize itemized bill");
    info!("  PUT  /api/bills/:id/items/:item_id/price - set item price");
    info!("  PUT  /api/orders/:id/amount    - set work order amount");
    info!("  POST /api/consolidated         - monthly statement per doctor");
    info!("  GET  /api/doctors              - deduplicated doctor names");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;

/// 创建数据库连接池，超过阈值的语句按 WARN 记录
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let connect_options = PgConnectOptions::from_str(&config.url)?.log_slow_statements(
        tracing::log::LevelFilter::Warn,
        Duration::from_secs(config.slow_statement_secs),
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await?;
    tracing::info!("database pool ready (max {} connections)", config.max_connections);
    Ok(pool)
}

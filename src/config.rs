use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 应用配置
///
/// 加载顺序：内置默认值 -> config/default.toml (可选) -> 环境变量 `LAB_*`
/// (如 `LAB_SERVER__PORT`) -> `DATABASE_URL`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub billing: BillingConfig,
    pub print: PrintConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// 慢查询告警阈值 (秒)
    pub slow_statement_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub page_size: usize,
    pub currency_symbol: String,
    pub lab_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintConfig {
    pub spool_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/dental_lab".to_string(),
                max_connections: 20,
                slow_statement_secs: 5,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
            },
            billing: BillingConfig {
                page_size: 25,
                currency_symbol: "₹".to_string(),
                lab_name: "Dental Lab".to_string(),
            },
            print: PrintConfig {
                spool_dir: PathBuf::from("./print-spool"),
            },
        }
    }
}

impl AppConfig {
    /// 从配置文件与环境变量加载
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("LAB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }
        builder.build()?.try_deserialize()
    }

    /// 默认值 + 一段 TOML 覆盖
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

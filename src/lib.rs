pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod print;
pub mod service;

pub use config::AppConfig;
pub use db::create_pool;
pub use error::{BillingError, BillingResult};
pub use service::BillingService;

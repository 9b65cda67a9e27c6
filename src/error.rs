use thiserror::Error;

/// 计费核心的错误类型
///
/// 解析与汇总函数是全函数，不会产生错误；这里只包含存储失败、
/// 记录缺失以及调用方可见的前置条件违例。
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// 金额 <= 0 时尝试定稿或打印，消息可直接展示给用户
    #[error("{0}")]
    InconsistentPricing(String),

    /// 请求参数无法识别（如月份格式）
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("print error: {0}")]
    Print(#[from] std::io::Error),

    #[error("export error: {0}")]
    Export(#[from] csv::Error),
}

impl BillingError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;

/// 工单状态，未知取值读入时按 pending 处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum WorkOrderStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// 数据库中的文本值 -> 状态，未知值按 pending 处理
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "pending" => Self::Pending,
            other => {
                tracing::debug!("unknown work order status {:?}, treating as pending", other);
                Self::Pending
            }
        }
    }
}

impl From<String> for WorkOrderStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// 技工所工单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: String,
    /// 技工所分配的唯一流水号
    #[serde(default, deserialize_with = "lenient::text")]
    pub serial_number: String,
    /// 自由文本，去重见 [`crate::service::doctor`]
    #[serde(default, deserialize_with = "lenient::text")]
    pub doctor_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub patient_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub product_quality: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub product_shade: String,
    /// 多形态：数组 / JSON 字符串 / 逗号分隔字符串 / 单值
    #[serde(default)]
    pub tooth_selection: Value,
    #[serde(default, deserialize_with = "lenient::text")]
    pub order_date: String,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub expected_complete_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub completion_date: Option<String>,
    #[serde(default)]
    pub status: WorkOrderStatus,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub batch_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    pub is_urgent: bool,
}

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::lenient;

/// 账单存储状态
///
/// 存储值不一定可靠（金额更可信），显示状态由
/// [`crate::service::status::resolve`] 推导。未知取值原样保留。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum BillStatus {
    #[default]
    Pending,
    Priced,
    Printed,
    Sent,
    Other(String),
}

impl BillStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Priced => "priced",
            Self::Printed => "printed",
            Self::Sent => "sent",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for BillStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "priced" => Self::Priced,
            "printed" => Self::Printed,
            "sent" => Self::Sent,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for BillStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<BillStatus> for String {
    fn from(status: BillStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 账单主表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub serial_number: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub doctor_name: String,
    /// 合并账单时为多个患者名拼接
    #[serde(default, deserialize_with = "lenient::text")]
    pub patient_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub work_description: String,
    /// ISO 日期字符串 (YYYY-MM-DD...)
    #[serde(default, deserialize_with = "lenient::text")]
    pub bill_date: String,
    #[serde(default)]
    pub is_grouped: bool,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub batch_id: Option<String>,
    /// 为空表示尚未定价
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    pub status: BillStatus,
    #[serde(default)]
    pub items: Vec<BillItem>,
}

/// 账单明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillItem {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub bill_id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub serial_number: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub item_description: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub product_quality: String,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub product_shade: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub unit_price: Option<BigDecimal>,
    /// 单件计价，始终等于 `unit_price`
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total_price: Option<BigDecimal>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub notes: Option<String>,
}

impl BillItem {
    /// 更新单价并同步总价（本业务无数量乘数）
    pub fn set_unit_price(&mut self, price: Option<BigDecimal>) {
        self.total_price = price.clone();
        self.unit_price = price;
    }
}

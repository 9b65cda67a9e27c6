//! 账单过滤
//!
//! 纯函数，所有条件 AND 组合；只删除不重排。

use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::{has_amount, resolve};
use crate::models::{Bill, BillStatus};

/// 状态过滤条件
///
/// `Pending` / `Priced` 按金额判断（兼容未迁移的旧数据），
/// 其余取值按存储的 status 字面匹配。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Priced,
    Stored(BillStatus),
}

impl From<&str> for StatusFilter {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Self::All,
            "pending" => Self::Pending,
            "priced" => Self::Priced,
            _ => Self::Stored(BillStatus::from(raw.trim())),
        }
    }
}

impl From<String> for StatusFilter {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<StatusFilter> for String {
    fn from(filter: StatusFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Pending => f.write_str("pending"),
            Self::Priced => f.write_str("priced"),
            Self::Stored(status) => write!(f, "{status}"),
        }
    }
}

impl StatusFilter {
    pub fn matches(&self, bill: &Bill) -> bool {
        match self {
            Self::All => true,
            Self::Pending => resolve(bill).is_pending(),
            Self::Priced => has_amount(bill.amount.as_ref()),
            Self::Stored(status) => bill.status == *status,
        }
    }
}

/// 组合过滤条件，空值不构成约束
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingFilter {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default, alias = "doctor")]
    pub doctor_substring: Option<String>,
    #[serde(default, alias = "serial")]
    pub serial_substring: Option<String>,
}

fn constraint(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 只比较日期部分 (YYYY-MM-DD)，带时间的时间戳也按天算
fn date_part(value: &str) -> &str {
    let value = value.trim();
    value.get(..10).unwrap_or(value)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl BillingFilter {
    pub fn is_empty(&self) -> bool {
        constraint(&self.start_date).is_none()
            && constraint(&self.end_date).is_none()
            && self.status == StatusFilter::All
            && constraint(&self.doctor_substring).is_none()
            && constraint(&self.serial_substring).is_none()
    }

    pub fn matches(&self, bill: &Bill) -> bool {
        let bill_date = date_part(&bill.bill_date);
        if let Some(start) = constraint(&self.start_date) {
            if bill_date < date_part(start) {
                return false;
            }
        }
        if let Some(end) = constraint(&self.end_date) {
            if bill_date > date_part(end) {
                return false;
            }
        }
        if !self.status.matches(bill) {
            return false;
        }
        if let Some(doctor) = constraint(&self.doctor_substring) {
            if !contains_ignore_case(&bill.doctor_name, doctor) {
                return false;
            }
        }
        if let Some(serial) = constraint(&self.serial_substring) {
            if !contains_ignore_case(&bill.serial_number, serial) {
                return false;
            }
        }
        true
    }
}

pub fn apply<'a>(bills: &'a [Bill], filter: &BillingFilter) -> Vec<&'a Bill> {
    bills.iter().filter(|bill| filter.matches(bill)).collect()
}

//! 账单显示状态推导
//!
//! 金额是否存在比存储的 status 列更可信。优先级（按顺序）：
//! 1. 金额缺失或 <= 0 -> pending（无视存储状态）
//! 2. 存储 priced -> priced
//! 3. 存储 printed -> printed
//! 4. 存储 sent -> sent
//! 5. 其余原样透传，使用中性样式

use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;

use crate::models::{Bill, BillStatus};

/// 显示样式标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    Pending,
    Priced,
    Printed,
    Sent,
    Neutral,
}

impl StatusTag {
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Pending => "bg-yellow-100 text-yellow-800",
            Self::Priced => "bg-blue-100 text-blue-800",
            Self::Printed => "bg-purple-100 text-purple-800",
            Self::Sent => "bg-green-100 text-green-800",
            Self::Neutral => "bg-gray-100 text-gray-800",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayStatus {
    pub status: BillStatus,
    pub tag: StatusTag,
}

impl DisplayStatus {
    fn new(status: BillStatus, tag: StatusTag) -> Self {
        Self { status, tag }
    }

    /// 由金额规则判定的待定价（规则 1）
    pub fn is_pending(&self) -> bool {
        self.tag == StatusTag::Pending
    }

    pub fn label(&self) -> String {
        match &self.status {
            BillStatus::Pending => "Pending".to_string(),
            BillStatus::Priced => "Priced".to_string(),
            BillStatus::Printed => "Printed".to_string(),
            BillStatus::Sent => "Sent".to_string(),
            BillStatus::Other(raw) => raw.clone(),
        }
    }
}

/// 金额存在且 > 0
pub fn has_amount(amount: Option<&BigDecimal>) -> bool {
    amount.is_some_and(|a| *a > BigDecimal::zero())
}

pub fn resolve(bill: &Bill) -> DisplayStatus {
    resolve_parts(bill.amount.as_ref(), &bill.status)
}

pub fn resolve_parts(amount: Option<&BigDecimal>, stored: &BillStatus) -> DisplayStatus {
    if !has_amount(amount) {
        return DisplayStatus::new(BillStatus::Pending, StatusTag::Pending);
    }
    match stored {
        BillStatus::Priced => DisplayStatus::new(BillStatus::Priced, StatusTag::Priced),
        BillStatus::Printed => DisplayStatus::new(BillStatus::Printed, StatusTag::Printed),
        BillStatus::Sent => DisplayStatus::new(BillStatus::Sent, StatusTag::Sent),
        other => DisplayStatus::new(other.clone(), StatusTag::Neutral),
    }
}

//! 金额解析与汇总
//!
//! 所有汇总每次都从头重新计算，不保留增量状态。汇总过程不做舍入，
//! 只在显示时固定保留两位小数。

use bigdecimal::{BigDecimal, Zero};
use serde_json::Value;
use std::str::FromStr;

use crate::models::{Bill, BillItem, WorkOrder};

/// 宽松解析金额：数字或数字字符串，其余一律 None（包括 NaN / Infinity）
pub fn parse_amount(raw: &Value) -> Option<BigDecimal> {
    match raw {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse_amount_str(s),
        _ => None,
    }
}

pub fn parse_amount_str(raw: &str) -> Option<BigDecimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    BigDecimal::from_str(trimmed).ok()
}

/// 可计价条目
pub trait Priced {
    fn price(&self) -> Option<&BigDecimal>;
}

impl Priced for BillItem {
    fn price(&self) -> Option<&BigDecimal> {
        self.total_price.as_ref()
    }
}

impl Priced for Bill {
    fn price(&self) -> Option<&BigDecimal> {
        self.amount.as_ref()
    }
}

impl Priced for WorkOrder {
    fn price(&self) -> Option<&BigDecimal> {
        self.amount.as_ref()
    }
}

impl<T: Priced> Priced for &T {
    fn price(&self) -> Option<&BigDecimal> {
        (*self).price()
    }
}

/// 计入汇总的金额：缺失或负数按 0
pub fn countable(price: Option<&BigDecimal>) -> BigDecimal {
    match price {
        Some(p) if *p >= BigDecimal::zero() => p.clone(),
        _ => BigDecimal::zero(),
    }
}

pub fn total<I>(entries: I) -> BigDecimal
where
    I: IntoIterator,
    I::Item: Priced,
{
    entries
        .into_iter()
        .fold(BigDecimal::zero(), |acc, entry| acc + countable(entry.price()))
}

pub fn items_total(items: &[BillItem]) -> BigDecimal {
    total(items)
}

pub fn bills_total(bills: &[Bill]) -> BigDecimal {
    total(bills)
}

/// 原始 JSON 金额列表求和
pub fn values_total(values: &[Value]) -> BigDecimal {
    values.iter().fold(BigDecimal::zero(), |acc, v| {
        acc + countable(parse_amount(v).as_ref())
    })
}

/// 修改某个明细的单价（总价随之同步），返回是否找到该明细
pub fn set_unit_price(items: &mut [BillItem], item_id: &str, price: Option<BigDecimal>) -> bool {
    match items.iter_mut().find(|item| item.id == item_id) {
        Some(item) => {
            item.set_unit_price(price);
            true
        }
        None => false,
    }
}

/// 固定两位小数
pub fn format_amount(amount: &BigDecimal) -> String {
    amount.round(2).with_scale(2).to_string()
}

pub fn format_currency(symbol: &str, amount: &BigDecimal) -> String {
    format!("{}{}", symbol, format_amount(amount))
}

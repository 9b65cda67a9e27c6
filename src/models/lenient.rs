//! 宽松反序列化：上游数据的金额字段可能是数字、字符串、null 或乱填的文本。

use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::service::pricing::parse_amount;

/// 任意 JSON 值 -> `Option<BigDecimal>`，无法解析时为 `None`（不报错）
pub fn amount<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(parse_amount(&raw))
}

/// 字符串字段允许 null / 数字，统一转成 `String`
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// 同 [`text`]，空字符串视为缺失
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = text(deserializer)?;
    Ok(if s.trim().is_empty() { None } else { Some(s) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::str::FromStr;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "amount")]
        amount: Option<BigDecimal>,
        #[serde(default, deserialize_with = "text")]
        name: String,
    }

    #[test]
    fn amount_accepts_numbers_and_numeric_strings() {
        let p: Probe = serde_json::from_str(r#"{"amount": 12.5}"#).unwrap();
        assert_eq!(p.amount, Some(BigDecimal::from_str("12.5").unwrap()));

        let p: Probe = serde_json::from_str(r#"{"amount": " 80 "}"#).unwrap();
        assert_eq!(p.amount, Some(BigDecimal::from(80)));
    }

    #[test]
    fn garbage_amount_becomes_none() {
        for body in [r#"{"amount": "abc"}"#, r#"{"amount": null}"#, r#"{"amount": [1]}"#, "{}"] {
            let p: Probe = serde_json::from_str(body).unwrap();
            assert_eq!(p.amount, None, "body: {body}");
        }
    }

    #[test]
    fn text_tolerates_null_and_numbers() {
        let p: Probe = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(p.name, "");
        let p: Probe = serde_json::from_str(r#"{"name": 1042}"#).unwrap();
        assert_eq!(p.name, "1042");
    }
}

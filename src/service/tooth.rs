//! 牙位解析 (FDI 记法)
//!
//! 工单里的 `tooth_selection` 字段历史上存过多种形态：数组、JSON 字符串、
//! 逗号分隔字符串、单个数值。这里在边界处一次性归一成 [`ToothSet`]，
//! 下游只处理规范类型。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const MIN_TOOTH: i64 = 11;
pub const MAX_TOOTH: i64 = 48;

/// 原始输入的形态
#[derive(Debug, Clone, PartialEq)]
pub enum ToothInput {
    Array(Vec<Value>),
    /// 能按 JSON 解析的字符串，保存解析结果和原文
    JsonString { parsed: Value, raw: String },
    CsvString(String),
    Scalar(Value),
    Empty,
}

impl ToothInput {
    pub fn classify(raw: &Value) -> Self {
        match raw {
            Value::Null => Self::Empty,
            Value::Array(values) => Self::Array(values.clone()),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Self::Empty;
                }
                match serde_json::from_str::<Value>(trimmed) {
                    Ok(parsed) => Self::JsonString {
                        parsed,
                        raw: trimmed.to_string(),
                    },
                    Err(_) => Self::CsvString(trimmed.to_string()),
                }
            }
            other => Self::Scalar(other.clone()),
        }
    }

    /// 展开为候选元素，尚未做数值转换
    fn into_elements(self) -> Vec<Value> {
        match self {
            Self::Array(values) => values,
            Self::JsonString { parsed, raw } => match parsed {
                Value::Array(values) => values,
                Value::Number(_) => vec![parsed],
                Value::String(inner) => split_csv(&inner),
                Value::Null => Vec::new(),
                // 对象 / 布尔之类无法识别，退回逗号切分
                _ => split_csv(&raw),
            },
            Self::CsvString(raw) => split_csv(&raw),
            Self::Scalar(value) => vec![value],
            Self::Empty => Vec::new(),
        }
    }
}

fn split_csv(raw: &str) -> Vec<Value> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Value::String(part.to_string()))
        .collect()
}

/// 元素 -> 整数，非数值返回 None
fn coerce(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// 规范化后的牙位集合：升序、去重、均在 11..=48 之间
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToothSet(BTreeSet<u8>);

impl ToothSet {
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tooth: u8) -> bool {
        self.0.contains(&tooth)
    }

    pub fn quadrants(&self) -> ToothQuadrantSet {
        quadrants_of(self.iter())
    }
}

impl FromIterator<i64> for ToothSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .filter(|t| (MIN_TOOTH..=MAX_TOOTH).contains(t))
                .map(|t| t as u8)
                .collect(),
        )
    }
}

/// 解析任意形态的牙位输入，永不失败
pub fn parse(raw: &Value) -> ToothSet {
    let elements = ToothInput::classify(raw).into_elements();
    let total = elements.len();
    let set: ToothSet = elements.iter().filter_map(coerce).collect();
    if set.len() < total {
        tracing::debug!("{} tooth values dropped or merged while parsing {}", total - set.len(), raw);
    }
    set
}

/// 四个象限：Q1=11–18, Q2=21–28, Q3=31–38, Q4=41–48
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToothQuadrantSet {
    pub q1: BTreeSet<u8>,
    pub q2: BTreeSet<u8>,
    pub q3: BTreeSet<u8>,
    pub q4: BTreeSet<u8>,
}

impl ToothQuadrantSet {
    pub fn is_empty(&self) -> bool {
        self.q1.is_empty() && self.q2.is_empty() && self.q3.is_empty() && self.q4.is_empty()
    }

    /// 四个象限的并集
    pub fn union(&self) -> BTreeSet<u8> {
        self.q1
            .iter()
            .chain(&self.q2)
            .chain(&self.q3)
            .chain(&self.q4)
            .copied()
            .collect()
    }

    pub fn grid(&self) -> QuadrantGrid {
        QuadrantGrid {
            q1: render_quadrant(&self.q1),
            q2: render_quadrant(&self.q2),
            q3: render_quadrant(&self.q3),
            q4: render_quadrant(&self.q4),
        }
    }
}

/// 按象限分桶，末位为 0 或 9 的编号以及超出范围的值静默丢弃
pub fn quadrants_of<I>(teeth: I) -> ToothQuadrantSet
where
    I: IntoIterator,
    I::Item: Into<i64>,
{
    let mut quadrants = ToothQuadrantSet::default();
    for tooth in teeth.into_iter().map(Into::into) {
        if !(MIN_TOOTH..=MAX_TOOTH).contains(&tooth) {
            continue;
        }
        let position = tooth % 10;
        if !(1..=8).contains(&position) {
            continue;
        }
        let bucket = match tooth / 10 {
            1 => &mut quadrants.q1,
            2 => &mut quadrants.q2,
            3 => &mut quadrants.q3,
            4 => &mut quadrants.q4,
            _ => continue,
        };
        bucket.insert(tooth as u8);
    }
    quadrants
}

/// 象限渲染：每颗牙取末位数字按升序拼接，如 {11,14} -> "14"
pub fn render_quadrant(teeth: &BTreeSet<u8>) -> String {
    teeth.iter().map(|t| char::from(b'0' + t % 10)).collect()
}

/// 打印/表格用的 2x2 牙位格
///
/// 视图布局：上排 Q1 | Q2，下排 Q4 | Q3。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuadrantGrid {
    pub q1: String,
    pub q2: String,
    pub q3: String,
    pub q4: String,
}

impl QuadrantGrid {
    pub fn from_raw(raw: &Value) -> Self {
        parse(raw).quadrants().grid()
    }

    /// 按显示顺序返回 [[Q1, Q2], [Q4, Q3]]
    pub fn rows(&self) -> [[&str; 2]; 2] {
        [
            [self.q1.as_str(), self.q2.as_str()],
            [self.q4.as_str(), self.q3.as_str()],
        ]
    }
}

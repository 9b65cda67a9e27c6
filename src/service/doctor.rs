//! 医生姓名归一化
//!
//! 工单上的医生名是自由文本（"Dr. Smith" / "smith" / "DOCTOR Smith"），
//! 去重与分组都基于 [`canonicalize`] 的结果，不做模糊匹配。

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

static HONORIFIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:doctor|dr\.?)\s+").expect("Invalid regex"));

/// 去掉前缀称谓 (Dr / Dr. / Doctor)，再 trim + 小写
pub fn canonicalize(name: &str) -> String {
    HONORIFIC_RE
        .replace(name.trim(), "")
        .trim()
        .to_lowercase()
}

pub fn same_doctor(a: &str, b: &str) -> bool {
    canonicalize(a) == canonicalize(b)
}

/// 医生目录：归一化 key -> 首次出现的原始写法
#[derive(Debug, Clone, Default)]
pub struct DoctorDirectory {
    names: IndexMap<String, String>,
}

impl DoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut directory = Self::new();
        for name in names {
            directory.insert(name);
        }
        directory
    }

    /// 记录一个名字，已存在同 key 时保留先前的写法。返回归一化 key
    pub fn insert(&mut self, name: &str) -> Option<String> {
        let key = canonicalize(name);
        if key.is_empty() {
            return None;
        }
        self.names
            .entry(key.clone())
            .or_insert_with(|| name.trim().to_string());
        Some(key)
    }

    pub fn display_name(&self, name: &str) -> Option<&str> {
        self.names.get(&canonicalize(name)).map(String::as_str)
    }

    /// 按首次出现顺序的显示名
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

//! 分页与批量选择
//!
//! [`PageWindow`] 完全由 (过滤后条数, 每页条数, 请求页) 推导，
//! 数据或页大小变化时重新计算即可，不单独维护状态。

use indexmap::IndexSet;
use serde::Serialize;

/// 导航栏最多显示的连续页码数
pub const MAX_VISIBLE_PAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub current_page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl PageWindow {
    /// 当前页切片起点 (含)
    pub fn start(&self) -> usize {
        ((self.current_page - 1) * self.page_size).min(self.total_items)
    }

    /// 当前页切片终点 (不含)
    pub fn end(&self) -> usize {
        (self.start() + self.page_size).min(self.total_items)
    }

    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }
}

/// 计算分页窗口。请求页为 0 或越界时回到第 1 页（不是最后一页）
pub fn window(filtered_count: usize, page_size: usize, requested_page: usize) -> PageWindow {
    let page_size = page_size.max(1);
    let total_pages = filtered_count.div_ceil(page_size);
    let current_page = if requested_page == 0 || requested_page > total_pages {
        1
    } else {
        requested_page
    };
    PageWindow {
        current_page,
        page_size,
        total_pages,
        total_items: filtered_count,
    }
}

pub fn slice<'a, T>(items: &'a [T], window: &PageWindow) -> &'a [T] {
    let end = window.end().min(items.len());
    let start = window.start().min(end);
    &items[start..end]
}

/// 页码按钮
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "page", rename_all = "snake_case")]
pub enum PageButton {
    Page(usize),
    Ellipsis,
}

/// 滑动窗口页码：尽量以当前页为中心，首页/末页始终可见，中间用省略号
pub fn page_numbers(window: &PageWindow) -> Vec<PageButton> {
    let total = window.total_pages;
    if total == 0 {
        return Vec::new();
    }
    let current = window.current_page.clamp(1, total);

    let mut start = current.saturating_sub(MAX_VISIBLE_PAGES / 2).max(1);
    let end = (start + MAX_VISIBLE_PAGES - 1).min(total);
    if end + 1 - start < MAX_VISIBLE_PAGES {
        start = (end + 1).saturating_sub(MAX_VISIBLE_PAGES).max(1);
    }

    let mut buttons = Vec::with_capacity(MAX_VISIBLE_PAGES + 4);
    if start > 1 {
        buttons.push(PageButton::Page(1));
        if start > 2 {
            buttons.push(PageButton::Ellipsis);
        }
    }
    buttons.extend((start..=end).map(PageButton::Page));
    if end < total {
        if end < total - 1 {
            buttons.push(PageButton::Ellipsis);
        }
        buttons.push(PageButton::Page(total));
    }
    buttons
}

/// 批量选择：保序的账单 ID 集合
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: IndexSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 切换选中状态，返回切换后是否选中
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.shift_remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn select_all<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.ids.extend(ids.into_iter().map(str::to_string));
    }

    /// 当前页是否已全部选中（空页视为否）
    pub fn all_selected<'a, I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut any = false;
        for id in ids {
            if !self.ids.contains(id) {
                return false;
            }
            any = true;
        }
        any
    }

    /// 丢弃已不在当前数据中的 ID，返回丢弃数量
    pub fn retain_present<'a, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: IndexSet<&str> = ids.into_iter().collect();
        let before = self.ids.len();
        self.ids.retain(|id| present.contains(id.as_str()));
        before - self.ids.len()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

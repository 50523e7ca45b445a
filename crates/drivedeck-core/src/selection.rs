//! 多选跟踪
//!
//! 跟踪一个目录列表中被勾选的文件名。
//!
//! - 勾选 "全选" 选中所有行，取消勾选则清空集合
//! - 逐行勾选到全部选中时 "全选" 自动勾选；取消任意一行则 "全选" 取消（不做半选状态）
//! - 批量操作控件仅在集合非空时可用
//! - [`SelectionTracker::drain`] 一次性返回并清空当前选择

use std::collections::HashSet;

/// 一个目录列表的选择状态
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    rows: Vec<String>,
    selected: HashSet<String>,
    all_checked: bool,
}

impl SelectionTracker {
    pub fn new<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tracker = Self::default();
        tracker.set_rows(rows);
        tracker
    }

    /// 替换列表行，同时清空选择
    pub fn set_rows<I, S>(&mut self, rows: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.clear();
        for row in rows {
            let row = row.into();
            if !self.rows.contains(&row) {
                self.rows.push(row);
            }
        }
        self.clear();
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// "全选" 复选框
    pub fn toggle_all(&mut self, checked: bool) {
        if checked {
            self.selected = self.rows.iter().cloned().collect();
            self.all_checked = !self.rows.is_empty();
        } else {
            self.clear();
        }
    }

    /// 单行复选框
    ///
    /// 不在列表中的文件名会被忽略。
    pub fn toggle(&mut self, name: &str, checked: bool) {
        if !self.rows.iter().any(|r| r == name) {
            log::debug!("Ignoring selection of unknown row: {}", name);
            return;
        }
        if checked {
            self.selected.insert(name.to_string());
            if self.selected.len() == self.rows.len() {
                self.all_checked = true;
            }
        } else {
            self.selected.remove(name);
            self.all_checked = false;
        }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    /// "全选" 复选框是否勾选
    pub fn all_checked(&self) -> bool {
        self.all_checked
    }

    /// 批量操作控件是否可用
    pub fn bulk_actions_enabled(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// 当前选择（按列表顺序），不清空
    pub fn selected(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| self.selected.contains(*r))
            .cloned()
            .collect()
    }

    /// 返回当前选择并清空
    pub fn drain(&mut self) -> Vec<String> {
        let names = self.selected();
        self.clear();
        names
    }

    fn clear(&mut self) {
        self.selected.clear();
        self.all_checked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SelectionTracker {
        SelectionTracker::new(["a.txt", "b.txt", "c.txt"])
    }

    #[test]
    fn test_toggle_all() {
        let mut sel = tracker();
        sel.toggle_all(true);
        assert!(sel.all_checked());
        assert_eq!(sel.selected(), vec!["a.txt", "b.txt", "c.txt"]);
        assert!(sel.bulk_actions_enabled());

        sel.toggle_all(false);
        assert!(!sel.all_checked());
        assert!(sel.is_empty());
        assert!(!sel.bulk_actions_enabled());
    }

    #[test]
    fn test_individual_equals_select_all() {
        let mut one_by_one = tracker();
        for name in ["c.txt", "a.txt", "b.txt"] {
            one_by_one.toggle(name, true);
        }

        let mut all = tracker();
        all.toggle_all(true);

        assert_eq!(one_by_one.all_checked(), all.all_checked());
        assert_eq!(one_by_one.selected(), all.selected());
    }

    #[test]
    fn test_uncheck_row_clears_select_all() {
        let mut sel = tracker();
        sel.toggle_all(true);
        sel.toggle("b.txt", false);
        assert!(!sel.all_checked());
        assert_eq!(sel.selected(), vec!["a.txt", "c.txt"]);
    }

    #[test]
    fn test_partial_selection_does_not_check_all() {
        let mut sel = tracker();
        sel.toggle("a.txt", true);
        sel.toggle("b.txt", true);
        assert!(!sel.all_checked());
        // 重复勾选不会重复计数
        sel.toggle("b.txt", true);
        assert!(!sel.all_checked());
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn test_drain_empties_selection() {
        let mut sel = tracker();
        sel.toggle("b.txt", true);
        sel.toggle("a.txt", true);

        let drained = sel.drain();
        assert_eq!(drained, vec!["a.txt", "b.txt"]);
        assert!(sel.is_empty());
        assert!(!sel.all_checked());
        assert!(sel.drain().is_empty());
    }

    #[test]
    fn test_unknown_row_ignored() {
        let mut sel = tracker();
        sel.toggle("missing.txt", true);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_set_rows_resets_selection() {
        let mut sel = tracker();
        sel.toggle_all(true);
        sel.set_rows(["x", "y", "x"]);
        assert_eq!(sel.rows(), &["x".to_string(), "y".to_string()]);
        assert!(sel.is_empty());
        assert!(!sel.all_checked());
    }

    #[test]
    fn test_empty_listing_select_all() {
        let mut sel = SelectionTracker::default();
        sel.toggle_all(true);
        assert!(!sel.all_checked());
        assert!(!sel.bulk_actions_enabled());
    }
}

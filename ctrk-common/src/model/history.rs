//! Bounded history of count-changing actions

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::Category;

/// Entries retained across both categories
pub const HISTORY_CAPACITY: usize = 15;

/// Speech entries shown by [`HistoryLog::recent`]
const RECENT_SPEECHES: usize = 5;

/// Question entries shown by [`HistoryLog::recent`]
const RECENT_QUESTIONS: usize = 10;

/// One recorded count change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    #[serde(alias = "action_type")]
    pub action_type: Category,
    #[serde(alias = "competitor_name")]
    pub competitor_name: String,
    #[serde(alias = "old_value")]
    pub old_value: u32,
    #[serde(alias = "new_value")]
    pub new_value: u32,
    /// Wall-clock `HH:MM:SS`
    #[serde(default)]
    pub timestamp: String,
}

impl HistoryItem {
    pub fn new(action_type: Category, competitor_name: &str, old_value: u32, new_value: u32) -> Self {
        Self {
            action_type,
            competitor_name: competitor_name.to_string(),
            old_value,
            new_value,
            timestamp: crate::time::clock_stamp(),
        }
    }

    pub fn display_text(&self) -> String {
        let action = match self.action_type {
            Category::Speech => "gave speech",
            Category::Question => "asked question",
        };
        format!(
            "{}: {} {} (was {}, now {})",
            self.timestamp, self.competitor_name, action, self.old_value, self.new_value
        )
    }
}

/// Append-only log keeping the most recent [`HISTORY_CAPACITY`] entries,
/// oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    items: VecDeque<HistoryItem>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries, keeping only the newest ones
    pub fn from_items(items: Vec<HistoryItem>) -> Self {
        let mut log = Self::new();
        for item in items {
            log.push(item);
        }
        log
    }

    /// Append an entry, evicting from the front past capacity
    pub fn push(&mut self, item: HistoryItem) {
        self.items.push_back(item);
        while self.items.len() > HISTORY_CAPACITY {
            self.items.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryItem> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryItem> {
        self.items.iter().cloned().collect()
    }

    /// Entries shown for one category: the last 5 speeches or the last 10
    /// questions, most recent last
    pub fn recent(&self, category: Category) -> Vec<&HistoryItem> {
        let limit = match category {
            Category::Speech => RECENT_SPEECHES,
            Category::Question => RECENT_QUESTIONS,
        };
        let matching: Vec<&HistoryItem> = self
            .items
            .iter()
            .filter(|item| item.action_type == category)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        matching.into_iter().skip(skip).collect()
    }

    /// Point history entries at a renamed competitor
    pub fn rename(&mut self, old: &str, new: &str) {
        for item in self.items.iter_mut().filter(|i| i.competitor_name == old) {
            item.competitor_name = new.to_string();
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech(name: &str, old: u32) -> HistoryItem {
        HistoryItem::new(Category::Speech, name, old, old + 1)
    }

    #[test]
    fn test_sixteenth_entry_evicts_oldest() {
        let mut log = HistoryLog::new();
        for i in 0..16 {
            log.push(speech("Alice", i));
        }
        assert_eq!(log.len(), HISTORY_CAPACITY);
        assert_eq!(log.get(0).unwrap().old_value, 1);
        assert_eq!(log.get(14).unwrap().old_value, 15);
    }

    #[test]
    fn test_from_items_truncates_to_newest() {
        let items: Vec<_> = (0..20).map(|i| speech("Bob", i)).collect();
        let log = HistoryLog::from_items(items);
        assert_eq!(log.len(), HISTORY_CAPACITY);
        assert_eq!(log.get(0).unwrap().old_value, 5);
    }

    #[test]
    fn test_recent_filters_by_category_with_limits() {
        let mut log = HistoryLog::new();
        for i in 0..7 {
            log.push(speech("Alice", i));
        }
        for i in 0..8 {
            log.push(HistoryItem::new(Category::Question, "Bob", i, i + 1));
        }
        let speeches = log.recent(Category::Speech);
        assert_eq!(speeches.len(), 5);
        assert_eq!(speeches[0].old_value, 2);
        assert_eq!(speeches[4].old_value, 6);
        assert_eq!(log.recent(Category::Question).len(), 8);
    }

    #[test]
    fn test_display_text() {
        let mut item = speech("Alice", 0);
        item.timestamp = "10:15:00".into();
        assert_eq!(item.display_text(), "10:15:00: Alice gave speech (was 0, now 1)");
        item.action_type = Category::Question;
        assert!(item.display_text().contains("asked question"));
    }

    #[test]
    fn test_serde_uses_camel_case_and_accepts_snake_case() {
        let item = speech("Alice", 2);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["actionType"], "speech");
        assert_eq!(json["competitorName"], "Alice");

        let legacy: HistoryItem = serde_json::from_str(
            r#"{"action_type":"question","competitor_name":"Bob","old_value":1,"new_value":2,"timestamp":"09:00:00"}"#,
        )
        .unwrap();
        assert_eq!(legacy.action_type, Category::Question);
        assert_eq!(legacy.new_value, 2);
    }

    #[test]
    fn test_rename_updates_matching_entries() {
        let mut log = HistoryLog::new();
        log.push(speech("Alice", 0));
        log.push(speech("Bob", 0));
        log.rename("Alice", "Alicia");
        assert_eq!(log.get(0).unwrap().competitor_name, "Alicia");
        assert_eq!(log.get(1).unwrap().competitor_name, "Bob");
    }
}

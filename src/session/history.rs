use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub label: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Newest-first prediction history, capped at 50 entries.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: &str, confidence: f64) {
        self.entries.push_front(HistoryEntry {
            label: label.to_string(),
            confidence,
            timestamp: Utc::now(),
        });
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SendOutcome {
    Sent,
    /// Connection was not Open; the payload was discarded.
    Dropped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRecord {
    pub timestamp: DateTime<Utc>,
    pub connection_id: u64,
    pub kind: String,
    pub bytes: usize,
    pub outcome: SendOutcome,
}

/// Totals for one message kind.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KindCounts {
    pub sent: u64,
    pub dropped: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub recent_sends: Vec<SendRecord>,
    pub by_kind: BTreeMap<String, KindCounts>,
    pub sent_count: u64,
    pub dropped_count: u64,
    pub bytes_sent: u64,
}

mod types;

pub use types::{KindCounts, MetricsSnapshot, SendOutcome, SendRecord};

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const MAX_RECENT_SENDS: usize = 20;

/// Send-result callback. Sends stay fire-and-forget; observers only watch.
pub trait SendObserver: Send + Sync {
    fn on_send(&self, connection_id: u64, kind: &str, bytes: usize, outcome: SendOutcome);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SendObserver for NoopObserver {
    fn on_send(&self, _connection_id: u64, _kind: &str, _bytes: usize, _outcome: SendOutcome) {}
}

#[derive(Default)]
struct MetricsState {
    recent_sends: Vec<SendRecord>,
    by_kind: BTreeMap<String, KindCounts>,
    sent_count: u64,
    dropped_count: u64,
    bytes_sent: u64,
}

#[derive(Clone, Default)]
pub struct SendMetrics {
    inner: Arc<Mutex<MetricsState>>,
}

impl SendMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        MetricsSnapshot {
            recent_sends: state.recent_sends.clone(),
            by_kind: state.by_kind.clone(),
            sent_count: state.sent_count,
            dropped_count: state.dropped_count,
            bytes_sent: state.bytes_sent,
        }
    }

    pub fn reset(&self) {
        if let Ok(mut state) = self.inner.lock() {
            *state = MetricsState::default();
        }
    }
}

impl SendObserver for SendMetrics {
    fn on_send(&self, connection_id: u64, kind: &str, bytes: usize, outcome: SendOutcome) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };

        let counts = state.by_kind.entry(kind.to_string()).or_default();
        match outcome {
            SendOutcome::Sent => {
                counts.sent += 1;
                counts.bytes = counts.bytes.saturating_add(bytes as u64);
            }
            SendOutcome::Dropped => counts.dropped += 1,
        }

        match outcome {
            SendOutcome::Sent => {
                state.sent_count += 1;
                state.bytes_sent = state.bytes_sent.saturating_add(bytes as u64);
            }
            SendOutcome::Dropped => state.dropped_count += 1,
        }

        state.recent_sends.push(SendRecord {
            timestamp: Utc::now(),
            connection_id,
            kind: kind.to_string(),
            bytes,
            outcome,
        });

        if state.recent_sends.len() > MAX_RECENT_SENDS {
            state.recent_sends.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outcomes_and_caps_recent_records() {
        let metrics = SendMetrics::new();
        for _ in 0..25 {
            metrics.on_send(1, "frame", 100, SendOutcome::Sent);
        }
        metrics.on_send(1, "frame", 100, SendOutcome::Dropped);
        metrics.on_send(2, "clear", 16, SendOutcome::Sent);
        metrics.on_send(2, "upload_frame", 300, SendOutcome::Dropped);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sent_count, 26);
        assert_eq!(snapshot.dropped_count, 2);
        assert_eq!(snapshot.bytes_sent, 2516);
        assert_eq!(snapshot.recent_sends.len(), MAX_RECENT_SENDS);
        assert_eq!(
            snapshot.recent_sends.last().map(|r| r.kind.as_str()),
            Some("upload_frame")
        );

        assert_eq!(
            snapshot.by_kind["frame"],
            KindCounts {
                sent: 25,
                dropped: 1,
                bytes: 2500
            }
        );
        assert_eq!(
            snapshot.by_kind["clear"],
            KindCounts {
                sent: 1,
                dropped: 0,
                bytes: 16
            }
        );
        assert_eq!(
            snapshot.by_kind["upload_frame"],
            KindCounts {
                sent: 0,
                dropped: 1,
                bytes: 0
            }
        );

        metrics.reset();
        let cleared = metrics.snapshot();
        assert_eq!(cleared.sent_count, 0);
        assert!(cleared.by_kind.is_empty());
    }
}

//! Render-only surface the session core drives. Implementations never call
//! back into session logic.

use serde::Serialize;

use crate::protocol::Prediction;
use crate::session::{HistoryEntry, OverlayState};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::ui";

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Success,
    Warning,
    Error,
    Info,
}

impl Severity {
    /// Severity implied by the markers embedded in a status string.
    pub fn classify(status: &str) -> Self {
        if status.contains('✅') {
            Severity::Success
        } else if status.contains("⚠️") || status.contains('🔥') {
            Severity::Warning
        } else if status.contains('❌') {
            Severity::Error
        } else {
            Severity::Info
        }
    }
}

/// Live connection indicator. Upload connections never drive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Reconnecting,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence >= 0.8 {
            ConfidenceBand::High
        } else if confidence >= 0.6 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PredictionFilter {
    #[default]
    All,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPrediction {
    /// 1-based position in the server's ordering.
    pub rank: usize,
    pub label: String,
    pub confidence: f64,
    pub band: ConfidenceBand,
}

impl RankedPrediction {
    /// Rank the server's list, keeping positions stable under filtering.
    pub fn rank_all(predictions: &[Prediction], filter: PredictionFilter) -> Vec<Self> {
        predictions
            .iter()
            .enumerate()
            .map(|(index, prediction)| RankedPrediction {
                rank: index + 1,
                label: prediction.label.clone(),
                confidence: prediction.confidence,
                band: ConfidenceBand::of(prediction.confidence),
            })
            .filter(|ranked| filter == PredictionFilter::All || ranked.band == ConfidenceBand::High)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub prediction_count: u64,
    pub buffer_size: Option<u64>,
}

pub trait Renderer: Send + Sync {
    fn render_overlay(&self, state: &OverlayState);
    fn render_predictions(&self, predictions: &[RankedPrediction]);
    fn render_current_prediction(&self, top: Option<&Prediction>);
    fn render_history(&self, entries: &[HistoryEntry]);
    fn render_connection_status(&self, status: ConnectionStatus);
    fn render_status_text(&self, text: &str, severity: Severity);
    fn show_modal(&self, title: &str, body: &str);
    fn show_error(&self, title: &str, body: &str);

    /// `None` hides the indicator.
    fn render_loading(&self, _message: Option<&str>) {}
    fn render_stats(&self, _stats: Stats) {}
    fn render_demo_warning(&self) {}
    fn render_predictions_loading(&self) {}
}

/// Renders every surface to the log. Used by the command-line client.
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render_overlay(&self, state: &OverlayState) {
        log_info!("overlay: {state}");
    }

    fn render_predictions(&self, predictions: &[RankedPrediction]) {
        let listed: Vec<String> = predictions
            .iter()
            .map(|p| format!("#{} {} {:.1}% ({:?})", p.rank, p.label, p.confidence * 100.0, p.band))
            .collect();
        log_info!("predictions: [{}]", listed.join(", "));
    }

    fn render_current_prediction(&self, top: Option<&Prediction>) {
        match top {
            Some(p) => log_info!("current: {} ({:.1}%)", p.label, p.confidence * 100.0),
            None => log_info!("current: -"),
        }
    }

    fn render_history(&self, entries: &[HistoryEntry]) {
        log_info!("history: {} entries", entries.len());
    }

    fn render_connection_status(&self, status: ConnectionStatus) {
        log_info!("connection: {status:?}");
    }

    fn render_status_text(&self, text: &str, severity: Severity) {
        match severity {
            Severity::Error | Severity::Warning => log_warn!("[{severity:?}] {text}"),
            _ => log_info!("[{severity:?}] {text}"),
        }
    }

    fn show_modal(&self, title: &str, body: &str) {
        log_warn!("{title}: {body}");
    }

    fn show_error(&self, title: &str, body: &str) {
        log_warn!("{title}: {body}");
    }

    fn render_loading(&self, message: Option<&str>) {
        if let Some(message) = message {
            log_info!("loading: {message}");
        }
    }

    fn render_stats(&self, stats: Stats) {
        log_info!(
            "stats: {} predictions, buffer {}",
            stats.prediction_count,
            stats
                .buffer_size
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".into())
        );
    }

    fn render_demo_warning(&self) {
        log_warn!("recognizer is running in demo mode");
    }
}

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::connection::{ConnectionState, Purpose};
use crate::media::SharedSource;
use crate::protocol::Prediction;
use crate::render::PredictionFilter;
use crate::settings::Settings;

use super::history::{History, HistoryEntry};
use super::overlay::{OverlayMachine, OverlayState};

/// Live camera session. Exists from a successful start until stop.
pub struct CameraSession {
    pub id: Uuid,
    pub source: SharedSource,
    pub started_at: DateTime<Utc>,
}

/// One uploaded file being sampled and awaiting its aggregated result.
pub struct UploadSession {
    /// Stale extractor and settle events carry an older epoch.
    pub epoch: u64,
    pub path: PathBuf,
    pub frames_sent: u32,
    pub extraction_done: bool,
    pub settle_scheduled: bool,
    /// Settle fired before extraction finished.
    pub settle_deferred: bool,
    pub task: Option<JoinHandle<()>>,
}

impl UploadSession {
    pub fn new(epoch: u64, path: PathBuf) -> Self {
        Self {
            epoch,
            path,
            frames_sent: 0,
            extraction_done: false,
            settle_scheduled: false,
            settle_deferred: false,
            task: None,
        }
    }
}

/// Everything the session actor owns. Only the actor task touches it.
pub struct SessionContext {
    pub camera: Option<CameraSession>,
    /// Token of an in-flight camera acquisition.
    pub camera_opening: Option<u64>,
    pub upload: Option<UploadSession>,
    pub overlay: OverlayMachine,
    pub history: History,
    pub prediction_count: u64,
    pub predictions: Vec<Prediction>,
    pub current_prediction: Option<Prediction>,
    pub filter: PredictionFilter,
    pub countdown_epoch: u64,
    next_token: u64,
    pub started_at: Instant,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            camera: None,
            camera_opening: None,
            upload: None,
            overlay: OverlayMachine::new(),
            history: History::new(),
            prediction_count: 0,
            predictions: Vec::new(),
            current_prediction: None,
            filter: PredictionFilter::All,
            countdown_epoch: 0,
            next_token: 0,
            started_at: Instant::now(),
        }
    }

    /// Advisory guard: set while an upload owns the UI.
    pub fn upload_guard(&self) -> bool {
        self.upload.is_some()
    }

    pub fn camera_active(&self) -> bool {
        self.camera.is_some()
    }

    pub fn camera_id(&self) -> Option<Uuid> {
        self.camera.as_ref().map(|camera| camera.id)
    }

    /// Monotonic token for acquisitions and upload epochs.
    pub fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub fn upload_epoch(&self) -> Option<u64> {
        self.upload.as_ref().map(|upload| upload.epoch)
    }

    /// The current upload, if `epoch` is still current.
    pub fn upload_for(&mut self, epoch: u64) -> Option<&mut UploadSession> {
        self.upload.as_mut().filter(|upload| upload.epoch == epoch)
    }

    /// Invalidate any local countdown timer and return the new epoch.
    pub fn bump_countdown(&mut self) -> u64 {
        self.countdown_epoch += 1;
        self.countdown_epoch
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the session for the UI and tests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub overlay: OverlayState,
    pub overlay_transitions: u64,
    pub camera_active: bool,
    pub camera_started_at: Option<DateTime<Utc>>,
    pub upload_active: bool,
    pub upload_guard: bool,
    pub upload_frames_sent: u32,
    pub connection_state: ConnectionState,
    pub connection_purpose: Option<Purpose>,
    pub reconnect_attempts: u32,
    pub prediction_count: u64,
    pub current_prediction: Option<Prediction>,
    pub history: Vec<HistoryEntry>,
    pub filter: PredictionFilter,
    pub settings: Settings,
    pub uptime_ms: u64,
}

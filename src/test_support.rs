//! In-crate test doubles: scripted connector, recording renderer, stub media.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use image::{DynamicImage, RgbImage};
use tokio::sync::mpsc;

use crate::connection::{Connector, Link, LinkCommand, LinkEvent};
use crate::media::{AcquisitionError, FrameSource, MediaProvider, SharedSource, VideoDecoder};
use crate::protocol::Prediction;
use crate::render::{ConnectionStatus, RankedPrediction, Renderer, Severity, Stats};
use crate::session::{HistoryEntry, OverlayState};

fn tiny_frame() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(8, 8))
}

/// Server side of one mock connection. Dropping it ends the link uncleanly.
pub struct MockPeer {
    received: mpsc::UnboundedReceiver<LinkCommand>,
    events: mpsc::UnboundedSender<LinkEvent>,
    pending: Vec<String>,
    closed: bool,
}

impl MockPeer {
    fn drain(&mut self) {
        while let Ok(command) = self.received.try_recv() {
            match command {
                LinkCommand::Text(text) => self.pending.push(text),
                LinkCommand::Close => self.closed = true,
            }
        }
    }

    /// Messages the client sent since the last call.
    pub fn sent_json(&mut self) -> Vec<serde_json::Value> {
        self.drain();
        self.pending
            .drain(..)
            .map(|text| serde_json::from_str(&text).unwrap())
            .collect()
    }

    pub fn saw_close(&mut self) -> bool {
        self.drain();
        self.closed
    }

    pub fn push(&self, text: &str) {
        let _ = self.events.send(LinkEvent::Text(text.to_string()));
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push(&value.to_string());
    }

    pub fn close(&self, clean: bool) {
        let _ = self.events.send(LinkEvent::Closed { clean });
    }
}

/// Hands every established link's server side to the test.
pub struct MockConnector {
    peers: mpsc::UnboundedSender<MockPeer>,
    failures: AtomicU32,
    stalled: AtomicBool,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            peers: tx,
            failures: AtomicU32::new(0),
            stalled: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        });
        (connector, rx)
    }

    /// Refuse the next `n` connects.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Connects never complete while stalled.
    pub fn stall(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(&self, _url: &str) -> BoxFuture<'static, Result<Link>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.stalled.load(Ordering::SeqCst) {
            return future::pending().boxed();
        }

        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return future::ready(Err(anyhow!("connection refused"))).boxed();
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.peers.send(MockPeer {
            received: out_rx,
            events: in_tx,
            pending: Vec::new(),
            closed: false,
        });
        future::ready(Ok(Link {
            outgoing: out_tx,
            incoming: in_rx,
        }))
        .boxed()
    }
}

pub struct StubCamera {
    stopped: Arc<AtomicBool>,
}

impl FrameSource for StubCamera {
    fn dimensions(&self) -> (u32, u32) {
        (8, 8)
    }

    fn grab(&mut self) -> Result<DynamicImage> {
        if self.stopped.load(Ordering::SeqCst) {
            bail!("camera stopped");
        }
        Ok(tiny_frame())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

pub fn shared_camera() -> (SharedSource, Arc<AtomicBool>) {
    let stopped = Arc::new(AtomicBool::new(false));
    let camera: Box<dyn FrameSource> = Box::new(StubCamera {
        stopped: Arc::clone(&stopped),
    });
    (Arc::new(Mutex::new(camera)), stopped)
}

pub struct StubVideo {
    duration: f64,
    seeks: Arc<Mutex<Vec<f64>>>,
}

impl StubVideo {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            seeks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seeks(&self) -> Arc<Mutex<Vec<f64>>> {
        Arc::clone(&self.seeks)
    }
}

impl VideoDecoder for StubVideo {
    fn duration_secs(&self) -> f64 {
        self.duration
    }

    fn seek(&self, t: f64) -> BoxFuture<'static, Result<DynamicImage>> {
        self.seeks.lock().unwrap().push(t);
        future::ready(Ok(tiny_frame())).boxed()
    }
}

pub struct StubMedia {
    pub camera_error: Option<AcquisitionError>,
    pub video_error: Option<AcquisitionError>,
    pub video_duration: f64,
    pub camera_stopped: Arc<AtomicBool>,
}

impl Default for StubMedia {
    fn default() -> Self {
        Self {
            camera_error: None,
            video_error: None,
            video_duration: 5.0,
            camera_stopped: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl MediaProvider for StubMedia {
    fn open_camera(&self) -> Result<Box<dyn FrameSource>, AcquisitionError> {
        if let Some(err) = &self.camera_error {
            return Err(err.clone());
        }
        self.camera_stopped.store(false, Ordering::SeqCst);
        Ok(Box::new(StubCamera {
            stopped: Arc::clone(&self.camera_stopped),
        }))
    }

    fn open_video(&self, _path: &Path) -> Result<Box<dyn VideoDecoder>, AcquisitionError> {
        if let Some(err) = &self.video_error {
            return Err(err.clone());
        }
        Ok(Box::new(StubVideo::new(self.video_duration)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Overlay(OverlayState),
    Predictions(Vec<RankedPrediction>),
    Current(Option<Prediction>),
    History(Vec<HistoryEntry>),
    Connection(ConnectionStatus),
    Status(String, Severity),
    Modal(String, String),
    Error(String, String),
    Loading(Option<String>),
    Stats(Stats),
    DemoWarning,
    PredictionsLoading,
}

#[derive(Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: RenderCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn overlays(&self) -> Vec<OverlayState> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Overlay(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Status(text, _) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<(String, Severity)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            RenderCall::Status(text, severity) => Some((text, severity)),
            _ => None,
        })
    }

    pub fn connection_statuses(&self) -> Vec<ConnectionStatus> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Connection(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn modals(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Modal(title, body) => Some((title, body)),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Error(title, body) => Some((title, body)),
                _ => None,
            })
            .collect()
    }

    pub fn loading(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Loading(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn render_overlay(&self, state: &OverlayState) {
        self.record(RenderCall::Overlay(state.clone()));
    }

    fn render_predictions(&self, predictions: &[RankedPrediction]) {
        self.record(RenderCall::Predictions(predictions.to_vec()));
    }

    fn render_current_prediction(&self, top: Option<&Prediction>) {
        self.record(RenderCall::Current(top.cloned()));
    }

    fn render_history(&self, entries: &[HistoryEntry]) {
        self.record(RenderCall::History(entries.to_vec()));
    }

    fn render_connection_status(&self, status: ConnectionStatus) {
        self.record(RenderCall::Connection(status));
    }

    fn render_status_text(&self, text: &str, severity: Severity) {
        self.record(RenderCall::Status(text.to_string(), severity));
    }

    fn show_modal(&self, title: &str, body: &str) {
        self.record(RenderCall::Modal(title.to_string(), body.to_string()));
    }

    fn show_error(&self, title: &str, body: &str) {
        self.record(RenderCall::Error(title.to_string(), body.to_string()));
    }

    fn render_loading(&self, message: Option<&str>) {
        self.record(RenderCall::Loading(message.map(str::to_string)));
    }

    fn render_stats(&self, stats: Stats) {
        self.record(RenderCall::Stats(stats));
    }

    fn render_demo_warning(&self) {
        self.record(RenderCall::DemoWarning);
    }

    fn render_predictions_loading(&self) {
        self.record(RenderCall::PredictionsLoading);
    }
}

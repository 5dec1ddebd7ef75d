use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::capture::CaptureController;
use crate::connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, Connector, Purpose, MAX_RECONNECT_ATTEMPTS,
};
use crate::media::{AcquisitionError, FrameSource, MediaProvider, SharedSource};
use crate::metrics::SendObserver;
use crate::protocol::{InboundMessage, OutboundMessage, UPLOAD_TARGET_FRAMES};
use crate::render::{ConnectionStatus, RankedPrediction, Renderer, Severity};
use crate::settings::{Settings, SettingsStore};
use crate::upload::{UploadError, UploadExtractor};

use super::handle::{SessionCommand, SessionHandle};
use super::overlay::OverlayState;
use super::state::{CameraSession, SessionContext, SessionSnapshot, UploadSession};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::session";

use crate::{log_debug, log_error, log_info, log_warn};

/// Grace period before an insufficient-frames rejection stops the camera.
pub const INSUFFICIENT_FRAMES_STOP_DELAY: Duration = Duration::from_millis(1_000);
/// How long the upload guard outlives the upload's final response.
pub const UPLOAD_SETTLE_DELAY: Duration = Duration::from_millis(2_000);
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
pub const COUNTDOWN_HIDE_DELAY: Duration = Duration::from_millis(300);

const CAMERA_ERROR_TITLE: &str = "Error de Cámara";
const VIDEO_ERROR_TITLE: &str = "Error de Video";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    User,
    PredictionComplete,
    InsufficientFrames,
    ReconnectExhausted,
}

/// Timer and worker completions routed back into the actor.
pub(crate) enum Internal {
    CameraOpened {
        token: u64,
        result: Result<Box<dyn FrameSource>, AcquisitionError>,
    },
    ReconnectDue {
        camera: Uuid,
    },
    AutoStop {
        camera: Uuid,
        reason: StopReason,
    },
    CountdownTick {
        epoch: u64,
    },
    CountdownHide {
        epoch: u64,
    },
    ExtractionProgress {
        epoch: u64,
        sent: u32,
    },
    ExtractionFinished {
        epoch: u64,
        result: Result<u32, UploadError>,
    },
    UploadSettle {
        epoch: u64,
    },
}

/// Collaborators the session actor is built from.
pub struct SessionParts {
    pub url: String,
    pub connector: Arc<dyn Connector>,
    pub media: Arc<dyn MediaProvider>,
    pub renderer: Arc<dyn Renderer>,
    pub observer: Arc<dyn SendObserver>,
    pub settings_store: Option<Arc<SettingsStore>>,
}

/// The session actor. Owns the `SessionContext` and applies every effect.
pub struct SessionController {
    pub(super) ctx: SessionContext,
    pub(super) connections: ConnectionManager,
    capture: CaptureController,
    media: Arc<dyn MediaProvider>,
    pub(super) renderer: Arc<dyn Renderer>,
    settings_store: Option<Arc<SettingsStore>>,
    settings_tx: watch::Sender<Settings>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    connection_events: mpsc::UnboundedReceiver<ConnectionEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
}

impl SessionController {
    pub fn new(parts: SessionParts) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let settings = parts
            .settings_store
            .as_ref()
            .map(|store| store.settings())
            .unwrap_or_default();
        let (settings_tx, _) = watch::channel(settings);

        let controller = Self {
            ctx: SessionContext::new(),
            connections: ConnectionManager::new(parts.connector, parts.url, event_tx, parts.observer),
            capture: CaptureController::new(),
            media: parts.media,
            renderer: parts.renderer,
            settings_store: parts.settings_store,
            settings_tx,
            commands: command_rx,
            connection_events: event_rx,
            internal_tx,
            internal_rx,
        };

        (controller, SessionHandle::new(command_tx))
    }

    pub async fn run(mut self) {
        log_info!("session controller started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.connection_events.recv() => {
                    self.handle_connection_event(event).await;
                }
                Some(event) = self.internal_rx.recv() => {
                    self.handle_internal(event).await;
                }
            }
        }

        self.shutdown().await;
        log_info!("session controller stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::StartCamera => self.start_camera(),
            SessionCommand::StopCamera => self.stop_camera(StopReason::User).await,
            SessionCommand::UploadVideo(path) => self.start_upload(path),
            SessionCommand::ClearBuffer => self.clear_buffer(),
            SessionCommand::UpdateSettings(settings, reply) => {
                let _ = reply.send(self.update_settings(settings));
            }
            SessionCommand::ClearHistory => {
                self.ctx.history.clear();
                self.renderer.render_history(&[]);
            }
            SessionCommand::SetPredictionFilter(filter) => {
                self.ctx.filter = filter;
                self.renderer
                    .render_predictions(&RankedPrediction::rank_all(&self.ctx.predictions, filter));
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Shutdown => {}
        }
    }

    async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened { id } => {
                if !self.connections.is_current(id) {
                    log_debug!("ignoring open of stale connection {}", id);
                    return;
                }
                match self.connections.purpose() {
                    Some(Purpose::Live) => self.on_live_open(),
                    _ => log_info!("upload connection {} open", id),
                }
            }
            ConnectionEvent::Message { id, text } => {
                if !self.connections.is_current(id) {
                    log_debug!("dropping message from stale connection {}", id);
                    return;
                }
                match InboundMessage::parse(&text) {
                    Ok(message) => self.handle_message(message).await,
                    Err(err) => log_warn!("unparseable server message: {err}"),
                }
            }
            ConnectionEvent::Closed { id, clean } => self.on_closed(id, clean).await,
        }
    }

    async fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::CameraOpened { token, result } => self.on_camera_opened(token, result),
            Internal::ReconnectDue { camera } => self.on_reconnect_due(camera),
            Internal::AutoStop { camera, reason } => {
                if self.ctx.camera_id() == Some(camera) {
                    log_info!("auto-stopping camera ({:?})", reason);
                    self.stop_camera(reason).await;
                }
            }
            Internal::CountdownTick { epoch } => self.on_countdown_tick(epoch),
            Internal::CountdownHide { epoch } => {
                if epoch == self.ctx.countdown_epoch && self.ctx.overlay.leave_countdown() {
                    self.renderer.render_overlay(self.ctx.overlay.state());
                }
            }
            Internal::ExtractionProgress { epoch, sent } => self.on_extraction_progress(epoch, sent),
            Internal::ExtractionFinished { epoch, result } => {
                self.on_extraction_finished(epoch, result)
            }
            Internal::UploadSettle { epoch } => self.on_upload_settle(epoch),
        }
    }

    pub(super) fn status(&self, text: &str, severity: Severity) {
        self.renderer.render_status_text(text, severity);
    }

    /// The Live indicator; upload connections never touch it.
    fn connection_status(&self, purpose: Option<Purpose>, status: ConnectionStatus) {
        if purpose == Some(Purpose::Live) {
            self.renderer.render_connection_status(status);
        }
    }

    pub(super) fn set_overlay(&mut self, next: OverlayState) {
        if self.ctx.overlay.transition(next) {
            self.renderer.render_overlay(self.ctx.overlay.state());
        }
    }

    pub(super) fn settings(&self) -> Settings {
        self.settings_tx.borrow().clone()
    }

    pub(super) fn schedule(&self, delay: Duration, event: Internal) {
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
    }

    fn start_camera(&mut self) {
        if self.ctx.camera.is_some() || self.ctx.camera_opening.is_some() {
            log_warn!("camera already active");
            return;
        }

        self.renderer
            .render_loading(Some("Solicitando acceso a la cámara..."));
        self.status("🔄 Solicitando acceso a la cámara...", Severity::Warning);

        let token = self.ctx.next_token();
        self.ctx.camera_opening = Some(token);

        let media = Arc::clone(&self.media);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || media.open_camera())
                .await
                .unwrap_or_else(|err| Err(AcquisitionError::Other(err.to_string())));
            let _ = tx.send(Internal::CameraOpened { token, result });
        });
    }

    fn on_camera_opened(
        &mut self,
        token: u64,
        result: Result<Box<dyn FrameSource>, AcquisitionError>,
    ) {
        if self.ctx.camera_opening != Some(token) {
            log_debug!("camera acquisition {} no longer wanted", token);
            if let Ok(mut source) = result {
                source.stop();
            }
            return;
        }
        self.ctx.camera_opening = None;
        self.renderer.render_loading(None);

        let source = match result {
            Ok(source) => source,
            Err(err) => {
                log_warn!("camera acquisition failed: {err:?}");
                let text = format!("Error accediendo a la cámara: {err}");
                self.status(&format!("❌ {text}"), Severity::Error);
                self.renderer.show_error(CAMERA_ERROR_TITLE, &text);
                return;
            }
        };

        let (width, height) = source.dimensions();
        let camera = CameraSession {
            id: Uuid::new_v4(),
            source: Arc::new(Mutex::new(source)),
            started_at: Utc::now(),
        };
        log_info!("camera session {} started ({}x{})", camera.id, width, height);
        self.ctx.camera = Some(camera);

        if !self.ctx.upload_guard() {
            self.set_overlay(OverlayState::Guidance);
        }
        self.status(
            "📹 Cámara iniciada - Conectando al servidor...",
            Severity::Success,
        );
        self.ensure_live_connection();
    }

    /// Promote a usable connection to Live, or open one.
    fn ensure_live_connection(&mut self) {
        let reusable = self.connections.usable().map(|handle| handle.state());
        match reusable {
            Some(state) => {
                self.connections.set_purpose(Purpose::Live);
                if state == ConnectionState::Open {
                    self.on_live_open();
                } else {
                    self.renderer
                        .render_connection_status(ConnectionStatus::Connecting);
                }
            }
            None => {
                self.connections.open(Purpose::Live);
                self.renderer
                    .render_connection_status(ConnectionStatus::Connecting);
                self.status("🔌 Conectando al servidor...", Severity::Info);
            }
        }
    }

    fn on_live_open(&mut self) {
        self.connections.reconnect().reset();
        self.renderer
            .render_connection_status(ConnectionStatus::Connected);
        self.status("✅ Conectado - Realizando predicciones...", Severity::Success);

        let Some(camera) = self.ctx.camera.as_ref() else {
            return;
        };
        let Some(connection) = self.connections.current().cloned() else {
            return;
        };
        if self.capture.is_running() {
            return;
        }
        if let Err(err) = self.capture.start(
            Arc::clone(&camera.source),
            connection,
            self.settings_tx.subscribe(),
        ) {
            log_error!("failed to start capture: {err:#}");
        }
    }

    pub(super) async fn stop_camera(&mut self, reason: StopReason) {
        let Some(camera) = self.ctx.camera.take() else {
            if self.ctx.camera_opening.take().is_some() {
                self.renderer.render_loading(None);
                log_info!("camera start cancelled");
            }
            return;
        };

        release_source(&camera.source);
        if let Err(err) = self.capture.stop().await {
            log_error!("{err:#}");
        }
        self.connections.reconnect().reset();
        self.ctx.bump_countdown();

        if self.ctx.upload_guard() {
            self.connections.set_purpose(Purpose::Upload);
        } else {
            self.connections.close();
        }

        if reason != StopReason::PredictionComplete {
            self.set_overlay(OverlayState::Idle);
        }

        log_info!("camera session {} stopped ({:?})", camera.id, reason);
        if reason != StopReason::ReconnectExhausted {
            self.renderer
                .render_connection_status(ConnectionStatus::Disconnected);
            self.status("🛑 Cámara detenida", Severity::Warning);
        }
    }

    async fn on_closed(&mut self, id: u64, clean: bool) {
        if !self.connections.is_current(id) {
            log_debug!("ignoring close of stale connection {}", id);
            return;
        }
        let purpose = self.connections.release(id);
        if let Err(err) = self.capture.stop().await {
            log_error!("{err:#}");
        }
        log_info!("connection {} closed (clean: {}, {:?})", id, clean, purpose);

        if purpose == Some(Purpose::Live) {
            self.connection_status(purpose, ConnectionStatus::Disconnected);
            if clean {
                self.status("🔌 Conexión cerrada", Severity::Warning);
            } else {
                self.status(
                    "❌ Conexión perdida - Intentando reconectar...",
                    Severity::Error,
                );
                self.schedule_reconnect().await;
            }
        }

        let awaiting_result = self
            .ctx
            .upload
            .as_ref()
            .map(|upload| upload.extraction_done && !upload.settle_scheduled)
            .unwrap_or(false);
        if awaiting_result {
            let err = UploadError::ConnectionLost;
            self.status(&format!("❌ Error procesando video: {err}"), Severity::Error);
            self.renderer.render_loading(None);
            self.finish_upload();
        }
    }

    async fn schedule_reconnect(&mut self) {
        let Some(camera) = self.ctx.camera_id() else {
            log_debug!("no camera session, not reconnecting");
            return;
        };

        match self.connections.reconnect().next_attempt() {
            Some((attempt, delay)) => {
                log_info!(
                    "reconnect attempt {}/{} in {:?}",
                    attempt,
                    MAX_RECONNECT_ATTEMPTS,
                    delay
                );
                self.renderer
                    .render_connection_status(ConnectionStatus::Reconnecting);
                self.status(
                    &format!("🔄 Reintentando conexión ({attempt}/{MAX_RECONNECT_ATTEMPTS})..."),
                    Severity::Warning,
                );
                self.schedule(delay, Internal::ReconnectDue { camera });
            }
            None => {
                log_warn!("giving up after {} reconnect attempts", MAX_RECONNECT_ATTEMPTS);
                self.renderer.render_connection_status(ConnectionStatus::Error);
                self.status(
                    "❌ No se pudo conectar al servidor. Verifica tu conexión e intenta recargar la página.",
                    Severity::Error,
                );
                self.stop_camera(StopReason::ReconnectExhausted).await;
            }
        }
    }

    fn on_reconnect_due(&mut self, camera: Uuid) {
        if self.ctx.camera_id() != Some(camera) {
            log_debug!("reconnect abandoned: camera session gone");
            return;
        }
        if self.connections.usable().is_some() {
            log_debug!("reconnect skipped: a connection is already usable");
            self.ensure_live_connection();
            return;
        }
        self.connections.open(Purpose::Live);
        self.renderer
            .render_connection_status(ConnectionStatus::Connecting);
    }

    pub(super) fn start_local_countdown(&mut self) {
        let epoch = self.ctx.bump_countdown();
        self.set_overlay(OverlayState::Countdown(super::overlay::LOCAL_COUNTDOWN_FROM));
        self.schedule(COUNTDOWN_TICK, Internal::CountdownTick { epoch });
    }

    fn on_countdown_tick(&mut self, epoch: u64) {
        if epoch != self.ctx.countdown_epoch {
            return;
        }
        let state = self.ctx.overlay.state().clone();
        match state {
            OverlayState::Countdown(n) if n > 1 => {
                self.set_overlay(OverlayState::Countdown(n - 1));
                self.schedule(COUNTDOWN_TICK, Internal::CountdownTick { epoch });
            }
            OverlayState::Countdown(_) => {
                self.schedule(COUNTDOWN_HIDE_DELAY, Internal::CountdownHide { epoch });
            }
            _ => {}
        }
    }

    fn start_upload(&mut self, path: PathBuf) {
        if let Some(previous) = self.ctx.upload.take() {
            log_warn!(
                "upload of {} replaced before it settled",
                previous.path.display()
            );
            if let Some(task) = previous.task {
                task.abort();
            }
        }

        let epoch = self.ctx.next_token();
        self.ctx.upload = Some(UploadSession::new(epoch, path.clone()));
        log_info!("upload {} started: {}", epoch, path.display());

        if *self.ctx.overlay.state() == OverlayState::Guidance {
            self.set_overlay(OverlayState::Idle);
        }
        self.renderer.render_loading(Some("Procesando video..."));
        self.status("📹 Procesando video subido...", Severity::Info);

        let decoder = match self.media.open_video(&path) {
            Ok(decoder) => decoder,
            Err(err) => {
                log_warn!("failed to open {}: {err:?}", path.display());
                self.status("❌ Error cargando video", Severity::Error);
                self.renderer.show_error(
                    VIDEO_ERROR_TITLE,
                    "No se pudo cargar el video. Verifica que sea un formato compatible.",
                );
                self.renderer.render_loading(None);
                self.finish_upload();
                return;
            }
        };

        let connection = match self.connections.usable().cloned() {
            Some(handle) => {
                log_info!("upload reusing connection {}", handle.id());
                handle
            }
            None => self.connections.open(Purpose::Upload),
        };

        let extractor = UploadExtractor::new(decoder, connection, self.settings_tx.subscribe());
        let tx = self.internal_tx.clone();
        let task = tokio::spawn(async move {
            let progress = tx.clone();
            let result = extractor
                .run(move |sent| {
                    let _ = progress.send(Internal::ExtractionProgress { epoch, sent });
                })
                .await;
            let _ = tx.send(Internal::ExtractionFinished { epoch, result });
        });

        if let Some(upload) = self.ctx.upload_for(epoch) {
            upload.task = Some(task);
        }
    }

    fn on_extraction_progress(&mut self, epoch: u64, sent: u32) {
        let Some(upload) = self.ctx.upload_for(epoch) else {
            return;
        };
        upload.frames_sent = sent;
        let percent = (f64::from(sent) * 100.0 / f64::from(UPLOAD_TARGET_FRAMES)).round();
        self.status(
            &format!("📹 Extrayendo frames: {sent}/{UPLOAD_TARGET_FRAMES} ({percent}%)"),
            Severity::Info,
        );
    }

    fn on_extraction_finished(&mut self, epoch: u64, result: Result<u32, UploadError>) {
        let Some(upload) = self.ctx.upload_for(epoch) else {
            log_debug!("ignoring result of stale upload {}", epoch);
            return;
        };
        upload.task = None;

        match result {
            Ok(frames) => {
                upload.extraction_done = true;
                let deferred = upload.settle_deferred;
                log_info!("upload {} extracted {} frames", epoch, frames);
                self.status(
                    "✅ Frames extraídos - Esperando predicción...",
                    Severity::Info,
                );
                if deferred {
                    self.finish_upload();
                }
            }
            Err(err) => {
                log_warn!("upload {} failed: {err}", epoch);
                self.status(&format!("❌ Error procesando video: {err}"), Severity::Error);
                self.renderer.show_error(
                    VIDEO_ERROR_TITLE,
                    "No se pudo procesar el video. Asegúrate de que sea un formato válido.",
                );
                self.renderer.render_loading(None);
                self.finish_upload();
            }
        }
    }

    pub(super) fn schedule_settle(&mut self, epoch: u64) {
        let Some(upload) = self.ctx.upload_for(epoch) else {
            return;
        };
        if upload.settle_scheduled {
            return;
        }
        upload.settle_scheduled = true;
        self.schedule(UPLOAD_SETTLE_DELAY, Internal::UploadSettle { epoch });
    }

    fn on_upload_settle(&mut self, epoch: u64) {
        let Some(upload) = self.ctx.upload_for(epoch) else {
            return;
        };
        if !upload.extraction_done {
            log_debug!("upload {} settled before extraction finished, deferring", epoch);
            upload.settle_deferred = true;
            return;
        }
        self.finish_upload();
    }

    /// Drop the upload guard and reconcile the connection with the camera.
    fn finish_upload(&mut self) {
        let Some(upload) = self.ctx.upload.take() else {
            return;
        };
        if let Some(task) = upload.task {
            task.abort();
        }

        if self.ctx.camera_active() {
            self.connections.set_purpose(Purpose::Live);
        } else {
            self.connections.close();
        }
        log_info!(
            "upload {} settled; camera available again ({} frames sent)",
            upload.epoch,
            upload.frames_sent
        );
    }

    fn clear_buffer(&mut self) {
        let Some(connection) = self.connections.current().filter(|c| c.is_open()) else {
            log_debug!("clear ignored: not connected");
            return;
        };
        connection.send(&OutboundMessage::Clear);

        self.ctx.predictions.clear();
        self.ctx.current_prediction = None;
        self.renderer.render_predictions(&[]);
        self.renderer.render_current_prediction(None);
        self.status("🧹 Buffer limpiado", Severity::Success);
    }

    fn update_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        if let Some(store) = &self.settings_store {
            store.update(settings.clone())?;
        }
        log_info!(
            "settings updated: threshold {:.2}, {} predictions, {} ms/frame",
            settings.confidence_threshold,
            settings.prediction_count,
            settings.frame_rate
        );
        self.settings_tx.send_replace(settings);
        Ok(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            overlay: self.ctx.overlay.state().clone(),
            overlay_transitions: self.ctx.overlay.transitions(),
            camera_active: self.ctx.camera_active(),
            camera_started_at: self.ctx.camera.as_ref().map(|c| c.started_at),
            upload_active: self.ctx.upload.is_some(),
            upload_guard: self.ctx.upload_guard(),
            upload_frames_sent: self
                .ctx
                .upload
                .as_ref()
                .map(|u| u.frames_sent)
                .unwrap_or(0),
            connection_state: self.connections.state(),
            connection_purpose: self.connections.purpose(),
            reconnect_attempts: self.connections.reconnect_attempts(),
            prediction_count: self.ctx.prediction_count,
            current_prediction: self.ctx.current_prediction.clone(),
            history: self.ctx.history.entries(),
            filter: self.ctx.filter,
            settings: self.settings(),
            uptime_ms: self.ctx.started_at.elapsed().as_millis() as u64,
        }
    }

    async fn shutdown(&mut self) {
        if self.ctx.camera.is_some() {
            self.stop_camera(StopReason::User).await;
        }
        if let Some(upload) = self.ctx.upload.take() {
            if let Some(task) = upload.task {
                task.abort();
            }
        }
        self.connections.close();
    }
}

fn release_source(source: &SharedSource) {
    match source.lock() {
        Ok(mut source) => source.stop(),
        Err(poisoned) => poisoned.into_inner().stop(),
    }
}

//! Applies classified server messages to the session.

use crate::protocol::{InboundMessage, Prediction, UploadProgress};
use crate::render::{RankedPrediction, Severity, Stats};

use super::controller::{
    Internal, SessionController, StopReason, INSUFFICIENT_FRAMES_STOP_DELAY,
};
use super::interpreter::{
    self, insufficient_frames_body, CountdownSignal, Route, StatusMarker, MIN_FRAMES,
};
use super::overlay::OverlayState;

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::session";

use crate::{log_debug, log_info, log_warn};

const INSUFFICIENT_TITLE: &str = "Secuencia Insuficiente";

impl SessionController {
    pub(super) async fn handle_message(&mut self, message: InboundMessage) {
        match interpreter::route(&message, self.ctx.upload_guard()) {
            Route::Upload => return self.handle_upload_message(message),
            Route::SystemMarker => {
                log_info!(
                    "camera marker from server: {}",
                    message.kind.as_deref().or(message.source.as_deref()).unwrap_or("?")
                );
                return;
            }
            Route::Discard => {
                log_debug!("camera message discarded while an upload is active");
                return;
            }
            Route::Camera => {}
        }

        let guard = self.ctx.upload_guard();

        if let Some(frames) = interpreter::insufficient_frames(&message) {
            log_warn!("server rejected sequence: {} frames", frames);
            if let Some(camera) = self.ctx.camera_id().filter(|_| !guard) {
                self.schedule(
                    INSUFFICIENT_FRAMES_STOP_DELAY,
                    Internal::AutoStop {
                        camera,
                        reason: StopReason::InsufficientFrames,
                    },
                );
            }
            self.renderer
                .show_modal(INSUFFICIENT_TITLE, &insufficient_frames_body(frames));
            self.status(
                &format!("❌ Frames insuficientes: {frames}/{MIN_FRAMES} - Intenta nuevamente"),
                Severity::Error,
            );
            if !guard {
                self.ctx.current_prediction = None;
                self.renderer.render_current_prediction(None);
            }
            return;
        }

        match interpreter::countdown_signal(&message) {
            Some(CountdownSignal::Show(remaining)) => {
                self.ctx.bump_countdown();
                self.set_overlay(OverlayState::Countdown(remaining));
            }
            Some(CountdownSignal::Hide) => {
                self.ctx.bump_countdown();
                if self.ctx.overlay.leave_countdown() {
                    self.renderer.render_overlay(self.ctx.overlay.state());
                }
            }
            None => {}
        }

        if let Some(status) = message.status.as_deref().filter(|_| !guard) {
            self.apply_status(&message, status).await;
        }

        if let Some(predictions) = message.predictions.as_deref() {
            self.apply_predictions(predictions, message.main_result(), message.buffer_size);
        }

        if message.status.as_deref().map(interpreter::mentions_demo).unwrap_or(false) {
            self.renderer.render_demo_warning();
        }

        if let Some(error) = message.error.as_deref() {
            self.status(&format!("⚠️ Error del servidor: {error}"), Severity::Error);
        }
    }

    async fn apply_status(&mut self, message: &InboundMessage, status: &str) {
        let marker = StatusMarker::detect(message);
        let server_countdown =
            message.countdown_active.is_some() || message.countdown_remaining.is_some();

        if marker.is_some() && marker != Some(StatusMarker::AboutToRecord) {
            self.ctx.bump_countdown();
        }

        match marker {
            Some(StatusMarker::Pause) => {
                self.set_overlay(OverlayState::Paused(interpreter::pause_remaining(status)))
            }
            Some(StatusMarker::Guidance) => self.set_overlay(OverlayState::Guidance),
            Some(StatusMarker::HandsDetected) => self.set_overlay(OverlayState::HandsDetected),
            Some(StatusMarker::AboutToRecord) => {
                if !server_countdown && !self.ctx.overlay.state().is_countdown() {
                    self.start_local_countdown();
                }
            }
            Some(StatusMarker::Recording) => {
                let progress = message.recording_progress.or(match self.ctx.overlay.state() {
                    OverlayState::Recording(previous) => *previous,
                    _ => None,
                });
                self.set_overlay(OverlayState::Recording(progress));
            }
            Some(StatusMarker::PredictionComplete) => {
                self.set_overlay(OverlayState::Result);
                self.stop_camera(StopReason::PredictionComplete).await;
            }
            None => {}
        }

        self.status(status, Severity::classify(status));

        let has_predictions = message
            .predictions
            .as_ref()
            .map(|p| !p.is_empty())
            .unwrap_or(false);
        if interpreter::is_collecting(status) && !has_predictions {
            self.renderer.render_predictions_loading();
        }
    }

    pub(super) fn apply_predictions(
        &mut self,
        predictions: &[Prediction],
        main: Option<(&str, f64)>,
        buffer_size: Option<u64>,
    ) {
        if !predictions.is_empty() {
            self.ctx.predictions = predictions.to_vec();
            self.ctx.current_prediction = predictions.first().cloned();

            self.renderer.render_predictions(&RankedPrediction::rank_all(
                &self.ctx.predictions,
                self.ctx.filter,
            ));
            self.renderer
                .render_current_prediction(self.ctx.current_prediction.as_ref());

            if let Some((label, confidence)) = main {
                if confidence > self.settings().confidence_threshold {
                    self.ctx.history.push(label, confidence);
                    self.renderer.render_history(&self.ctx.history.entries());
                }
            }
        }

        // An empty list still counts as an answer.
        self.ctx.prediction_count += 1;
        self.renderer.render_stats(Stats {
            prediction_count: self.ctx.prediction_count,
            buffer_size,
        });
    }

    fn handle_upload_message(&mut self, message: InboundMessage) {
        let Some(epoch) = self.ctx.upload_epoch() else {
            log_debug!("upload response with no upload in flight");
            return;
        };

        if let Some(progress) = message.upload_progress.as_ref() {
            self.render_upload_progress(progress);
        }

        if let Some(predictions) = message.predictions.as_deref() {
            self.apply_predictions(predictions, message.main_result(), message.buffer_size);
            let (label, confidence) = message.main_result().unwrap_or_else(|| {
                predictions
                    .first()
                    .map(|p| (p.label.as_str(), p.confidence))
                    .unwrap_or(("?", 0.0))
            });
            self.status(
                &format!("✅ Video procesado: {label} ({:.1}%)", confidence * 100.0),
                Severity::Success,
            );
            self.renderer.render_loading(None);
            self.schedule_settle(epoch);
        } else if let Some(error) = message.error.as_deref() {
            log_warn!("upload {} rejected: {}", epoch, error);
            self.status(&format!("❌ Error procesando video: {error}"), Severity::Error);
            self.renderer.render_loading(None);
            self.schedule_settle(epoch);
        }
    }

    fn render_upload_progress(&self, progress: &UploadProgress) {
        let percent = progress.percent();
        self.status(
            &format!(
                "📹 Procesando video... {}/{} frames ({percent}%)",
                progress.frames_with_hands, progress.target_frames
            ),
            Severity::Info,
        );
        self.renderer.render_loading(Some(&format!(
            "Extrayendo keypoints: {}/{} frames ({percent}%)",
            progress.frames_with_hands, progress.target_frames
        )));
    }
}

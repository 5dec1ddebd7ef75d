use std::time::Duration;

use tokio::sync::watch;

use crate::connection::{ConnectionHandle, WaitOpenError};
use crate::media::{encode_frame, letterbox, VideoDecoder, UPLOAD_CANVAS};
use crate::metrics::SendOutcome;
use crate::protocol::{OutboundMessage, UPLOAD_TARGET_FRAMES};
use crate::settings::Settings;

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::upload";

use crate::{log_debug, log_info};

/// Shortest video worth sampling.
pub const MIN_UPLOAD_DURATION_SECS: f64 = 1.0;
/// Pause between a frame send and the next seek.
pub const PACING_DELAY: Duration = Duration::from_millis(50);
/// How long the extractor waits for its connection to open.
pub const UPLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why an upload was abandoned. `Display` is shown to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    #[error("Video muy corto: {duration:.2}s - Se necesita al menos 1 segundo")]
    TooShort { duration: f64 },
    #[error("No se pudo conectar al servidor para video upload")]
    ConnectTimeout,
    #[error("Conexión perdida durante la subida del video")]
    ConnectionLost,
    #[error("No se pudo leer el frame {index}: {reason}")]
    Decode { index: u32, reason: String },
    #[error("No se pudo codificar el frame {index}: {reason}")]
    Encode { index: u32, reason: String },
}

/// Evenly spaced sample timestamps over a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSchedule {
    duration: f64,
    count: u32,
}

impl SampleSchedule {
    pub fn new(duration: f64) -> Result<Self, UploadError> {
        if duration.is_nan() || duration < MIN_UPLOAD_DURATION_SECS {
            return Err(UploadError::TooShort { duration });
        }
        Ok(Self {
            duration,
            count: UPLOAD_TARGET_FRAMES,
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn interval(&self) -> f64 {
        self.duration / f64::from(self.count)
    }

    /// `t_i = i · interval` for `i` in `[0, count)`.
    pub fn timestamps(&self) -> impl Iterator<Item = f64> {
        let interval = self.interval();
        (0..self.count).map(move |i| f64::from(i) * interval)
    }
}

/// Samples a decoded video into the recognizer over one connection.
pub struct UploadExtractor {
    decoder: Box<dyn VideoDecoder>,
    connection: ConnectionHandle,
    settings: watch::Receiver<Settings>,
}

impl UploadExtractor {
    pub fn new(
        decoder: Box<dyn VideoDecoder>,
        connection: ConnectionHandle,
        settings: watch::Receiver<Settings>,
    ) -> Self {
        Self {
            decoder,
            connection,
            settings,
        }
    }

    /// Reset, 50 tagged frames, then the finish marker. `on_frame` receives the
    /// number of frames sent so far.
    pub async fn run<F>(self, mut on_frame: F) -> Result<u32, UploadError>
    where
        F: FnMut(u32) + Send,
    {
        let schedule = SampleSchedule::new(self.decoder.duration_secs())?;
        log_info!(
            "extracting {} frames from {:.2}s video (every {:.3}s)",
            schedule.count(),
            self.decoder.duration_secs(),
            schedule.interval()
        );

        self.connection
            .wait_open(UPLOAD_CONNECT_TIMEOUT)
            .await
            .map_err(|err| match err {
                WaitOpenError::Timeout(_) => UploadError::ConnectTimeout,
                WaitOpenError::Closed => UploadError::ConnectionLost,
            })?;

        self.send(&OutboundMessage::reset_upload())?;

        for (index, t) in schedule.timestamps().enumerate() {
            let index = index as u32;
            let frame = self
                .decoder
                .seek(t)
                .await
                .map_err(|err| UploadError::Decode {
                    index,
                    reason: format!("{err:#}"),
                })?;

            let data = tokio::task::spawn_blocking(move || {
                encode_frame(&letterbox(&frame, UPLOAD_CANVAS.0, UPLOAD_CANVAS.1))
            })
            .await
            .map_err(|err| UploadError::Encode {
                index,
                reason: err.to_string(),
            })?
            .map_err(|err| UploadError::Encode {
                index,
                reason: format!("{err:#}"),
            })?;

            let settings = self.settings.borrow().clone();
            self.send(&OutboundMessage::upload_frame(data, settings))?;
            log_debug!("upload frame {} at {:.3}s sent", index + 1, t);
            on_frame(index + 1);

            tokio::time::sleep(PACING_DELAY).await;
        }

        let settings = self.settings.borrow().clone();
        self.send(&OutboundMessage::upload_finished(settings))?;
        log_info!("upload extraction finished ({} frames)", schedule.count());
        Ok(schedule.count())
    }

    fn send(&self, message: &OutboundMessage) -> Result<(), UploadError> {
        match self.connection.send(message) {
            SendOutcome::Sent => Ok(()),
            SendOutcome::Dropped => Err(UploadError::ConnectionLost),
        }
    }
}

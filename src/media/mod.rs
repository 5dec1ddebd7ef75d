//! Frame producers: live sources, seekable video decoders and the provider
//! that acquires them.

pub mod encode;
pub mod sequence;

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures_util::future::BoxFuture;
use image::DynamicImage;

pub use encode::{encode_frame, letterbox, JPEG_QUALITY, UPLOAD_CANVAS};
pub use sequence::SequenceProvider;

/// Why a camera or video could not be acquired. `Display` is the text shown to
/// the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquisitionError {
    #[error("Permiso denegado. Por favor, permite el acceso a la cámara y recarga la página.")]
    PermissionDenied,
    #[error("No se encontró ninguna cámara en este dispositivo.")]
    NotFound,
    #[error("La cámara está siendo utilizada por otra aplicación.")]
    Busy,
    #[error("No se pudo configurar la cámara con los parámetros solicitados.")]
    Unsupported,
    #[error("{0}")]
    Other(String),
}

impl AcquisitionError {
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Other(err.to_string()),
        }
    }
}

/// A live video source. Grabs are blocking and run off the async runtime.
pub trait FrameSource: Send {
    fn dimensions(&self) -> (u32, u32);
    fn grab(&mut self) -> Result<DynamicImage>;
    /// Release the device. Further grabs fail.
    fn stop(&mut self);
}

pub type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

/// A decoded, seekable video file.
pub trait VideoDecoder: Send + Sync {
    fn duration_secs(&self) -> f64;
    /// Resolves with the frame at `t` once the seek has completed.
    fn seek(&self, t: f64) -> BoxFuture<'static, Result<DynamicImage>>;
}

pub trait MediaProvider: Send + Sync {
    /// Blocking; called from a blocking task.
    fn open_camera(&self) -> Result<Box<dyn FrameSource>, AcquisitionError>;
    fn open_video(&self, path: &Path) -> Result<Box<dyn VideoDecoder>, AcquisitionError>;
}

//! Directory-of-images media, so the full pipeline runs without platform
//! camera or codec bindings.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use image::DynamicImage;

use super::{AcquisitionError, FrameSource, MediaProvider, VideoDecoder};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::media";

use crate::log_info;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Sorted image files of a directory.
fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, AcquisitionError> {
    if dir.is_file() {
        return Err(AcquisitionError::Unsupported);
    }

    let entries = fs::read_dir(dir).map_err(|err| AcquisitionError::from_io(&err))?;
    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();

    if frames.is_empty() {
        return Err(AcquisitionError::NotFound);
    }
    Ok(frames)
}

fn load(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to decode {}", path.display()))
}

/// Loops over a directory of images as if it were a camera.
pub struct SequenceCamera {
    frames: Vec<PathBuf>,
    next: usize,
    dimensions: (u32, u32),
    stopped: bool,
}

impl SequenceCamera {
    pub fn open(dir: &Path) -> Result<Self, AcquisitionError> {
        let frames = list_frames(dir)?;
        let dimensions = image::image_dimensions(&frames[0])
            .map_err(|err| AcquisitionError::Other(err.to_string()))?;
        log_info!(
            "camera: {} frames from {} ({}x{})",
            frames.len(),
            dir.display(),
            dimensions.0,
            dimensions.1
        );
        Ok(Self {
            frames,
            next: 0,
            dimensions,
            stopped: false,
        })
    }
}

impl FrameSource for SequenceCamera {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn grab(&mut self) -> Result<DynamicImage> {
        if self.stopped {
            bail!("camera stopped");
        }
        let path = &self.frames[self.next];
        self.next = (self.next + 1) % self.frames.len();
        load(path)
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// A directory of images played back at a fixed frame rate.
pub struct SequenceVideo {
    frames: Arc<Vec<PathBuf>>,
    fps: f64,
}

impl SequenceVideo {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, AcquisitionError> {
        if fps.is_nan() || fps <= 0.0 {
            return Err(AcquisitionError::Unsupported);
        }
        let frames = list_frames(dir)?;
        Ok(Self {
            frames: Arc::new(frames),
            fps,
        })
    }

    fn index_at(&self, t: f64) -> usize {
        let index = (t * self.fps).round().max(0.0) as usize;
        index.min(self.frames.len() - 1)
    }
}

impl VideoDecoder for SequenceVideo {
    fn duration_secs(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    fn seek(&self, t: f64) -> BoxFuture<'static, Result<DynamicImage>> {
        let frames = Arc::clone(&self.frames);
        let index = self.index_at(t);
        async move {
            tokio::task::spawn_blocking(move || load(&frames[index]))
                .await
                .map_err(|err| anyhow!("seek task failed: {err}"))?
        }
        .boxed()
    }
}

/// Camera from a fixed directory; uploaded "videos" are directories too.
pub struct SequenceProvider {
    camera_dir: Option<PathBuf>,
    fps: f64,
}

impl SequenceProvider {
    pub fn new(camera_dir: Option<PathBuf>, fps: f64) -> Self {
        Self { camera_dir, fps }
    }
}

impl MediaProvider for SequenceProvider {
    fn open_camera(&self) -> Result<Box<dyn FrameSource>, AcquisitionError> {
        let dir = self.camera_dir.as_deref().ok_or(AcquisitionError::NotFound)?;
        Ok(Box::new(SequenceCamera::open(dir)?))
    }

    fn open_video(&self, path: &Path) -> Result<Box<dyn VideoDecoder>, AcquisitionError> {
        Ok(Box::new(SequenceVideo::open(path, self.fps)?))
    }
}

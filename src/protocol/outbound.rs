use serde::Serialize;

use crate::settings::Settings;

/// Frames per upload; also announced in the finish marker.
pub const UPLOAD_TARGET_FRAMES: u32 = 50;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutboundSource {
    Upload,
    UploadInit,
    UploadFinish,
}

/// Envelopes sent to the recognizer. Serialized with a `type` tag.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Frame {
        /// Base64 JPEG, no data-URL prefix.
        data: String,
        settings: Settings,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<OutboundSource>,
    },
    Clear,
    ResetVideoUpload {
        source: OutboundSource,
    },
    VideoUploadFinished {
        total_frames: u32,
        settings: Settings,
        source: OutboundSource,
    },
}

impl OutboundMessage {
    pub fn camera_frame(data: String, settings: Settings) -> Self {
        Self::Frame {
            data,
            settings,
            source: None,
        }
    }

    pub fn upload_frame(data: String, settings: Settings) -> Self {
        Self::Frame {
            data,
            settings,
            source: Some(OutboundSource::Upload),
        }
    }

    pub fn reset_upload() -> Self {
        Self::ResetVideoUpload {
            source: OutboundSource::UploadInit,
        }
    }

    pub fn upload_finished(settings: Settings) -> Self {
        Self::VideoUploadFinished {
            total_frames: UPLOAD_TARGET_FRAMES,
            settings,
            source: OutboundSource::UploadFinish,
        }
    }

    /// Short name used by logs and send metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Frame { source: None, .. } => "frame",
            Self::Frame { source: Some(_), .. } => "upload_frame",
            Self::Clear => "clear",
            Self::ResetVideoUpload { .. } => "reset_video_upload",
            Self::VideoUploadFinished { .. } => "video_upload_finished",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

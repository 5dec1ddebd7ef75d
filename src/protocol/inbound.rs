use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadProgress {
    #[serde(deserialize_with = "count")]
    pub frames_with_hands: u32,
    #[serde(deserialize_with = "count")]
    pub target_frames: u32,
    #[serde(default)]
    pub progress_percent: f64,
}

impl UploadProgress {
    pub fn percent(&self) -> u32 {
        if self.target_frames == 0 {
            return 0;
        }
        (100.0 * f64::from(self.frames_with_hands) / f64::from(self.target_frames)).round() as u32
    }
}

/// Logical producer an inbound message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Camera,
    Upload,
    CameraBlocked,
    /// No tag, or a tag this client does not know.
    Unspecified,
}

/// Server status envelope. Every field is optional and several may co-occur.
/// A field of the wrong type is dropped on its own; the rest of the message
/// still applies.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    #[serde(deserialize_with = "lenient")]
    pub source: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub status: Option<String>,
    /// Machine-readable stage code, preferred over `status` markers when present.
    #[serde(deserialize_with = "lenient")]
    pub stage: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub error: Option<String>,
    #[serde(deserialize_with = "lenient_count")]
    pub frame_count: Option<i64>,
    #[serde(deserialize_with = "lenient_count")]
    pub frames_count: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub countdown_active: Option<bool>,
    #[serde(deserialize_with = "lenient_count")]
    pub countdown_remaining: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub recording_progress: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub predictions: Option<Vec<Prediction>>,
    #[serde(deserialize_with = "lenient")]
    pub main_prediction: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub confidence: Option<f64>,
    #[serde(deserialize_with = "lenient_count")]
    pub buffer_size: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub upload_progress: Option<UploadProgress>,
}

/// Integer part of a JSON number, whether sent as `12` or `12.0`.
fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(|n| n.trunc() as i64)
    })
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_count<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(whole_number(&value).and_then(|n| T::try_from(n).ok()))
}

fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    whole_number(&value)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("expected a frame count, got {value}")))
}

impl InboundMessage {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn logical_source(&self) -> MessageSource {
        match self.source.as_deref() {
            Some("camera") => MessageSource::Camera,
            Some("upload") => MessageSource::Upload,
            Some("camera_blocked") => MessageSource::CameraBlocked,
            _ => MessageSource::Unspecified,
        }
    }

    pub fn is_camera_restored(&self) -> bool {
        self.kind.as_deref() == Some("camera_restored")
    }

    /// `main_prediction` paired with its `confidence`, when both are present.
    pub fn main_result(&self) -> Option<(&str, f64)> {
        match (self.main_prediction.as_deref(), self.confidence) {
            (Some(label), Some(confidence)) => Some((label, confidence)),
            _ => None,
        }
    }
}

//! Pure classification of inbound messages. The controller applies the effects.

use std::sync::OnceLock;

use regex::Regex;

use crate::protocol::{InboundMessage, MessageSource};

/// Fewest frames the recognizer can classify.
pub const MIN_FRAMES: i64 = 21;

/// Which path an inbound message takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Upload,
    /// Camera restored / camera blocked: UI no-op.
    SystemMarker,
    /// Camera-tagged while an upload owns the UI.
    Discard,
    Camera,
}

pub fn route(message: &InboundMessage, upload_guard: bool) -> Route {
    match message.logical_source() {
        MessageSource::Upload => Route::Upload,
        MessageSource::CameraBlocked => Route::SystemMarker,
        _ if message.is_camera_restored() => Route::SystemMarker,
        MessageSource::Camera if upload_guard => Route::Discard,
        _ => Route::Camera,
    }
}

/// Protocol stage announced by a status string or stage code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMarker {
    Pause,
    Guidance,
    HandsDetected,
    AboutToRecord,
    Recording,
    PredictionComplete,
}

/// Priority order: first hit wins.
const STATUS_MARKERS: &[(StatusMarker, &[&str])] = &[
    (StatusMarker::Pause, &["Pausa después de predicción", "⏸️"]),
    (
        StatusMarker::Guidance,
        &["Muestra ambas manos frente a la cámara", "👋"],
    ),
    (StatusMarker::HandsDetected, &["Ambas manos detectadas", "✋"]),
    (StatusMarker::AboutToRecord, &["Preparándose para grabar", "🔥"]),
    (StatusMarker::Recording, &["Grabando", "🎬"]),
    (StatusMarker::PredictionComplete, &["Predicción completada", "✅"]),
];

impl StatusMarker {
    pub fn from_stage(stage: &str) -> Option<Self> {
        match stage {
            "pause" => Some(Self::Pause),
            "guidance" => Some(Self::Guidance),
            "hands_detected" => Some(Self::HandsDetected),
            "about_to_record" => Some(Self::AboutToRecord),
            "recording" => Some(Self::Recording),
            "prediction_complete" => Some(Self::PredictionComplete),
            _ => None,
        }
    }

    pub fn from_status(status: &str) -> Option<Self> {
        STATUS_MARKERS
            .iter()
            .find(|(_, needles)| needles.iter().any(|needle| status.contains(needle)))
            .map(|(marker, _)| *marker)
    }

    /// A known stage code wins; free text is the fallback.
    pub fn detect(message: &InboundMessage) -> Option<Self> {
        message
            .stage
            .as_deref()
            .and_then(Self::from_stage)
            .or_else(|| message.status.as_deref().and_then(Self::from_status))
    }
}

fn captured_frames_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+)\s+frames\s+capturados")
            .expect("captured-frames regex should compile")
    })
}

fn pause_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+\.\d+)s").expect("pause regex should compile"))
}

/// Frame count behind an insufficient-frames rejection, if the message is one.
pub fn insufficient_frames(message: &InboundMessage) -> Option<i64> {
    if let Some(error) = message.error.as_deref() {
        let explicit = error.contains("insufficient frames") || error.contains("frames insuficientes");
        let short = message.frame_count.map(|n| n < MIN_FRAMES).unwrap_or(false);
        if explicit || short {
            return Some(message.frame_count.unwrap_or(0));
        }
    }

    if message.predictions.is_some() {
        if let Some(count) = message.frames_count.filter(|n| *n < MIN_FRAMES) {
            return Some(count);
        }
    }

    let status = message.status.as_deref()?;
    let captures = captured_frames_pattern().captures(status)?;
    let count: i64 = captures[1].parse().ok()?;
    (count < MIN_FRAMES).then_some(count)
}

/// Remaining pause seconds embedded as `"<float>s"`.
pub fn pause_remaining(status: &str) -> Option<f64> {
    pause_pattern()
        .captures(status)
        .and_then(|captures| captures[1].parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownSignal {
    Show(u32),
    Hide,
}

pub fn countdown_signal(message: &InboundMessage) -> Option<CountdownSignal> {
    match (message.countdown_active, message.countdown_remaining) {
        (Some(true), Some(remaining)) if remaining > 0 => {
            Some(CountdownSignal::Show(u32::try_from(remaining).unwrap_or(u32::MAX)))
        }
        (Some(false), _) | (_, Some(0)) => Some(CountdownSignal::Hide),
        _ => None,
    }
}

pub fn mentions_demo(status: &str) -> bool {
    status.contains("demostración") || status.contains("demo")
}

pub fn is_collecting(status: &str) -> bool {
    status.contains("Recolectando")
}

pub fn insufficient_frames_body(frame_count: i64) -> String {
    format!(
        "Se detectaron {frame_count} frames, pero se necesitan al menos {MIN_FRAMES} frames para \
         realizar una predicción precisa en 2.5 segundos.\n\n\
         Consejos:\n\
         - Mantén las manos visibles durante toda la seña\n\
         - Realiza movimientos más lentos y claros\n\
         - Asegúrate de tener buena iluminación\n\
         - Evita movimientos bruscos o muy rápidos\n\n\
         Intenta nuevamente realizando la seña de forma más pausada."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> InboundMessage {
        InboundMessage::parse(raw).unwrap()
    }

    #[test]
    fn routing_follows_source_and_guard() {
        assert_eq!(route(&parse(r#"{"source":"upload"}"#), false), Route::Upload);
        assert_eq!(route(&parse(r#"{"source":"upload"}"#), true), Route::Upload);
        assert_eq!(route(&parse(r#"{"source":"camera_blocked"}"#), true), Route::SystemMarker);
        assert_eq!(route(&parse(r#"{"type":"camera_restored"}"#), false), Route::SystemMarker);
        assert_eq!(route(&parse(r#"{"source":"camera"}"#), true), Route::Discard);
        assert_eq!(route(&parse(r#"{"source":"camera"}"#), false), Route::Camera);
        assert_eq!(route(&parse(r#"{"status":"x"}"#), true), Route::Camera);
    }

    #[test]
    fn markers_are_matched_in_priority_order() {
        assert_eq!(
            StatusMarker::from_status("⏸️ Pausa después de predicción (1.5s)"),
            Some(StatusMarker::Pause)
        );
        assert_eq!(
            StatusMarker::from_status("👋 Muestra ambas manos frente a la cámara"),
            Some(StatusMarker::Guidance)
        );
        assert_eq!(
            StatusMarker::from_status("✋ Ambas manos detectadas"),
            Some(StatusMarker::HandsDetected)
        );
        assert_eq!(
            StatusMarker::from_status("🔥 Preparándose para grabar..."),
            Some(StatusMarker::AboutToRecord)
        );
        assert_eq!(
            StatusMarker::from_status("🎬 Grabando seña"),
            Some(StatusMarker::Recording)
        );
        assert_eq!(
            StatusMarker::from_status("✅ Predicción completada"),
            Some(StatusMarker::PredictionComplete)
        );
        // Pause wins over the success marker it also carries.
        assert_eq!(
            StatusMarker::from_status("✅ Pausa después de predicción"),
            Some(StatusMarker::Pause)
        );
        assert_eq!(StatusMarker::from_status("Procesando"), None);
    }

    #[test]
    fn stage_code_is_preferred_over_text() {
        let message = parse(r#"{"stage":"recording","status":"👋 Muestra ambas manos"}"#);
        assert_eq!(StatusMarker::detect(&message), Some(StatusMarker::Recording));

        let unknown = parse(r#"{"stage":"warming_up","status":"👋 Muestra ambas manos"}"#);
        assert_eq!(StatusMarker::detect(&unknown), Some(StatusMarker::Guidance));
    }

    #[test]
    fn detects_every_insufficient_frames_form() {
        assert_eq!(
            insufficient_frames(&parse(r#"{"error":"insufficient frames","frame_count":12}"#)),
            Some(12)
        );
        assert_eq!(
            insufficient_frames(&parse(r#"{"error":"frames insuficientes"}"#)),
            Some(0)
        );
        assert_eq!(
            insufficient_frames(&parse(r#"{"error":"otro","frame_count":20}"#)),
            Some(20)
        );
        assert_eq!(
            insufficient_frames(&parse(
                r#"{"predictions":[{"label":"A","confidence":0.5}],"frames_count":15}"#
            )),
            Some(15)
        );
        assert_eq!(
            insufficient_frames(&parse(r#"{"status":"⚠️ Solo 9 frames capturados"}"#)),
            Some(9)
        );

        assert_eq!(insufficient_frames(&parse(r#"{"error":"otro","frame_count":21}"#)), None);
        assert_eq!(insufficient_frames(&parse(r#"{"status":"30 frames capturados"}"#)), None);
        assert_eq!(insufficient_frames(&parse(r#"{"frames_count":3}"#)), None);
    }

    #[test]
    fn countdown_fields() {
        assert_eq!(
            countdown_signal(&parse(r#"{"countdown_active":true,"countdown_remaining":2}"#)),
            Some(CountdownSignal::Show(2))
        );
        assert_eq!(
            countdown_signal(&parse(r#"{"countdown_active":true,"countdown_remaining":0}"#)),
            Some(CountdownSignal::Hide)
        );
        assert_eq!(
            countdown_signal(&parse(r#"{"countdown_active":false}"#)),
            Some(CountdownSignal::Hide)
        );
        assert_eq!(countdown_signal(&parse(r#"{"status":"x"}"#)), None);
    }

    #[test]
    fn pause_seconds_are_parsed_from_text() {
        assert_eq!(pause_remaining("⏸️ Pausa después de predicción (2.5s)"), Some(2.5));
        assert_eq!(pause_remaining("⏸️ Pausa"), None);
    }
}

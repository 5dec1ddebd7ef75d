//! JSON envelopes exchanged with the recognizer over the persistent connection.

pub mod inbound;
pub mod outbound;

pub use inbound::{InboundMessage, MessageSource, Prediction, UploadProgress};
pub use outbound::{OutboundMessage, OutboundSource, UPLOAD_TARGET_FRAMES};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use serde_json::json;

    #[test]
    fn camera_frame_omits_source() {
        let msg = OutboundMessage::camera_frame("abc".into(), Settings::default());
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "frame");
        assert_eq!(value["data"], "abc");
        assert_eq!(value["settings"]["frameRate"], 50);
        assert!(value.get("source").is_none());
    }

    #[test]
    fn upload_envelopes_carry_their_tags() {
        let frame = serde_json::to_value(OutboundMessage::upload_frame(
            "xyz".into(),
            Settings::default(),
        ))
        .unwrap();
        assert_eq!(frame["source"], "upload");

        let reset = serde_json::to_value(OutboundMessage::reset_upload()).unwrap();
        assert_eq!(reset, json!({"type": "reset_video_upload", "source": "upload_init"}));

        let finish =
            serde_json::to_value(OutboundMessage::upload_finished(Settings::default())).unwrap();
        assert_eq!(finish["type"], "video_upload_finished");
        assert_eq!(finish["total_frames"], 50);
        assert_eq!(finish["source"], "upload_finish");

        let clear = serde_json::to_value(OutboundMessage::Clear).unwrap();
        assert_eq!(clear, json!({"type": "clear"}));
    }

    #[test]
    fn inbound_fields_may_co_occur() {
        let msg = InboundMessage::parse(
            r#"{"source":"camera","status":"✅ Predicción completada",
                "predictions":[{"label":"HOLA","confidence":0.92}],
                "main_prediction":"HOLA","confidence":0.92,"buffer_size":50,
                "hands_detected":true}"#,
        )
        .unwrap();
        assert_eq!(msg.logical_source(), MessageSource::Camera);
        assert_eq!(msg.predictions.as_ref().map(Vec::len), Some(1));
        assert_eq!(msg.main_result(), Some(("HOLA", 0.92)));
        assert_eq!(msg.buffer_size, Some(50));
    }

    #[test]
    fn float_counts_are_accepted_and_bad_fields_dropped_alone() {
        let msg = InboundMessage::parse(
            r#"{"source":"camera","status":"👋 Muestra ambas manos frente a la cámara",
                "countdown_remaining":2.0,"frame_count":12.0,"frames_count":"muchos",
                "countdown_active":"sí","buffer_size":-3,"confidence":0.5}"#,
        )
        .unwrap();
        assert_eq!(msg.countdown_remaining, Some(2));
        assert_eq!(msg.frame_count, Some(12));
        assert_eq!(msg.frames_count, None);
        assert_eq!(msg.countdown_active, None);
        assert_eq!(msg.buffer_size, None);
        assert_eq!(
            msg.status.as_deref(),
            Some("👋 Muestra ambas manos frente a la cámara")
        );
        assert_eq!(msg.confidence, Some(0.5));

        let progress = InboundMessage::parse(
            r#"{"source":"upload","upload_progress":{"frames_with_hands":40.0,"target_frames":50},
                "predictions":"pending"}"#,
        )
        .unwrap();
        assert_eq!(progress.upload_progress.as_ref().map(|p| p.percent()), Some(80));
        assert_eq!(progress.predictions, None);
        assert_eq!(progress.logical_source(), MessageSource::Upload);
    }

    #[test]
    fn unknown_or_missing_source_is_unspecified() {
        assert_eq!(
            InboundMessage::parse("{}").unwrap().logical_source(),
            MessageSource::Unspecified
        );
        let restored =
            InboundMessage::parse(r#"{"type":"camera_restored","status":"📷"}"#).unwrap();
        assert!(restored.is_camera_restored());
        assert_eq!(
            InboundMessage::parse(r#"{"source":"camera_blocked"}"#)
                .unwrap()
                .logical_source(),
            MessageSource::CameraBlocked
        );
    }

    #[test]
    fn upload_progress_percent_is_rounded() {
        let progress = UploadProgress {
            frames_with_hands: 17,
            target_frames: 50,
            progress_percent: 0.0,
        };
        assert_eq!(progress.percent(), 34);

        let progress = UploadProgress {
            frames_with_hands: 1,
            target_frames: 3,
            progress_percent: 0.0,
        };
        assert_eq!(progress.percent(), 33);
    }
}

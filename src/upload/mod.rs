//! File upload: fixed-count frame sampling of a decoded video.

pub mod extractor;

pub use extractor::{
    SampleSchedule, UploadError, UploadExtractor, MIN_UPLOAD_DURATION_SECS, PACING_DELAY,
    UPLOAD_CONNECT_TIMEOUT,
};

//! Live capture: sample the camera, encode, send, reschedule.

pub mod controller;
pub mod loop_worker;

pub use controller::CaptureController;

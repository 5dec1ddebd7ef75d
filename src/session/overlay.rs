use std::fmt;

use serde::Serialize;

/// Default guidance text shown right after the camera starts.
pub const DEFAULT_GUIDANCE: &str = "Muestra ambas manos frente a la cámara";
/// Local fallback countdown start value.
pub const LOCAL_COUNTDOWN_FROM: u32 = 3;

/// The single visible protocol-stage overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum OverlayState {
    Idle,
    Guidance,
    /// Both hands in view. Renders no overlay of its own.
    HandsDetected,
    Countdown(u32),
    Recording(Option<f64>),
    /// Remaining pause seconds, when the status carried them.
    Paused(Option<f64>),
    Result,
}

impl OverlayState {
    pub fn is_countdown(&self) -> bool {
        matches!(self, OverlayState::Countdown(_))
    }
}

impl fmt::Display for OverlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayState::Idle => write!(f, "idle"),
            OverlayState::Guidance => write!(f, "guidance ({DEFAULT_GUIDANCE})"),
            OverlayState::HandsDetected => write!(f, "hands detected"),
            OverlayState::Countdown(n) => write!(f, "countdown {n}"),
            OverlayState::Recording(Some(p)) => write!(f, "recording {:.0}%", p * 100.0),
            OverlayState::Recording(None) => write!(f, "recording"),
            OverlayState::Paused(Some(s)) => write!(f, "paused {s:.1}s"),
            OverlayState::Paused(None) => write!(f, "paused"),
            OverlayState::Result => write!(f, "result"),
        }
    }
}

/// Holds the current overlay; every transition goes through here.
#[derive(Debug, Clone)]
pub struct OverlayMachine {
    state: OverlayState,
    transitions: u64,
}

impl OverlayMachine {
    pub fn new() -> Self {
        Self {
            state: OverlayState::Idle,
            transitions: 0,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    /// Number of state changes so far.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Move to `next`. Returns false when already there.
    pub fn transition(&mut self, next: OverlayState) -> bool {
        if self.state == next {
            return false;
        }
        self.state = next;
        self.transitions += 1;
        true
    }

    /// Drop out of Countdown, if in it.
    pub fn leave_countdown(&mut self) -> bool {
        if self.state.is_countdown() {
            self.transition(OverlayState::Idle)
        } else {
            false
        }
    }
}

impl Default for OverlayMachine {
    fn default() -> Self {
        Self::new()
    }
}

//! Switchable, target-tagged logging macros.
//!
//! A module opts in by defining two consts next to its imports:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! const LOG_TARGET: &str = "signcast::connection";
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("connection {} open", id);
//! ```
//! Flipping `ENABLE_LOGS` silences a chatty module without touching `RUST_LOG`,
//! while `LOG_TARGET` lets `RUST_LOG=signcast::capture=debug` pick one out.

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!(target: LOG_TARGET, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!(target: LOG_TARGET, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!(target: LOG_TARGET, $($arg)*);
        }
    };
}

/// Errors are never gated: a muted module still reports failures.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        {
            let _ = ENABLE_LOGS;
            log::error!(target: LOG_TARGET, $($arg)*);
        }
    };
}

/// Initialise `env_logger` from `RUST_LOG`, defaulting to Info (Debug in debug mode).
pub fn init(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

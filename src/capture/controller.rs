use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connection::ConnectionHandle;
use crate::media::SharedSource;
use crate::settings::Settings;

use super::loop_worker::capture_loop;

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::capture";

use crate::log_debug;

/// Owns the running capture loop, if any.
pub struct CaptureController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(
        &mut self,
        source: SharedSource,
        connection: ConnectionHandle,
        settings: watch::Receiver<Settings>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("capture already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(
            source,
            connection,
            settings,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancel the loop and wait for it to exit. In-flight encodes are discarded.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            log_debug!("waiting for capture loop to exit");
            handle
                .await
                .context("capture loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new()
    }
}

use anyhow::anyhow;
use tokio::sync::watch;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::connection::ConnectionHandle;
use crate::media::{encode_frame, letterbox, SharedSource};
use crate::protocol::OutboundMessage;
use crate::settings::Settings;

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::capture";

use crate::{log_debug, log_error, log_info, log_warn};

/// Self-rescheduling capture loop. The next tick is scheduled after dispatch,
/// `frameRate` ms later, whether or not the previous frame was sent yet.
pub async fn capture_loop(
    source: SharedSource,
    connection: ConnectionHandle,
    settings: watch::Receiver<Settings>,
    cancel_token: CancellationToken,
) {
    let size = frame_size(&source);
    log_info!(
        "capture loop started on connection {} ({}x{})",
        connection.id(),
        size.0,
        size.1
    );
    let mut ticks: u64 = 0;

    loop {
        if connection.is_open() {
            let frame_settings = settings.borrow().clone();
            tokio::spawn(dispatch_frame(
                source.clone(),
                size,
                connection.clone(),
                frame_settings,
                cancel_token.clone(),
            ));
            ticks += 1;
        }

        let delay = Duration::from_millis(settings.borrow().frame_rate);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_token.cancelled() => {
                log_info!("capture loop shutting down after {} frames", ticks);
                break;
            }
        }
    }
}

/// Canvas size, fixed for the life of the loop.
fn frame_size(source: &SharedSource) -> (u32, u32) {
    match source.lock() {
        Ok(source) => source.dimensions(),
        Err(poisoned) => poisoned.into_inner().dimensions(),
    }
}

async fn dispatch_frame(
    source: SharedSource,
    (width, height): (u32, u32),
    connection: ConnectionHandle,
    settings: Settings,
    cancel_token: CancellationToken,
) {
    let encoded = tokio::task::spawn_blocking(move || {
        let frame = {
            let mut source = source
                .lock()
                .map_err(|_| anyhow!("frame source lock poisoned"))?;
            source.grab()?
        };
        if (frame.width(), frame.height()) == (width, height) {
            encode_frame(&frame)
        } else {
            encode_frame(&letterbox(&frame, width, height))
        }
    })
    .await;

    match encoded {
        Ok(Ok(data)) => {
            if cancel_token.is_cancelled() {
                log_debug!("capture stopped mid-encode, discarding frame");
                return;
            }
            connection.send(&OutboundMessage::camera_frame(data, settings));
        }
        Ok(Err(err)) => log_warn!("frame capture failed: {err:#}"),
        Err(err) => log_error!("frame capture task failed: {err}"),
    }
}

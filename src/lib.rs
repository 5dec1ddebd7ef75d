pub mod capture;
pub mod config;
pub mod connection;
pub mod media;
pub mod metrics;
pub mod protocol;
pub mod render;
pub mod session;
pub mod settings;
pub mod upload;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;

use config::ClientConfig;
use connection::Connector;
use media::MediaProvider;
use metrics::SendObserver;
use render::Renderer;
use session::{SessionController, SessionHandle, SessionParts};
use settings::SettingsStore;

/// Build the session actor for `config` and spawn it on the current runtime.
pub fn spawn_session(
    config: &ClientConfig,
    connector: Arc<dyn Connector>,
    media: Arc<dyn MediaProvider>,
    renderer: Arc<dyn Renderer>,
    observer: Arc<dyn SendObserver>,
) -> Result<(SessionHandle, JoinHandle<()>)> {
    let settings_store = match &config.settings_path {
        Some(path) => Some(Arc::new(SettingsStore::new(path.clone())?)),
        None => None,
    };

    let (controller, handle) = SessionController::new(SessionParts {
        url: config.endpoint_url(),
        connector,
        media,
        renderer,
        observer,
        settings_store,
    });

    log::info!("signcast session for {}", config.endpoint_url());
    Ok((handle, tokio::spawn(controller.run())))
}

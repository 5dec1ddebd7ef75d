use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};

use crate::render::PredictionFilter;
use crate::settings::Settings;

use super::state::SessionSnapshot;

pub enum SessionCommand {
    StartCamera,
    StopCamera,
    UploadVideo(PathBuf),
    ClearBuffer,
    UpdateSettings(Settings, oneshot::Sender<Result<()>>),
    ClearHistory,
    SetPredictionFilter(PredictionFilter),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Cloneable front door to the session actor.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { commands }
    }

    fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("session controller is not running"))
    }

    pub fn start_camera(&self) -> Result<()> {
        self.send(SessionCommand::StartCamera)
    }

    pub fn stop_camera(&self) -> Result<()> {
        self.send(SessionCommand::StopCamera)
    }

    pub fn upload_video(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(SessionCommand::UploadVideo(path.into()))
    }

    pub fn clear_buffer(&self) -> Result<()> {
        self.send(SessionCommand::ClearBuffer)
    }

    /// Validate, persist and apply new settings.
    pub async fn update_settings(&self, settings: Settings) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::UpdateSettings(settings, tx))?;
        rx.await
            .map_err(|_| anyhow!("session controller dropped the settings update"))?
    }

    pub fn clear_history(&self) -> Result<()> {
        self.send(SessionCommand::ClearHistory)
    }

    pub fn set_prediction_filter(&self, filter: PredictionFilter) -> Result<()> {
        self.send(SessionCommand::SetPredictionFilter(filter))
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(tx))?;
        rx.await
            .map_err(|_| anyhow!("session controller dropped the snapshot request"))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown)
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};

use signcast_lib::config::ClientConfig;
use signcast_lib::connection::WsConnector;
use signcast_lib::media::SequenceProvider;
use signcast_lib::metrics::SendMetrics;
use signcast_lib::render::LogRenderer;
use signcast_lib::session::SessionHandle;
use signcast_lib::{spawn_session, utils};

const UPLOAD_POLL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "signcast", about = "Real-time sign recognition client", version)]
struct Cli {
    /// Recognizer `host[:port]`.
    #[arg(long, env = "SIGNCAST_HOST")]
    host: Option<String>,
    /// Connect over wss://.
    #[arg(long, env = "SIGNCAST_SECURE", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    secure: bool,
    /// JSON file the recognition settings persist to.
    #[arg(long, env = "SIGNCAST_SETTINGS")]
    settings: Option<PathBuf>,
    #[arg(long, env = "SIGNCAST_DEBUG", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a directory of frames as the live camera.
    Live {
        #[arg(long)]
        frames: PathBuf,
        /// Stop after this many seconds (Ctrl-C stops earlier).
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Upload a directory of frames as a recorded video.
    Upload {
        #[arg(long)]
        frames: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
        /// Give up waiting for the result after this many seconds.
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            host: self.host.clone().unwrap_or(defaults.host),
            secure: self.secure,
            settings_path: self.settings.clone(),
            debug: self.debug,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli.client_config();
    utils::logging::init(config.debug);

    let metrics = SendMetrics::new();
    let media = match &cli.command {
        Command::Live { frames, .. } => SequenceProvider::new(Some(frames.clone()), 30.0),
        Command::Upload { fps, .. } => SequenceProvider::new(None, *fps),
    };

    let (session, actor) = spawn_session(
        &config,
        Arc::new(WsConnector),
        Arc::new(media),
        Arc::new(LogRenderer),
        Arc::new(metrics.clone()),
    )?;

    match cli.command {
        Command::Live { seconds, .. } => run_live(&session, seconds).await?,
        Command::Upload {
            frames, timeout, ..
        } => run_upload(&session, frames, timeout).await?,
    }

    let snapshot = session.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    let sends = metrics.snapshot();
    log::info!(
        "sent {} messages ({} bytes), dropped {}",
        sends.sent_count,
        sends.bytes_sent,
        sends.dropped_count
    );

    session.shutdown()?;
    actor.await?;
    Ok(())
}

async fn run_live(session: &SessionHandle, seconds: u64) -> Result<()> {
    session.start_camera()?;
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => log::info!("interrupted"),
    }
    session.stop_camera()
}

async fn run_upload(session: &SessionHandle, frames: PathBuf, timeout: u64) -> Result<()> {
    session.upload_video(frames)?;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout);

    while session.snapshot().await?.upload_active {
        if tokio::time::Instant::now() >= deadline {
            log::warn!("no upload result after {timeout}s");
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(UPLOAD_POLL) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_and_environment_build_the_config() {
        std::env::remove_var("SIGNCAST_HOST");
        std::env::remove_var("SIGNCAST_SETTINGS");
        std::env::remove_var("SIGNCAST_DEBUG");

        std::env::set_var("SIGNCAST_SECURE", "yes");
        let cli = Cli::try_parse_from(["signcast", "live", "--frames", "shots"]).unwrap();
        let config = cli.client_config();
        assert!(config.secure);
        assert!(!config.debug);
        assert_eq!(config.endpoint_url(), "wss://127.0.0.1:8000/ws");

        std::env::set_var("SIGNCAST_SECURE", "off");
        let cli = Cli::try_parse_from([
            "signcast", "--host", "signs.local:9000", "--debug", "upload", "--frames", "clip",
        ])
        .unwrap();
        let config = cli.client_config();
        assert!(!config.secure);
        assert!(config.debug);
        assert_eq!(config.endpoint_url(), "ws://signs.local:9000/ws");

        std::env::set_var("SIGNCAST_SECURE", "maybe");
        assert!(Cli::try_parse_from(["signcast", "live", "--frames", "shots"]).is_err());

        std::env::remove_var("SIGNCAST_SECURE");
        let cli = Cli::try_parse_from(["signcast", "--secure", "live", "--frames", "shots"]).unwrap();
        assert!(cli.client_config().secure);
    }
}

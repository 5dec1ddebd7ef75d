use std::path::PathBuf;

/// Fixed endpoint path of the recognizer service.
pub const ENDPOINT_PATH: &str = "/ws";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host[:port]` of the recognizer service.
    pub host: String,
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    pub settings_path: Option<PathBuf>,
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:8000".into(),
            secure: false,
            settings_path: None,
            debug: false,
        }
    }
}

impl ClientConfig {
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}{ENDPOINT_PATH}", self.host)
    }
}

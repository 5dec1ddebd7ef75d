use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::transport";

use crate::{log_debug, log_warn};

#[derive(Debug)]
pub enum LinkCommand {
    Text(String),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Text(String),
    /// `clean` is true when the closing handshake completed.
    Closed { clean: bool },
}

/// An established, message-oriented duplex link.
pub struct Link {
    pub outgoing: mpsc::UnboundedSender<LinkCommand>,
    pub incoming: mpsc::UnboundedReceiver<LinkEvent>,
}

pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link>>;
}

/// WebSocket transport backed by tokio-tungstenite.
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link>> {
        let url = url.to_string();
        async move {
            let (stream, _) = connect_async(url.as_str())
                .await
                .with_context(|| format!("websocket connect to {url} failed"))?;
            let (mut ws_tx, mut ws_rx) = stream.split();

            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<LinkCommand>();
            let (in_tx, in_rx) = mpsc::unbounded_channel::<LinkEvent>();

            tokio::spawn(async move {
                while let Some(command) = out_rx.recv().await {
                    match command {
                        LinkCommand::Text(text) => {
                            if let Err(err) = ws_tx.send(Message::Text(text.into())).await {
                                log_warn!("websocket write failed: {err}");
                                break;
                            }
                        }
                        LinkCommand::Close => {
                            let _ = ws_tx.close().await;
                            break;
                        }
                    }
                }
            });

            tokio::spawn(async move {
                let clean = loop {
                    match ws_rx.next().await {
                        Some(Ok(Message::Text(text))) => {
                            if in_tx.send(LinkEvent::Text(text.to_string())).is_err() {
                                return;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log_debug!("websocket close frame: {frame:?}");
                            break true;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            log_warn!("websocket read failed: {err}");
                            break false;
                        }
                        None => break false,
                    }
                };
                let _ = in_tx.send(LinkEvent::Closed { clean });
            });

            Ok(Link {
                outgoing: out_tx,
                incoming: in_rx,
            })
        }
        .boxed()
    }
}

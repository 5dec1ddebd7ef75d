use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::metrics::{SendObserver, SendOutcome};
use crate::protocol::OutboundMessage;

use super::reconnect::ReconnectPolicy;
use super::transport::{Connector, LinkCommand, LinkEvent};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "signcast::connection";

use crate::{log_debug, log_error, log_info, log_warn};

/// Why a connection was opened. Decides reconnect and indicator behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Purpose {
    Live,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

/// Everything the manager observes on a connection, tagged with its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened { id: u64 },
    Message { id: u64, text: String },
    Closed { id: u64, clean: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitOpenError {
    #[error("connection did not open within {0:?}")]
    Timeout(Duration),
    #[error("connection closed before opening")]
    Closed,
}

/// Cloneable send side of one connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: u64,
    state: watch::Receiver<ConnectionState>,
    outgoing: mpsc::UnboundedSender<LinkCommand>,
    observer: Arc<dyn SendObserver>,
}

impl ConnectionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Fire-and-forget. Anything sent while the connection is not Open is
    /// logged and dropped, never queued.
    pub fn send(&self, message: &OutboundMessage) -> SendOutcome {
        let kind = message.kind();
        let state = self.state();
        if state != ConnectionState::Open {
            log_debug!("dropping {} on connection {} ({:?})", kind, self.id, state);
            self.observer.on_send(self.id, kind, 0, SendOutcome::Dropped);
            return SendOutcome::Dropped;
        }

        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(err) => {
                log_error!("failed to serialize {kind}: {err}");
                self.observer.on_send(self.id, kind, 0, SendOutcome::Dropped);
                return SendOutcome::Dropped;
            }
        };

        let bytes = payload.len();
        if self.outgoing.send(LinkCommand::Text(payload)).is_err() {
            log_debug!("connection {} driver gone, dropping {}", self.id, kind);
            self.observer.on_send(self.id, kind, 0, SendOutcome::Dropped);
            return SendOutcome::Dropped;
        }

        self.observer.on_send(self.id, kind, bytes, SendOutcome::Sent);
        SendOutcome::Sent
    }

    /// Resolve once Open; fail if the connection closes first or `timeout` elapses.
    pub async fn wait_open(&self, timeout: Duration) -> Result<(), WaitOpenError> {
        let mut state = self.state.clone();
        let settled = tokio::time::timeout(
            timeout,
            state.wait_for(|s| matches!(s, ConnectionState::Open | ConnectionState::Closed)),
        )
        .await
        .map_err(|_| WaitOpenError::Timeout(timeout))?;

        match settled.map(|s| *s) {
            Ok(ConnectionState::Open) => Ok(()),
            _ => Err(WaitOpenError::Closed),
        }
    }
}

struct ActiveConnection {
    purpose: Purpose,
    handle: ConnectionHandle,
}

/// Owns the single logical transport handle.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    url: String,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    observer: Arc<dyn SendObserver>,
    current: Option<ActiveConnection>,
    next_id: u64,
    reconnect: ReconnectPolicy,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        url: String,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        observer: Arc<dyn SendObserver>,
    ) -> Self {
        Self {
            connector,
            url,
            events,
            observer,
            current: None,
            next_id: 1,
            reconnect: ReconnectPolicy::new(),
        }
    }

    /// Open a fresh connection, closing whatever was current.
    pub fn open(&mut self, purpose: Purpose) -> ConnectionHandle {
        self.close();

        let id = self.next_id;
        self.next_id += 1;

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(drive_connection(
            id,
            self.url.clone(),
            Arc::clone(&self.connector),
            state_tx,
            command_rx,
            self.events.clone(),
        ));

        let handle = ConnectionHandle {
            id,
            state: state_rx,
            outgoing: command_tx,
            observer: Arc::clone(&self.observer),
        };

        log_info!("opening connection {} ({:?}) to {}", id, purpose, self.url);
        self.current = Some(ActiveConnection {
            purpose,
            handle: handle.clone(),
        });
        handle
    }

    /// Cleanly close the current connection, if any. Its close event will be stale.
    pub fn close(&mut self) -> Option<Purpose> {
        let active = self.current.take()?;
        log_info!(
            "closing connection {} ({:?})",
            active.handle.id,
            active.purpose
        );
        let _ = active.handle.outgoing.send(LinkCommand::Close);
        Some(active.purpose)
    }

    /// Forget the current connection after its driver reported closure.
    pub fn release(&mut self, id: u64) -> Option<Purpose> {
        if self.is_current(id) {
            self.current.take().map(|active| active.purpose)
        } else {
            None
        }
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.current
            .as_ref()
            .map(|active| active.handle.id == id)
            .unwrap_or(false)
    }

    pub fn current(&self) -> Option<&ConnectionHandle> {
        self.current.as_ref().map(|active| &active.handle)
    }

    pub fn purpose(&self) -> Option<Purpose> {
        self.current.as_ref().map(|active| active.purpose)
    }

    pub fn state(&self) -> ConnectionState {
        self.current
            .as_ref()
            .map(|active| active.handle.state())
            .unwrap_or(ConnectionState::Closed)
    }

    /// Re-tag the current connection without touching the transport.
    pub fn set_purpose(&mut self, purpose: Purpose) {
        if let Some(active) = self.current.as_mut() {
            if active.purpose != purpose {
                log_debug!(
                    "connection {} now serves {:?} (was {:?})",
                    active.handle.id,
                    purpose,
                    active.purpose
                );
                active.purpose = purpose;
            }
        }
    }

    /// Current connection when it is Open or about to be.
    pub fn usable(&self) -> Option<&ConnectionHandle> {
        self.current().filter(|handle| {
            matches!(
                handle.state(),
                ConnectionState::Open | ConnectionState::Connecting
            )
        })
    }

    pub fn reconnect(&mut self) -> &mut ReconnectPolicy {
        &mut self.reconnect
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect.attempts()
    }
}

async fn drive_connection(
    id: u64,
    url: String,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let finish = |clean: bool| {
        let _ = state.send(ConnectionState::Closed);
        let _ = events.send(ConnectionEvent::Closed { id, clean });
    };

    let mut connecting = connector.connect(&url);
    let connected = loop {
        tokio::select! {
            result = &mut connecting => break result,
            command = commands.recv() => match command {
                Some(LinkCommand::Text(_)) => continue,
                Some(LinkCommand::Close) | None => {
                    log_debug!("connection {} closed while connecting", id);
                    finish(true);
                    return;
                }
            }
        }
    };

    let mut link = match connected {
        Ok(link) => link,
        Err(err) => {
            log_warn!("connection {} failed: {err:#}", id);
            finish(false);
            return;
        }
    };

    let _ = state.send(ConnectionState::Open);
    let _ = events.send(ConnectionEvent::Opened { id });

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Text(text)) => {
                    let _ = link.outgoing.send(LinkCommand::Text(text));
                }
                Some(LinkCommand::Close) | None => {
                    let _ = state.send(ConnectionState::Closing);
                    let _ = link.outgoing.send(LinkCommand::Close);
                    finish(true);
                    return;
                }
            },
            event = link.incoming.recv() => match event {
                Some(LinkEvent::Text(text)) => {
                    let _ = events.send(ConnectionEvent::Message { id, text });
                }
                Some(LinkEvent::Closed { clean }) => {
                    finish(clean);
                    return;
                }
                None => {
                    finish(false);
                    return;
                }
            },
        }
    }
}

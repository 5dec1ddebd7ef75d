//! Single logical connection to the recognizer: open/close by purpose,
//! fire-and-forget sends, and the Live reconnect budget.

pub mod manager;
pub mod reconnect;
pub mod transport;

pub use manager::{
    ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionState, Purpose, WaitOpenError,
};
pub use reconnect::{reconnect_delay, ReconnectPolicy, MAX_RECONNECT_ATTEMPTS};
pub use transport::{Connector, Link, LinkCommand, LinkEvent, WsConnector};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{SendMetrics, SendOutcome};
    use crate::protocol::OutboundMessage;
    use crate::test_support::MockConnector;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn manager(
        connector: Arc<MockConnector>,
        metrics: SendMetrics,
    ) -> (ConnectionManager, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(
            connector,
            "ws://test/ws".into(),
            tx,
            Arc::new(metrics),
        );
        (manager, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn sends_are_dropped_until_open() {
        let (connector, mut peers) = MockConnector::new();
        let metrics = SendMetrics::new();
        let (mut manager, mut events) = manager(connector, metrics.clone());

        let handle = manager.open(Purpose::Live);
        assert_eq!(handle.state(), ConnectionState::Connecting);
        assert_eq!(handle.send(&OutboundMessage::Clear), SendOutcome::Dropped);

        let mut peer = peers.recv().await.unwrap();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened { id: 1 }));
        assert!(handle.is_open());

        assert_eq!(handle.send(&OutboundMessage::Clear), SendOutcome::Sent);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let sent = peer.sent_json();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "clear");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sent_count, 1);
        assert_eq!(snapshot.dropped_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_text_is_tagged_with_connection_id() {
        let (connector, mut peers) = MockConnector::new();
        let (mut manager, mut events) = manager(connector, SendMetrics::new());

        manager.open(Purpose::Upload);
        let peer = peers.recv().await.unwrap();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened { id: 1 }));

        peer.push(r#"{"status":"hola"}"#);
        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Message {
                id: 1,
                text: r#"{"status":"hola"}"#.into()
            })
        );

        peer.close(false);
        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Closed { id: 1, clean: false })
        );
        assert_eq!(manager.release(1), Some(Purpose::Upload));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_closes_the_previous_connection() {
        let (connector, mut peers) = MockConnector::new();
        let (mut manager, mut events) = manager(connector, SendMetrics::new());

        let first = manager.open(Purpose::Upload);
        let mut first_peer = peers.recv().await.unwrap();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened { id: 1 }));

        let second = manager.open(Purpose::Live);
        assert_eq!(second.id(), 2);
        assert_eq!(manager.purpose(), Some(Purpose::Live));

        let _second_peer = peers.recv().await.unwrap();
        let mut seen = vec![events.recv().await.unwrap(), events.recv().await.unwrap()];
        seen.sort_by_key(|event| format!("{event:?}"));
        assert_eq!(
            seen,
            vec![
                ConnectionEvent::Closed { id: 1, clean: true },
                ConnectionEvent::Opened { id: 2 },
            ]
        );
        assert!(!manager.is_current(first.id()));
        assert!(first_peer.saw_close());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_reports_unclean_close() {
        let (connector, _peers) = MockConnector::new();
        connector.fail_next(1);
        let (mut manager, mut events) = manager(connector.clone(), SendMetrics::new());

        let handle = manager.open(Purpose::Live);
        assert_eq!(
            handle.wait_open(Duration::from_secs(10)).await,
            Err(WaitOpenError::Closed)
        );
        assert_eq!(
            events.recv().await,
            Some(ConnectionEvent::Closed { id: 1, clean: false })
        );
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_open_times_out_on_a_stalled_connect() {
        let (connector, _peers) = MockConnector::new();
        connector.stall(true);
        let (mut manager, _events) = manager(connector, SendMetrics::new());

        let handle = manager.open(Purpose::Upload);
        assert_eq!(
            handle.wait_open(Duration::from_secs(10)).await,
            Err(WaitOpenError::Timeout(Duration::from_secs(10)))
        );
        assert_eq!(handle.state(), ConnectionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn purpose_can_be_retagged_in_place() {
        let (connector, mut peers) = MockConnector::new();
        let (mut manager, mut events) = manager(connector, SendMetrics::new());

        manager.open(Purpose::Upload);
        let _peer = peers.recv().await.unwrap();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened { id: 1 }));

        manager.set_purpose(Purpose::Live);
        assert_eq!(manager.purpose(), Some(Purpose::Live));
        assert_eq!(manager.usable().map(|h| h.id()), Some(1));
    }
}

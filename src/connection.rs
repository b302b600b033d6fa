//! Connection manager
//!
//! Owns at most one WebSocket connection at a time and exposes it through the
//! `Connection` trait: `connect`, `send`, `disconnect`, plus an event stream of
//! `Ready`, `MessageReceived` and `Closed`.
//!
//! The socket itself runs in a spawned task (see `handler`). Events are tagged
//! with the connection id so anything arriving from a released connection is
//! dropped here and never reaches the session controller.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::handler::{run_connection, ConnectionTask};
use crate::message::ChatMessage;
use crate::types::ConnectionId;

/// Events emitted by a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Socket open
    Ready,
    /// Inbound chat record (or system-attributed raw text)
    MessageReceived(ChatMessage),
    /// Socket closed, gracefully or not
    Closed,
}

/// The operations the session controller drives a connection through
pub trait Connection {
    /// Open a connection for these credentials. No-op if one is already owned.
    fn connect(&mut self, credentials: &Credentials);

    /// Transmit a message if the connection is open, otherwise do nothing.
    fn send(&self, message: &ChatMessage);

    /// Close and release the current connection, if any.
    fn disconnect(&mut self);

    /// Next event from the current connection.
    fn next_event(&mut self) -> impl Future<Output = Option<ConnectionEvent>> + Send;
}

/// Handle on the live connection task
struct ActiveConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<ChatMessage>,
    shutdown: Option<oneshot::Sender<()>>,
    ready: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ActiveConnection {
    fn is_open(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// WebSocket-backed connection manager
///
/// `connect` spawns onto the current tokio runtime.
pub struct ConnectionManager {
    server_url: String,
    active: Option<ActiveConnection>,
    event_tx: mpsc::Sender<(ConnectionId, ConnectionEvent)>,
    event_rx: mpsc::Receiver<(ConnectionId, ConnectionEvent)>,
}

impl ConnectionManager {
    pub fn new(config: &ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        Self {
            server_url: config.server_url.clone(),
            active: None,
            event_tx,
            event_rx,
        }
    }

    /// Id of the owned connection, if any
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.active.as_ref().map(|c| c.id)
    }

    /// Whether a connection is owned (connecting or open)
    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    /// Whether the owned connection is open and accepting sends
    pub fn is_open(&self) -> bool {
        self.active.as_ref().is_some_and(ActiveConnection::is_open)
    }

    async fn recv_current(&mut self) -> Option<ConnectionEvent> {
        loop {
            let (id, event) = self.event_rx.recv().await?;

            if self.connection_id() != Some(id) {
                debug!("Discarding {:?} from released connection {}", event, id);
                continue;
            }

            if event == ConnectionEvent::Closed {
                // Release ownership; the task has already finished
                self.active = None;
                debug!("Connection {} released after close", id);
            }

            return Some(event);
        }
    }
}

impl Connection for ConnectionManager {
    fn connect(&mut self, credentials: &Credentials) {
        if let Some(active) = &self.active {
            warn!("connect ignored: connection {} already owned", active.id);
            return;
        }

        let id = ConnectionId::new();
        let url = credentials.target_url(&self.server_url);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let ready = Arc::new(AtomicBool::new(false));

        info!(
            "Connection {}: joining room '{}' as '{}'{}",
            id,
            credentials.room(),
            credentials.username(),
            if credentials.create_if_missing() {
                " (create if missing)"
            } else {
                ""
            }
        );

        let task = tokio::spawn(run_connection(ConnectionTask {
            id,
            url,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
            ready: Arc::clone(&ready),
            events: self.event_tx.clone(),
        }));

        self.active = Some(ActiveConnection {
            id,
            outbound: outbound_tx,
            shutdown: Some(shutdown_tx),
            ready,
            task,
        });
    }

    fn send(&self, message: &ChatMessage) {
        let Some(active) = self.active.as_ref().filter(|c| c.is_open()) else {
            debug!("send ignored: no open connection");
            return;
        };

        if active.outbound.send(message.clone()).is_err() {
            debug!("send ignored: connection {} task ended", active.id);
        }
    }

    fn disconnect(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        info!("Connection {} disconnecting", active.id);
        active.close();
    }

    fn next_event(&mut self) -> impl Future<Output = Option<ConnectionEvent>> + Send {
        self.recv_current()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    use super::*;
    use crate::credentials::JoinForm;

    const WAIT: Duration = Duration::from_secs(5);

    fn credentials(username: &str, room: &str, password: &str) -> Credentials {
        Credentials::from_form(&JoinForm {
            username: username.to_string(),
            room: room.to_string(),
            password: password.to_string(),
            create_if_missing: false,
        })
        .unwrap()
    }

    /// Accept one socket, report the request URI, then hand it to `serve`
    async fn spawn_server<F, Fut>(serve: F) -> (String, oneshot::Receiver<String>)
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (uri_tx, uri_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
                let _ = uri_tx.send(req.uri().to_string());
                Ok::<_, ErrorResponse>(resp)
            })
            .await
            .unwrap();
            serve(ws).await;
        });

        (format!("ws://{}", addr), uri_rx)
    }

    /// Sends a plain-text notice, then echoes every text frame back
    async fn echo_server(mut ws: WebSocketStream<TcpStream>) {
        ws.send(Message::Text("server restarting".into()))
            .await
            .unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) => {
                    if ws.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    }

    async fn next(manager: &mut ConnectionManager) -> ConnectionEvent {
        timeout(WAIT, manager.next_event())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    fn manager_for(server_url: &str) -> ConnectionManager {
        ConnectionManager::new(&ClientConfig::new(server_url).unwrap())
    }

    #[tokio::test]
    async fn test_connect_send_and_receive() {
        let (url, uri_rx) = spawn_server(echo_server).await;
        let mut manager = manager_for(&url);

        manager.connect(&credentials("Bob", "general", "x"));
        assert!(manager.is_connected());

        assert_eq!(next(&mut manager).await, ConnectionEvent::Ready);
        assert!(manager.is_open());
        assert_eq!(
            uri_rx.await.unwrap(),
            "/ws/chat/general/?username=Bob&password=x"
        );

        assert_eq!(
            next(&mut manager).await,
            ConnectionEvent::MessageReceived(ChatMessage::new("système", "server restarting"))
        );

        manager.send(&ChatMessage::new("Bob", "hello"));
        assert_eq!(
            next(&mut manager).await,
            ConnectionEvent::MessageReceived(ChatMessage::new("Bob", "hello"))
        );

        manager.disconnect();
        assert!(!manager.is_connected());
        assert!(!manager.is_open());
    }

    #[tokio::test]
    async fn test_server_close_releases_connection() {
        let (url, _uri_rx) = spawn_server(|mut ws| async move {
            let _ = ws.close(None).await;
            // Drain until the client acknowledges
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;
        let mut manager = manager_for(&url);

        manager.connect(&credentials("Bob", "general", "x"));
        assert_eq!(next(&mut manager).await, ConnectionEvent::Ready);
        assert_eq!(next(&mut manager).await, ConnectionEvent::Closed);

        assert!(!manager.is_connected());
        // No connection to send on
        manager.send(&ChatMessage::new("Bob", "anyone?"));
        assert!(!manager.is_open());
    }

    #[tokio::test]
    async fn test_refused_connection_emits_closed_only() {
        // Grab a free port, then stop listening on it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut manager = manager_for(&format!("ws://{}", addr));
        manager.connect(&credentials("Bob", "general", "x"));

        assert_eq!(next(&mut manager).await, ConnectionEvent::Closed);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_second_connect_is_ignored() {
        let (url, _uri_rx) = spawn_server(echo_server).await;
        let mut manager = manager_for(&url);

        manager.connect(&credentials("Bob", "general", "x"));
        let first = manager.connection_id();
        manager.connect(&credentials("Alice", "other", "y"));

        assert!(first.is_some());
        assert_eq!(manager.connection_id(), first);
        assert_eq!(next(&mut manager).await, ConnectionEvent::Ready);
    }

    #[tokio::test]
    async fn test_send_before_open_is_noop() {
        let manager = manager_for("ws://127.0.0.1:9");
        manager.send(&ChatMessage::new("Bob", "hello"));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_events_after_disconnect_are_discarded() {
        let (url, _uri_rx) = spawn_server(echo_server).await;
        let mut manager = manager_for(&url);

        manager.connect(&credentials("Bob", "general", "x"));
        assert_eq!(next(&mut manager).await, ConnectionEvent::Ready);

        manager.disconnect();
        manager.disconnect();

        // The released connection's notice and Closed never surface
        let pending = timeout(Duration::from_millis(300), manager.next_event()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_server_close_is_acknowledged() {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (url, _uri_rx) = spawn_server(|mut ws| async move {
            let frame = CloseFrame {
                code: CloseCode::from(4001),
                reason: "bad".into(),
            };
            let _ = ws.close(Some(frame)).await;
            let reply = ws.next().await;
            let _ = reply_tx.send(matches!(reply, Some(Ok(Message::Close(_)))));
        })
        .await;
        let mut manager = manager_for(&url);

        manager.connect(&credentials("Bob", "general", "wrong"));
        assert_eq!(next(&mut manager).await, ConnectionEvent::Ready);
        assert_eq!(next(&mut manager).await, ConnectionEvent::Closed);

        let acknowledged = timeout(WAIT, reply_rx).await.unwrap().unwrap();
        assert!(acknowledged, "server did not receive a close reply");
    }

    #[tokio::test]
    async fn test_disconnect_completes_close_handshake() {
        let (done_tx, done_rx) = oneshot::channel();
        let (url, _uri_rx) = spawn_server(|mut ws| async move {
            let mut saw_close = false;
            let clean_end = loop {
                match ws.next().await {
                    Some(Ok(Message::Close(_))) => saw_close = true,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break false,
                    None => break true,
                }
            };
            let _ = done_tx.send(saw_close && clean_end);
        })
        .await;
        let mut manager = manager_for(&url);

        manager.connect(&credentials("Bob", "general", "x"));
        assert_eq!(next(&mut manager).await, ConnectionEvent::Ready);
        manager.disconnect();

        let clean = timeout(WAIT, done_rx).await.unwrap().unwrap();
        assert!(clean, "server saw an unclean close");
    }

    #[tokio::test]
    async fn test_disconnect_aborts_pending_handshake() {
        // Accepts TCP but never answers the upgrade request
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut manager = manager_for(&format!("ws://{}", addr));
        manager.connect(&credentials("Bob", "general", "x"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(manager.is_connected());
        assert!(!manager.is_open());

        manager.disconnect();
        assert!(!manager.is_connected());

        // The aborted attempt's Closed is dropped, not delivered
        let pending = timeout(Duration::from_millis(300), manager.next_event()).await;
        assert!(pending.is_err());
    }
}

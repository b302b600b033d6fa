//! WebSocket connection task
//!
//! Runs one client socket: handshake, outbound writes, inbound reads, and
//! translation of everything into `ConnectionEvent`s for the manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionEvent;
use crate::message::{ChatMessage, InboundPayload};
use crate::types::ConnectionId;

type WsReceiver = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// How long to wait for the server's close reply after we close
const CLOSE_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything a connection task needs, moved into the spawned task
pub(crate) struct ConnectionTask {
    pub id: ConnectionId,
    pub url: String,
    pub outbound: mpsc::UnboundedReceiver<ChatMessage>,
    pub shutdown: oneshot::Receiver<()>,
    pub ready: Arc<AtomicBool>,
    pub events: mpsc::Sender<(ConnectionId, ConnectionEvent)>,
}

/// Drive a single connection until it closes
///
/// Emits `Ready` at most once and always ends with exactly one `Closed`.
pub(crate) async fn run_connection(task: ConnectionTask) {
    let ConnectionTask {
        id,
        url,
        mut outbound,
        mut shutdown,
        ready,
        events,
    } = task;

    debug!("Connection {} opening", id);

    // Handshake, abortable by disconnect
    let ws_stream = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => match result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                warn!("Connection {} failed: {}", id, e);
                let _ = events.send((id, ConnectionEvent::Closed)).await;
                return;
            }
        },
        _ = &mut shutdown => {
            debug!("Connection {} aborted during handshake", id);
            let _ = events.send((id, ConnectionEvent::Closed)).await;
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    ready.store(true, Ordering::SeqCst);
    info!("Connection {} open", id);
    if events.send((id, ConnectionEvent::Ready)).await.is_err() {
        debug!("Manager gone, closing connection {}", id);
        let _ = ws_sender.close().await;
        await_close_reply(&mut ws_receiver, id).await;
        return;
    }

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Connection {} closing on request", id);
                let _ = ws_sender.close().await;
                await_close_reply(&mut ws_receiver, id).await;
                break;
            }
            outgoing = outbound.recv() => {
                let Some(msg) = outgoing else {
                    debug!("Outbound channel closed for {}", id);
                    let _ = ws_sender.close().await;
                    await_close_reply(&mut ws_receiver, id).await;
                    break;
                };
                match msg.to_json() {
                    Ok(json) => {
                        if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                            error!("WebSocket send failed for {}: {}", id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        // Continue - don't break on serialization errors
                    }
                }
            }
            incoming = ws_receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).into_owned(),
                    Some(Ok(Message::Close(frame))) => {
                        match frame {
                            Some(frame) => info!(
                                "Connection {} closed by server: code {}, reason '{}'",
                                id,
                                u16::from(frame.code),
                                frame.reason
                            ),
                            None => info!("Connection {} closed by server", id),
                        }
                        // Flush the queued close reply
                        let _ = ws_sender.close().await;
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong handled by tungstenite
                        continue;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for {}: {}", id, e);
                        break;
                    }
                    None => {
                        debug!("Stream ended for {}", id);
                        break;
                    }
                };

                let msg = InboundPayload::parse(&text).into_message();
                if events
                    .send((id, ConnectionEvent::MessageReceived(msg)))
                    .await
                    .is_err()
                {
                    debug!("Manager gone, ending read loop for {}", id);
                    break;
                }
            }
        }
    }

    ready.store(false, Ordering::SeqCst);
    let _ = events.send((id, ConnectionEvent::Closed)).await;
    info!("Connection {} closed", id);
}

/// Read until the server answers our close frame or the stream ends
async fn await_close_reply(ws_receiver: &mut WsReceiver, id: ConnectionId) {
    let drained = tokio::time::timeout(CLOSE_REPLY_TIMEOUT, async {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if msg.is_close() {
                break;
            }
        }
    })
    .await;

    if drained.is_err() {
        debug!("No close reply for {} within {:?}", id, CLOSE_REPLY_TIMEOUT);
    }
}

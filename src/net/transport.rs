//! WebSocket transport: one persistent bidirectional connection per session

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use crate::net::protocol::{parse_server_message, ClientAction, ServerMessage};

/// Transport-level events the session consumes, in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Handshake acknowledged; the connection is live.
    Opened,
    /// One parsed inbound frame.
    Message(ServerMessage),
    /// The peer closed, or the stream ended.
    Closed,
    /// Transport-level failure.
    Errored(String),
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open websocket connection: {0}")]
    Connect(#[from] tungstenite::Error),
}

/// Open the session connection and split it into channel halves.
///
/// The display name rides along as the `name` query parameter, exactly as
/// the server expects. Returns the inbound event stream and the outbound
/// action sender; a reader and a writer task own the socket halves. Both
/// tasks stop as soon as the session side drops its channel ends, so no
/// frame is processed after teardown, and a fresh `connect` shares nothing
/// (including ordering) with a previous one.
pub async fn connect(
    server_url: &str,
    player_name: &str,
) -> Result<(mpsc::Receiver<TransportEvent>, mpsc::Sender<ClientAction>), TransportError> {
    let url = format!("{server_url}?name={player_name}");
    let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
    debug!(url = %url, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();
    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(64);
    let (action_tx, mut action_rx) = mpsc::channel::<ClientAction>(64);

    // The successful handshake is the open acknowledgment; the receiver is
    // still local here so this cannot fail.
    let _ = event_tx.send(TransportEvent::Opened).await;

    // Writer: outbound actions -> socket.
    tokio::spawn(async move {
        while let Some(action) = action_rx.recv().await {
            let json = match serde_json::to_string(&action) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to encode outbound action");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(json.into())).await {
                debug!(error = %e, "WebSocket send failed");
                break;
            }
        }
        // Session hung up (or the send failed): close politely.
        let _ = sink.send(Message::Close(None)).await;
    });

    // Reader: socket -> inbound events.
    tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    let message = parse_server_message(text.as_str());
                    if event_tx
                        .send(TransportEvent::Message(message))
                        .await
                        .is_err()
                    {
                        // Session gone; stop reading immediately.
                        return;
                    }
                }
                Ok(Message::Binary(_)) => {
                    warn!("Received binary frame, ignoring");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    let _ = event_tx.send(TransportEvent::Closed).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = event_tx.send(TransportEvent::Errored(e.to_string())).await;
                    return;
                }
            }
        }
        let _ = event_tx.send(TransportEvent::Closed).await;
    });

    Ok((event_rx, action_tx))
}

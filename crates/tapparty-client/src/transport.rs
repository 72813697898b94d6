//! WebSocket transport for the client.
//!
//! Provides [`ConnectedClient`] which moves frames over a WebSocket as binary
//! messages, one frame per message. This is a thin layer that just
//! sends/receives frames; protocol logic remains in the Sans-IO
//! [`Client`](crate::Client).

use futures::{SinkExt, StreamExt};
use tapparty_proto::Frame;
use thiserror::Error;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel depth in each direction.
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Handle to a live relay connection.
///
/// Frames are sent/received via the channels, and an internal task handles
/// the WebSocket I/O. `from_server` yields `None` once the socket closes.
pub struct ConnectedClient {
    /// Send frames to the relay.
    pub to_server: mpsc::Sender<Frame>,
    /// Receive frames from the relay.
    pub from_server: mpsc::Receiver<Frame>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedClient {
    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

impl Drop for ConnectedClient {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

/// Connect to a relay at a `ws://` URL.
///
/// Returns a [`ConnectedClient`] with channels for frame transport.
pub async fn connect(url: &str) -> Result<ConnectedClient, TransportError> {
    let (ws, _) = connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(format!("{url}: {e}")))?;

    let (to_server_tx, to_server_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);
    let (from_server_tx, from_server_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        if let Err(e) = run_connection(ws, to_server_rx, from_server_tx).await {
            warn!(error = %e, "relay connection ended");
        }
    });

    Ok(ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Bridge channels and the WebSocket until either side closes.
async fn run_connection(
    ws: WsStream,
    mut to_server: mpsc::Receiver<Frame>,
    from_server: mpsc::Sender<Frame>,
) -> Result<(), TransportError> {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            frame = to_server.recv() => {
                let Some(frame) = frame else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ok(());
                };
                let bytes = frame
                    .to_vec()
                    .map_err(|e| TransportError::Protocol(format!("encode failed: {e}")))?;
                ws_tx
                    .send(Message::Binary(bytes.into()))
                    .await
                    .map_err(|e| TransportError::Stream(format!("write failed: {e}")))?;
            }
            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => return Err(TransportError::Stream(format!("read failed: {e}"))),
                    None => return Ok(()),
                };

                match msg {
                    Message::Binary(data) => match Frame::decode(&data) {
                        Ok(frame) => {
                            if from_server.send(frame).await.is_err() {
                                return Ok(());
                            }
                        },
                        Err(e) => warn!(error = %e, "dropping undecodable frame"),
                    },
                    Message::Close(reason) => {
                        debug!(?reason, "relay closed the socket");
                        return Ok(());
                    },
                    Message::Text(_) => warn!("ignoring text message from relay"),
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {},
                }
            }
        }
    }
}

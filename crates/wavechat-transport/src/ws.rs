//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! Each open socket is split into a writer task (draining the outbound
//! channel) and a reader task (forwarding inbound frames). Closing the
//! outbound channel makes the writer send a normal-closure frame, so
//! dropping the handle is a clean disconnect.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;
use crate::socket::{InboundFrame, SocketTransport, TransportHandle};

/// Close code reported when the socket drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Per-connection channel capacity.
const CHANNEL_CAPACITY: usize = 32;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Production WebSocket transport.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Create a new WebSocket transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl SocketTransport for WsTransport {
    async fn open(&self, endpoint: &str) -> Result<TransportHandle, TransportError> {
        let (ws_stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();

        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<InboundFrame>(CHANNEL_CAPACITY);

        tokio::spawn(ws_writer(write, outbound_rx));
        tokio::spawn(ws_reader(read, inbound_tx));

        Ok(TransportHandle::new(outbound_tx, inbound_rx))
    }
}

/// Task that drains outbound frames into the socket.
///
/// When the outbound channel closes, sends a normal close frame so the peer
/// sees a clean disconnect.
async fn ws_writer(mut write: WsSink, mut rx: mpsc::Receiver<String>) {
    while let Some(text) = rx.recv().await {
        if write.send(Message::Text(text)).await.is_err() {
            return;
        }
    }

    let close = Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "client disconnect".into(),
    }));
    let _ = write.send(close).await;
}

/// Task that forwards inbound frames until the socket closes.
async fn ws_reader(mut read: WsSource, tx: mpsc::Sender<InboundFrame>) {
    while let Some(result) = read.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if tx.send(InboundFrame::Text(text)).await.is_err() {
                    return;
                }
            }
            Ok(Message::Close(frame)) => {
                let code = frame.map_or(ABNORMAL_CLOSURE, |f| u16::from(f.code));
                let _ = tx.send(InboundFrame::Closed { code }).await;
                return;
            }
            // Control frames and binary payloads are not part of the protocol
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_) | Message::Binary(_)) => {}
            Err(e) => {
                tracing::debug!(error = %e, "socket read failed");
                let _ = tx
                    .send(InboundFrame::Closed {
                        code: ABNORMAL_CLOSURE,
                    })
                    .await;
                return;
            }
        }
    }

    // Stream ended without a close frame: report an unclean drop
    let _ = tx
        .send(InboundFrame::Closed {
            code: ABNORMAL_CLOSURE,
        })
        .await;
}

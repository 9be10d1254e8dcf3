//! Transport trait and connection handle.
//!
//! A [`SocketTransport`] owns the mechanics of opening one logical socket to
//! the streaming endpoint. Each successful open yields a
//! [`TransportHandle`]: an outbound text channel and an inbound frame
//! channel. Dropping the handle (or its outbound half) closes the socket
//! with a normal-closure code.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// A raw frame delivered by a transport.
///
/// Transports carry no chat semantics; everything above the socket is typed
/// by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A text frame as received from the peer.
    Text(String),
    /// The socket closed with the given close code.
    ///
    /// Code 1000 is a clean closure; anything else (including the synthetic
    /// 1006 for an unclean drop) feeds the reconnect policy.
    Closed {
        /// WebSocket close code.
        code: u16,
    },
}

/// Handle to one open socket.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<InboundFrame>,
}

impl TransportHandle {
    /// Build a handle from its two channel halves.
    #[must_use]
    pub fn new(outbound: mpsc::Sender<String>, inbound: mpsc::Receiver<InboundFrame>) -> Self {
        Self { outbound, inbound }
    }

    /// Queue an outbound text frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket's writer has gone away or its queue is
    /// full.
    pub fn try_send(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .try_send(text)
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Receive the next inbound frame.
    ///
    /// Returns `None` once the reader task has shut down.
    pub async fn recv(&mut self) -> Option<InboundFrame> {
        self.inbound.recv().await
    }

    /// Split the handle into its sender and receiver halves.
    ///
    /// The connection manager keeps the sender for `send()` while its read
    /// loop owns the receiver.
    #[must_use]
    pub fn split(self) -> (mpsc::Sender<String>, mpsc::Receiver<InboundFrame>) {
        (self.outbound, self.inbound)
    }
}

/// A factory for socket connections to the streaming endpoint.
///
/// Implemented by [`crate::WsTransport`] in production and by scripted fakes
/// in tests.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    /// Open a socket to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be constructed or the handshake
    /// fails. The connection manager treats such failures as abnormal
    /// closures and enters its reconnect path.
    async fn open(&self, endpoint: &str) -> Result<TransportHandle, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_forwards_frames_in_order() {
        let (out_tx, _out_rx) = mpsc::channel(4);
        let (in_tx, in_rx) = mpsc::channel(4);
        let mut handle = TransportHandle::new(out_tx, in_rx);

        in_tx
            .send(InboundFrame::Text("a".to_string()))
            .await
            .unwrap();
        in_tx.send(InboundFrame::Closed { code: 1000 }).await.unwrap();

        assert_eq!(handle.recv().await, Some(InboundFrame::Text("a".to_string())));
        assert_eq!(handle.recv().await, Some(InboundFrame::Closed { code: 1000 }));
    }

    #[tokio::test]
    async fn try_send_fails_when_writer_is_gone() {
        let (out_tx, out_rx) = mpsc::channel(1);
        let (_in_tx, in_rx) = mpsc::channel::<InboundFrame>(1);
        let handle = TransportHandle::new(out_tx, in_rx);

        drop(out_rx);
        let result = handle.try_send("hello".to_string());
        assert!(matches!(result, Err(TransportError::Send(_))));
    }
}

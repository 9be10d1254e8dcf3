//! Streaming connection manager.
//!
//! Owns at most one logical socket to the streaming endpoint. Each explicit
//! connect captures a [`ConnectIntent`] and drives it through open,
//! initiation, read loop, and the reconnect policy; inbound frames are
//! republished as [`StreamEvent`]s on a broadcast channel and coarse
//! connectivity is published through a watch channel.
//!
//! Supersession is generation-based: every connect and disconnect bumps a
//! generation counter, and a connection task that observes a newer generation
//! abandons its socket without touching shared state. This keeps "new send
//! replaces old stream" races un-lockable by construction: the stale task
//! simply stops mattering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};

use wavechat_core::{
    ClientFrame, ConnectionStatus, ServerFrame, SessionId, StreamEvent, NORMAL_CLOSURE,
};
use wavechat_transport::{InboundFrame, ReconnectPolicy, SocketTransport, TransportHandle};

use crate::config::StreamConfig;
use crate::intent::ConnectIntent;

/// Synthetic close code for sockets that dropped without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Internal connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket exists and none is being opened.
    #[default]
    Disconnected,
    /// An open or a scheduled reconnect is in flight.
    Connecting,
    /// The socket is open and frames flow.
    Open,
    /// An explicit disconnect was requested; the close is still being
    /// delivered.
    Closing,
}

#[derive(Default)]
struct ManagerInner {
    state: ConnectionState,
    intent: Option<Arc<ConnectIntent>>,
    outbound: Option<mpsc::Sender<String>>,
}

/// Manages the persistent streaming socket for one client.
pub struct StreamingConnectionManager {
    transport: Arc<dyn SocketTransport>,
    policy: ReconnectPolicy,
    endpoint: String,
    events: broadcast::Sender<StreamEvent>,
    status: watch::Sender<ConnectionStatus>,
    generation: AtomicU64,
    inner: Mutex<ManagerInner>,
}

impl StreamingConnectionManager {
    /// Create a manager over the given transport.
    #[must_use]
    pub fn new(config: &StreamConfig, transport: Arc<dyn SocketTransport>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            transport,
            policy: config.reconnect_policy(),
            endpoint: config.endpoint.clone(),
            events,
            status,
            generation: AtomicU64::new(0),
            inner: Mutex::new(ManagerInner::default()),
        }
    }

    /// Subscribe to the typed event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Watch coarse connectivity.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Whether a socket is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lock().state == ConnectionState::Open
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// The session the current (or pending) socket is bound to.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.inner
            .lock()
            .intent
            .as_ref()
            .map(|i| i.session_id.clone())
    }

    /// Establish (or take over) the streaming connection for an intent.
    ///
    /// A connect for the session that is already connecting or connected is
    /// a no-op. A connect for a different session supersedes the existing
    /// connection: its socket is closed cleanly and its task abandoned.
    pub fn connect(self: &Arc<Self>, intent: ConnectIntent) {
        let intent = Arc::new(intent);
        let generation = {
            let mut inner = self.inner.lock();
            let same_session = inner
                .intent
                .as_ref()
                .is_some_and(|active| active.session_id == intent.session_id);
            if same_session
                && matches!(
                    inner.state,
                    ConnectionState::Connecting | ConnectionState::Open
                )
            {
                tracing::debug!(
                    session_id = %intent.session_id,
                    "connect ignored: session already active"
                );
                return;
            }

            // Dropping the outbound half closes the old socket cleanly
            inner.outbound = None;
            inner.intent = Some(Arc::clone(&intent));
            inner.state = ConnectionState::Connecting;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        self.status.send_replace(ConnectionStatus::Connecting);
        tracing::info!(session_id = %intent.session_id, "connecting");

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_connection(generation, intent).await;
        });
    }

    /// Queue an outbound frame on the open socket.
    ///
    /// Returns whether the frame was queued; frames sent while no socket is
    /// open are dropped with a warning.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        let inner = self.inner.lock();
        let (ConnectionState::Open, Some(outbound)) = (inner.state, inner.outbound.as_ref())
        else {
            tracing::warn!(state = ?inner.state, "frame dropped: no open socket");
            return false;
        };

        let encoded = match frame.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "frame dropped: encoding failed");
                return false;
            }
        };
        match outbound.try_send(encoded) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "frame dropped: socket queue unavailable");
                false
            }
        }
    }

    /// Close the connection and suppress any pending reconnects.
    ///
    /// The close frame is delivered asynchronously; the state sits in
    /// [`ConnectionState::Closing`] until the connection task observes the
    /// socket end and settles to `Disconnected`.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            ConnectionState::Disconnected | ConnectionState::Closing => return,
            ConnectionState::Connecting | ConnectionState::Open => {}
        }
        tracing::info!("disconnect requested");
        inner.state = ConnectionState::Closing;
        inner.outbound = None;
        drop(inner);
        self.status.send_replace(ConnectionStatus::Disconnected);
    }

    async fn run_connection(self: Arc<Self>, generation: u64, intent: Arc<ConnectIntent>) {
        let mut attempt: u32 = 0;
        loop {
            if self.is_stale(generation) {
                return;
            }
            if self.close_requested() {
                self.settle_disconnected(&intent.session_id);
                return;
            }

            match self.transport.open(&self.endpoint).await {
                Ok(handle) => {
                    if self.is_stale(generation) {
                        return;
                    }
                    attempt = 0;
                    let code = self.drive_socket(generation, &intent, handle).await;
                    if self.is_stale(generation) {
                        return;
                    }
                    if self.close_requested() {
                        self.settle_disconnected(&intent.session_id);
                        return;
                    }
                    if code == NORMAL_CLOSURE {
                        tracing::info!(session_id = %intent.session_id, "socket closed cleanly");
                        self.settle_disconnected(&intent.session_id);
                        return;
                    }
                    tracing::warn!(
                        session_id = %intent.session_id,
                        code,
                        "socket closed abnormally"
                    );
                }
                Err(e) => {
                    tracing::warn!(session_id = %intent.session_id, error = %e, "open failed");
                }
            }

            attempt += 1;
            let Some(delay) = self.policy.delay(attempt) else {
                tracing::error!(
                    session_id = %intent.session_id,
                    attempt,
                    "reconnect budget exhausted"
                );
                self.settle_disconnected(&intent.session_id);
                self.emit(StreamEvent::ConnectionFailed {
                    session_id: intent.session_id.clone(),
                });
                return;
            };

            {
                let mut inner = self.inner.lock();
                inner.state = ConnectionState::Connecting;
                inner.outbound = None;
            }
            self.status.send_replace(ConnectionStatus::Connecting);
            self.emit(StreamEvent::Reconnecting {
                session_id: intent.session_id.clone(),
                attempt,
                delay,
            });
            tokio::time::sleep(delay).await;
        }
    }

    /// Drive one open socket to its close; returns the observed close code.
    async fn drive_socket(
        &self,
        generation: u64,
        intent: &ConnectIntent,
        handle: TransportHandle,
    ) -> u16 {
        let (outbound, mut inbound) = handle.split();

        let initiation = match intent.initiation_frame().encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(session_id = %intent.session_id, error = %e, "encoding failed");
                return ABNORMAL_CLOSURE;
            }
        };
        if let Err(e) = outbound.try_send(initiation) {
            tracing::warn!(session_id = %intent.session_id, error = %e, "initiation send failed");
            return ABNORMAL_CLOSURE;
        }

        {
            let mut inner = self.inner.lock();
            if self.generation.load(Ordering::SeqCst) != generation
                || inner.state == ConnectionState::Closing
            {
                return NORMAL_CLOSURE;
            }
            inner.state = ConnectionState::Open;
            inner.outbound = Some(outbound);
        }
        self.status.send_replace(ConnectionStatus::Connected);
        tracing::info!(session_id = %intent.session_id, "connected");
        self.emit(StreamEvent::Connected {
            session_id: intent.session_id.clone(),
            conversation_id: intent.conversation_id.clone(),
            metadata: intent.metadata.clone(),
        });

        loop {
            match inbound.recv().await {
                Some(InboundFrame::Text(text)) => {
                    if self.is_stale(generation) || self.close_requested() {
                        return NORMAL_CLOSURE;
                    }
                    match ServerFrame::decode(&text) {
                        Ok(frame) => {
                            self.emit(StreamEvent::from_frame(intent.session_id.clone(), frame));
                        }
                        Err(e) => {
                            tracing::warn!(
                                session_id = %intent.session_id,
                                error = %e,
                                "malformed frame discarded"
                            );
                        }
                    }
                }
                Some(InboundFrame::Closed { code }) => return code,
                None => return ABNORMAL_CLOSURE,
            }
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn close_requested(&self) -> bool {
        self.inner.lock().state == ConnectionState::Closing
    }

    fn settle_disconnected(&self, session_id: &SessionId) {
        {
            let mut inner = self.inner.lock();
            inner.state = ConnectionState::Disconnected;
            inner.outbound = None;
            inner.intent = None;
        }
        self.status.send_replace(ConnectionStatus::Disconnected);
        self.emit(StreamEvent::Disconnected {
            session_id: session_id.clone(),
        });
    }

    fn emit(&self, event: StreamEvent) {
        // No subscribers is fine; events are advisory
        let _ = self.events.send(event);
    }
}

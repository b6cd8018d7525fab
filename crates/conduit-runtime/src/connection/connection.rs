//! One transport session with one peer.

use super::{ConnectionError, ConnectionRegistry};
use crate::dispatch::{PacketApi, PacketPeer};
use crate::supervisor::Supervisor;
use crate::transport::{Frame, FrameSink, TransportSession};
use async_trait::async_trait;
use conduit_protocol::{
    Action, ReceiptPacket, ReceiptState, RequestMode, RequestPacket, TypedPacket,
};
use conduit_types::{Cause, ConnectionId, PacketId, SessionId, Subject};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Waiter = oneshot::Sender<Result<ReceiptPacket, Cause>>;

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Sending and receiving.
    Open,
    /// Close sequence running.
    Closing,
    /// Terminal.
    Closed,
}

/// Per-call options for [`Connection::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Invocation mode.
    pub mode: RequestMode,
    /// Deadline; the connection default when `None`.
    pub timeout: Option<Duration>,
    /// Why the request is made.
    pub cause: Option<Cause>,
    /// Session to tag the request with.
    pub session: Option<SessionId>,
}

impl RequestOptions {
    /// Sync request with the connection's default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Sets the session.
    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }
}

/// Caller-side outcome of a typed request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestResult<R> {
    /// `succeed` receipt; `data` decoded with the action's result rules.
    Succeed {
        /// Result, absent for optional results.
        data: Option<R>,
    },
    /// Any other receipt state.
    Unsuccessful {
        /// Receipt state.
        state: ReceiptState,
        /// Cause sent by the peer.
        cause: Option<Cause>,
    },
}

impl<R> RequestResult<R> {
    /// Whether the peer reported success.
    #[must_use]
    pub fn is_succeed(&self) -> bool {
        matches!(self, Self::Succeed { .. })
    }

    /// Result data, `None` unless succeeded.
    #[must_use]
    pub fn data(self) -> Option<R> {
        match self {
            Self::Succeed { data } => data,
            Self::Unsuccessful { .. } => None,
        }
    }

    /// Cause of an unsuccessful request.
    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Succeed { .. } => None,
            Self::Unsuccessful { cause, .. } => cause.as_ref(),
        }
    }
}

struct Inner {
    id: ConnectionId,
    sink: Arc<dyn FrameSink>,
    api: Arc<PacketApi>,
    registry: Arc<ConnectionRegistry>,
    supervisor: Supervisor,
    request_timeout: Duration,
    pending: Mutex<HashMap<PacketId, Waiter>>,
    state: Mutex<ConnectionState>,
    closed: CancellationToken,
}

/// A live session with one peer.
///
/// Multiplexes independent request/receipt exchanges over the transport.
/// Outbound requests wait on a one-shot channel keyed by packet id;
/// inbound packets are dispatched through the shared [`PacketApi`], each
/// on its own task.
///
/// A connection closes exactly once: a second [`close`](Self::close)
/// fails with [`ConnectionError::AlreadyClosed`].
///
/// Cloning is cheap and every clone refers to the same session.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Opens a connection over `session` and starts its receive loop.
    ///
    /// The connection registers itself in `registry` and runs under a
    /// child of `supervisor`. `request_timeout` applies to requests that
    /// set none.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::AlreadyRegistered`] if the registry rejects it.
    pub fn open(
        session: TransportSession,
        api: Arc<PacketApi>,
        registry: Arc<ConnectionRegistry>,
        supervisor: &Supervisor,
        request_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let TransportSession { sink, inbound } = session;
        let connection = Self {
            inner: Arc::new(Inner {
                id: ConnectionId::new(),
                sink,
                api,
                registry: Arc::clone(&registry),
                supervisor: supervisor.child(),
                request_timeout,
                pending: Mutex::new(HashMap::new()),
                state: Mutex::new(ConnectionState::Open),
                closed: CancellationToken::new(),
            }),
        };
        registry.register(connection.clone())?;

        let receiver = connection.clone();
        connection
            .inner
            .supervisor
            .spawn(async move { receiver.receive_loop(inbound).await });
        info!(connection = %connection.id(), "connection opened");
        Ok(connection)
    }

    /// Connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Subject of the remote peer.
    #[must_use]
    pub fn peer_subject(&self) -> Subject {
        Subject::connection(self.inner.id)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Whether requests can be sent.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Number of requests awaiting a receipt.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Sends a typed request and waits for its receipt.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::Encode`] if the argument does not serialize.
    /// - [`ConnectionError::Raw`] if succeeded data violates the action's
    ///   result descriptor.
    /// - Everything [`request_raw`](Self::request_raw) reports.
    pub async fn request<P, R>(
        &self,
        action: &Action<P, R>,
        argument: Option<P>,
        options: RequestOptions,
    ) -> Result<RequestResult<R>, ConnectionError>
    where
        P: Serialize,
        R: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let timeout = options.timeout.unwrap_or(self.inner.request_timeout);
        let argument = argument
            .map(serde_json::to_value)
            .transpose()
            .map_err(|source| ConnectionError::Encode {
                action: action.name().to_string(),
                source,
            })?;

        let mut request = RequestPacket::new(action.name(), options.mode, millis(timeout))
            .with_argument_tree(argument);
        if let Some(cause) = options.cause {
            request = request.with_cause(cause);
        }
        if let Some(session) = options.session {
            request = request.with_session(session);
        }

        let receipt = self.request_raw(request).await?;
        if receipt.state.is_succeed() {
            let data = receipt.decode_data::<R>(action.result())?;
            Ok(RequestResult::Succeed { data })
        } else {
            Ok(RequestResult::Unsuccessful {
                state: receipt.state,
                cause: receipt.header.cause,
            })
        }
    }

    /// Sends `request` and waits for the receipt whose `target` is its id.
    ///
    /// A request with `timeout = 0` uses the connection default. The id
    /// is replaced if it is already pending.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::Closed`] if the connection is not open.
    /// - [`ConnectionError::Timeout`] if no receipt arrives in time; a
    ///   late receipt is dropped.
    /// - [`ConnectionError::Interrupted`] if the connection closes first.
    /// - Encode or transport failures while sending.
    pub async fn request_raw(&self, mut request: RequestPacket) -> Result<ReceiptPacket, ConnectionError> {
        let timeout = match request.timeout_ms {
            0 => self.inner.request_timeout,
            ms => Duration::from_millis(ms),
        };
        request.timeout_ms = millis(timeout);

        let (tx, rx) = oneshot::channel();
        let id = {
            let mut pending = self.inner.pending.lock();
            while pending.contains_key(&request.header.id) {
                request.header.id = PacketId::new();
            }
            pending.insert(request.header.id, tx);
            request.header.id
        };
        // Checked after inserting so a concurrent close either sees the
        // waiter or we see the close.
        if !self.is_open() {
            self.inner.pending.lock().remove(&id);
            return Err(ConnectionError::Closed { id: self.id() });
        }

        let action = request.action.clone();
        if let Err(err) = self.send_packet(request.into()).await {
            self.inner.pending.lock().remove(&id);
            return Err(err);
        }
        debug!(connection = %self.id(), packet = %id, %action, "request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(receipt))) => Ok(receipt),
            Ok(Ok(Err(cause))) => Err(ConnectionError::Interrupted { packet: id, cause }),
            Ok(Err(_)) => Err(ConnectionError::Closed { id: self.id() }),
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                Err(ConnectionError::Timeout {
                    packet: id,
                    action,
                    timeout_ms: millis(timeout),
                })
            }
        }
    }

    /// Closes the connection because the platform asked to.
    ///
    /// # Errors
    ///
    /// See [`close_with`](Self::close_with).
    pub async fn close(&self) -> Result<(), ConnectionError> {
        let cause = Cause::text("connection closed").by(self.inner.api.subject().clone());
        self.close_with(cause).await
    }

    /// Closes the connection with `cause`.
    ///
    /// In order: deregisters from the routing table, closes the transport,
    /// cancels the receive loop and packet tasks, then fails every pending
    /// request with `cause`.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::AlreadyClosed`] if a close already started;
    ///   nothing else happens.
    /// - [`ConnectionError::NotRegistered`] if the routing table had no
    ///   entry. The rest of the sequence still runs.
    pub async fn close_with(&self, cause: Cause) -> Result<(), ConnectionError> {
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Open {
                return Err(ConnectionError::AlreadyClosed { id: self.id() });
            }
            *state = ConnectionState::Closing;
        }
        info!(connection = %self.id(), %cause, "closing connection");

        let deregistered = self.inner.registry.deregister(self.id()).map(|_| ());
        if let Err(err) = &deregistered {
            warn!(connection = %self.id(), error = %err, "connection missing from registry");
        }
        self.inner.sink.close().await;
        self.inner.supervisor.cancel();

        let pending: Vec<_> = self.inner.pending.lock().drain().collect();
        for (packet, waiter) in pending {
            debug!(connection = %self.id(), %packet, "failing pending request");
            let _ = waiter.send(Err(cause.clone()));
        }

        *self.inner.state.lock() = ConnectionState::Closed;
        self.inner.closed.cancel();
        deregistered
    }

    /// Resolves once the close sequence has finished.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }

    async fn receive_loop(self, mut inbound: mpsc::Receiver<Frame>) {
        let token = self.inner.supervisor.token().clone();
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    if self.is_open() {
                        let cause = Cause::text("supervisor cancelled").by(Subject::Platform);
                        if let Err(err) = self.close_with(cause).await {
                            debug!(connection = %self.id(), error = %err, "cancel close skipped");
                        }
                    }
                    break;
                }
                frame = inbound.recv() => match frame {
                    Some(frame) => self.spawn_dispatch(frame, token.clone()),
                    None => {
                        if self.is_open() {
                            let cause = Cause::text("channel closed").by(self.peer_subject());
                            if let Err(err) = self.close_with(cause).await {
                                debug!(connection = %self.id(), error = %err, "self-close skipped");
                            }
                        }
                        break;
                    }
                },
            }
        }
        debug!(connection = %self.id(), "receive loop stopped");
    }

    fn spawn_dispatch(&self, frame: Frame, token: CancellationToken) {
        let connection = self.clone();
        self.inner.supervisor.spawn(async move {
            let api = Arc::clone(&connection.inner.api);
            let peer: Arc<dyn PacketPeer> = Arc::new(connection.clone());
            let disconnect = tokio::select! {
                () = token.cancelled() => None,
                disconnect = api.receive_frame(&frame, peer) => disconnect,
            };
            if let Some(disconnect) = disconnect {
                info!(
                    connection = %connection.id(),
                    subject = %disconnect.subject,
                    cause = %disconnect.cause,
                    "handler requested disconnect"
                );
                let cause = disconnect.cause.by(disconnect.subject);
                if let Err(err) = connection.close_with(cause).await {
                    debug!(connection = %connection.id(), error = %err, "disconnect skipped");
                }
            }
        });
    }
}

#[async_trait]
impl PacketPeer for Connection {
    fn subject(&self) -> Subject {
        self.peer_subject()
    }

    async fn send_packet(&self, packet: TypedPacket) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed { id: self.id() });
        }
        let frame = self.inner.api.codec().encode(packet)?;
        self.inner.sink.send(frame).await?;
        Ok(())
    }

    fn resolve_receipt(&self, receipt: ReceiptPacket) -> bool {
        let waiter = self.inner.pending.lock().remove(&receipt.target);
        match waiter {
            Some(waiter) => {
                // The caller may have given up between removal and send.
                let _ = waiter.send(Ok(receipt));
                true
            }
            None => {
                debug!(
                    connection = %self.id(),
                    target = %receipt.target,
                    "dropping receipt with no pending request"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("pending", &self.pending_requests())
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

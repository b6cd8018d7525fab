//! Transport abstraction.
//!
//! A connection only needs two things from its transport: a way to push
//! text frames to the peer ([`FrameSink`]) and a stream of frames coming
//! back (an `mpsc::Receiver`). Framing, TLS and authentication belong to
//! the transport; the connection sees whole packets.
//!
//! [`memory_pair`] wires two sessions back to back in-process.

use async_trait::async_trait;
use conduit_types::ErrorCode;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// One encoded packet.
pub type Frame = String;

/// Transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The session is closed on either end.
    #[error("transport closed")]
    Closed,

    /// The peer rejected our credentials.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Peer's explanation.
        reason: String,
    },

    /// Connecting or sending failed.
    #[error("transport failure: {reason}")]
    Failed {
        /// Underlying error text.
        reason: String,
    },
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "CONNECTION_TRANSPORT_CLOSED",
            Self::Unauthorized { .. } => "CONNECTION_TRANSPORT_UNAUTHORIZED",
            Self::Failed { .. } => "CONNECTION_TRANSPORT_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Unauthorized { .. })
    }
}

/// Outbound half of a transport session.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Sends one frame.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] once either side has closed.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Closes the session. The peer's inbound stream ends. Closing twice is
    /// harmless at this level.
    async fn close(&self);
}

/// A connected duplex session.
pub struct TransportSession {
    /// Outbound frames.
    pub sink: Arc<dyn FrameSink>,
    /// Inbound frames; `None` from `recv` means the peer went away.
    pub inbound: mpsc::Receiver<Frame>,
}

impl TransportSession {
    /// Pairs a sink with its inbound stream.
    #[must_use]
    pub fn new(sink: Arc<dyn FrameSink>, inbound: mpsc::Receiver<Frame>) -> Self {
        Self { sink, inbound }
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession").finish_non_exhaustive()
    }
}

/// In-process sink writing into the peer's inbound channel.
#[derive(Debug)]
pub struct MemorySink {
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
}

impl MemorySink {
    fn new(outbound: mpsc::Sender<Frame>) -> Self {
        Self {
            outbound: Mutex::new(Some(outbound)),
        }
    }

    /// Whether [`close`](FrameSink::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.lock().is_none()
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let sender = self.outbound.lock().clone().ok_or(TransportError::Closed)?;
        sender.send(frame).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        self.outbound.lock().take();
    }
}

/// Two sessions connected back to back.
///
/// Frames sent on one side arrive on the other side's inbound stream.
/// Closing one sink ends the other side's inbound stream once every
/// clone of the sender is gone.
///
/// # Example
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use conduit_runtime::transport::memory_pair;
///
/// let (left, mut right) = memory_pair(8);
/// left.sink.send("hello".to_string()).await.unwrap();
/// assert_eq!(right.inbound.recv().await.as_deref(), Some("hello"));
///
/// left.sink.close().await;
/// assert!(right.inbound.recv().await.is_none());
/// # }
/// ```
#[must_use]
pub fn memory_pair(buffer: usize) -> (TransportSession, TransportSession) {
    let buffer = buffer.max(1);
    let (left_tx, right_rx) = mpsc::channel(buffer);
    let (right_tx, left_rx) = mpsc::channel(buffer);
    let left = TransportSession::new(Arc::new(MemorySink::new(left_tx)), left_rx);
    let right = TransportSession::new(Arc::new(MemorySink::new(right_tx)), right_rx);
    (left, right)
}

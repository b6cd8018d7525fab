//! Packet routing by `type`.

use super::actions::{ActionRegistry, HandlerError};
use super::handlers::{ReceiptPacketHandler, RequestPacketHandler};
use crate::connection::ConnectionError;
use crate::PlatformError;
use async_trait::async_trait;
use conduit_protocol::{
    ActionError, LanguageTable, PacketCodec, ReceiptPacket, ReceiptState, TypedPacket, RECEIPT,
    REQUEST,
};
use conduit_raw::{RawError, TreeRaw};
use conduit_types::{Cause, Subject};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// The remote end a packet came from.
#[async_trait]
pub trait PacketPeer: Send + Sync {
    /// Who the peer is.
    fn subject(&self) -> Subject;

    /// Sends a packet back to the peer.
    ///
    /// # Errors
    ///
    /// Encode or transport failures, or [`ConnectionError::Closed`].
    async fn send_packet(&self, packet: TypedPacket) -> Result<(), ConnectionError>;

    /// Completes a pending request. Returns `false` if nothing waited for
    /// the receipt's target.
    fn resolve_receipt(&self, receipt: ReceiptPacket) -> bool;
}

/// Handles every packet of one `type`.
#[async_trait]
pub trait PacketHandler: Send + Sync {
    /// Handles one packet.
    ///
    /// # Errors
    ///
    /// Any error is logged with the packet's id, type and origin. The
    /// handler is responsible for answering the peer itself.
    async fn handle(&self, ctx: &PacketContext<'_>) -> Result<(), HandlerError>;
}

/// Request to close the connection after the current packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    /// Why.
    pub cause: Cause,
    /// Who asked.
    pub subject: Subject,
}

/// What a [`PacketHandler`] sees.
pub struct PacketContext<'a> {
    /// Dispatcher that routed the packet.
    pub api: &'a PacketApi,
    /// The packet.
    pub packet: TypedPacket,
    /// Where it came from.
    pub peer: Arc<dyn PacketPeer>,
    disconnect: Mutex<Option<Disconnect>>,
}

impl<'a> PacketContext<'a> {
    fn new(api: &'a PacketApi, packet: TypedPacket, peer: Arc<dyn PacketPeer>) -> Self {
        Self {
            api,
            packet,
            peer,
            disconnect: Mutex::new(None),
        }
    }

    /// Sends `packet` to the peer.
    ///
    /// # Errors
    ///
    /// See [`PacketPeer::send_packet`].
    pub async fn reply(&self, packet: impl Into<TypedPacket>) -> Result<(), ConnectionError> {
        self.peer.send_packet(packet.into()).await
    }

    /// Asks the connection to close once this packet is handled, on behalf
    /// of `subject`. The last request wins.
    pub fn request_disconnect(&self, subject: Subject, cause: Cause) {
        *self.disconnect.lock() = Some(Disconnect { cause, subject });
    }

    fn into_disconnect(self) -> Option<Disconnect> {
        self.disconnect.into_inner()
    }
}

struct Registration {
    handler: Arc<dyn PacketHandler>,
    owner: Subject,
}

/// Routes decoded packets to the handler registered for their `type`.
///
/// `request` and `receipt` handlers are installed on construction.
/// Packets of a type nobody handles get a `failed` receipt with
/// `unsupported_packet_type`.
pub struct PacketApi {
    subject: Subject,
    codec: PacketCodec,
    handlers: RwLock<HashMap<String, Registration>>,
    actions: Arc<ActionRegistry>,
    language: LanguageTable,
    handler_timeout: Duration,
}

impl PacketApi {
    /// Dispatcher serving `actions`, answering as the platform.
    #[must_use]
    pub fn new(actions: Arc<ActionRegistry>) -> Self {
        let mut handlers: HashMap<String, Registration> = HashMap::new();
        handlers.insert(
            REQUEST.to_string(),
            Registration {
                handler: Arc::new(RequestPacketHandler),
                owner: Subject::Platform,
            },
        );
        handlers.insert(
            RECEIPT.to_string(),
            Registration {
                handler: Arc::new(ReceiptPacketHandler),
                owner: Subject::Platform,
            },
        );
        Self {
            subject: Subject::Platform,
            codec: PacketCodec::new(),
            handlers: RwLock::new(handlers),
            actions,
            language: LanguageTable::english(),
            handler_timeout: Duration::from_millis(conduit_protocol::DEFAULT_TIMEOUT_MS),
        }
    }

    /// Uses `language` to render failure messages.
    #[must_use]
    pub fn with_language(mut self, language: LanguageTable) -> Self {
        self.language = language;
        self
    }

    /// Timeout for requests that carry `timeout = 0`.
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Subject failures are attributed to.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    /// Subject failures are attributed to.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Codec used for frames.
    #[must_use]
    pub fn codec(&self) -> &PacketCodec {
        &self.codec
    }

    /// Action registry served by the request handler.
    #[must_use]
    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }

    /// Failure message table.
    #[must_use]
    pub fn language(&self) -> &LanguageTable {
        &self.language
    }

    /// Fallback handler timeout.
    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        self.handler_timeout
    }

    /// Installs `handler` for `packet_type`.
    ///
    /// # Errors
    ///
    /// [`PlatformError::DuplicateHandler`] if the type is taken.
    pub fn register_handler(
        &self,
        packet_type: impl Into<String>,
        owner: Subject,
        handler: Arc<dyn PacketHandler>,
    ) -> Result<(), PlatformError> {
        let packet_type = packet_type.into();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&packet_type) {
            return Err(PlatformError::DuplicateHandler { packet_type });
        }
        debug!(%packet_type, %owner, "packet handler registered");
        handlers.insert(packet_type, Registration { handler, owner });
        Ok(())
    }

    /// Removes the handler for `packet_type`, returning its owner.
    ///
    /// # Errors
    ///
    /// [`PlatformError::HandlerNotFound`] if there is none.
    pub fn unregister_handler(&self, packet_type: &str) -> Result<Subject, PlatformError> {
        self.handlers
            .write()
            .remove(packet_type)
            .map(|registration| registration.owner)
            .ok_or_else(|| PlatformError::HandlerNotFound {
                packet_type: packet_type.to_string(),
            })
    }

    /// Types with a handler, sorted.
    #[must_use]
    pub fn handler_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.handlers.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Registers a frame decoder for an extension packet type.
    ///
    /// # Errors
    ///
    /// [`PlatformError::Decoder`] if the type already has one.
    pub fn register_decoder<F>(&self, packet_type: impl Into<String>, decoder: F) -> Result<(), PlatformError>
    where
        F: Fn(TreeRaw) -> Result<TypedPacket, RawError> + Send + Sync + 'static,
    {
        self.codec.register(packet_type, decoder)?;
        Ok(())
    }

    /// Decodes a frame and dispatches it.
    ///
    /// Frames that do not decode are logged and dropped; there is no id
    /// to answer to.
    pub async fn receive_frame(&self, frame: &str, peer: Arc<dyn PacketPeer>) -> Option<Disconnect> {
        match self.codec.decode(frame) {
            Ok(packet) => self.receive(packet, peer).await,
            Err(err) => {
                warn!(error = %err, source = %peer.subject(), "dropping undecodable frame");
                None
            }
        }
    }

    /// Dispatches one packet to its handler.
    ///
    /// Handler errors and panics are logged and do not propagate.
    /// Returns the disconnect the handler asked for, if any.
    pub async fn receive(&self, packet: TypedPacket, peer: Arc<dyn PacketPeer>) -> Option<Disconnect> {
        let packet_type = packet.packet_type().to_string();
        let handler = self
            .handlers
            .read()
            .get(&packet_type)
            .map(|registration| Arc::clone(&registration.handler));

        let Some(handler) = handler else {
            self.reject_unsupported(&packet, peer.as_ref()).await;
            return None;
        };

        let ctx = PacketContext::new(self, packet, peer);
        let outcome = AssertUnwindSafe(handler.handle(&ctx)).catch_unwind().await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some("packet handler panicked".to_string()),
        };
        if let Some(failure) = failure {
            let header = ctx.packet.header();
            error!(
                packet = %header.id,
                packet_type = %header.packet_type,
                source = %ctx.peer.subject(),
                origin = ?header.cause.as_ref().map(|c| c.root().to_string()),
                error = %failure,
                "packet handler failed"
            );
        }
        ctx.into_disconnect()
    }

    async fn reject_unsupported(&self, packet: &TypedPacket, peer: &dyn PacketPeer) {
        let err = ActionError::UnsupportedPacketType {
            got: packet.packet_type().to_string(),
            supported: self.handler_types(),
        };
        warn!(
            packet = %packet.id(),
            packet_type = packet.packet_type(),
            source = %peer.subject(),
            "no handler for packet type"
        );
        let receipt = ReceiptPacket::failure(
            packet.header(),
            ReceiptState::Failed,
            err.to_cause(&self.language, self.subject.clone()),
        );
        if let Err(send) = peer.send_packet(receipt.into()).await {
            debug!(error = %send, "could not report unsupported packet type");
        }
    }
}

impl std::fmt::Debug for PacketApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketApi")
            .field("subject", &self.subject)
            .field("handlers", &self.handler_types())
            .field("actions", &self.actions)
            .field("handler_timeout", &self.handler_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use conduit_protocol::{Action, Packet, RequestMode, RequestPacket};
    use serde_json::Value;

    /// Peer that records what it is sent.
    #[derive(Default)]
    pub(crate) struct RecordingPeer {
        pub sent: Mutex<Vec<TypedPacket>>,
        pub resolved: Mutex<Vec<ReceiptPacket>>,
    }

    #[async_trait]
    impl PacketPeer for RecordingPeer {
        fn subject(&self) -> Subject {
            Subject::test("peer")
        }

        async fn send_packet(&self, packet: TypedPacket) -> Result<(), ConnectionError> {
            self.sent.lock().push(packet);
            Ok(())
        }

        fn resolve_receipt(&self, receipt: ReceiptPacket) -> bool {
            self.resolved.lock().push(receipt);
            true
        }
    }

    impl RecordingPeer {
        pub(crate) fn receipts(&self) -> Vec<ReceiptPacket> {
            self.sent
                .lock()
                .iter()
                .filter_map(|p| match p {
                    TypedPacket::Receipt(r) => Some(r.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    fn api() -> PacketApi {
        let actions = Arc::new(ActionRegistry::new());
        let echo: Action<String, String> = Action::new("test:echo", Subject::Platform);
        actions
            .handle(&echo, RequestMode::Sync, |t: String, _| async move { Ok(t) })
            .unwrap();
        PacketApi::new(actions)
    }

    struct Failing;

    #[async_trait]
    impl PacketHandler for Failing {
        async fn handle(&self, ctx: &PacketContext<'_>) -> Result<(), HandlerError> {
            ctx.request_disconnect(Subject::test("ext"), Cause::text("bye"));
            Err("broken".into())
        }
    }

    #[tokio::test]
    async fn request_is_answered() {
        let api = api();
        let peer = Arc::new(RecordingPeer::default());
        let request = RequestPacket::new("test:echo", RequestMode::Sync, 1_000)
            .with_argument("hello".to_string())
            .unwrap();

        assert!(api.receive(request.clone().into(), peer.clone()).await.is_none());
        let receipts = peer.receipts();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].target, request.header.id);
        assert_eq!(receipts[0].data().and_then(Value::as_str), Some("hello"));
    }

    #[tokio::test]
    async fn unknown_type_gets_failed_receipt() {
        let api = api();
        let peer = Arc::new(RecordingPeer::default());
        let packet = Packet::new("telemetry");
        let id = packet.header().id;

        api.receive(packet.into(), peer.clone()).await;
        let receipts = peer.receipts();
        assert_eq!(receipts[0].target, id);
        assert_eq!(receipts[0].state, ReceiptState::Failed);
        let cause = receipts[0].header.cause.clone().unwrap();
        assert_eq!(cause.error_id(), Some("unsupported_packet_type"));
        assert_eq!(
            ActionError::from_cause(&cause),
            Some(ActionError::UnsupportedPacketType {
                got: "telemetry".into(),
                supported: vec!["receipt".into(), "request".into()],
            })
        );
    }

    #[tokio::test]
    async fn receipts_resolve_on_peer() {
        let api = api();
        let peer = Arc::new(RecordingPeer::default());
        let request = RequestPacket::new("x:y", RequestMode::Sync, 5);
        let receipt = ReceiptPacket::reply(&request.header, ReceiptState::Succeed);

        api.receive(receipt.into(), peer.clone()).await;
        assert_eq!(peer.resolved.lock().len(), 1);
        assert!(peer.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn handler_error_is_contained_and_disconnect_reported() {
        let api = api();
        api.register_handler("custom", Subject::test("ext"), Arc::new(Failing))
            .unwrap();
        let peer = Arc::new(RecordingPeer::default());

        let disconnect = api
            .receive(Packet::new("custom").into(), peer.clone())
            .await
            .unwrap();
        assert_eq!(disconnect.cause, Cause::text("bye"));
        assert_eq!(disconnect.subject, Subject::test("ext"));
        assert!(peer.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn undecodable_frame_dropped() {
        let api = api();
        let peer = Arc::new(RecordingPeer::default());
        assert!(api.receive_frame("not json", peer.clone()).await.is_none());
        assert!(peer.sent.lock().is_empty());
    }

    #[test]
    fn handler_registration() {
        let api = api();
        assert!(matches!(
            api.register_handler(REQUEST, Subject::Platform, Arc::new(Failing)),
            Err(PlatformError::DuplicateHandler { .. })
        ));
        api.register_handler("custom", Subject::test("ext"), Arc::new(Failing))
            .unwrap();
        assert_eq!(api.handler_types(), vec!["custom", "receipt", "request"]);
        assert_eq!(api.unregister_handler("custom").unwrap(), Subject::test("ext"));
        assert!(api.unregister_handler("custom").is_err());

        api.register_decoder("custom", |raw| Packet::from_raw(raw).map(TypedPacket::Other))
            .unwrap();
        assert!(api
            .register_decoder(REQUEST, |raw| Packet::from_raw(raw).map(TypedPacket::Other))
            .is_err());
    }
}

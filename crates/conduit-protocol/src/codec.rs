//! Frame encoding and type dispatch.

use crate::{Packet, PacketHeader, ProtocolError, ReceiptPacket, RequestPacket, RECEIPT, REQUEST};
use conduit_raw::{DecoderRegistry, RawError, TreeRaw};
use conduit_types::PacketId;

/// A decoded packet.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedPacket {
    /// `type = "request"`.
    Request(RequestPacket),
    /// `type = "receipt"`.
    Receipt(ReceiptPacket),
    /// Any other type, header validated.
    Other(Packet),
}

impl TypedPacket {
    /// Header fields.
    #[must_use]
    pub fn header(&self) -> &PacketHeader {
        match self {
            Self::Request(p) => &p.header,
            Self::Receipt(p) => &p.header,
            Self::Other(p) => p.header(),
        }
    }

    /// Packet id.
    #[must_use]
    pub fn id(&self) -> PacketId {
        self.header().id
    }

    /// Discriminator.
    #[must_use]
    pub fn packet_type(&self) -> &str {
        &self.header().packet_type
    }

    /// Complete raw form.
    ///
    /// # Errors
    ///
    /// Propagates encode failures.
    pub fn into_raw(self) -> Result<TreeRaw, RawError> {
        match self {
            Self::Request(p) => p.into_raw(),
            Self::Receipt(p) => p.into_raw(),
            Self::Other(p) => p.into_raw(),
        }
    }

    /// Text frame.
    ///
    /// # Errors
    ///
    /// Propagates encode failures.
    pub fn to_frame(&self) -> Result<String, RawError> {
        self.clone().into_raw()?.to_frame()
    }
}

impl From<RequestPacket> for TypedPacket {
    fn from(packet: RequestPacket) -> Self {
        Self::Request(packet)
    }
}

impl From<ReceiptPacket> for TypedPacket {
    fn from(packet: ReceiptPacket) -> Self {
        Self::Receipt(packet)
    }
}

impl From<Packet> for TypedPacket {
    fn from(packet: Packet) -> Self {
        Self::Other(packet)
    }
}

/// Turns text frames into [`TypedPacket`]s and back.
///
/// `request` and `receipt` are registered on construction. Frames of any
/// other type fall back to a header-validated [`Packet`]. Extension types
/// can register their own decoder to get validation up front.
///
/// # Example
///
/// ```
/// use conduit_protocol::{PacketCodec, RequestMode, RequestPacket, TypedPacket};
///
/// let codec = PacketCodec::new();
/// let frame = codec
///     .encode(RequestPacket::new("acme:echo", RequestMode::Sync, 1_000).into())
///     .unwrap();
///
/// match codec.decode(&frame).unwrap() {
///     TypedPacket::Request(request) => assert_eq!(request.action, "acme:echo"),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Debug)]
pub struct PacketCodec {
    decoders: DecoderRegistry<TypedPacket>,
}

impl PacketCodec {
    /// Codec with the built-in packet types.
    #[must_use]
    pub fn new() -> Self {
        let decoders = DecoderRegistry::new("packet", crate::packet::field::TYPE)
            .with(REQUEST, |raw| RequestPacket::from_raw(raw).map(TypedPacket::Request))
            .with(RECEIPT, |raw| ReceiptPacket::from_raw(raw).map(TypedPacket::Receipt))
            .with_fallback(|raw| Packet::from_raw(raw).map(TypedPacket::Other));
        Self { decoders }
    }

    /// Registers a decoder for an extension packet type.
    ///
    /// # Errors
    ///
    /// [`RawError::DuplicateDecoder`] if the type is taken.
    pub fn register<F>(&self, packet_type: impl Into<String>, decoder: F) -> Result<(), RawError>
    where
        F: Fn(TreeRaw) -> Result<TypedPacket, RawError> + Send + Sync + 'static,
    {
        self.decoders.register(packet_type, decoder)
    }

    /// Types with a dedicated decoder, sorted.
    #[must_use]
    pub fn packet_types(&self) -> Vec<String> {
        self.decoders.discriminators()
    }

    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Raw`] if the frame is not a JSON object.
    /// - [`ProtocolError::Malformed`] if the packet fails validation.
    pub fn decode(&self, frame: &str) -> Result<TypedPacket, ProtocolError> {
        let raw = TreeRaw::from_frame(frame)?;
        self.decode_raw(raw)
    }

    /// Decodes an already parsed raw.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Malformed`] if the packet fails validation.
    pub fn decode_raw(&self, raw: TreeRaw) -> Result<TypedPacket, ProtocolError> {
        let packet_type = raw
            .value(crate::packet::field::TYPE)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        self.decoders
            .decode(raw)
            .map_err(|source| ProtocolError::Malformed {
                packet_type,
                source,
            })
    }

    /// Encodes a packet as a text frame.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Raw`] on encode failure.
    pub fn encode(&self, packet: TypedPacket) -> Result<String, ProtocolError> {
        Ok(packet.into_raw()?.to_frame()?)
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

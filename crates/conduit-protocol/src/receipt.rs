//! Receipt packets.

use crate::packet::{header_schema, PacketHeader};
use crate::TypeDescriptor;
use conduit_raw::{FieldDescriptor, FieldRule, FieldType, Raw, RawError, RawExt, Schema, TreeRaw};
use conduit_types::{Cause, PacketId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Discriminator of receipt packets.
pub const RECEIPT: &str = "receipt";

/// Receipt body field names.
pub mod field {
    /// Id of the request being answered.
    pub const TARGET: &str = "target";
    /// Outcome.
    pub const STATE: &str = "state";
    /// Result payload.
    pub const DATA: &str = "data";
}

/// Outcome reported by a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptState {
    /// The action completed; `data` holds the result.
    Succeed,
    /// The action failed; `cause` explains why.
    Failed,
    /// The action was cut short (shutdown, disconnect).
    Interrupted,
    /// Accepted for asynchronous processing.
    Received,
    /// The outcome is unknown.
    Undefined,
}

impl ReceiptState {
    /// Whether this is [`ReceiptState::Succeed`].
    #[must_use]
    pub fn is_succeed(self) -> bool {
        matches!(self, Self::Succeed)
    }
}

impl fmt::Display for ReceiptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Succeed => "succeed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
            Self::Received => "received",
            Self::Undefined => "undefined",
        };
        f.write_str(text)
    }
}

/// Descriptor table of receipt packets.
pub fn receipt_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new(RECEIPT)
            .extend(header_schema())
            .field(FieldDescriptor::required(field::TARGET, FieldType::String))
            .field(FieldDescriptor::required(field::STATE, FieldType::String))
            .field(FieldDescriptor::optional(field::DATA, FieldType::Any).nullable())
    })
}

/// Answer to a request, correlated by `target`.
///
/// # Example
///
/// ```
/// use conduit_protocol::{ReceiptPacket, ReceiptState, RequestMode, RequestPacket};
///
/// let request = RequestPacket::new("acme:echo", RequestMode::Sync, 1_000);
/// let receipt = ReceiptPacket::reply(&request.header, ReceiptState::Succeed)
///     .with_data("hello".to_string())
///     .unwrap();
///
/// assert_eq!(receipt.target, request.header.id);
/// assert_eq!(receipt.data().and_then(|v| v.as_str()), Some("hello"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptPacket {
    /// Common header.
    pub header: PacketHeader,
    /// Id of the request being answered.
    pub target: PacketId,
    /// Outcome.
    pub state: ReceiptState,
    raw: TreeRaw,
}

impl ReceiptPacket {
    /// Receipt answering the request with header `request`.
    ///
    /// The cause points at the request and the session is carried over.
    #[must_use]
    pub fn reply(request: &PacketHeader, state: ReceiptState) -> Self {
        let mut header = PacketHeader::new(RECEIPT);
        header.cause = Some(Cause::packet(request.id));
        header.session = request.session;
        Self {
            header,
            target: request.id,
            state,
            raw: TreeRaw::new(),
        }
    }

    /// Failure receipt whose cause is `cause`, itself caused by the request.
    #[must_use]
    pub fn failure(request: &PacketHeader, state: ReceiptState, cause: Cause) -> Self {
        let mut receipt = Self::reply(request, state);
        receipt.header.cause = Some(cause.because(Cause::packet(request.id)));
        receipt
    }

    /// Validates and decodes `raw`.
    ///
    /// # Errors
    ///
    /// Schema violations or undecodable fields.
    pub fn from_raw(raw: TreeRaw) -> Result<Self, RawError> {
        receipt_schema().validate(&raw)?;
        Ok(Self {
            header: PacketHeader::read(&raw)?,
            target: raw.require(field::TARGET)?,
            state: raw.require(field::STATE)?,
            raw,
        })
    }

    /// Sets the result payload.
    ///
    /// # Errors
    ///
    /// [`RawError::Encode`] if `data` fails to serialize.
    pub fn with_data<R: Serialize + Send + Sync + 'static>(mut self, data: R) -> Result<Self, RawError> {
        self.raw.set(field::DATA, Some(data), FieldRule::optional())?;
        Ok(self)
    }

    /// Sets an untyped result payload.
    #[must_use]
    pub fn with_data_tree(mut self, data: Value) -> Self {
        self.raw.insert_value(field::DATA, data);
        self
    }

    /// Untyped payload, if present.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.raw.value(field::DATA)
    }

    /// Decodes the payload according to `descriptor`.
    ///
    /// Returns `Ok(None)` without looking at `data` unless the state is
    /// [`ReceiptState::Succeed`].
    ///
    /// # Errors
    ///
    /// Whatever [`TypeDescriptor::read`] reports for the `data` field.
    pub fn decode_data<R>(&self, descriptor: &TypeDescriptor) -> Result<Option<R>, RawError>
    where
        R: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if !self.state.is_succeed() {
            return Ok(None);
        }
        descriptor.read(&self.raw, field::DATA)
    }

    /// Raw form including extension fields.
    #[must_use]
    pub fn raw(&self) -> &TreeRaw {
        &self.raw
    }

    /// Whether a data field is present (possibly null).
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.raw.contains(field::DATA)
    }

    /// Writes typed fields back and returns the complete raw.
    ///
    /// # Errors
    ///
    /// Propagates encode failures.
    pub fn into_raw(self) -> Result<TreeRaw, RawError> {
        let mut raw = self.raw;
        self.header.write(&mut raw)?;
        raw.set(field::TARGET, Some(self.target), FieldRule::required())?;
        raw.set(field::STATE, Some(self.state), FieldRule::required())?;
        Ok(raw)
    }
}

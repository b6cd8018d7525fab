//! Request packets.

use crate::packet::{header_schema, PacketHeader};
use crate::TypeDescriptor;
use conduit_raw::{FieldDescriptor, FieldRule, FieldType, RawError, RawExt, Schema, TreeRaw};
use conduit_types::{Cause, SessionId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Discriminator of request packets.
pub const REQUEST: &str = "request";

/// Timeout used when the caller does not pick one, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Request body field names.
pub mod field {
    /// Action name.
    pub const ACTION: &str = "action";
    /// Invocation mode.
    pub const MODE: &str = "mode";
    /// Action argument.
    pub const ARGUMENT: &str = "argument";
    /// Maximum wait in milliseconds.
    pub const TIMEOUT: &str = "timeout";
}

/// How the caller wants the action invoked.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// The receipt carries the result.
    #[default]
    Sync,
    /// The receipt acknowledges acceptance; the work continues afterwards.
    Async,
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.write_str("sync"),
            Self::Async => f.write_str("async"),
        }
    }
}

/// Descriptor table of request packets.
pub fn request_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new(REQUEST)
            .extend(header_schema())
            .field(FieldDescriptor::required(field::ACTION, FieldType::String))
            .field(FieldDescriptor::required(field::MODE, FieldType::String))
            .field(FieldDescriptor::optional(field::ARGUMENT, FieldType::Any).nullable())
            .field(FieldDescriptor::required(field::TIMEOUT, FieldType::Integer))
    })
}

/// An action invocation.
///
/// The argument stays in the packet's raw until a handler decodes it with
/// the action's parameter descriptor.
///
/// # Example
///
/// ```
/// use conduit_protocol::{RequestMode, RequestPacket};
///
/// let request = RequestPacket::new("acme:echo", RequestMode::Sync, 5_000)
///     .with_argument("hello".to_string())
///     .unwrap();
///
/// let frame = request.clone().into_raw().unwrap().to_frame().unwrap();
/// assert!(frame.contains(r#""type":"request""#));
/// assert!(frame.contains(r#""argument":"hello""#));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPacket {
    /// Common header.
    pub header: PacketHeader,
    /// Action name.
    pub action: String,
    /// Invocation mode.
    pub mode: RequestMode,
    /// Maximum wait in milliseconds.
    pub timeout_ms: u64,
    raw: TreeRaw,
}

impl RequestPacket {
    /// New request without argument.
    #[must_use]
    pub fn new(action: impl Into<String>, mode: RequestMode, timeout_ms: u64) -> Self {
        Self {
            header: PacketHeader::new(REQUEST),
            action: action.into(),
            mode,
            timeout_ms,
            raw: TreeRaw::new(),
        }
    }

    /// Validates and decodes `raw`.
    ///
    /// # Errors
    ///
    /// Schema violations or undecodable header/body fields.
    pub fn from_raw(raw: TreeRaw) -> Result<Self, RawError> {
        request_schema().validate(&raw)?;
        Ok(Self {
            header: PacketHeader::read(&raw)?,
            action: raw.require(field::ACTION)?,
            mode: raw.require(field::MODE)?,
            timeout_ms: raw.require(field::TIMEOUT)?,
            raw,
        })
    }

    /// Sets the argument.
    ///
    /// # Errors
    ///
    /// [`RawError::Encode`] if `argument` fails to serialize.
    pub fn with_argument<P: Serialize + Send + Sync + 'static>(
        mut self,
        argument: P,
    ) -> Result<Self, RawError> {
        self.raw
            .set(field::ARGUMENT, Some(argument), FieldRule::optional())?;
        Ok(self)
    }

    /// Sets an untyped argument (`None` removes it).
    pub fn with_argument_tree(mut self, argument: Option<Value>) -> Self {
        match argument {
            Some(value) => self.raw.insert_value(field::ARGUMENT, value),
            None => {
                conduit_raw::Raw::remove(&mut self.raw, field::ARGUMENT);
            }
        }
        self
    }

    /// Sets the cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.header.cause = Some(cause);
        self
    }

    /// Sets the session.
    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.header.session = Some(session);
        self
    }

    /// Untyped argument, if present.
    #[must_use]
    pub fn argument(&self) -> Option<&Value> {
        self.raw.value(field::ARGUMENT)
    }

    /// Decodes the argument according to `descriptor`.
    ///
    /// # Errors
    ///
    /// Whatever [`TypeDescriptor::read`] reports for the `argument` field.
    pub fn decode_argument<P>(&self, descriptor: &TypeDescriptor) -> Result<Option<P>, RawError>
    where
        P: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        descriptor.read(&self.raw, field::ARGUMENT)
    }

    /// Raw form including extension fields.
    #[must_use]
    pub fn raw(&self) -> &TreeRaw {
        &self.raw
    }

    /// Writes typed fields back and returns the complete raw.
    ///
    /// # Errors
    ///
    /// Propagates encode failures.
    pub fn into_raw(self) -> Result<TreeRaw, RawError> {
        let mut raw = self.raw;
        self.header.write(&mut raw)?;
        raw.set(field::ACTION, Some(self.action), FieldRule::required())?;
        raw.set(field::MODE, Some(self.mode), FieldRule::required())?;
        raw.set(field::TIMEOUT, Some(self.timeout_ms), FieldRule::required())?;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire() -> Value {
        json!({
            "id": "3b0c8e55-52cf-4a8e-b9a3-8d9f43a1c001",
            "type": "request",
            "time": "2026-03-01T10:00:00Z",
            "action": "acme:echo",
            "mode": "async",
            "argument": {"text": "hi"},
            "timeout": 250,
            "x-trace": "t-1"
        })
    }

    #[test]
    fn decodes_wire_form() {
        let request = RequestPacket::from_raw(TreeRaw::from_value(wire()).unwrap()).unwrap();
        assert_eq!(request.action, "acme:echo");
        assert_eq!(request.mode, RequestMode::Async);
        assert_eq!(request.timeout_ms, 250);
        assert_eq!(request.argument(), Some(&json!({"text": "hi"})));
    }

    #[test]
    fn roundtrip_preserves_unknown_fields() {
        let request = RequestPacket::from_raw(TreeRaw::from_value(wire()).unwrap()).unwrap();
        let raw = request.into_raw().unwrap();
        assert_eq!(serde_json::to_value(&raw).unwrap(), wire());
    }

    #[test]
    fn bad_mode_is_rejected() {
        let mut value = wire();
        value["mode"] = json!("batch");
        assert!(matches!(
            RequestPacket::from_raw(TreeRaw::from_value(value).unwrap()),
            Err(RawError::Decode { .. })
        ));
    }

    #[test]
    fn timeout_must_be_integer() {
        let mut value = wire();
        value["timeout"] = json!("soon");
        assert!(matches!(
            RequestPacket::from_raw(TreeRaw::from_value(value).unwrap()),
            Err(RawError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn argument_tree_can_be_cleared() {
        let request = RequestPacket::new("a:b", RequestMode::Sync, 1)
            .with_argument_tree(Some(json!(1)))
            .with_argument_tree(None);
        assert!(request.argument().is_none());
    }

    #[test]
    fn mode_display() {
        assert_eq!(RequestMode::Sync.to_string(), "sync");
        assert_eq!(
            serde_json::to_value(RequestMode::Async).unwrap(),
            json!("async")
        );
    }
}

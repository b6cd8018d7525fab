//! Packet envelope and the generic packet variant.
//!
//! Every packet shares a header:
//!
//! | Field | Wire type | Rule |
//! |-------|-----------|------|
//! | `id` | string (UUID) | required |
//! | `type` | string | required |
//! | `time` | string (RFC 3339) | required |
//! | `cause` | object | optional, nullable |
//! | `session` | string (UUID) | optional, nullable |
//!
//! Typed packets keep the [`TreeRaw`] they were decoded from. Encoding
//! writes the typed fields back into that raw, so fields this build does
//! not know about are sent on unchanged.

use chrono::{DateTime, Utc};
use conduit_raw::{FieldDescriptor, FieldRule, FieldType, Raw, RawError, RawExt, Schema, TreeRaw};
use conduit_types::{Cause, PacketId, SessionId};
use std::sync::OnceLock;

/// Header field names.
pub mod field {
    /// Correlation id.
    pub const ID: &str = "id";
    /// Discriminator.
    pub const TYPE: &str = "type";
    /// Creation time.
    pub const TIME: &str = "time";
    /// Causal chain.
    pub const CAUSE: &str = "cause";
    /// Session.
    pub const SESSION: &str = "session";
}

const CAUSE_RULE: FieldRule<Cause> = FieldRule::optional().nullable();
const SESSION_RULE: FieldRule<SessionId> = FieldRule::optional().nullable();

/// Descriptor table shared by all packet types.
pub fn header_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("packet")
            .field(FieldDescriptor::required(field::ID, FieldType::String))
            .field(FieldDescriptor::required(field::TYPE, FieldType::String))
            .field(FieldDescriptor::required(field::TIME, FieldType::String))
            .field(FieldDescriptor::optional(field::CAUSE, FieldType::Object).nullable())
            .field(FieldDescriptor::optional(field::SESSION, FieldType::String).nullable())
    })
}

/// Fields common to every packet.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketHeader {
    /// Correlation id.
    pub id: PacketId,
    /// Discriminator (`request`, `receipt`, or an extension type).
    pub packet_type: String,
    /// When the packet was created.
    pub time: DateTime<Utc>,
    /// Why the packet was produced.
    pub cause: Option<Cause>,
    /// Session the packet belongs to.
    pub session: Option<SessionId>,
}

impl PacketHeader {
    /// Fresh header with a new id and the current time.
    #[must_use]
    pub fn new(packet_type: impl Into<String>) -> Self {
        Self {
            id: PacketId::new(),
            packet_type: packet_type.into(),
            time: Utc::now(),
            cause: None,
            session: None,
        }
    }

    /// Reads the header fields out of `raw`.
    ///
    /// # Errors
    ///
    /// The first header field that is missing, null or of the wrong type.
    pub fn read(raw: &dyn Raw) -> Result<Self, RawError> {
        Ok(Self {
            id: raw.require(field::ID)?,
            packet_type: raw.require(field::TYPE)?,
            time: raw.require(field::TIME)?,
            cause: raw.get(field::CAUSE, CAUSE_RULE)?,
            session: raw.get(field::SESSION, SESSION_RULE)?,
        })
    }

    /// Writes the header into `raw`. Absent optionals are removed rather
    /// than written as null.
    ///
    /// # Errors
    ///
    /// Propagates encode failures.
    pub fn write(&self, raw: &mut TreeRaw) -> Result<(), RawError> {
        raw.set(field::ID, Some(self.id), FieldRule::required())?;
        raw.set(field::TYPE, Some(self.packet_type.clone()), FieldRule::required())?;
        raw.set(field::TIME, Some(self.time), FieldRule::required())?;
        match &self.cause {
            Some(cause) => raw.set(field::CAUSE, Some(cause.clone()), CAUSE_RULE)?,
            None => {
                raw.clear(field::CAUSE, CAUSE_RULE)?;
            }
        }
        match self.session {
            Some(session) => raw.set(field::SESSION, Some(session), SESSION_RULE)?,
            None => {
                raw.clear(field::SESSION, SESSION_RULE)?;
            }
        }
        Ok(())
    }
}

/// A packet whose type has no dedicated decoder.
///
/// Handlers for extension packet types read their own fields from
/// [`raw`](Self::raw).
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    header: PacketHeader,
    raw: TreeRaw,
}

impl Packet {
    /// Builds an empty packet of `packet_type`.
    #[must_use]
    pub fn new(packet_type: impl Into<String>) -> Self {
        Self {
            header: PacketHeader::new(packet_type),
            raw: TreeRaw::new(),
        }
    }

    /// Validates the header and wraps `raw`.
    ///
    /// # Errors
    ///
    /// Header validation failures.
    pub fn from_raw(raw: TreeRaw) -> Result<Self, RawError> {
        header_schema().validate(&raw)?;
        let header = PacketHeader::read(&raw)?;
        Ok(Self { header, raw })
    }

    /// Header fields.
    #[must_use]
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    /// Mutable header fields.
    pub fn header_mut(&mut self) -> &mut PacketHeader {
        &mut self.header
    }

    /// Body fields (and the header as last decoded).
    #[must_use]
    pub fn raw(&self) -> &TreeRaw {
        &self.raw
    }

    /// Mutable body fields.
    pub fn raw_mut(&mut self) -> &mut TreeRaw {
        &mut self.raw
    }

    /// Writes the header back and returns the complete raw.
    ///
    /// # Errors
    ///
    /// Propagates encode failures.
    pub fn into_raw(self) -> Result<TreeRaw, RawError> {
        let mut raw = self.raw;
        self.header.write(&mut raw)?;
        Ok(raw)
    }
}

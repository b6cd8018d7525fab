//! Typed key/value envelope.
//!
//! Every protocol message and configuration object in conduit travels as a
//! *raw*: an ordered set of named fields whose wire form is a JSON tree,
//! read back through typed accessors that state what they expect.
//!
//! ```text
//!            set(name, Some(v), rule)             get::<T>(name, rule)
//!   caller ───────────────────────────► Raw ─────────────────────────► T
//!                                        │
//!                     ┌──────────────────┴──────────────────┐
//!                     ▼                                     ▼
//!               ┌───────────┐   into_tree()          ┌────────────┐
//!               │  MapRaw   │ ─────────────────────► │  TreeRaw   │
//!               │ typed     │                        │ JSON tree  │
//!               │ values    │                        │ + views    │
//!               └───────────┘                        └────────────┘
//! ```
//!
//! # Access contract
//!
//! Reads and writes carry a [`FieldRule`] (optional, nullable, default).
//! Violations surface immediately as [`RawError`] naming the field.
//!
//! # Extension fields
//!
//! [`TreeRaw`] never drops fields it was not asked about, so unknown
//! fields survive decode → modify → encode.
//!
//! # Schemas and registries
//!
//! - [`Schema`]: explicit per-type descriptor table, validated on decode.
//! - [`DecoderRegistry`]: discriminator → decoder map for polymorphic
//!   payloads.

mod error;
mod map;
mod raw;
mod registry;
mod rule;
mod schema;
mod tree;

pub use error::RawError;
pub use map::MapRaw;
pub use raw::{
    content_eq, json_kind, DecodeFn, EncodeFn, Erased, Presence, Raw, RawExt, TypedValue,
};
pub use registry::{Decoder, DecoderRegistry};
pub use rule::FieldRule;
pub use schema::{FieldDescriptor, FieldType, Schema};
pub use tree::TreeRaw;

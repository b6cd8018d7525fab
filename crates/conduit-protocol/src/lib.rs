//! Packets, actions and action-layer failures.
//!
//! Two packet types carry all RPC traffic between a platform and its
//! peers:
//!
//! ```text
//!   caller                                   callee
//!     │  RequestPacket { id, action, mode,      │
//!     │                  argument, timeout }    │
//!     │ ──────────────────────────────────────► │
//!     │                                         │ Action lookup
//!     │                                         │ handler(P) -> R
//!     │  ReceiptPacket { target = id, state,    │
//!     │                  data | cause }         │
//!     │ ◄────────────────────────────────────── │
//! ```
//!
//! Every packet is a [`conduit_raw::TreeRaw`] underneath. Typed packets
//! decode the fields they know and keep the rest, so peers running a
//! newer protocol revision can add fields without breaking older ones.
//!
//! # Failures
//!
//! A request that cannot be served is answered with a `failed` receipt
//! whose cause is built from an [`ActionError`]. Peers match on the
//! stable wire id; the message is rendered through a [`LanguageTable`].
//!
//! Frames that cannot be decoded at all are [`ProtocolError`]s and stay
//! local to the receiver.
//!
//! # Crate Structure
//!
//! - [`PacketHeader`], [`Packet`]: common header, generic packet
//! - [`RequestPacket`], [`RequestMode`]
//! - [`ReceiptPacket`], [`ReceiptState`]
//! - [`Action`], [`ActionDescriptor`], [`TypeDescriptor`]
//! - [`PacketCodec`], [`TypedPacket`]: frame dispatch by `type`
//! - [`ActionError`], [`LanguageTable`], [`ProtocolError`]

mod action;
mod codec;
mod error;
mod failure;
mod language;
pub mod packet;
pub mod receipt;
pub mod request;

pub use action::{Action, ActionDescriptor, TypeDescriptor};
pub use codec::{PacketCodec, TypedPacket};
pub use error::ProtocolError;
pub use failure::ActionError;
pub use language::LanguageTable;
pub use packet::{header_schema, Packet, PacketHeader};
pub use receipt::{receipt_schema, ReceiptPacket, ReceiptState, RECEIPT};
pub use request::{request_schema, RequestMode, RequestPacket, DEFAULT_TIMEOUT_MS, REQUEST};

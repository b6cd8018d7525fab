//! Packet dispatch.
//!
//! ```text
//! frame ─► PacketCodec ─► PacketApi ─┬─ "request" ─► RequestPacketHandler ─► ActionRegistry
//!                                    ├─ "receipt" ─► ReceiptPacketHandler ─► pending request
//!                                    ├─ custom    ─► registered PacketHandler
//!                                    └─ other     ─► failed receipt (unsupported_packet_type)
//! ```
//!
//! Nothing a handler does escapes dispatch: errors and panics are logged
//! with the packet's id, type, source subject and origin cause, and the
//! connection keeps running. Only action-layer failures reach the peer,
//! as `failed` receipts carrying a structured cause.

mod actions;
mod api;
mod handlers;

pub use actions::{ActionContext, ActionRegistry, HandlerError};
pub use api::{Disconnect, PacketApi, PacketContext, PacketHandler, PacketPeer};
pub use handlers::{ReceiptPacketHandler, RequestPacketHandler};

//! Connection layer: request/receipt correlation over a transport.
//!
//! ```text
//!   caller task                 Connection                      peer
//!   request(action, arg) ──► pending[id] = waiter
//!                            send RequestPacket ───────────────►
//!        (suspended)                                 ◄────────── ReceiptPacket{target=id}
//!                            receive loop ─► PacketApi
//!                              └─ receipt handler ─► pending.remove(id)
//!   ◄── receipt ───────────── waiter.send(receipt)
//! ```
//!
//! Exactly one receipt resolves a request: the waiter is removed on first
//! resolution, on timeout and on close, so late or duplicate receipts are
//! dropped with a `debug!` line.
//!
//! # Closing
//!
//! [`Connection::close`] runs once. It deregisters the connection from the
//! [`ConnectionRegistry`], closes the transport, cancels the receive loop
//! and fails every pending request with the close cause. When the peer
//! goes away first, the connection closes itself with `channel closed`.

mod connection;
mod error;
mod reconnect;
mod registry;

pub use connection::{Connection, ConnectionState, RequestOptions, RequestResult};
pub use error::ConnectionError;
pub use reconnect::{Connector, ReconnectPolicy, Reconnector};
pub use registry::ConnectionRegistry;

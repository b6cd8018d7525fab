//! Conduit runtime.
//!
//! Everything that runs: connections and their request/receipt
//! correlation, packet dispatch, permission evaluation, plugin batches,
//! layered configuration and the [`Platform`] facade that wires them.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Model Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  conduit-types    : ids, Subject, Cause, ErrorCode          │
//! │  conduit-raw      : Raw trees, schemas, decoder registry    │
//! │  conduit-protocol : packets, actions, wire error ids        │
//! │  conduit-auth     : segment matchers, comparators, records  │
//! │  conduit-plugin   : metadata, manifests, lifecycle          │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Runtime Layer (THIS CRATE)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  transport/  : FrameSink, TransportSession, memory_pair     │
//! │  connection/ : Connection, ConnectionRegistry, Reconnector  │
//! │  dispatch/   : PacketApi, ActionRegistry, packet handlers   │
//! │  auth/       : PermissionManager, MemoryProfileRepository   │
//! │  plugin/     : PluginManager, StaticPluginLoader            │
//! │  config/     : ConduitConfig, ConfigLoader                  │
//! │  platform    : Platform                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                             │
//! │  (conduit-cli)                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! ## [`connection`]
//!
//! - [`Connection`]: one transport session, many concurrent requests
//! - [`ConnectionRegistry`]: open connections by id
//! - [`Reconnector`](connection::Reconnector): client-side retry loop
//!
//! ## [`dispatch`]
//!
//! - [`PacketApi`]: routes inbound packets by `type`
//! - [`ActionRegistry`]: typed handlers per action and mode
//!
//! ## [`auth`]
//!
//! - [`PermissionManager`]: profiles, inheritance and checks
//!
//! ## [`plugin`]
//!
//! - [`PluginManager`]: install, enable, disable and unload in
//!   dependency order
//!
//! ## [`config`]
//!
//! Priority: Environment > Project > Global > Default.

pub mod auth;
pub mod config;
pub mod connection;
pub mod dispatch;
mod error;
pub mod platform;
pub mod plugin;
pub mod supervisor;
pub mod transport;

pub use auth::{MemoryProfileRepository, PermissionManager};
pub use config::{ConduitConfig, ConfigError, ConfigLoader};
pub use connection::{
    Connection, ConnectionError, ConnectionRegistry, ConnectionState, RequestOptions,
    RequestResult,
};
pub use dispatch::{ActionContext, ActionRegistry, HandlerError, PacketApi, PacketHandler};
pub use error::PlatformError;
pub use platform::{Platform, PermissionQuery};
pub use plugin::{
    BatchReport, PluginManager, PluginSummary, ResolutionError, ResolutionIssue,
    StaticPluginLoader,
};
pub use supervisor::Supervisor;
pub use transport::{memory_pair, TransportSession};

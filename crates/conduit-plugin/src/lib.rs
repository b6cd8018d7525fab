//! Plugin model for conduit.
//!
//! This crate describes plugins; it does not run them. The runtime's
//! `PluginManager` resolves dependency batches and drives each plugin's
//! [`Lifecycle`] through its [`PluginEntry`] callbacks.
//!
//! # Crate Architecture
//!
//! ```text
//! conduit-types   (NamespaceId)
//!       ↑
//! conduit-plugin  (PluginMeta, manifests, Lifecycle, PluginEntry)  ◄── HERE
//!       ↑
//! conduit-runtime (PluginManager, StaticPluginLoader)
//! ```
//!
//! # Crate Structure
//!
//! - [`PluginCoordinate`], [`VersionMatcher`], [`Requirement`], [`Provision`]
//! - [`PluginMeta`], [`PluginManifest`]: metadata and its TOML form
//! - [`PluginState`], [`PluginAction`], [`Lifecycle`]: the state machine
//! - [`PluginEntry`], [`PluginLoader`], [`PluginArtifact`]
//! - [`PluginError`]

mod coordinate;
mod entry;
mod error;
mod meta;
mod state;

pub use coordinate::{channel_accepts, PluginCoordinate, Provision, Requirement, VersionMatcher};
pub use entry::{EntryError, NoopEntry, PluginArtifact, PluginEntry, PluginLoader};
pub use error::PluginError;
pub use meta::{PluginManifest, PluginMeta};
pub use state::{Lifecycle, PluginAction, PluginState, Transition};

// Re-exported so entry implementations need no direct dependency.
pub use async_trait::async_trait;

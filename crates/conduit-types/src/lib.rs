//! Core types shared by every conduit crate.
//!
//! # Overview
//!
//! conduit is a platform runtime: a central platform process talks to
//! independently developed plugins and remote peers over a typed
//! request/receipt protocol, manages plugin lifecycles and answers
//! permission checks.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        conduit-cli                           │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      conduit-runtime                         │
//! │  Connection · PacketApi · PermissionManager · PluginManager  │
//! └──────┬──────────────────┬──────────────────┬─────────────────┘
//!        ▼                  ▼                  ▼
//! ┌──────────────┐  ┌────────────────┐  ┌────────────────┐
//! │conduit-auth  │  │conduit-protocol│  │conduit-plugin  │
//! └──────┬───────┘  └───────┬────────┘  └───────┬────────┘
//!        │                  ▼                   │
//!        │          ┌──────────────┐            │
//!        │          │ conduit-raw  │            │
//!        │          └──────┬───────┘            │
//!        ▼                 ▼                    ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 conduit-types (this crate)                   │
//! │     PacketId · NamespaceId · Subject · Cause · ErrorCode     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identifiers
//!
//! | Type | Backing | Purpose |
//! |------|---------|---------|
//! | [`PacketId`] | UUID v4 | Request/receipt correlation |
//! | [`ConnectionId`] | UUID v4 | One transport session |
//! | [`SessionId`] | UUID v4 | Optional logical session |
//! | [`NamespaceId`] | `namespace:name` | Plugins and actions |
//! | [`NumericalId`] | `u64` | Repository rows |
//!
//! # Attribution
//!
//! - [`Subject`]: who did something.
//! - [`Cause`]: why it happened, as an acyclic chain.
//!
//! # Errors
//!
//! Every error type in the workspace implements [`ErrorCode`].

mod cause;
mod error;
mod id;
mod subject;

pub use cause::{Cause, Reason};
pub use error::{assert_error_code, assert_error_codes, ErrorCode, ErrorSummary};
pub use id::{ConnectionId, IdError, NamespaceId, NumericalId, PacketId, SessionId};
pub use subject::{Subject, SubjectKind};

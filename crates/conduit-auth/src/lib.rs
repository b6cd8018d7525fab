//! Permission primitives for conduit.
//!
//! Permissions are dot-separated nodes (`conduit.plugin.install`) asked
//! for by a [`Subject`](conduit_types::Subject). Profiles hold ordered
//! records; each record pairs a [`PermissionComparator`] with a decision:
//!
//! ```text
//! profile "operators"
//!   #3  subject=any   node=conduit.plugin.uninstall   -> Grant(false)
//!   #2  subject=any   node=conduit.plugin.??          -> Grant(true)
//!   #1  subject=any   node=??                         -> Inherit(profile "readers")
//! ```
//!
//! Evaluation walks records newest first and stops at the first match.
//! An inheritance record continues in the referenced profile. When
//! nothing matches the answer is "unset", which callers keep distinct
//! from "denied".
//!
//! # Crate Architecture
//!
//! ```text
//! conduit-types  (Subject, NumericalId)
//!       ↑
//! conduit-auth   (Matcher, SegmentMatcher, comparators, ProfileRepository)  ◄── HERE
//!       ↑
//! conduit-runtime (PermissionManager, MemoryProfileRepository)
//! ```
//!
//! Traits here, implementations in the runtime.

mod comparator;
mod error;
mod matcher;
mod permission;
mod record;
mod repository;
mod segment;

pub use comparator::{PermissionComparator, SubjectMatcher, ValueMatcher};
pub use error::AuthError;
pub use matcher::{Anything, Exact, Matcher};
pub use permission::Permission;
pub use record::{PermissionProfile, PermissionRecord, RecordValue};
pub use repository::ProfileRepository;
pub use segment::{SegmentMatcher, SegmentPath};

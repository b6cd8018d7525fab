//! Plugin management.
//!
//! [`PluginManager`] keeps every resident plugin with its lifecycle and
//! moves batches of them between states in dependency order.
//!
//! ```text
//! enable_plugins(candidates)
//!   ├─ protocol check
//!   ├─ provisions: skip candidates an enabled plugin stands in for
//!   ├─ resident versions: keep, replace or conflict
//!   ├─ dependency graph (cycles among required edges reject the batch)
//!   └─ load + enable, dependencies first
//!
//! disable_plugins / unload_plugins
//!   └─ same graph, dependents first
//! ```

mod graph;
mod loader;
mod manager;
mod report;

pub use loader::StaticPluginLoader;
pub use manager::{PluginManager, PROTOCOL_VERSION};
pub use report::{BatchReport, PluginSummary, ResolutionError, ResolutionIssue, Satisfied};

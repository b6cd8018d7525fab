//! Permission evaluation over profile repositories.

mod manager;
mod memory;

pub use manager::PermissionManager;
pub use memory::MemoryProfileRepository;

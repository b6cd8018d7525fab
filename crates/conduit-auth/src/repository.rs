//! Storage abstraction for profiles and records.
//!
//! The trait is synchronous: implementations are expected to be in-memory
//! or to cache. Deletes are soft: a deleted profile or record disappears
//! from reads but its id is never handed out again.

use crate::{AuthError, PermissionComparator, PermissionProfile, PermissionRecord, RecordValue};
use conduit_types::NumericalId;

/// CRUD over permission profiles and their records.
///
/// Implementations live in the runtime (`MemoryProfileRepository`);
/// callers normally go through `PermissionManager`, which adds locking
/// and the inheritance cycle check.
pub trait ProfileRepository: Send + Sync {
    /// Creates a profile.
    ///
    /// # Errors
    ///
    /// [`AuthError::DuplicateProfile`] if a live profile has `name`.
    fn insert_profile(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<PermissionProfile, AuthError>;

    /// Live profile by id.
    fn profile(&self, id: NumericalId) -> Option<PermissionProfile>;

    /// Live profile by name.
    fn profile_by_name(&self, name: &str) -> Option<PermissionProfile>;

    /// All live profiles, oldest first.
    fn profiles(&self) -> Vec<PermissionProfile>;

    /// Soft-deletes a profile and its records.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProfileNotFound`] if no live profile has `id`.
    fn delete_profile(&mut self, id: NumericalId) -> Result<(), AuthError>;

    /// Appends a record to a profile.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProfileNotFound`] if the profile is missing.
    fn insert_record(
        &mut self,
        profile: NumericalId,
        comparator: PermissionComparator,
        value: RecordValue,
    ) -> Result<PermissionRecord, AuthError>;

    /// Live records of a profile, oldest first.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProfileNotFound`] if the profile is missing.
    fn records(&self, profile: NumericalId) -> Result<Vec<PermissionRecord>, AuthError>;

    /// Soft-deletes a record.
    ///
    /// # Errors
    ///
    /// [`AuthError::RecordNotFound`] if no live record has `id`.
    fn delete_record(&mut self, id: NumericalId) -> Result<(), AuthError>;
}

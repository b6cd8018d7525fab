//! Permission profiles, their records and evaluation.

use super::MemoryProfileRepository;
use conduit_auth::{
    AuthError, Matcher, Permission, PermissionComparator, PermissionProfile, PermissionRecord,
    ProfileRepository, RecordValue,
};
use conduit_types::{NumericalId, Subject};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

struct State<R> {
    repository: R,
    assignments: HashMap<Subject, Vec<NumericalId>>,
}

/// Guards a [`ProfileRepository`] and answers permission questions.
///
/// Reads share the lock; every mutation holds it exclusively, including
/// the inheritance cycle check, so two concurrent `inherit` calls cannot
/// close a cycle between them.
///
/// # Example
///
/// ```
/// use conduit_auth::{Permission, PermissionComparator};
/// use conduit_runtime::PermissionManager;
/// use conduit_types::Subject;
///
/// let manager = PermissionManager::new();
/// let readers = manager.create_profile("readers", None).unwrap();
/// manager
///     .grant(readers.id, PermissionComparator::node("conduit.plugin.list").unwrap(), true)
///     .unwrap();
///
/// let list = Permission::parse(Subject::module("shell"), "conduit.plugin.list").unwrap();
/// let install = Permission::parse(Subject::module("shell"), "conduit.plugin.install").unwrap();
/// assert_eq!(manager.has_permission(readers.id, &list).unwrap(), Some(true));
/// assert_eq!(manager.has_permission(readers.id, &install).unwrap(), None);
/// ```
pub struct PermissionManager<R: ProfileRepository = MemoryProfileRepository> {
    state: RwLock<State<R>>,
}

impl PermissionManager<MemoryProfileRepository> {
    /// Manager over an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::with_repository(MemoryProfileRepository::new())
    }
}

impl Default for PermissionManager<MemoryProfileRepository> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProfileRepository> PermissionManager<R> {
    /// Manager over `repository`.
    pub fn with_repository(repository: R) -> Self {
        Self {
            state: RwLock::new(State {
                repository,
                assignments: HashMap::new(),
            }),
        }
    }

    /// Creates a profile.
    ///
    /// # Errors
    ///
    /// [`AuthError::DuplicateProfile`] if the name is taken.
    pub fn create_profile(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<PermissionProfile, AuthError> {
        let profile = self
            .state
            .write()
            .repository
            .insert_profile(name, description)?;
        info!(profile = %profile.id, name, "permission profile created");
        Ok(profile)
    }

    /// Deletes a profile, its records and its assignments.
    ///
    /// Inheritance records in other profiles that point at it stay and
    /// evaluate as unset.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProfileNotFound`] if it does not exist.
    pub fn delete_profile(&self, id: NumericalId) -> Result<(), AuthError> {
        let mut state = self.state.write();
        state.repository.delete_profile(id)?;
        for profiles in state.assignments.values_mut() {
            profiles.retain(|assigned| *assigned != id);
        }
        state.assignments.retain(|_, profiles| !profiles.is_empty());
        info!(profile = %id, "permission profile deleted");
        Ok(())
    }

    /// Live profile by id.
    #[must_use]
    pub fn profile(&self, id: NumericalId) -> Option<PermissionProfile> {
        self.state.read().repository.profile(id)
    }

    /// Live profile by name.
    #[must_use]
    pub fn profile_by_name(&self, name: &str) -> Option<PermissionProfile> {
        self.state.read().repository.profile_by_name(name)
    }

    /// Every live profile, oldest first.
    #[must_use]
    pub fn profiles(&self) -> Vec<PermissionProfile> {
        self.state.read().repository.profiles()
    }

    /// Adds a record granting (`true`) or denying (`false`) what
    /// `comparator` matches. It overrides older records.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProfileNotFound`] if the profile is missing.
    pub fn grant(
        &self,
        profile: NumericalId,
        comparator: PermissionComparator,
        allowed: bool,
    ) -> Result<PermissionRecord, AuthError> {
        let record = self.state.write().repository.insert_record(
            profile,
            comparator,
            RecordValue::Grant(allowed),
        )?;
        debug!(%profile, record = %record.id, allowed, "permission record added");
        Ok(record)
    }

    /// Adds a record deferring to `parent` for what `comparator` matches.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ProfileNotFound`] if either profile is missing.
    /// - [`AuthError::InheritanceCycle`] if `parent` already inherits,
    ///   directly or transitively, from `profile`.
    pub fn inherit(
        &self,
        profile: NumericalId,
        comparator: PermissionComparator,
        parent: NumericalId,
    ) -> Result<PermissionRecord, AuthError> {
        let mut state = self.state.write();
        if state.repository.profile(profile).is_none() {
            return Err(AuthError::ProfileNotFound(profile));
        }
        if state.repository.profile(parent).is_none() {
            return Err(AuthError::ProfileNotFound(parent));
        }
        if reaches(&state.repository, parent, profile) {
            return Err(AuthError::InheritanceCycle {
                from: profile,
                to: parent,
            });
        }
        let record =
            state
                .repository
                .insert_record(profile, comparator, RecordValue::Inherit(parent))?;
        debug!(%profile, %parent, record = %record.id, "inheritance record added");
        Ok(record)
    }

    /// Removes a record.
    ///
    /// # Errors
    ///
    /// [`AuthError::RecordNotFound`] if it does not exist.
    pub fn revoke(&self, record: NumericalId) -> Result<(), AuthError> {
        self.state.write().repository.delete_record(record)?;
        debug!(%record, "permission record revoked");
        Ok(())
    }

    /// Records of a profile, oldest first.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProfileNotFound`] if the profile is missing.
    pub fn records(&self, profile: NumericalId) -> Result<Vec<PermissionRecord>, AuthError> {
        self.state.read().repository.records(profile)
    }

    /// Evaluates `permission` against a profile.
    ///
    /// Records are tried newest first and the first match decides. A
    /// matching inheritance record asks the parent; if the parent has no
    /// opinion the walk continues with older records. `None` means no
    /// record anywhere matched, which is not the same as `Some(false)`.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProfileNotFound`] if `profile` is missing.
    pub fn has_permission(
        &self,
        profile: NumericalId,
        permission: &Permission,
    ) -> Result<Option<bool>, AuthError> {
        let state = self.state.read();
        let mut visited = HashSet::new();
        evaluate(&state.repository, profile, permission, &mut visited)
    }

    /// Assigns a profile to a subject. Later assignments take precedence.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProfileNotFound`] if the profile is missing.
    pub fn assign(&self, subject: Subject, profile: NumericalId) -> Result<(), AuthError> {
        let mut state = self.state.write();
        if state.repository.profile(profile).is_none() {
            return Err(AuthError::ProfileNotFound(profile));
        }
        let assigned = state.assignments.entry(subject).or_default();
        assigned.retain(|existing| *existing != profile);
        assigned.push(profile);
        Ok(())
    }

    /// Removes an assignment. Returns whether it existed.
    pub fn unassign(&self, subject: &Subject, profile: NumericalId) -> bool {
        let mut state = self.state.write();
        let Some(assigned) = state.assignments.get_mut(subject) else {
            return false;
        };
        let before = assigned.len();
        assigned.retain(|existing| *existing != profile);
        let removed = assigned.len() != before;
        if assigned.is_empty() {
            state.assignments.remove(subject);
        }
        removed
    }

    /// Profiles assigned to `subject`, most recent first.
    #[must_use]
    pub fn profiles_of(&self, subject: &Subject) -> Vec<PermissionProfile> {
        let state = self.state.read();
        state
            .assignments
            .get(subject)
            .map(|assigned| {
                assigned
                    .iter()
                    .rev()
                    .filter_map(|id| state.repository.profile(*id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Evaluates `permission` against the profiles assigned to its
    /// subject, most recent assignment first. The first profile with an
    /// opinion decides.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub fn check(&self, permission: &Permission) -> Result<Option<bool>, AuthError> {
        let state = self.state.read();
        let Some(assigned) = state.assignments.get(&permission.subject) else {
            return Ok(None);
        };
        for profile in assigned.iter().rev() {
            let mut visited = HashSet::new();
            if let Some(decision) = evaluate(&state.repository, *profile, permission, &mut visited)? {
                return Ok(Some(decision));
            }
        }
        Ok(None)
    }
}

impl<R: ProfileRepository> std::fmt::Debug for PermissionManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PermissionManager")
            .field("profiles", &state.repository.profiles().len())
            .field("assigned_subjects", &state.assignments.len())
            .finish()
    }
}

fn evaluate<R: ProfileRepository>(
    repository: &R,
    profile: NumericalId,
    permission: &Permission,
    visited: &mut HashSet<NumericalId>,
) -> Result<Option<bool>, AuthError> {
    if !visited.insert(profile) {
        return Ok(None);
    }
    let mut records = repository.records(profile)?;
    records.sort_by_key(|record| std::cmp::Reverse(record.id));

    for record in records {
        if !record.comparator.matches(permission) {
            continue;
        }
        match record.value {
            RecordValue::Grant(allowed) => return Ok(Some(allowed)),
            RecordValue::Inherit(parent) => {
                match evaluate(repository, parent, permission, visited) {
                    Ok(Some(decision)) => return Ok(Some(decision)),
                    Ok(None) => {}
                    Err(AuthError::ProfileNotFound(missing)) => {
                        debug!(%profile, parent = %missing, "inherited profile is gone");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }
    Ok(None)
}

/// Whether `target` is reachable from `start` along inheritance records.
fn reaches<R: ProfileRepository>(repository: &R, start: NumericalId, target: NumericalId) -> bool {
    let mut stack = vec![start];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Ok(records) = repository.records(current) {
            stack.extend(records.iter().filter_map(PermissionRecord::inherits));
        }
    }
    false
}

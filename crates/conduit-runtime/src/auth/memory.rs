//! In-memory [`ProfileRepository`].

use conduit_auth::{
    AuthError, PermissionComparator, PermissionProfile, PermissionRecord, ProfileRepository,
    RecordValue,
};
use conduit_types::NumericalId;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Stored<T> {
    value: T,
    deleted: bool,
}

impl<T> Stored<T> {
    fn live(value: T) -> Self {
        Self {
            value,
            deleted: false,
        }
    }
}

/// Profiles and records kept in ordered maps.
///
/// Deletes leave tombstones so ids are never reused; reads skip them.
#[derive(Debug, Clone)]
pub struct MemoryProfileRepository {
    profiles: BTreeMap<NumericalId, Stored<PermissionProfile>>,
    records: BTreeMap<NumericalId, Stored<PermissionRecord>>,
    next_profile: u64,
    next_record: u64,
}

impl Default for MemoryProfileRepository {
    fn default() -> Self {
        Self {
            profiles: BTreeMap::new(),
            records: BTreeMap::new(),
            next_profile: 1,
            next_record: 1,
        }
    }
}

impl MemoryProfileRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn live_profile(&self, id: NumericalId) -> Result<&PermissionProfile, AuthError> {
        self.profiles
            .get(&id)
            .filter(|stored| !stored.deleted)
            .map(|stored| &stored.value)
            .ok_or(AuthError::ProfileNotFound(id))
    }
}

impl ProfileRepository for MemoryProfileRepository {
    fn insert_profile(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<PermissionProfile, AuthError> {
        if self.profile_by_name(name).is_some() {
            return Err(AuthError::DuplicateProfile(name.to_string()));
        }
        let profile = PermissionProfile {
            id: NumericalId(self.next_profile),
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        self.next_profile += 1;
        self.profiles.insert(profile.id, Stored::live(profile.clone()));
        Ok(profile)
    }

    fn profile(&self, id: NumericalId) -> Option<PermissionProfile> {
        self.live_profile(id).ok().cloned()
    }

    fn profile_by_name(&self, name: &str) -> Option<PermissionProfile> {
        self.profiles
            .values()
            .find(|stored| !stored.deleted && stored.value.name == name)
            .map(|stored| stored.value.clone())
    }

    fn profiles(&self) -> Vec<PermissionProfile> {
        self.profiles
            .values()
            .filter(|stored| !stored.deleted)
            .map(|stored| stored.value.clone())
            .collect()
    }

    fn delete_profile(&mut self, id: NumericalId) -> Result<(), AuthError> {
        self.live_profile(id)?;
        if let Some(stored) = self.profiles.get_mut(&id) {
            stored.deleted = true;
        }
        for stored in self.records.values_mut() {
            if stored.value.profile == id {
                stored.deleted = true;
            }
        }
        Ok(())
    }

    fn insert_record(
        &mut self,
        profile: NumericalId,
        comparator: PermissionComparator,
        value: RecordValue,
    ) -> Result<PermissionRecord, AuthError> {
        self.live_profile(profile)?;
        let record = PermissionRecord {
            id: NumericalId(self.next_record),
            profile,
            comparator,
            value,
        };
        self.next_record += 1;
        self.records.insert(record.id, Stored::live(record.clone()));
        Ok(record)
    }

    fn records(&self, profile: NumericalId) -> Result<Vec<PermissionRecord>, AuthError> {
        self.live_profile(profile)?;
        Ok(self
            .records
            .values()
            .filter(|stored| !stored.deleted && stored.value.profile == profile)
            .map(|stored| stored.value.clone())
            .collect())
    }

    fn delete_record(&mut self, id: NumericalId) -> Result<(), AuthError> {
        match self.records.get_mut(&id) {
            Some(stored) if !stored.deleted => {
                stored.deleted = true;
                Ok(())
            }
            _ => Err(AuthError::RecordNotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any() -> PermissionComparator {
        PermissionComparator::node("??").unwrap()
    }

    #[test]
    fn ids_start_at_one_and_never_repeat() {
        let mut repo = MemoryProfileRepository::new();
        let first = repo.insert_profile("readers", None).unwrap();
        assert_eq!(first.id, NumericalId(1));

        repo.delete_profile(first.id).unwrap();
        let again = repo.insert_profile("readers", Some("recreated")).unwrap();
        assert_eq!(again.id, NumericalId(2));
        assert_eq!(again.description.as_deref(), Some("recreated"));
    }

    #[test]
    fn duplicate_live_name_rejected() {
        let mut repo = MemoryProfileRepository::new();
        repo.insert_profile("ops", None).unwrap();
        assert!(matches!(
            repo.insert_profile("ops", None),
            Err(AuthError::DuplicateProfile(name)) if name == "ops"
        ));
    }

    #[test]
    fn deleted_profile_hides_records() {
        let mut repo = MemoryProfileRepository::new();
        let ops = repo.insert_profile("ops", None).unwrap();
        let record = repo
            .insert_record(ops.id, any(), RecordValue::Grant(true))
            .unwrap();
        assert_eq!(repo.records(ops.id).unwrap(), vec![record.clone()]);

        repo.delete_profile(ops.id).unwrap();
        assert!(repo.profile(ops.id).is_none());
        assert!(repo.profiles().is_empty());
        assert!(matches!(
            repo.records(ops.id),
            Err(AuthError::ProfileNotFound(_))
        ));
        assert!(matches!(
            repo.delete_record(record.id),
            Err(AuthError::RecordNotFound(_))
        ));
    }

    #[test]
    fn record_tombstones() {
        let mut repo = MemoryProfileRepository::new();
        let ops = repo.insert_profile("ops", None).unwrap();
        let a = repo
            .insert_record(ops.id, any(), RecordValue::Grant(true))
            .unwrap();
        let b = repo
            .insert_record(ops.id, any(), RecordValue::Grant(false))
            .unwrap();
        assert!(a.id < b.id);

        repo.delete_record(a.id).unwrap();
        assert_eq!(repo.records(ops.id).unwrap(), vec![b]);
        assert!(repo.delete_record(a.id).is_err());
        assert!(repo
            .insert_record(NumericalId(99), any(), RecordValue::Grant(true))
            .is_err());
    }
}

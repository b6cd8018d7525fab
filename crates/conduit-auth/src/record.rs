//! Profiles and the records they hold.

use crate::PermissionComparator;
use conduit_types::NumericalId;
use serde::{Deserialize, Serialize};

/// A named set of permission records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionProfile {
    /// Repository key.
    pub id: NumericalId,
    /// Unique name among live profiles.
    pub name: String,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// What a matching record decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordValue {
    /// Granted (`true`) or denied (`false`).
    Grant(bool),
    /// Defer to another profile.
    Inherit(NumericalId),
}

/// One rule of a profile.
///
/// Records are evaluated newest first; the id doubles as the insertion
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Repository key, increasing with insertion.
    pub id: NumericalId,
    /// Owning profile.
    pub profile: NumericalId,
    /// When the record applies.
    pub comparator: PermissionComparator,
    /// What it decides.
    pub value: RecordValue,
}

impl PermissionRecord {
    /// Profile this record inherits from, if it is an inheritance record.
    #[must_use]
    pub fn inherits(&self) -> Option<NumericalId> {
        match self.value {
            RecordValue::Inherit(id) => Some(id),
            RecordValue::Grant(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_value_wire_form() {
        assert_eq!(
            serde_json::to_value(RecordValue::Grant(false)).unwrap(),
            json!({"kind": "grant", "value": false})
        );
        assert_eq!(
            serde_json::to_value(RecordValue::Inherit(NumericalId(4))).unwrap(),
            json!({"kind": "inherit", "value": 4})
        );
    }

    #[test]
    fn inherit_accessor() {
        let record = PermissionRecord {
            id: NumericalId(1),
            profile: NumericalId(2),
            comparator: PermissionComparator::node("??").unwrap(),
            value: RecordValue::Inherit(NumericalId(3)),
        };
        assert_eq!(record.inherits(), Some(NumericalId(3)));
    }
}

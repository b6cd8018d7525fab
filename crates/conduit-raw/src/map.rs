//! Map-backed raw.

use crate::raw::{DecodeFn, Erased, Presence, Raw, TypedValue};
use crate::{RawError, TreeRaw};
use serde::Serialize;
use serde_json::Value;
use std::any::TypeId;

#[derive(Debug, Clone)]
enum Slot {
    Null,
    Typed(TypedValue),
}

/// Raw holding typed values directly.
///
/// Used for objects built locally before they are first sent anywhere:
/// reading back a value with the type it was written with is a clone of
/// the stored `Arc`, no serialization involved. Reading with any other
/// type goes through the serialized form.
///
/// [`into_tree`](Self::into_tree) performs the first serialization and
/// carries the typed values over as pre-populated views.
///
/// # Example
///
/// ```
/// use conduit_raw::{MapRaw, RawExt, TreeRaw};
///
/// let local = MapRaw::new().with("name", "greeter".to_string()).with("retries", 3u8);
/// let tree = local.clone().into_tree().unwrap();
///
/// assert!(local.content_eq(&tree));
/// assert_eq!(tree.require::<u8>("retries").unwrap(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapRaw {
    entries: Vec<(String, Slot)>,
}

impl MapRaw {
    /// Empty raw.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a non-null value.
    #[must_use]
    pub fn with<T: Serialize + Send + Sync + 'static>(mut self, name: &str, value: T) -> Self {
        self.store(name, Slot::Typed(TypedValue::new(value)));
        self
    }

    /// Builder-style insert of a null.
    #[must_use]
    pub fn with_null(mut self, name: &str) -> Self {
        self.store(name, Slot::Null);
        self
    }

    /// Serializes every field into a [`TreeRaw`], seeding its view cache
    /// with the values as written.
    ///
    /// # Errors
    ///
    /// [`RawError::Encode`] naming the first field that fails to serialize.
    pub fn into_tree(self) -> Result<TreeRaw, RawError> {
        let mut tree = TreeRaw::new();
        for (name, slot) in self.entries {
            match slot {
                Slot::Null => tree.insert_value(name, Value::Null),
                Slot::Typed(typed) => {
                    let value = typed.encode().map_err(|source| RawError::Encode {
                        field: name.clone(),
                        source,
                    })?;
                    tree.insert_value(name.clone(), value);
                    tree.seed_view(&name, &typed);
                }
            }
        }
        Ok(tree)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    fn store(&mut self, name: &str, slot: Slot) {
        match self.position(name) {
            Some(i) => self.entries[i].1 = slot,
            None => self.entries.push((name.to_string(), slot)),
        }
    }
}

impl Raw for MapRaw {
    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    fn presence(&self, name: &str) -> Presence {
        match self.slot(name) {
            None => Presence::Absent,
            Some(Slot::Null) => Presence::Null,
            Some(Slot::Typed(_)) => Presence::Value,
        }
    }

    fn view(
        &self,
        name: &str,
        type_id: TypeId,
        decode: DecodeFn,
    ) -> Result<Erased, serde_json::Error> {
        match self.slot(name) {
            Some(Slot::Typed(typed)) if typed.type_id() == type_id => Ok(typed.erased()),
            Some(Slot::Typed(typed)) => decode(&typed.encode()?),
            Some(Slot::Null) => decode(&Value::Null),
            None => Err(<serde_json::Error as serde::de::Error>::missing_field("value")),
        }
    }

    fn put(&mut self, name: &str, value: Option<TypedValue>) -> Result<(), serde_json::Error> {
        let slot = value.map_or(Slot::Null, Slot::Typed);
        self.store(name, slot);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    fn tree(&self, name: &str) -> Result<Option<Value>, serde_json::Error> {
        match self.slot(name) {
            None => Ok(None),
            Some(Slot::Null) => Ok(Some(Value::Null)),
            Some(Slot::Typed(typed)) => typed.encode().map(Some),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl PartialEq for MapRaw {
    fn eq(&self, other: &Self) -> bool {
        crate::content_eq(self, other)
    }
}

impl PartialEq<TreeRaw> for MapRaw {
    fn eq(&self, other: &TreeRaw) -> bool {
        crate::content_eq(self, other)
    }
}

impl Serialize for MapRaw {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tree()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

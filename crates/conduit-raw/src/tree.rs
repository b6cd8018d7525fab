//! Tree-backed raw.
//!
//! [`TreeRaw`] keeps the serialized object as the source of truth. Typed
//! reads are decoded once per `(field, type)` pair and memoized; a write
//! replaces the tree entry and drops every cached view of that field.
//!
//! Fields the reader never asks about are left untouched, so a packet
//! decoded by an older peer and re-encoded still carries the extension
//! fields a newer peer put there.

use crate::raw::{json_kind, DecodeFn, Erased, Presence, Raw, TypedValue};
use crate::RawError;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type ViewCache = HashMap<(String, TypeId), Erased>;

/// Raw backed by a JSON object and a decode cache.
///
/// # Example
///
/// ```
/// use conduit_raw::{FieldRule, RawExt, TreeRaw};
///
/// let frame = r#"{"action":"acme:echo","x-trace":"abc"}"#;
/// let mut raw = TreeRaw::from_frame(frame).unwrap();
///
/// let action: String = raw.require("action").unwrap();
/// assert_eq!(action, "acme:echo");
///
/// raw.set("action", Some("acme:ping".to_string()), FieldRule::required()).unwrap();
/// assert_eq!(raw.to_frame().unwrap(), r#"{"action":"acme:ping","x-trace":"abc"}"#);
/// ```
#[derive(Default)]
pub struct TreeRaw {
    tree: Map<String, Value>,
    views: RwLock<ViewCache>,
}

impl TreeRaw {
    /// Empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing object.
    #[must_use]
    pub fn from_map(tree: Map<String, Value>) -> Self {
        Self {
            tree,
            views: RwLock::new(HashMap::new()),
        }
    }

    /// Wraps a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// [`RawError::NotAnObject`] for any other JSON kind.
    pub fn from_value(value: Value) -> Result<Self, RawError> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(RawError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// [`RawError::MalformedFrame`] for invalid JSON,
    /// [`RawError::NotAnObject`] for non-object JSON.
    pub fn from_frame(frame: &str) -> Result<Self, RawError> {
        let value: Value = serde_json::from_str(frame).map_err(RawError::MalformedFrame)?;
        Self::from_value(value)
    }

    /// Serializes to a compact text frame.
    ///
    /// # Errors
    ///
    /// [`RawError::MalformedFrame`] if serialization fails.
    pub fn to_frame(&self) -> Result<String, RawError> {
        serde_json::to_string(&self.tree).map_err(RawError::MalformedFrame)
    }

    /// Borrows the underlying object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.tree
    }

    /// Consumes the raw, returning the underlying object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.tree
    }

    /// Returns the untyped value of `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.tree.get(name)
    }

    /// Writes an untyped value, dropping cached views of `name`.
    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.invalidate(&name);
        self.tree.insert(name, value);
    }

    /// Number of cached typed views. Exposed for tests and diagnostics.
    #[must_use]
    pub fn cached_views(&self) -> usize {
        self.views.read().len()
    }

    pub(crate) fn seed_view(&mut self, name: &str, typed: &TypedValue) {
        self.views
            .get_mut()
            .insert((name.to_string(), typed.type_id()), typed.erased());
    }

    fn invalidate(&mut self, name: &str) {
        self.views.get_mut().retain(|(field, _), _| field != name);
    }
}

impl Raw for TreeRaw {
    fn keys(&self) -> Vec<String> {
        self.tree.keys().cloned().collect()
    }

    fn presence(&self, name: &str) -> Presence {
        match self.tree.get(name) {
            None => Presence::Absent,
            Some(Value::Null) => Presence::Null,
            Some(_) => Presence::Value,
        }
    }

    fn view(
        &self,
        name: &str,
        type_id: TypeId,
        decode: DecodeFn,
    ) -> Result<Erased, serde_json::Error> {
        let key = (name.to_string(), type_id);
        if let Some(hit) = self.views.read().get(&key) {
            return Ok(Arc::clone(hit));
        }
        let value = self
            .tree
            .get(name)
            .ok_or_else(|| <serde_json::Error as serde::de::Error>::missing_field("value"))?;
        let decoded = decode(value)?;
        self.views.write().insert(key, Arc::clone(&decoded));
        Ok(decoded)
    }

    fn put(&mut self, name: &str, value: Option<TypedValue>) -> Result<(), serde_json::Error> {
        let tree = match &value {
            Some(typed) => typed.encode()?,
            None => Value::Null,
        };
        self.invalidate(name);
        self.tree.insert(name.to_string(), tree);
        if let Some(typed) = &value {
            self.seed_view(name, typed);
        }
        Ok(())
    }

    fn remove(&mut self, name: &str) -> bool {
        if !self.tree.contains_key(name) {
            return false;
        }
        self.invalidate(name);
        // Rebuild instead of swap-removing to keep the remaining order.
        self.tree = std::mem::take(&mut self.tree)
            .into_iter()
            .filter(|(key, _)| key != name)
            .collect();
        true
    }

    fn tree(&self, name: &str) -> Result<Option<Value>, serde_json::Error> {
        Ok(self.tree.get(name).cloned())
    }

    fn to_tree(&self) -> Result<Map<String, Value>, serde_json::Error> {
        Ok(self.tree.clone())
    }

    fn len(&self) -> usize {
        self.tree.len()
    }
}

impl Clone for TreeRaw {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            views: RwLock::new(self.views.read().clone()),
        }
    }
}

impl fmt::Debug for TreeRaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TreeRaw").field(&self.tree).finish()
    }
}

impl PartialEq for TreeRaw {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl PartialEq<crate::MapRaw> for TreeRaw {
    fn eq(&self, other: &crate::MapRaw) -> bool {
        crate::content_eq(self, other)
    }
}

impl Serialize for TreeRaw {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.tree.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TreeRaw {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from_map)
    }
}

impl From<Map<String, Value>> for TreeRaw {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldRule, RawExt};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Loose {
        x: i64,
    }

    fn sample() -> TreeRaw {
        TreeRaw::from_value(json!({"p": {"x": 1, "y": 2}, "ext": [true]})).unwrap()
    }

    #[test]
    fn reads_are_memoized() {
        let raw = sample();
        assert_eq!(raw.cached_views(), 0);
        let first: Point = raw.require("p").unwrap();
        let second: Point = raw.require("p").unwrap();
        assert_eq!(first, second);
        assert_eq!(raw.cached_views(), 1);
    }

    #[test]
    fn multiple_views_coexist() {
        let raw = sample();
        let point: Point = raw.require("p").unwrap();
        let loose: Loose = raw.require("p").unwrap();
        let tree: Value = raw.require("p").unwrap();
        assert_eq!(point.x, loose.x);
        assert_eq!(tree["y"], 2);
        assert_eq!(raw.cached_views(), 3);
    }

    #[test]
    fn write_invalidates_views_of_that_field_only() {
        let mut raw = sample();
        let _: Point = raw.require("p").unwrap();
        let _: Vec<bool> = raw.require("ext").unwrap();
        raw.set("p", Some(Loose { x: 9 }), FieldRule::required()).unwrap();

        // The Loose view is seeded by the write; the Point view is gone.
        assert_eq!(raw.cached_views(), 2);
        assert!(raw.get::<Point>("p", FieldRule::required()).is_err());
        assert_eq!(raw.require::<Loose>("p").unwrap(), Loose { x: 9 });
    }

    #[test]
    fn replacing_keeps_field_order() {
        let mut raw = TreeRaw::from_value(json!({"a": 1, "b": 2, "c": 3})).unwrap();
        raw.set("a", Some(10), FieldRule::required()).unwrap();
        assert_eq!(raw.keys(), vec!["a", "b", "c"]);
        assert!(raw.remove("b"));
        assert_eq!(raw.keys(), vec!["a", "c"]);
        assert!(!raw.remove("b"));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            TreeRaw::from_value(json!([1])),
            Err(RawError::NotAnObject { found: "array" })
        ));
        assert!(matches!(
            TreeRaw::from_frame("{"),
            Err(RawError::MalformedFrame(_))
        ));
    }

    #[test]
    fn decode_failure_names_field_and_type() {
        let raw = sample();
        let err = raw.require::<String>("p").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'p'"), "{message}");
        assert!(message.contains("String"), "{message}");
    }

    #[test]
    fn clone_keeps_cache() {
        let raw = sample();
        let _: Point = raw.require("p").unwrap();
        let copy = raw.clone();
        assert_eq!(copy.cached_views(), 1);
        assert_eq!(copy, raw);
    }

    #[test]
    fn serde_is_transparent() {
        let raw = sample();
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json, json!({"p": {"x": 1, "y": 2}, "ext": [true]}));
        let back: TreeRaw = serde_json::from_value(json).unwrap();
        assert_eq!(back, raw);
    }
}

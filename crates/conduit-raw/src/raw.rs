//! The [`Raw`] trait and its typed access layer.

use crate::{FieldRule, RawError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A decoded value stored behind type erasure.
pub type Erased = Arc<dyn Any + Send + Sync>;

/// Decodes a tree into an erased value of one concrete type.
pub type DecodeFn = fn(&Value) -> Result<Erased, serde_json::Error>;

/// Encodes an erased value of one concrete type into a tree.
pub type EncodeFn = fn(&(dyn Any + Send + Sync)) -> Result<Value, serde_json::Error>;

/// Whether and how a field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The key is not present.
    Absent,
    /// The key is present with a null value.
    Null,
    /// The key is present with a non-null value.
    Value,
}

/// A typed value together with the means to serialize it.
#[derive(Clone)]
pub struct TypedValue {
    type_id: TypeId,
    type_name: &'static str,
    value: Erased,
    encode: EncodeFn,
}

impl TypedValue {
    /// Wraps `value`.
    #[must_use]
    pub fn new<T: Serialize + Send + Sync + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
            encode: encode_as::<T>,
        }
    }

    /// Type id of the wrapped value.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the wrapped value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Shared handle to the wrapped value.
    #[must_use]
    pub fn erased(&self) -> Erased {
        Arc::clone(&self.value)
    }

    /// Serializes the wrapped value.
    ///
    /// # Errors
    ///
    /// Propagates the serializer's error.
    pub fn encode(&self) -> Result<Value, serde_json::Error> {
        (self.encode)(self.value.as_ref())
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

pub(crate) fn decode_as<T: DeserializeOwned + Send + Sync + 'static>(
    value: &Value,
) -> Result<Erased, serde_json::Error> {
    T::deserialize(value).map(|v| Arc::new(v) as Erased)
}

fn encode_as<T: Serialize + 'static>(
    value: &(dyn Any + Send + Sync),
) -> Result<Value, serde_json::Error> {
    match value.downcast_ref::<T>() {
        Some(v) => serde_json::to_value(v),
        None => Err(serde::ser::Error::custom(format!(
            "stored value is not a {}",
            std::any::type_name::<T>()
        ))),
    }
}

/// Human-readable JSON kind, used in error messages.
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// An ordered bag of named fields with typed access.
///
/// This is the object-safe core; typed reads and writes are provided by
/// [`RawExt`], which every `Raw` gets for free.
///
/// Implementations:
///
/// - [`TreeRaw`](crate::TreeRaw): canonical serialized tree plus a
///   per-type decode cache. Preserves unknown fields.
/// - [`MapRaw`](crate::MapRaw): typed values as written, serialized
///   only when asked.
pub trait Raw: fmt::Debug + Send + Sync {
    /// Field names in insertion order.
    fn keys(&self) -> Vec<String>;

    /// How `name` is stored.
    fn presence(&self, name: &str) -> Presence;

    /// Returns the value of `name` viewed as the type identified by
    /// `type_id`, decoding with `decode` if no such view exists yet.
    ///
    /// Callers must only ask for fields whose presence is
    /// [`Presence::Value`].
    ///
    /// # Errors
    ///
    /// Returns the decoder's error.
    fn view(&self, name: &str, type_id: TypeId, decode: DecodeFn)
        -> Result<Erased, serde_json::Error>;

    /// Stores `value` under `name`, or null when `value` is `None`.
    ///
    /// Replacing a field keeps its position.
    ///
    /// # Errors
    ///
    /// Returns an encode error if the backing needs a tree immediately.
    fn put(&mut self, name: &str, value: Option<TypedValue>) -> Result<(), serde_json::Error>;

    /// Removes `name`. Returns whether it was present.
    fn remove(&mut self, name: &str) -> bool;

    /// Serialized form of one field. `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an encode error for values that fail to serialize.
    fn tree(&self, name: &str) -> Result<Option<Value>, serde_json::Error>;

    /// Serialized form of every field, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns the first encode error.
    fn to_tree(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut map = Map::new();
        for key in self.keys() {
            if let Some(value) = self.tree(&key)? {
                map.insert(key, value);
            }
        }
        Ok(map)
    }

    /// Number of fields.
    fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether there are no fields.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `name` is present (null or not).
    fn contains(&self, name: &str) -> bool {
        self.presence(name) != Presence::Absent
    }
}

/// Typed access on top of [`Raw`].
///
/// # Example
///
/// ```
/// use conduit_raw::{FieldRule, MapRaw, RawExt, RawError};
///
/// let mut raw = MapRaw::new();
/// raw.set("timeout", Some(5_000u64), FieldRule::required()).unwrap();
///
/// let timeout = raw.get::<u64>("timeout", FieldRule::required()).unwrap();
/// assert_eq!(timeout, Some(5_000));
///
/// let missing = raw.get::<String>("session", FieldRule::required());
/// assert!(matches!(missing, Err(RawError::MissingField { .. })));
/// ```
pub trait RawExt: Raw {
    /// Reads `name` as `T` under `rule`.
    ///
    /// Returns `Ok(None)` only for null or absent values that the rule
    /// allows to be null.
    ///
    /// # Errors
    ///
    /// See [`FieldRule`] for the error table. A stored value that does not
    /// decode as `T` yields [`RawError::Decode`].
    fn get<T>(&self, name: &str, rule: FieldRule<T>) -> Result<Option<T>, RawError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        match self.presence(name) {
            Presence::Absent => {
                if !rule.is_optional() {
                    Err(RawError::MissingField {
                        field: name.to_string(),
                    })
                } else if let Some(default) = rule.default_factory() {
                    Ok(Some(default()))
                } else if rule.is_nullable() {
                    Ok(None)
                } else {
                    Err(RawError::NoDefault {
                        field: name.to_string(),
                    })
                }
            }
            Presence::Null => {
                if rule.is_nullable() {
                    Ok(None)
                } else {
                    Err(RawError::NullNotAllowed {
                        field: name.to_string(),
                    })
                }
            }
            Presence::Value => {
                let decode_err = |source| RawError::Decode {
                    field: name.to_string(),
                    expected: std::any::type_name::<T>(),
                    source,
                };
                let erased = self
                    .view(name, TypeId::of::<T>(), decode_as::<T>)
                    .map_err(decode_err)?;
                match erased.downcast_ref::<T>() {
                    Some(value) => Ok(Some(value.clone())),
                    None => Err(decode_err(serde::de::Error::custom(
                        "cached view has a different type",
                    ))),
                }
            }
        }
    }

    /// Reads a required, non-nullable field.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get) with [`FieldRule::required`].
    fn require<T>(&self, name: &str) -> Result<T, RawError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.get(name, FieldRule::required())?
            .ok_or_else(|| RawError::NullNotAllowed {
                field: name.to_string(),
            })
    }

    /// Writes `value` to `name` under `rule`. `None` writes null.
    ///
    /// # Errors
    ///
    /// [`RawError::NullNotAllowed`] for a null write to a non-nullable
    /// field, [`RawError::Encode`] if the value cannot be serialized.
    fn set<T>(&mut self, name: &str, value: Option<T>, rule: FieldRule<T>) -> Result<(), RawError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let typed = match value {
            Some(value) => Some(TypedValue::new(value)),
            None if rule.is_nullable() => None,
            None => {
                return Err(RawError::NullNotAllowed {
                    field: name.to_string(),
                })
            }
        };
        self.put(name, typed).map_err(|source| RawError::Encode {
            field: name.to_string(),
            source,
        })
    }

    /// Removes an optional field.
    ///
    /// # Errors
    ///
    /// [`RawError::RequiredField`] if `rule` says the field is required.
    fn clear<T>(&mut self, name: &str, rule: FieldRule<T>) -> Result<bool, RawError> {
        if !rule.is_optional() {
            return Err(RawError::RequiredField {
                field: name.to_string(),
            });
        }
        Ok(self.remove(name))
    }

    /// Content equality: same key set and equal trees per key,
    /// regardless of backing.
    fn content_eq(&self, other: &dyn Raw) -> bool {
        content_eq(self, other)
    }
}

impl<R: Raw + ?Sized> RawExt for R {}

/// Content equality between two raws of any backing.
///
/// Values that fail to serialize never compare equal.
#[must_use]
pub fn content_eq<A: Raw + ?Sized, B: Raw + ?Sized>(a: &A, b: &B) -> bool {
    let left: HashSet<String> = a.keys().into_iter().collect();
    let right: HashSet<String> = b.keys().into_iter().collect();
    if left != right {
        return false;
    }
    left.iter().all(|key| match (a.tree(key), b.tree(key)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_value_encodes() {
        let typed = TypedValue::new(vec![1u8, 2, 3]);
        assert_eq!(typed.encode().unwrap(), json!([1, 2, 3]));
        assert_eq!(typed.type_id(), TypeId::of::<Vec<u8>>());
        assert!(typed.type_name().contains("Vec"));
    }

    #[test]
    fn encode_as_rejects_foreign_type() {
        let value: Erased = Arc::new(5u32);
        assert!(encode_as::<String>(value.as_ref()).is_err());
    }

    #[test]
    fn json_kinds() {
        assert_eq!(json_kind(&json!(null)), "null");
        assert_eq!(json_kind(&json!(1)), "integer");
        assert_eq!(json_kind(&json!(1.5)), "number");
        assert_eq!(json_kind(&json!({})), "object");
    }
}

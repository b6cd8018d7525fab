//! Field descriptor tables.
//!
//! A [`Schema`] is built once per message type and lists that type's
//! known fields. It is consulted to validate incoming raws and to fill in
//! defaults; fields not listed are extension fields and pass through.

use crate::raw::{json_kind, Presence, Raw};
use crate::{FieldRule, RawError, TreeRaw};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Coarse shape tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Any non-null value.
    Any,
    /// JSON boolean.
    Bool,
    /// JSON integer.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON string.
    String,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl FieldType {
    /// Whether `value` (non-null) has this shape.
    #[must_use]
    pub fn admits(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// One row of a [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: &'static str,
    /// Expected shape.
    pub ty: FieldType,
    /// Whether the field may be absent.
    pub optional: bool,
    /// Whether the field may be null.
    pub nullable: bool,
    /// Value used by [`Schema::apply_defaults`] when absent.
    pub default: Option<Value>,
}

impl FieldDescriptor {
    /// Required, non-nullable field.
    #[must_use]
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            optional: false,
            nullable: false,
            default: None,
        }
    }

    /// Optional, non-nullable field.
    #[must_use]
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            optional: true,
            nullable: false,
            default: None,
        }
    }

    /// Allows null.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets a default tree. Implies optional.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.optional = true;
        self.default = Some(value);
        self
    }

    /// Access rule matching this descriptor's flags (without default).
    #[must_use]
    pub fn rule<T>(&self) -> FieldRule<T> {
        FieldRule::new(self.optional, self.nullable)
    }

    fn check(&self, schema: &'static str, raw: &dyn Raw) -> Result<(), RawError> {
        let field = || self.name.to_string();
        match raw.presence(self.name) {
            Presence::Absent if self.optional => Ok(()),
            Presence::Absent => Err(RawError::MissingField { field: field() }),
            Presence::Null if self.nullable => Ok(()),
            Presence::Null => Err(RawError::NullNotAllowed { field: field() }),
            Presence::Value => {
                let value = raw
                    .tree(self.name)
                    .map_err(|source| RawError::Encode {
                        field: field(),
                        source,
                    })?
                    .unwrap_or(Value::Null);
                if self.ty.admits(&value) {
                    Ok(())
                } else {
                    Err(RawError::TypeMismatch {
                        schema,
                        field: field(),
                        expected: self.ty,
                        found: json_kind(&value),
                    })
                }
            }
        }
    }
}

/// Descriptor table of one message type.
///
/// # Example
///
/// ```
/// use conduit_raw::{FieldDescriptor, FieldType, Schema, TreeRaw};
/// use serde_json::json;
///
/// let schema = Schema::new("greeting")
///     .field(FieldDescriptor::required("name", FieldType::String))
///     .field(FieldDescriptor::optional("times", FieldType::Integer).with_default(json!(1)));
///
/// let mut raw = TreeRaw::from_value(json!({"name": "ada", "x-extra": true})).unwrap();
/// schema.validate(&raw).unwrap();
/// schema.apply_defaults(&mut raw);
///
/// assert_eq!(raw.value("times"), Some(&json!(1)));
/// assert_eq!(schema.unknown_fields(&raw), vec!["x-extra".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Empty table for the type called `name`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Appends a descriptor, replacing an earlier one with the same name.
    #[must_use]
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.retain(|d| d.name != descriptor.name);
        self.fields.push(descriptor);
        self
    }

    /// Appends every descriptor of `other`. Used to share header fields.
    #[must_use]
    pub fn extend(mut self, other: &Schema) -> Self {
        for descriptor in &other.fields {
            self = self.field(descriptor.clone());
        }
        self
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Descriptors in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up one descriptor.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|d| d.name == name)
    }

    /// Checks presence, nullability and shape of every known field.
    ///
    /// # Errors
    ///
    /// The first violation found, in declaration order.
    pub fn validate(&self, raw: &dyn Raw) -> Result<(), RawError> {
        self.fields
            .iter()
            .try_for_each(|descriptor| descriptor.check(self.name, raw))
    }

    /// Fills absent fields that declare a default.
    pub fn apply_defaults(&self, raw: &mut TreeRaw) {
        for descriptor in &self.fields {
            if let Some(default) = &descriptor.default {
                if !raw.contains(descriptor.name) {
                    raw.insert_value(descriptor.name, default.clone());
                }
            }
        }
    }

    /// Field names present in `raw` but not described here.
    #[must_use]
    pub fn unknown_fields(&self, raw: &dyn Raw) -> Vec<String> {
        raw.keys()
            .into_iter()
            .filter(|key| self.descriptor(key).is_none())
            .collect()
    }
}

//! Typed action descriptors.
//!
//! An [`Action<P, R>`] names an RPC method and fixes its parameter type
//! `P` and result type `R`. The runtime looks actions up by name when a
//! request arrives; the [`TypeDescriptor`]s decide how strictly `argument`
//! and `data` are decoded.

use conduit_raw::{FieldRule, Presence, Raw, RawError, RawExt, TreeRaw};
use conduit_types::Subject;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Shape and rules of an action's parameter or result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Rust type name, for diagnostics and introspection.
    pub type_name: String,
    /// Whether the value may be absent.
    pub optional: bool,
    /// Whether the value may be null.
    pub nullable: bool,
    /// Value used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl TypeDescriptor {
    /// Required, non-nullable `T`.
    #[must_use]
    pub fn of<T>() -> Self {
        Self {
            type_name: std::any::type_name::<T>().to_string(),
            optional: false,
            nullable: false,
            default: None,
        }
    }

    /// Optional and nullable `()`: actions that take or return nothing.
    #[must_use]
    pub fn unit() -> Self {
        Self {
            type_name: "()".to_string(),
            optional: true,
            nullable: true,
            default: None,
        }
    }

    /// Marks the value optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the value nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default used when the value is absent. Implies optional.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.optional = true;
        self.default = Some(default);
        self
    }

    /// Reads `field` from `raw` under these rules.
    ///
    /// An absent field with a default decodes the default.
    ///
    /// # Errors
    ///
    /// The access errors of [`RawExt::get`], or [`RawError::Decode`] for a
    /// default that does not decode as `T`.
    pub fn read<T>(&self, raw: &dyn Raw, field: &str) -> Result<Option<T>, RawError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if let (Presence::Absent, Some(default)) = (raw.presence(field), &self.default) {
            return T::deserialize(default)
                .map(Some)
                .map_err(|source| RawError::Decode {
                    field: field.to_string(),
                    expected: std::any::type_name::<T>(),
                    source,
                });
        }
        raw.get(field, FieldRule::new(self.optional, self.nullable))
    }

    /// Writes `value` to `field` under these rules. `None` removes an
    /// optional field, or writes null to a required nullable one.
    ///
    /// # Errors
    ///
    /// [`RawError::NullNotAllowed`] for `None` on a required non-nullable
    /// field, or encode failures.
    pub fn write<T>(&self, raw: &mut TreeRaw, field: &str, value: Option<T>) -> Result<(), RawError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let rule = FieldRule::new(self.optional, self.nullable);
        match value {
            Some(value) => raw.set(field, Some(value), rule),
            None if self.optional => raw.clear(field, rule).map(|_| ()),
            None => raw.set::<T>(field, None, rule),
        }
    }
}

/// Type-erased view of an [`Action`], used by registries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action name.
    pub name: String,
    /// Parameter rules.
    pub parameter: TypeDescriptor,
    /// Result rules.
    pub result: TypeDescriptor,
    /// Who defined the action.
    pub owner: Subject,
}

/// A named RPC method taking `P` and producing `R`.
///
/// # Example
///
/// ```
/// use conduit_protocol::{Action, TypeDescriptor};
/// use conduit_types::Subject;
///
/// let echo: Action<String, String> = Action::new("acme:echo", Subject::Platform);
/// assert_eq!(echo.name(), "acme:echo");
/// assert!(!echo.parameter().nullable);
///
/// let ping: Action<(), String> =
///     Action::new("acme:ping", Subject::Platform).with_parameter(TypeDescriptor::unit());
/// assert!(ping.parameter().optional);
/// ```
pub struct Action<P, R> {
    name: String,
    parameter: TypeDescriptor,
    result: TypeDescriptor,
    owner: Subject,
    _types: PhantomData<fn(P) -> R>,
}

impl<P, R> Action<P, R> {
    /// Action with required, non-nullable parameter and result.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: Subject) -> Self {
        Self {
            name: name.into(),
            parameter: TypeDescriptor::of::<P>(),
            result: TypeDescriptor::of::<R>(),
            owner,
            _types: PhantomData,
        }
    }

    /// Replaces the parameter descriptor.
    #[must_use]
    pub fn with_parameter(mut self, parameter: TypeDescriptor) -> Self {
        self.parameter = parameter;
        self
    }

    /// Replaces the result descriptor.
    #[must_use]
    pub fn with_result(mut self, result: TypeDescriptor) -> Self {
        self.result = result;
        self
    }

    /// Action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter rules.
    #[must_use]
    pub fn parameter(&self) -> &TypeDescriptor {
        &self.parameter
    }

    /// Result rules.
    #[must_use]
    pub fn result(&self) -> &TypeDescriptor {
        &self.result
    }

    /// Owning subject.
    #[must_use]
    pub fn owner(&self) -> &Subject {
        &self.owner
    }

    /// Type-erased copy.
    #[must_use]
    pub fn descriptor(&self) -> ActionDescriptor {
        ActionDescriptor {
            name: self.name.clone(),
            parameter: self.parameter.clone(),
            result: self.result.clone(),
            owner: self.owner.clone(),
        }
    }
}

impl<P, R> Clone for Action<P, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            parameter: self.parameter.clone(),
            result: self.result.clone(),
            owner: self.owner.clone(),
            _types: PhantomData,
        }
    }
}

impl<P, R> fmt::Debug for Action<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("parameter", &self.parameter.type_name)
            .field("result", &self.result.type_name)
            .field("owner", &self.owner)
            .finish()
    }
}

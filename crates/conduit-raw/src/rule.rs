//! Per-access field constraints.

use std::fmt;

/// Optionality, nullability and default for one field access.
///
/// Every [`RawExt::get`](crate::RawExt::get) and
/// [`RawExt::set`](crate::RawExt::set) call states what it expects:
///
/// | Stored | `optional` | `nullable` | Default | Result |
/// |--------|-----------|-----------|---------|--------|
/// | absent | no | – | – | `MissingField` |
/// | absent | yes | – | yes | `Some(default())` |
/// | absent | yes | yes | no | `None` |
/// | absent | yes | no | no | `NoDefault` |
/// | null | – | yes | – | `None` |
/// | null | – | no | – | `NullNotAllowed` |
/// | value | – | – | – | decoded value |
///
/// The default is a plain function pointer so rules can be built in
/// `const` context.
pub struct FieldRule<T> {
    optional: bool,
    nullable: bool,
    default: Option<fn() -> T>,
}

impl<T> FieldRule<T> {
    /// Required, non-nullable.
    #[must_use]
    pub const fn required() -> Self {
        Self {
            optional: false,
            nullable: false,
            default: None,
        }
    }

    /// Optional, non-nullable, without default.
    ///
    /// Reading it while absent fails with `NoDefault` unless
    /// [`or_default`](Self::or_default) or [`nullable`](Self::nullable)
    /// is added.
    #[must_use]
    pub const fn optional() -> Self {
        Self {
            optional: true,
            nullable: false,
            default: None,
        }
    }

    /// Explicit flags.
    #[must_use]
    pub const fn new(optional: bool, nullable: bool) -> Self {
        Self {
            optional,
            nullable,
            default: None,
        }
    }

    /// Allows null.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Supplies a default for absent reads. Implies optional.
    #[must_use]
    pub const fn or_default(mut self, default: fn() -> T) -> Self {
        self.optional = true;
        self.default = Some(default);
        self
    }

    /// Whether the field may be absent.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Whether the field may be null.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Default factory, if any.
    #[must_use]
    pub fn default_factory(&self) -> Option<fn() -> T> {
        self.default
    }
}

impl<T> Clone for FieldRule<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldRule<T> {}

impl<T> fmt::Debug for FieldRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("optional", &self.optional)
            .field("nullable", &self.nullable)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: FieldRule<u64> = FieldRule::optional().or_default(|| 30_000);

    #[test]
    fn const_rules() {
        assert!(TIMEOUT.is_optional());
        assert!(!TIMEOUT.is_nullable());
        assert_eq!(TIMEOUT.default_factory().map(|f| f()), Some(30_000));
    }

    #[test]
    fn builders() {
        let rule = FieldRule::<String>::required().nullable();
        assert!(!rule.is_optional());
        assert!(rule.is_nullable());
        assert!(rule.default_factory().is_none());

        let rule = FieldRule::<u8>::new(true, true);
        assert!(rule.is_optional() && rule.is_nullable());
    }
}

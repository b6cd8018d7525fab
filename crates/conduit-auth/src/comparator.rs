//! Compound matchers over [`Permission`]s.
//!
//! A [`PermissionComparator`] matches a permission when all three parts
//! agree:
//!
//! ```text
//! subject  ── SubjectMatcher   any | exact | kind
//! node     ── SegmentMatcher   conduit.plugin.??
//! context  ── key -> ValueMatcher   any | literal | segments
//! ```

use crate::{AuthError, Matcher, Permission, SegmentMatcher, SegmentPath};
use conduit_types::{Subject, SubjectKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which subjects a comparator applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum SubjectMatcher {
    /// Every subject.
    #[default]
    Any,
    /// One subject.
    Exact {
        /// The subject.
        subject: Subject,
    },
    /// Every subject of a kind.
    Kind {
        /// The kind.
        kind: SubjectKind,
    },
}

impl Matcher<Subject> for SubjectMatcher {
    fn matches(&self, candidate: &Subject) -> bool {
        match self {
            Self::Any => true,
            Self::Exact { subject } => subject == candidate,
            Self::Kind { kind } => candidate.kind() == *kind,
        }
    }
}

/// Matcher for one context value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum ValueMatcher {
    /// Any value, including an absent one.
    Any,
    /// Equal to this value.
    Literal {
        /// Expected value.
        value: Value,
    },
    /// A string value, read as a segment path, matching the pattern.
    Segments {
        /// Pattern.
        pattern: SegmentMatcher,
    },
}

impl Matcher<Option<&Value>> for ValueMatcher {
    fn matches(&self, candidate: &Option<&Value>) -> bool {
        match (self, candidate) {
            (Self::Any, _) => true,
            (Self::Literal { value }, Some(found)) => value == *found,
            (Self::Segments { pattern }, Some(Value::String(text))) => pattern.matches_str(text),
            _ => false,
        }
    }
}

/// Predicate deciding whether a permission record applies.
///
/// # Example
///
/// ```
/// use conduit_auth::{Matcher, Permission, PermissionComparator, ValueMatcher};
/// use conduit_types::Subject;
/// use serde_json::json;
///
/// let comparator = PermissionComparator::node("conduit.plugin.??")
///     .unwrap()
///     .with_context("scope", ValueMatcher::Literal { value: json!("local") });
///
/// let permission = Permission::parse(Subject::Platform, "conduit.plugin.enable")
///     .unwrap()
///     .with_context("scope", "local");
/// assert!(comparator.matches(&permission));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionComparator {
    /// Subject part.
    #[serde(default)]
    pub subject: SubjectMatcher,
    /// Node part.
    pub node: SegmentMatcher,
    /// Context part, all keys must match.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, ValueMatcher>,
}

impl PermissionComparator {
    /// Comparator for any subject on nodes matching `pattern`.
    ///
    /// # Errors
    ///
    /// Pattern compile errors.
    pub fn node(pattern: &str) -> Result<Self, AuthError> {
        Ok(Self {
            subject: SubjectMatcher::Any,
            node: SegmentMatcher::compile(pattern)?,
            context: BTreeMap::new(),
        })
    }

    /// Restricts the subject.
    #[must_use]
    pub fn for_subject(mut self, subject: SubjectMatcher) -> Self {
        self.subject = subject;
        self
    }

    /// Adds a context requirement.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, matcher: ValueMatcher) -> Self {
        self.context.insert(key.into(), matcher);
        self
    }

    /// Whether the node part alone matches `node`.
    #[must_use]
    pub fn matches_node(&self, node: &SegmentPath) -> bool {
        self.node.matches(node)
    }
}

impl Matcher<Permission> for PermissionComparator {
    fn matches(&self, candidate: &Permission) -> bool {
        self.subject.matches(&candidate.subject)
            && self.node.matches(&candidate.node)
            && self
                .context
                .iter()
                .all(|(key, matcher)| matcher.matches(&candidate.context.get(key)))
    }
}

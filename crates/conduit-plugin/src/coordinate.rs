//! Plugin identity, version requirements and provisions.

use conduit_types::NamespaceId;
use semver::{Comparator, Op, Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of one plugin build: id, version and release channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginCoordinate {
    /// Namespaced plugin id.
    pub id: NamespaceId,
    /// Semantic version.
    pub version: Version,
    /// Release channel (`stable`, `beta`, ...). `None` is the default channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl PluginCoordinate {
    /// Coordinate on the default channel.
    #[must_use]
    pub fn new(id: NamespaceId, version: Version) -> Self {
        Self {
            id,
            version,
            channel: None,
        }
    }

    /// Sets the channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

impl fmt::Display for PluginCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)?;
        if let Some(channel) = &self.channel {
            write!(f, "#{channel}")?;
        }
        Ok(())
    }
}

/// Whether a wanted channel accepts an offered one.
///
/// A requirement without a channel accepts any; otherwise both must name
/// the same channel.
#[must_use]
pub fn channel_accepts(wanted: Option<&str>, offered: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => offered == Some(wanted),
    }
}

/// A semver requirement that remembers its source text.
///
/// # Example
///
/// ```
/// use conduit_plugin::VersionMatcher;
/// use semver::Version;
///
/// let m: VersionMatcher = "^1.2".parse().unwrap();
/// assert!(m.matches(&Version::new(1, 4, 0)));
/// assert!(!m.matches(&Version::new(2, 0, 0)));
/// assert_eq!(m.to_string(), "^1.2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionMatcher {
    source: String,
    req: VersionReq,
}

impl VersionMatcher {
    /// Matches every version.
    #[must_use]
    pub fn any() -> Self {
        Self {
            source: "*".to_string(),
            req: VersionReq::STAR,
        }
    }

    /// Matches exactly `version`.
    #[must_use]
    pub fn exact(version: &Version) -> Self {
        let source = format!("={version}");
        let req = VersionReq::parse(&source).unwrap_or(VersionReq::STAR);
        Self { source, req }
    }

    /// Whether `version` satisfies the requirement.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
    }

    /// Source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether some version satisfies both `self` and `other`.
    ///
    /// Each requirement is an interval, so a shared version exists iff the
    /// greatest lower bound among the comparators satisfies both.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        std::iter::once(Version::new(0, 0, 0))
            .chain(self.req.comparators.iter().map(lower_bound))
            .chain(other.req.comparators.iter().map(lower_bound))
            .any(|candidate| self.matches(&candidate) && other.matches(&candidate))
    }
}

/// Smallest version a single comparator admits.
fn lower_bound(comparator: &Comparator) -> Version {
    let minor = comparator.minor.unwrap_or(0);
    let patch = comparator.patch.unwrap_or(0);
    match comparator.op {
        Op::Less | Op::LessEq => Version::new(0, 0, 0),
        Op::Greater if !comparator.pre.is_empty() => Version::new(comparator.major, minor, patch),
        Op::Greater => match (comparator.minor, comparator.patch) {
            (Some(minor), Some(patch)) => {
                Version::new(comparator.major, minor, patch.saturating_add(1))
            }
            (Some(minor), None) => Version::new(comparator.major, minor.saturating_add(1), 0),
            _ => Version::new(comparator.major.saturating_add(1), 0, 0),
        },
        _ => {
            let mut version = Version::new(comparator.major, minor, patch);
            version.pre = comparator.pre.clone();
            version
        }
    }
}

impl Default for VersionMatcher {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for VersionMatcher {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            source: s.trim().to_string(),
            req: VersionReq::parse(s)?,
        })
    }
}

impl TryFrom<String> for VersionMatcher {
    type Error = semver::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionMatcher> for String {
    fn from(matcher: VersionMatcher) -> Self {
        matcher.source
    }
}

/// A dependency on another plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Required plugin id.
    pub id: NamespaceId,
    /// Acceptable versions.
    #[serde(default)]
    pub version: VersionMatcher,
    /// Required channel, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Optional dependencies only order enabling; they are not needed.
    #[serde(default)]
    pub optional: bool,
}

impl Requirement {
    /// Required dependency on any version of `id`.
    #[must_use]
    pub fn new(id: NamespaceId) -> Self {
        Self {
            id,
            version: VersionMatcher::any(),
            channel: None,
            optional: false,
        }
    }

    /// Restricts versions.
    #[must_use]
    pub fn with_version(mut self, version: VersionMatcher) -> Self {
        self.version = version;
        self
    }

    /// Marks the dependency optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Whether `coordinate` satisfies this requirement.
    #[must_use]
    pub fn is_satisfied_by(&self, coordinate: &PluginCoordinate) -> bool {
        self.id == coordinate.id
            && self.version.matches(&coordinate.version)
            && channel_accepts(self.channel.as_deref(), coordinate.channel.as_deref())
    }
}

/// A declaration that a plugin stands in for another plugin id.
///
/// A provider of `acme:json` at `^1` lets a batch skip a candidate
/// `acme:json 1.3.0`: the capability is already there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provision {
    /// Provided plugin id.
    pub id: NamespaceId,
    /// Versions of that plugin this provision covers.
    #[serde(default)]
    pub version: VersionMatcher,
    /// Channel covered, if restricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl Provision {
    /// Provision covering any version of `id`.
    #[must_use]
    pub fn new(id: NamespaceId) -> Self {
        Self {
            id,
            version: VersionMatcher::any(),
            channel: None,
        }
    }

    /// Restricts the covered versions.
    #[must_use]
    pub fn with_version(mut self, version: VersionMatcher) -> Self {
        self.version = version;
        self
    }

    /// Whether this provision makes loading `candidate` redundant.
    #[must_use]
    pub fn covers(&self, candidate: &PluginCoordinate) -> bool {
        self.id == candidate.id
            && self.version.matches(&candidate.version)
            && channel_accepts(self.channel.as_deref(), candidate.channel.as_deref())
    }

    /// Whether this provision can stand in for a dependency.
    ///
    /// The covered versions must overlap the requirement's range.
    #[must_use]
    pub fn fulfils(&self, requirement: &Requirement) -> bool {
        self.id == requirement.id
            && self.version.intersects(&requirement.version)
            && channel_accepts(requirement.channel.as_deref(), self.channel.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(text: &str) -> NamespaceId {
        text.parse().unwrap()
    }

    #[test]
    fn requirement_checks_id_version_and_channel() {
        let req = Requirement::new(id("acme:db")).with_version("^2".parse().unwrap());
        let v2 = PluginCoordinate::new(id("acme:db"), Version::new(2, 1, 0));
        assert!(req.is_satisfied_by(&v2));
        assert!(!req.is_satisfied_by(&PluginCoordinate::new(id("acme:db"), Version::new(3, 0, 0))));
        assert!(!req.is_satisfied_by(&PluginCoordinate::new(id("acme:kv"), Version::new(2, 0, 0))));

        let beta_only = Requirement {
            channel: Some("beta".into()),
            ..req
        };
        assert!(!beta_only.is_satisfied_by(&v2));
        assert!(beta_only.is_satisfied_by(&v2.with_channel("beta")));
    }

    #[test]
    fn provision_covers_candidate_versions() {
        let provision = Provision::new(id("acme:json")).with_version("^1".parse().unwrap());
        assert!(provision.covers(&PluginCoordinate::new(id("acme:json"), Version::new(1, 3, 0))));
        assert!(!provision.covers(&PluginCoordinate::new(id("acme:json"), Version::new(2, 0, 0))));
        assert!(provision.fulfils(&Requirement::new(id("acme:json"))));
    }

    #[test]
    fn provision_fulfils_only_overlapping_ranges() {
        let provision = Provision::new(id("acme:json")).with_version("^1".parse().unwrap());
        let wants = |range: &str| {
            Requirement::new(id("acme:json")).with_version(range.parse().unwrap())
        };
        assert!(provision.fulfils(&wants("^1.4")));
        assert!(provision.fulfils(&wants(">=1.9, <3")));
        assert!(provision.fulfils(&wants("<1.0.1")));
        assert!(!provision.fulfils(&wants("^2")));
        assert!(!provision.fulfils(&wants("<1")));
        assert!(!provision.fulfils(&wants(">1")));
        assert!(!provision.fulfils(&wants("=0.9.0")));
        assert!(!Provision::new(id("acme:json"))
            .with_version("=1.2.0".parse().unwrap())
            .fulfils(&wants(">1.2.0")));
    }

    #[test]
    fn matcher_intersection() {
        let m = |text: &str| text.parse::<VersionMatcher>().unwrap();
        assert!(VersionMatcher::any().intersects(&m("=3.1.4")));
        assert!(m("~1.2").intersects(&m(">1.2.5")));
        assert!(!m("~1.2").intersects(&m(">=1.3")));
        assert!(m(">=1.0, <2").intersects(&m(">1.9.9")));
    }

    #[test]
    fn exact_matcher() {
        let m = VersionMatcher::exact(&Version::new(1, 2, 3));
        assert!(m.matches(&Version::new(1, 2, 3)));
        assert!(!m.matches(&Version::new(1, 2, 4)));
    }

    #[test]
    fn matcher_serializes_as_text() {
        let m: VersionMatcher = ">=1.0, <2".parse().unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), r#"">=1.0, <2""#);
        assert!(serde_json::from_str::<VersionMatcher>(r#""not a version""#).is_err());
    }

    #[test]
    fn coordinate_display() {
        let c = PluginCoordinate::new(id("acme:db"), Version::new(1, 0, 0)).with_channel("beta");
        assert_eq!(c.to_string(), "acme:db@1.0.0#beta");
    }
}

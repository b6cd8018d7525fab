//! Plugin metadata and TOML manifests.
//!
//! ```toml
//! [plugin]
//! id = "acme:search"
//! version = "1.4.0"
//! channel = "stable"
//! name = "Search"
//! description = "Full-text search actions"
//! protocol = "^1"
//!
//! [[dependencies]]
//! id = "acme:index"
//! version = "^2"
//!
//! [[dependencies]]
//! id = "acme:metrics"
//! optional = true
//!
//! [[provisions]]
//! id = "legacy:search"
//! version = "^0.9"
//! ```

use crate::{PluginCoordinate, PluginError, Provision, Requirement, VersionMatcher};
use conduit_types::NamespaceId;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the manager needs to know about a plugin before loading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMeta {
    /// Identity.
    pub coordinate: PluginCoordinate,
    /// Display name.
    pub name: String,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Platform protocol versions the plugin works with.
    #[serde(default)]
    pub protocol: VersionMatcher,
    /// Plugins that must be enabled first.
    #[serde(default)]
    pub dependencies: Vec<Requirement>,
    /// Plugin ids this one stands in for.
    #[serde(default)]
    pub provisions: Vec<Provision>,
}

impl PluginMeta {
    /// Metadata with no dependencies, accepting any protocol.
    #[must_use]
    pub fn new(coordinate: PluginCoordinate) -> Self {
        Self {
            name: coordinate.id.to_string(),
            coordinate,
            description: String::new(),
            protocol: VersionMatcher::any(),
            dependencies: Vec::new(),
            provisions: Vec::new(),
        }
    }

    /// Adds a dependency.
    #[must_use]
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.dependencies.push(requirement);
        self
    }

    /// Adds a provision.
    #[must_use]
    pub fn provides(mut self, provision: Provision) -> Self {
        self.provisions.push(provision);
        self
    }

    /// Restricts the protocol versions.
    #[must_use]
    pub fn with_protocol(mut self, protocol: VersionMatcher) -> Self {
        self.protocol = protocol;
        self
    }

    /// Plugin id.
    #[must_use]
    pub fn id(&self) -> &NamespaceId {
        &self.coordinate.id
    }

    /// Plugin version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.coordinate.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestPlugin {
    id: NamespaceId,
    version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    protocol: VersionMatcher,
}

/// On-disk form of [`PluginMeta`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    plugin: ManifestPlugin,
    #[serde(default)]
    dependencies: Vec<Requirement>,
    #[serde(default)]
    provisions: Vec<Provision>,
}

impl PluginManifest {
    /// Parses manifest text.
    ///
    /// # Errors
    ///
    /// [`PluginError::Manifest`] with the parser message.
    pub fn parse(text: &str) -> Result<Self, PluginError> {
        toml::from_str(text).map_err(|e| PluginError::Manifest {
            origin: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// [`PluginError::Manifest`] naming the file on read or parse failure.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| PluginError::Manifest {
            origin: origin.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| PluginError::Manifest {
            origin,
            message: e.to_string(),
        })
    }

    /// Renders the manifest as TOML.
    ///
    /// # Errors
    ///
    /// [`PluginError::Manifest`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, PluginError> {
        toml::to_string_pretty(self).map_err(|e| PluginError::Manifest {
            origin: self.plugin.id.to_string(),
            message: e.to_string(),
        })
    }

    /// Metadata described by the manifest.
    #[must_use]
    pub fn into_meta(self) -> PluginMeta {
        let coordinate = PluginCoordinate {
            id: self.plugin.id,
            version: self.plugin.version,
            channel: self.plugin.channel,
        };
        PluginMeta {
            name: self
                .plugin
                .name
                .unwrap_or_else(|| coordinate.id.to_string()),
            coordinate,
            description: self.plugin.description,
            protocol: self.plugin.protocol,
            dependencies: self.dependencies,
            provisions: self.provisions,
        }
    }
}

impl From<&PluginMeta> for PluginManifest {
    fn from(meta: &PluginMeta) -> Self {
        Self {
            plugin: ManifestPlugin {
                id: meta.coordinate.id.clone(),
                version: meta.coordinate.version.clone(),
                channel: meta.coordinate.channel.clone(),
                name: Some(meta.name.clone()),
                description: meta.description.clone(),
                protocol: meta.protocol.clone(),
            },
            dependencies: meta.dependencies.clone(),
            provisions: meta.provisions.clone(),
        }
    }
}

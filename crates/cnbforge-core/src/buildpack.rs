//! Buildpack identity, order and layer metadata

use serde::{Deserialize, Serialize};

/// Buildpack identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildpackInfo {
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl BuildpackInfo {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for BuildpackInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// Buildpack identity plus display metadata
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DescriptiveBuildpackInfo {
    #[serde(flatten)]
    pub info: BuildpackInfo,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,
}

impl DescriptiveBuildpackInfo {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        homepage: impl Into<String>,
    ) -> Self {
        Self {
            info: BuildpackInfo::new(id, version),
            homepage: homepage.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }
}

impl std::fmt::Display for DescriptiveBuildpackInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.info.fmt(f)
    }
}

/// One buildpack occurrence in a group
///
/// `optional` is a property of the occurrence, not of the buildpack: it never
/// takes part in lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackRef {
    #[serde(flatten)]
    pub info: BuildpackInfo,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl BuildpackRef {
    pub fn new(id: impl Into<String>, version: impl Into<String>, optional: bool) -> Self {
        Self {
            info: BuildpackInfo::new(id, version),
            optional,
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }
}

/// A detection group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    #[serde(default)]
    pub group: Vec<BuildpackRef>,
}

impl OrderEntry {
    pub fn new(group: Vec<BuildpackRef>) -> Self {
        Self { group }
    }
}

/// Detection groups in precedence order
pub type Order = Vec<OrderEntry>;

/// Stack supported by a buildpack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackStack {
    pub id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,
}

/// Per-buildpack entry of the `io.buildpacks.buildpack.layers` label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildpackLayerInfo {
    #[serde(default)]
    pub api: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacks: Vec<BuildpackStack>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Order,

    #[serde(rename = "layerDiffID", default)]
    pub layer_diff_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,
}

impl BuildpackLayerInfo {
    /// Whether this buildpack can run on the given stack
    ///
    /// Meta-buildpacks declare no stacks and defer to their children.
    pub fn supports_stack(&self, stack_id: &str, stack_mixins: &[String]) -> bool {
        if self.stacks.is_empty() {
            return true;
        }

        self.stacks.iter().any(|s| {
            (s.id == stack_id || s.id == "*")
                && s.mixins.iter().all(|m| stack_mixins.contains(m))
        })
    }
}

/// Buildpack entry in a builder record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackMetadata {
    pub id: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,
}

impl From<&DescriptiveBuildpackInfo> for BuildpackMetadata {
    fn from(info: &DescriptiveBuildpackInfo) -> Self {
        Self {
            id: info.info.id.clone(),
            version: info.info.version.clone(),
            homepage: info.homepage.clone(),
        }
    }
}

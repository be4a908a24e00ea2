//! Builder inputs and the published builder record

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::buildpack::{BuildpackMetadata, BuildpackStack, Order};
use crate::error::{CoreError, Result};

/// What to build: a target tag and ordered detection groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderSpec {
    /// Tag the builder image is published under
    pub tag: String,

    /// Detection groups, preserved verbatim into the builder record
    #[serde(default)]
    pub order: Order,
}

impl BuilderSpec {
    pub fn new(tag: impl Into<String>, order: Order) -> Self {
        Self {
            tag: tag.into(),
            order,
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject malformed input before any lookup or registry access
    ///
    /// An empty order is valid.
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(CoreError::InvalidBuilderSpec {
                message: "tag must not be empty".to_string(),
            });
        }

        for (index, entry) in self.order.iter().enumerate() {
            for buildpack in &entry.group {
                if buildpack.id().trim().is_empty() {
                    return Err(CoreError::InvalidBuildpackRef {
                        group: index,
                        message: "buildpack id must not be empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Total number of buildpack references across all groups
    pub fn buildpack_count(&self) -> usize {
        self.order.iter().map(|e| e.group.len()).sum()
    }
}

/// Build and run base images for a stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    /// Stack identifier (e.g. `io.buildpacks.stacks.jammy`)
    pub id: String,

    /// Resolved build image reference
    pub build_image: String,

    /// Resolved run image reference
    pub run_image: String,

    #[serde(default)]
    pub mixins: Vec<String>,

    #[serde(default)]
    pub observed_generation: i64,
}

/// A buildpack available from a store, and where its layer lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreBuildpack {
    pub id: String,
    pub version: String,

    #[serde(default)]
    pub homepage: String,

    /// Packaged buildpack image carrying the layer
    pub image: String,

    /// Diff id of the buildpack's layer within `image`
    #[serde(rename = "diffId")]
    pub diff_id: String,

    #[serde(default)]
    pub api: String,

    #[serde(default)]
    pub stacks: Vec<BuildpackStack>,

    /// Child groups for meta-buildpacks
    #[serde(default)]
    pub order: Order,
}

/// Snapshot of a buildpack store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildpackStore {
    pub name: String,

    #[serde(default)]
    pub buildpacks: Vec<StoreBuildpack>,

    #[serde(default)]
    pub observed_generation: i64,
}

impl BuildpackStore {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Stack summary recorded on a builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStack {
    pub run_image: String,
    pub id: String,
}

/// Provenance of a published builder
///
/// Built once after a successful publish and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderRecord {
    image: String,
    stack: BuildStack,
    buildpacks: Vec<BuildpackMetadata>,
    order: Order,
    observed_stack_generation: i64,
    observed_store_generation: i64,
    os: String,
}

impl BuilderRecord {
    pub fn new(
        image: impl Into<String>,
        stack: &Stack,
        store: &BuildpackStore,
        buildpacks: Vec<BuildpackMetadata>,
        order: Order,
        os: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            stack: BuildStack {
                run_image: stack.run_image.clone(),
                id: stack.id.clone(),
            },
            buildpacks,
            order,
            observed_stack_generation: stack.observed_generation,
            observed_store_generation: store.observed_generation,
            os: os.into(),
        }
    }

    /// Published image identifier (`repository@digest`)
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn stack(&self) -> &BuildStack {
        &self.stack
    }

    pub fn buildpacks(&self) -> &[BuildpackMetadata] {
        &self.buildpacks
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn observed_stack_generation(&self) -> i64 {
        self.observed_stack_generation
    }

    pub fn observed_store_generation(&self) -> i64 {
        self.observed_store_generation
    }

    pub fn os(&self) -> &str {
        &self.os
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildpack::{BuildpackRef, OrderEntry};

    #[test]
    fn test_builder_spec_from_yaml() {
        let yaml = r#"
tag: registry.example.com/builders/base
order:
  - group:
      - id: paketo/java
        version: 1.0.0
  - group:
      - id: paketo/node
        version: 2.0.0
        optional: true
"#;
        let spec = BuilderSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.tag, "registry.example.com/builders/base");
        assert_eq!(spec.order.len(), 2);
        assert_eq!(spec.buildpack_count(), 2);
        assert!(spec.order[1].group[0].optional);
        spec.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_tag() {
        let spec = BuilderSpec::new("  ", vec![]);
        assert!(matches!(
            spec.validate(),
            Err(CoreError::InvalidBuilderSpec { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let spec = BuilderSpec::new(
            "example.com/builder",
            vec![
                OrderEntry::new(vec![BuildpackRef::new("a", "1", false)]),
                OrderEntry::new(vec![BuildpackRef::new("", "1", false)]),
            ],
        );
        assert!(matches!(
            spec.validate(),
            Err(CoreError::InvalidBuildpackRef { group: 1, .. })
        ));
    }

    #[test]
    fn test_empty_order_is_valid() {
        BuilderSpec::new("example.com/builder", vec![]).validate().unwrap();
    }

    #[test]
    fn test_record_copies_stack_and_generations() {
        let stack = Stack {
            id: "io.buildpacks.stacks.jammy".to_string(),
            build_image: "example.com/build@sha256:1".to_string(),
            run_image: "example.com/run@sha256:2".to_string(),
            mixins: vec![],
            observed_generation: 3,
        };
        let store = BuildpackStore {
            name: "default".to_string(),
            buildpacks: vec![],
            observed_generation: 7,
        };

        let record = BuilderRecord::new("example.com/builder@sha256:3", &stack, &store, vec![], vec![], "linux");

        assert_eq!(record.stack().run_image, "example.com/run@sha256:2");
        assert_eq!(record.stack().id, "io.buildpacks.stacks.jammy");
        assert_eq!(record.observed_stack_generation(), 3);
        assert_eq!(record.observed_store_generation(), 7);
        assert_eq!(record.os(), "linux");
    }
}

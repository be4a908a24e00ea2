//! Builder image composition
//!
//! A composer starts from the lifecycle image, takes the stack's build image
//! as the base filesystem and appends buildpack layers group by group.
//! Nothing here talks to a registry: `finalize` produces an image ready to
//! publish, or fails without side effects.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use cnbforge_core::{
    BuildpackLayerInfo, DescriptiveBuildpackInfo, Image, Layer, Order, OrderEntry, Stack, labels,
};

use crate::defaults;
use crate::error::{CnbError, Result};
use crate::lifecycle::{LifecycleApis, LifecycleMetadata};
use crate::repository::{BuildpackLayer, RemoteBuildpackRef};

/// Name stamped into builder metadata
pub const CREATED_BY: &str = "cnbforge";

/// Contents of the builder metadata label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderMetadata {
    pub description: String,
    pub stack: StackMetadata,
    pub lifecycle: LifecycleDescriptor,
    pub created_by: CreatorMetadata,
    #[serde(default)]
    pub buildpacks: Vec<DescriptiveBuildpackInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackMetadata {
    pub run_image: RunImageMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunImageMetadata {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleDescriptor {
    pub version: String,
    #[serde(default)]
    pub apis: LifecycleApis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorMetadata {
    pub name: String,
    pub version: String,
}

/// `id -> version -> layer info`
pub type BuildpackLayersLabel = BTreeMap<String, BTreeMap<String, BuildpackLayerInfo>>;

struct StackBase {
    image: Image,
    id: String,
    run_image: String,
    mixins: Vec<String>,
}

/// Assembles stack, lifecycle and buildpack groups into a builder image
pub struct BuilderComposer {
    product_version: String,
    lifecycle: LifecycleMetadata,
    lifecycle_layers: Vec<Layer>,
    base: Option<StackBase>,
    groups: Vec<Vec<RemoteBuildpackRef>>,
}

impl BuilderComposer {
    /// Start from a lifecycle image
    pub fn init(lifecycle_image: &Image, product_version: impl Into<String>) -> Result<Self> {
        let lifecycle = LifecycleMetadata::from_image(lifecycle_image)?;

        Ok(Self {
            product_version: product_version.into(),
            lifecycle,
            lifecycle_layers: lifecycle_image.layers().to_vec(),
            base: None,
            groups: Vec::new(),
        })
    }

    /// Use the stack's build image as the base filesystem
    pub fn add_stack(&mut self, build_image: Image, stack: &Stack) -> Result<()> {
        if let Some(actual) = build_image.label(labels::STACK_ID) {
            if actual != stack.id {
                return Err(CnbError::StackMismatch {
                    expected: stack.id.clone(),
                    actual: actual.to_string(),
                });
            }
        }

        let mixins = if stack.mixins.is_empty() {
            build_image
                .label_json::<Vec<String>>(labels::STACK_MIXINS)?
                .unwrap_or_default()
        } else {
            stack.mixins.clone()
        };

        self.base = Some(StackBase {
            image: build_image,
            id: stack.id.clone(),
            run_image: stack.run_image.clone(),
            mixins,
        });
        Ok(())
    }

    /// Append a detection group
    pub fn add_group(&mut self, buildpacks: impl IntoIterator<Item = RemoteBuildpackRef>) {
        self.groups.push(buildpacks.into_iter().collect());
    }

    /// Order as composed so far
    pub fn order(&self) -> Order {
        self.groups
            .iter()
            .map(|group| OrderEntry::new(group.iter().map(|r| r.buildpack_ref()).collect()))
            .collect()
    }

    /// Distinct buildpacks referenced by the order, sorted by id then version
    pub fn buildpacks(&self) -> Vec<DescriptiveBuildpackInfo> {
        self.groups
            .iter()
            .flatten()
            .map(|r| r.buildpack_info.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn lifecycle(&self) -> &LifecycleMetadata {
        &self.lifecycle
    }

    /// Every buildpack layer in group, ref and declared order
    fn buildpack_layers(&self) -> impl Iterator<Item = &BuildpackLayer> {
        self.groups
            .iter()
            .flatten()
            .flat_map(|r| r.layers.iter())
    }

    fn validate(&self, base: &StackBase) -> Result<()> {
        let buildpack_apis = &self.lifecycle.apis.buildpack;
        let mut checked = HashSet::new();

        for layer in self.buildpack_layers() {
            if !checked.insert(&layer.buildpack_info.info) {
                continue;
            }

            if !layer.layer_info.supports_stack(&base.id, &base.mixins) {
                return Err(CnbError::UnsupportedStack {
                    buildpack: layer.buildpack_info.to_string(),
                    stack: base.id.clone(),
                });
            }

            let api = &layer.layer_info.api;
            if !buildpack_apis.is_empty() && !api.is_empty() && !buildpack_apis.supports(api) {
                return Err(CnbError::UnsupportedBuildpackApi {
                    buildpack: layer.buildpack_info.to_string(),
                    api: api.clone(),
                    supported: buildpack_apis.supported.join(", "),
                });
            }
        }

        Ok(())
    }

    /// Produce the publishable builder image
    pub fn finalize(&self) -> Result<Image> {
        let base = self.base.as_ref().ok_or(CnbError::MissingStack)?;
        self.validate(base)?;

        let mut image = base.image.clone();

        for layer in &self.lifecycle_layers {
            if !image.has_layer(layer.digest()) {
                image.append_layer(layer.clone());
            }
        }

        let mut layers_label = BuildpackLayersLabel::new();
        for buildpack in self.buildpack_layers() {
            // Same physical layer reached through several buildpacks or groups
            if !image.has_layer(buildpack.layer.digest()) {
                image.append_layer(buildpack.layer.clone());
            }

            let mut info = buildpack.layer_info.clone();
            info.layer_diff_id = buildpack.layer.diff_id().to_string();
            layers_label
                .entry(buildpack.buildpack_info.id().to_string())
                .or_default()
                .insert(buildpack.buildpack_info.version().to_string(), info);
        }

        let order = self.order();
        image.append_layer(defaults::cnb_layer(&order, &base.run_image)?);

        let metadata = BuilderMetadata {
            description: format!("Builder for stack {}", base.id),
            stack: StackMetadata {
                run_image: RunImageMetadata {
                    image: base.run_image.clone(),
                    mirrors: vec![],
                },
            },
            lifecycle: LifecycleDescriptor {
                version: self.lifecycle.version.clone(),
                apis: self.lifecycle.apis.clone(),
            },
            created_by: CreatorMetadata {
                name: CREATED_BY.to_string(),
                version: self.product_version.clone(),
            },
            buildpacks: self.buildpacks(),
        };

        image.set_label_json(labels::BUILDER_METADATA, &metadata)?;
        image.set_label_json(labels::BUILDPACK_ORDER, &order)?;
        image.set_label_json(labels::BUILDPACK_LAYERS, &layers_label)?;
        image.set_label(labels::STACK_ID, base.id.clone());

        Ok(image)
    }
}

//! Buildpack repository
//!
//! Resolves `(id, version)` to a buildpack's descriptive metadata and the
//! content layers implementing it.
//!
//! Key features:
//! - **Per-request snapshot**: a repository is built from one store snapshot
//! - **Latest version**: an empty version selects the highest semver
//! - **Meta-buildpacks**: children's layers are included before the parent's

use async_trait::async_trait;
use semver::Version;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use cnbforge_core::{
    BuildpackInfo, BuildpackLayerInfo, BuildpackRef, BuildpackStore, DescriptiveBuildpackInfo,
    Image, Layer, StoreBuildpack,
};
use cnbforge_registry::{RegistryClient, RegistryKeychain};

use crate::error::{CnbError, Result};

/// A buildpack content layer and the metadata describing it
#[derive(Debug, Clone)]
pub struct BuildpackLayer {
    pub layer: Layer,
    pub buildpack_info: DescriptiveBuildpackInfo,
    pub layer_info: BuildpackLayerInfo,
}

/// A resolved buildpack
///
/// Produced once per lookup and never mutated; refs built from it share its
/// layers.
#[derive(Debug, Clone)]
pub struct RemoteBuildpackInfo {
    pub buildpack_info: DescriptiveBuildpackInfo,
    pub layers: Arc<[BuildpackLayer]>,
}

impl RemoteBuildpackInfo {
    /// Bind this buildpack to one occurrence in a group
    pub fn optional(&self, optional: bool) -> RemoteBuildpackRef {
        RemoteBuildpackRef {
            buildpack_info: self.buildpack_info.clone(),
            optional,
            layers: Arc::clone(&self.layers),
        }
    }
}

/// A resolved buildpack bound to its `optional` flag within a group
#[derive(Debug, Clone)]
pub struct RemoteBuildpackRef {
    pub buildpack_info: DescriptiveBuildpackInfo,
    pub optional: bool,
    pub layers: Arc<[BuildpackLayer]>,
}

impl RemoteBuildpackRef {
    pub fn buildpack_ref(&self) -> BuildpackRef {
        BuildpackRef {
            info: self.buildpack_info.info.clone(),
            optional: self.optional,
        }
    }
}

/// Buildpack lookup contract
#[async_trait]
pub trait BuildpackRepository: Send + Sync {
    async fn find_by_id_and_version(&self, id: &str, version: &str) -> Result<RemoteBuildpackInfo>;
}

/// Builds a repository from a store snapshot, once per builder creation
pub type NewBuildpackRepository =
    Arc<dyn Fn(&BuildpackStore) -> Box<dyn BuildpackRepository> + Send + Sync>;

/// Repository backed by a buildpack store and the packaged images it lists
pub struct StoreBuildpackRepository {
    store: BuildpackStore,
    registry: Arc<dyn RegistryClient>,
    keychain: Arc<dyn RegistryKeychain>,
    /// Packaged images fetched so far, by reference
    images: Mutex<HashMap<String, Image>>,
}

impl StoreBuildpackRepository {
    pub fn new(
        store: &BuildpackStore,
        registry: Arc<dyn RegistryClient>,
        keychain: Arc<dyn RegistryKeychain>,
    ) -> Self {
        Self {
            store: store.clone(),
            registry,
            keychain,
            images: Mutex::new(HashMap::new()),
        }
    }

    /// Factory suitable for `RemoteBuilderCreator`
    pub fn factory(
        registry: Arc<dyn RegistryClient>,
        keychain: Arc<dyn RegistryKeychain>,
    ) -> NewBuildpackRepository {
        Arc::new(move |store: &BuildpackStore| -> Box<dyn BuildpackRepository> {
            Box::new(Self::new(store, Arc::clone(&registry), Arc::clone(&keychain)))
        })
    }

    /// Find a store entry; an empty version selects the highest version
    fn find_entry(&self, id: &str, version: &str) -> Result<&StoreBuildpack> {
        let mut candidates = self.store.buildpacks.iter().filter(|b| b.id == id);

        let found = if version.is_empty() {
            candidates.max_by(|a, b| {
                let va = Version::parse(&a.version).ok();
                let vb = Version::parse(&b.version).ok();
                match (va, vb) {
                    (Some(va), Some(vb)) => va.cmp(&vb),
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (None, None) => a.version.cmp(&b.version),
                }
            })
        } else {
            candidates.find(|b| b.version == version)
        };

        found.ok_or_else(|| CnbError::BuildpackNotFound {
            id: id.to_string(),
            version: version.to_string(),
        })
    }

    /// Entries whose layers make up `root`, children before parents
    fn collect_entries<'a>(&'a self, root: &'a StoreBuildpack) -> Result<Vec<&'a StoreBuildpack>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut path = Vec::new();
        self.visit(root, &mut path, &mut seen, &mut out)?;
        Ok(out)
    }

    fn visit<'a>(
        &'a self,
        entry: &'a StoreBuildpack,
        path: &mut Vec<BuildpackInfo>,
        seen: &mut HashSet<BuildpackInfo>,
        out: &mut Vec<&'a StoreBuildpack>,
    ) -> Result<()> {
        let key = BuildpackInfo::new(entry.id.clone(), entry.version.clone());
        if path.contains(&key) {
            let cycle = path
                .iter()
                .chain(std::iter::once(&key))
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(CnbError::BuildpackCycle { cycle });
        }
        if seen.contains(&key) {
            return Ok(());
        }

        path.push(key.clone());
        for group in &entry.order {
            for child in &group.group {
                let child = self.find_entry(child.id(), child.version())?;
                self.visit(child, path, seen, out)?;
            }
        }
        path.pop();

        seen.insert(key);
        out.push(entry);
        Ok(())
    }

    async fn layer_for(&self, entry: &StoreBuildpack) -> Result<Layer> {
        let mut images = self.images.lock().await;

        if !images.contains_key(&entry.image) {
            let (image, resolved) = self
                .registry
                .fetch(self.keychain.as_ref(), &entry.image)
                .await?;
            tracing::debug!(image = %entry.image, %resolved, "fetched buildpackage");
            images.insert(entry.image.clone(), image);
        }

        images
            .get(&entry.image)
            .and_then(|image| image.layers().iter().find(|l| l.diff_id() == entry.diff_id))
            .cloned()
            .ok_or_else(|| CnbError::BuildpackLayerNotFound {
                id: entry.id.clone(),
                version: entry.version.clone(),
                diff_id: entry.diff_id.clone(),
                image: entry.image.clone(),
            })
    }
}

fn descriptive(entry: &StoreBuildpack) -> DescriptiveBuildpackInfo {
    DescriptiveBuildpackInfo::new(entry.id.clone(), entry.version.clone(), entry.homepage.clone())
}

#[async_trait]
impl BuildpackRepository for StoreBuildpackRepository {
    async fn find_by_id_and_version(&self, id: &str, version: &str) -> Result<RemoteBuildpackInfo> {
        let root = self.find_entry(id, version)?;
        let entries = self.collect_entries(root)?;

        let mut layers = Vec::with_capacity(entries.len());
        for entry in entries {
            let layer = self.layer_for(entry).await?;
            layers.push(BuildpackLayer {
                layer,
                buildpack_info: descriptive(entry),
                layer_info: BuildpackLayerInfo {
                    api: entry.api.clone(),
                    stacks: entry.stacks.clone(),
                    order: entry.order.clone(),
                    layer_diff_id: entry.diff_id.clone(),
                    homepage: entry.homepage.clone(),
                },
            });
        }

        tracing::debug!(
            store = %self.store.name,
            buildpack = %descriptive(root),
            layers = layers.len(),
            "resolved buildpack"
        );

        Ok(RemoteBuildpackInfo {
            buildpack_info: descriptive(root),
            layers: layers.into(),
        })
    }
}

//! Manager assembly and profile construction from extracted features.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::codec::registry::TypeRegistry;
use crate::core::config::LibsiftConfig;
use crate::core::errors::{LibsiftError, Result};
use crate::matching::strategy::Strategy;
use crate::profile::blueprint::Blueprint;
use crate::profile::element::ProfileElement;
use crate::profile::extension::{NamedExtension, Retention};
use crate::profile::extraction::{ExtractedElement, FeatureExtractor};
use crate::profile::kind::ElementKind;
use crate::profile::manager::ProfileManager;
use crate::profile::metadata::{BuildInfo, ProfileMetadata};
use crate::profile::normalize::Normalizer;
use crate::profile::Profile;

/// Assembles a [`ProfileManager`] from configuration.
///
/// Writers and readers of the same profile must be assembled from equivalent
/// builders so that extension sets and blueprint field orders agree.
pub struct ManagerBuilder {
    config: LibsiftConfig,
    registry: Option<Arc<TypeRegistry>>,
    strategy: Option<Strategy>,
    kinds: Option<Vec<ElementKind>>,
    normalizers: Vec<(ElementKind, Arc<dyn Normalizer>)>,
    is_application: bool,
}

impl ManagerBuilder {
    /// Builder over `config` with the default registry and configured strategy.
    pub fn new(config: LibsiftConfig) -> Self {
        Self {
            config,
            registry: None,
            strategy: None,
            kinds: None,
            normalizers: Vec::new(),
            is_application: false,
        }
    }

    /// Share an existing type registry instead of building the default one.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use an explicit strategy instead of the configured algorithms.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Restrict the element kinds. Defaults to every kind the strategy
    /// knows about.
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = ElementKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Add a normalizer for `kind`.
    pub fn normalizer(mut self, kind: ElementKind, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizers.push((kind, normalizer));
        self
    }

    /// Mark the manager as holding an application profile.
    pub fn application(mut self, is_application: bool) -> Self {
        self.is_application = is_application;
        self
    }

    /// Validate the config and assemble the manager.
    pub fn build(self) -> Result<ProfileManager> {
        self.config.validate()?;
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(TypeRegistry::with_defaults()));
        let strategy = match self.strategy {
            Some(strategy) => strategy,
            None => Strategy::from_config(&self.config)?,
        };
        let kinds = self.kinds.unwrap_or_else(|| strategy.kinds());

        let mut blueprints = Vec::with_capacity(kinds.len());
        for kind in &kinds {
            let mut blueprint = Blueprint::new(kind.clone());
            if let Some(step) = strategy.build_step_for(kind) {
                step.declare_fields(&mut blueprint)?;
            }
            blueprints.push(blueprint);
        }

        let mut manager = ProfileManager::new(registry, Arc::new(strategy));
        manager.set_application(self.is_application);
        manager.register(Box::new(ProfileMetadata::default()), Retention::Runtime);
        manager.register(Box::new(BuildInfo::default()), Retention::Source);
        for blueprint in blueprints {
            let kind = blueprint.kind().clone();
            manager.register_blueprint(blueprint)?;
            manager.register_element_list(kind);
        }
        for (kind, normalizer) in self.normalizers {
            manager.register_normalizer(kind, normalizer);
        }

        debug!(
            kinds = ?kinds.iter().map(ElementKind::name).collect::<Vec<_>>(),
            is_application = self.is_application,
            "assembled profile manager"
        );
        Ok(manager)
    }
}

/// Builds a [`Profile`] by running an extractor and the strategy's build
/// steps over its output.
pub struct ProfileBuilder {
    manager: ProfileManager,
    artifact: String,
    version: String,
}

impl ProfileBuilder {
    /// Builder filling `manager`.
    pub fn new(manager: ProfileManager) -> Self {
        Self {
            manager,
            artifact: String::new(),
            version: String::new(),
        }
    }

    /// Artifact name and version recorded in metadata.
    pub fn artifact(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.artifact = name.into();
        self.version = version.into();
        self
    }

    /// Extract `path`, then normalize, intern and process every element.
    ///
    /// Elements are processed in parallel; they are appended to their lists
    /// in extraction order. Descriptor indices depend on interning order and
    /// are therefore not stable across builds.
    pub fn build(mut self, extractor: &dyn FeatureExtractor, path: &Path) -> Result<Profile> {
        let started = Instant::now();
        let extracted = extractor.extract(path)?;
        for element in &extracted {
            if !self.manager.blueprints().contains(&element.kind) {
                return Err(LibsiftError::not_registered("element kind", element.kind.name()));
            }
        }

        let manager = &self.manager;
        let built: Vec<ProfileElement> = extracted
            .into_par_iter()
            .map(|element| build_element(manager, element))
            .collect::<Result<_>>()?;

        let mut normalizers = Vec::new();
        for element in built {
            let kind = element.kind().clone();
            self.manager.elements_mut(&kind)?.push(element)?;
            if let Some(normalizer) = self.manager.normalizer(&kind) {
                normalizers.push(normalizer.name().to_string());
            }
        }
        normalizers.sort();
        normalizers.dedup();

        let element_counts = self
            .manager
            .element_kinds()
            .into_iter()
            .map(|kind| {
                let count = self.manager.elements(&kind).map_or(0, |list| list.len());
                (kind.name().to_string(), count)
            })
            .collect();

        let is_application = self.manager.is_application();
        if self.manager.has(ProfileMetadata::NAME) {
            let metadata = self.manager.get_mut::<ProfileMetadata>()?;
            *metadata = ProfileMetadata::new(self.artifact.clone(), self.version.clone(), is_application);
        }
        let elapsed = started.elapsed();
        if self.manager.has(BuildInfo::NAME) {
            let info = self.manager.get_mut::<BuildInfo>()?;
            *info = BuildInfo {
                artifact_path: Some(path.to_path_buf()),
                extractor: extractor.name().to_string(),
                extraction_millis: elapsed.as_millis() as u64,
                element_counts,
                normalizers,
            };
        }

        info!(
            artifact = %self.artifact,
            path = %path.display(),
            descriptors = self.manager.descriptors()?.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "built profile"
        );
        Ok(Profile::from_manager(self.manager))
    }
}

fn build_element(manager: &ProfileManager, mut extracted: ExtractedElement) -> Result<ProfileElement> {
    if let Some(normalizer) = manager.normalizer(&extracted.kind) {
        normalizer.normalize(&mut extracted);
    }
    let descriptor = manager.descriptors()?.intern(&extracted.descriptor);
    let blueprint = manager.blueprint(&extracted.kind)?;
    let mut element = blueprint.instantiate(descriptor);
    if let Some(step) = manager.strategy().build_step_for(&extracted.kind) {
        step.process(&mut element, &extracted, blueprint)?;
    }
    Ok(element)
}

//! Kind-keyed dispatch of similarity functions and build steps.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::codec::values::FieldValue;
use crate::core::config::LibsiftConfig;
use crate::core::errors::{LibsiftError, Result};
use crate::matching::algorithms;
use crate::profile::blueprint::Blueprint;
use crate::profile::element::ProfileElement;
use crate::profile::extraction::ExtractedElement;
use crate::profile::kind::ElementKind;
use crate::profile::manager::ProfileManager;

/// An element viewed through the manager that owns it, so descriptors and
/// blueprint fields can be resolved.
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    /// The element
    pub element: &'a ProfileElement,
    /// Manager owning the element's descriptors and blueprint
    pub manager: &'a ProfileManager,
}

impl<'a> ElementRef<'a> {
    /// View `element` through `manager`.
    pub fn new(element: &'a ProfileElement, manager: &'a ProfileManager) -> Self {
        Self { element, manager }
    }

    /// Kind of the element.
    pub fn kind(&self) -> &'a ElementKind {
        self.element.kind()
    }

    /// Descriptor string, resolved through the owning manager.
    pub fn descriptor(&self) -> Option<&'a str> {
        self.manager
            .descriptors()
            .ok()?
            .resolve(self.element.descriptor())
    }

    /// Blueprint field `key` downcast to `T`.
    pub fn field<T: FieldValue + 'static>(&self, key: &str) -> Option<&'a T> {
        let index = self.manager.blueprint(self.element.kind()).ok()?.index_of(key)?;
        self.element.value_as::<T>(index)
    }

    /// True when the owning profile is an application.
    pub fn is_application(&self) -> bool {
        self.manager.is_application()
    }
}

/// Scores a library element against an application element.
///
/// Implementations return a value in `[0, 1]` and resolve incomparable inputs
/// (missing auxiliary data, empty inputs) to a score instead of failing.
pub trait SimilarityFunction: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Score in `[0, 1]`.
    fn similarity(&self, library: &ElementRef<'_>, application: &ElementRef<'_>) -> f64;
}

/// Build-time computation of auxiliary per-element data.
pub trait BuildStep: Send + Sync {
    /// Name used in logs and build information.
    fn name(&self) -> &str;

    /// Add the fields this step fills to the kind's blueprint.
    fn declare_fields(&self, blueprint: &mut Blueprint) -> Result<()>;

    /// Fill the declared fields of `element` from its extracted features.
    fn process(
        &self,
        element: &mut ProfileElement,
        extracted: &ExtractedElement,
        blueprint: &Blueprint,
    ) -> Result<()>;
}

/// Element kind to similarity function and build step.
///
/// Later registrations for a kind replace earlier ones.
#[derive(Clone)]
pub struct Strategy {
    similarities: HashMap<ElementKind, Arc<dyn SimilarityFunction>>,
    build_steps: HashMap<ElementKind, Arc<dyn BuildStep>>,
    require_descriptor_match: bool,
}

impl Strategy {
    /// Empty strategy that requires matching descriptors.
    pub fn new() -> Self {
        Self {
            similarities: HashMap::new(),
            build_steps: HashMap::new(),
            require_descriptor_match: true,
        }
    }

    /// Strategy with the algorithm configured for each kind.
    pub fn from_config(config: &LibsiftConfig) -> Result<Self> {
        let mut strategy = Self::new();
        strategy.require_descriptor_match = config.matching.require_descriptor_match;
        for (kind, algorithm) in &config.strategies.per_kind {
            algorithms::install(&mut strategy, ElementKind::from_name(kind), *algorithm, config);
        }
        Ok(strategy)
    }

    /// Whether pairs with different descriptors score 0.
    pub fn with_descriptor_match(mut self, required: bool) -> Self {
        self.require_descriptor_match = required;
        self
    }

    /// True when pairs must share a descriptor to score.
    pub fn requires_descriptor_match(&self) -> bool {
        self.require_descriptor_match
    }

    /// Set the similarity function for `kind`, replacing any earlier one.
    pub fn register_similarity(&mut self, kind: ElementKind, function: Arc<dyn SimilarityFunction>) {
        self.similarities.insert(kind, function);
    }

    /// Set the build step for `kind`, replacing any earlier one.
    pub fn register_build_step(&mut self, kind: ElementKind, step: Arc<dyn BuildStep>) {
        self.build_steps.insert(kind, step);
    }

    /// Register an algorithm that both builds its data and scores it.
    pub fn register_algorithm<A>(&mut self, kind: ElementKind, algorithm: Arc<A>)
    where
        A: SimilarityFunction + BuildStep + 'static,
    {
        self.build_steps.insert(kind.clone(), algorithm.clone());
        self.similarities.insert(kind, algorithm);
    }

    /// Similarity function for `kind`; a missing one is a configuration error.
    pub fn similarity_for(&self, kind: &ElementKind) -> Result<&Arc<dyn SimilarityFunction>> {
        self.similarities
            .get(kind)
            .ok_or_else(|| LibsiftError::not_registered("strategy", kind.name()))
    }

    /// Build step for `kind`, if any.
    pub fn build_step_for(&self, kind: &ElementKind) -> Option<&Arc<dyn BuildStep>> {
        self.build_steps.get(kind)
    }

    /// Kinds with a similarity function, sorted by name.
    pub fn kinds(&self) -> Vec<ElementKind> {
        let mut kinds: Vec<ElementKind> = self.similarities.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Compare two elements, ordering them by their managers' application
    /// flags. When both carry the same flag, `a` is the library side.
    pub fn compare(&self, a: &ElementRef<'_>, b: &ElementRef<'_>) -> Result<f64> {
        if a.is_application() && !b.is_application() {
            self.score(b, a)
        } else {
            self.score(a, b)
        }
    }

    /// Score `library` against `application` without reordering.
    ///
    /// Different kinds and, when required, different descriptors score 0.
    /// Fails only if no similarity function is registered for the kind.
    pub fn score(&self, library: &ElementRef<'_>, application: &ElementRef<'_>) -> Result<f64> {
        let function = self.similarity_for(library.kind())?;
        if library.kind() != application.kind() {
            return Ok(0.0);
        }
        if self.require_descriptor_match {
            match (library.descriptor(), application.descriptor()) {
                (Some(l), Some(a)) if l == a => {}
                _ => return Ok(0.0),
            }
        }
        let score = function.similarity(library, application);
        Ok(if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) })
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut similarities: Vec<(&str, &str)> = self
            .similarities
            .iter()
            .map(|(kind, function)| (kind.name(), function.name()))
            .collect();
        similarities.sort();
        f.debug_struct("Strategy")
            .field("similarities", &similarities)
            .field("build_steps", &self.build_steps.len())
            .field("require_descriptor_match", &self.require_descriptor_match)
            .finish()
    }
}

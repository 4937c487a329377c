//! Whole-profile comparison of a library against an application.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::config::{LibsiftConfig, MatchingMode};
use crate::core::errors::Result;
use crate::matching::bipartite::{greedy_assignment, optimal_assignment, Assignment};
use crate::matching::strategy::{ElementRef, Strategy};
use crate::profile::element::ProfileElement;
use crate::profile::kind::ElementKind;
use crate::profile::manager::ProfileManager;
use crate::profile::Profile;

/// Similarity of one element kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindSimilarity {
    /// Kind being compared
    pub kind: ElementKind,
    /// Assignment mode used
    pub mode: MatchingMode,
    /// Minimum score a pair needed
    pub threshold: f64,
    /// Library elements of this kind
    pub library_elements: usize,
    /// Application elements of this kind
    pub application_elements: usize,
    /// Library elements that found a partner
    pub matched: usize,
    /// Sum of matched scores
    pub total_score: f64,
    /// `total_score` over `library_elements`
    pub aggregate: f64,
    /// Pairs behind the aggregate
    #[serde(skip)]
    pub assignment: Assignment,
}

/// Per-kind and overall similarity between two profiles.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSimilarity {
    /// Library label
    pub library: String,
    /// Application label
    pub application: String,
    /// One entry per kind present in the library
    pub kinds: Vec<KindSimilarity>,
    /// Matched weight over library elements, across all kinds
    pub overall: f64,
}

impl ProfileSimilarity {
    /// Result for `kind`, if the library has that kind.
    pub fn kind(&self, kind: &ElementKind) -> Option<&KindSimilarity> {
        self.kinds.iter().find(|k| &k.kind == kind)
    }

    /// Pretty-printed JSON report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compares profiles kind by kind using the library profile's strategy.
#[derive(Debug, Clone, Default)]
pub struct ProfileComparator {
    config: LibsiftConfig,
}

impl ProfileComparator {
    /// Comparator driven by `config`.
    pub fn new(config: LibsiftConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &LibsiftConfig {
        &self.config
    }

    /// Compare two profiles. Which one is the library is decided by the
    /// application flags; with equal flags `a` is the library.
    pub fn compare(&self, a: &Profile, b: &Profile) -> Result<ProfileSimilarity> {
        let (library, application) = if a.is_application() && !b.is_application() {
            (b, a)
        } else {
            (a, b)
        };

        let mut kinds = Vec::new();
        for kind in library.manager().element_kinds() {
            kinds.push(self.compare_kind(library.manager(), application.manager(), &kind)?);
        }

        let library_total: usize = kinds.iter().map(|k| k.library_elements).sum();
        let matched_total: f64 = kinds.iter().map(|k| k.total_score).sum();
        let overall = if library_total == 0 {
            0.0
        } else {
            (matched_total / library_total as f64).min(1.0)
        };

        let result = ProfileSimilarity {
            library: library.label(),
            application: application.label(),
            kinds,
            overall,
        };
        info!(
            library = %result.library,
            application = %result.application,
            overall = result.overall,
            "compared profiles"
        );
        Ok(result)
    }

    /// Match all `kind` elements of `library` against those of
    /// `application`. A kind the application lacks matches nothing.
    pub fn compare_kind(
        &self,
        library: &ProfileManager,
        application: &ProfileManager,
        kind: &ElementKind,
    ) -> Result<KindSimilarity> {
        let strategy = library.strategy();
        let threshold = self.config.thresholds.threshold(kind.name());
        let library_elements = library.elements(kind)?.as_slice();
        let application_elements = application
            .elements(kind)
            .map(|list| list.as_slice())
            .unwrap_or(&[]);

        let weights = self.weight_matrix(
            strategy,
            (library, library_elements),
            (application, application_elements),
            threshold,
        )?;
        let assignment = match self.config.matching.mode {
            MatchingMode::Optimal => optimal_assignment(&weights, application_elements.len())?,
            MatchingMode::Greedy => greedy_assignment(&weights, application_elements.len())?,
        };

        debug!(
            kind = %kind,
            library_elements = library_elements.len(),
            application_elements = application_elements.len(),
            matched = assignment.matched(),
            "compared element kind"
        );
        Ok(KindSimilarity {
            kind: kind.clone(),
            mode: self.config.matching.mode,
            threshold,
            library_elements: library_elements.len(),
            application_elements: application_elements.len(),
            matched: assignment.matched(),
            total_score: assignment.total,
            aggregate: assignment.aggregate(),
            assignment,
        })
    }

    /// `[library][application]` scores with entries below `threshold`
    /// zeroed.
    fn weight_matrix(
        &self,
        strategy: &Strategy,
        (library, library_elements): (&ProfileManager, &[ProfileElement]),
        (application, application_elements): (&ProfileManager, &[ProfileElement]),
        threshold: f64,
    ) -> Result<Vec<Vec<f64>>> {
        let row = |element: &ProfileElement| -> Result<Vec<f64>> {
            let lib = ElementRef::new(element, library);
            application_elements
                .iter()
                .map(|other| {
                    let score = strategy.score(&lib, &ElementRef::new(other, application))?;
                    Ok(if score >= threshold { score } else { 0.0 })
                })
                .collect()
        };

        #[cfg(feature = "parallel")]
        {
            if self.config.matching.parallel {
                return library_elements.par_iter().map(row).collect();
            }
        }
        library_elements.iter().map(row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::profile::builder::{ManagerBuilder, ProfileBuilder};
    use crate::profile::extraction::{ExtractedElement, StaticExtractor};

    fn class(descriptor: &str, tokens: &[&str]) -> ExtractedElement {
        ExtractedElement::new(ElementKind::CLASS, descriptor).with_tokens(tokens.iter().copied())
    }

    fn profile(config: &LibsiftConfig, elements: Vec<ExtractedElement>, is_application: bool) -> Profile {
        let manager = ManagerBuilder::new(config.clone())
            .kinds([ElementKind::CLASS])
            .application(is_application)
            .build()
            .unwrap();
        ProfileBuilder::new(manager)
            .artifact(if is_application { "app" } else { "lib" }, "1")
            .build(&StaticExtractor::new(elements), Path::new("memory"))
            .unwrap()
    }

    fn library_classes() -> Vec<ExtractedElement> {
        vec![
            class("La;", &["a1", "a2", "a3"]),
            class("Lb;", &["b1", "b2"]),
            class("Lc;", &["c1", "c2", "c3", "c4"]),
        ]
    }

    #[test]
    fn test_argument_order_does_not_matter() {
        let config = LibsiftConfig::default();
        let library = profile(&config, library_classes(), false);
        let application = profile(&config, library_classes()[..2].to_vec(), true);
        let comparator = ProfileComparator::new(config);

        let forward = comparator.compare(&library, &application).unwrap();
        let backward = comparator.compare(&application, &library).unwrap();
        assert_eq!(forward.library, "lib@1");
        assert_eq!(backward.library, "lib@1");
        assert_eq!(forward.overall, backward.overall);
    }

    #[test]
    fn test_greedy_mode_and_json_report() {
        let mut config = LibsiftConfig::default();
        config.matching.mode = MatchingMode::Greedy;
        config.matching.parallel = false;
        let library = profile(&config, library_classes(), false);
        let application = profile(&config, library_classes(), true);

        let result = ProfileComparator::new(config).compare(&library, &application).unwrap();
        let class = result.kind(&ElementKind::CLASS).unwrap();
        assert_eq!(class.matched, 3);
        assert_eq!(class.mode, MatchingMode::Greedy);
        assert_eq!(result.overall, 1.0);

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["kinds"][0]["kind"], "class");
        assert_eq!(json["kinds"][0]["mode"], "greedy");
    }

    #[test]
    fn test_missing_kind_in_application_matches_nothing() {
        let config = LibsiftConfig::default();
        let library = profile(&config, library_classes(), false);
        let manager = ManagerBuilder::new(config.clone())
            .kinds([ElementKind::METHOD])
            .application(true)
            .build()
            .unwrap();
        let application = Profile::from_manager(manager);

        let result = ProfileComparator::new(config).compare(&library, &application).unwrap();
        assert_eq!(result.overall, 0.0);
        assert_eq!(result.kind(&ElementKind::CLASS).unwrap().application_elements, 0);
    }
}

//! Ranking known library profiles against an application profile.

use std::io;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::core::config::LibsiftConfig;
use crate::core::errors::{LibsiftError, Result};
use crate::matching::comparator::{ProfileComparator, ProfileSimilarity};
use crate::profile::manager::ProfileManager;
use crate::profile::Profile;

/// A library found in an application.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryMatch {
    /// Artifact name of the library
    pub library: String,
    /// Library version, when recorded
    pub version: Option<String>,
    /// File the library profile came from
    pub source: Option<PathBuf>,
    /// Overall similarity
    pub score: f64,
    /// Per-kind breakdown
    pub similarity: ProfileSimilarity,
}

/// Holds library profiles and ranks them against applications.
#[derive(Debug)]
pub struct LibraryDetector {
    comparator: ProfileComparator,
    libraries: Vec<Profile>,
}

impl LibraryDetector {
    /// Detector with no libraries loaded.
    pub fn new(config: LibsiftConfig) -> Self {
        Self {
            comparator: ProfileComparator::new(config),
            libraries: Vec::new(),
        }
    }

    /// Add a library profile.
    pub fn add(&mut self, library: Profile) {
        self.libraries.push(library);
    }

    /// Loaded library profiles.
    pub fn libraries(&self) -> &[Profile] {
        &self.libraries
    }

    /// Number of loaded libraries.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    /// True when no library is loaded.
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Load every profile under `dir` with the configured extension.
    /// `make_manager` supplies a fresh, equivalently configured manager per
    /// file. Any unreadable profile fails the whole load.
    pub fn load_dir<F>(&mut self, dir: &Path, mut make_manager: F) -> Result<usize>
    where
        F: FnMut() -> Result<ProfileManager>,
    {
        let extension = self.comparator.config().detection.profile_extension.clone();
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| {
                LibsiftError::io(
                    format!("Failed to walk library directory: {}", dir.display()),
                    io::Error::from(e),
                )
            })?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(extension.as_str())
            {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();

        for path in &paths {
            let mut profile = Profile::load(path, make_manager()?)?;
            if profile.is_application() {
                warn!(path = %path.display(), "application profile in library set; treating it as a library");
                profile.manager_mut().set_application(false);
            }
            self.libraries.push(profile);
        }
        info!(dir = %dir.display(), loaded = paths.len(), "loaded library profiles");
        Ok(paths.len())
    }

    /// Libraries scoring at least `detection.min_score`, best first, at
    /// most `detection.max_results` of them (0 keeps all).
    pub fn detect(&self, application: &Profile) -> Result<Vec<LibraryMatch>> {
        let detection = &self.comparator.config().detection;

        let score = |library: &Profile| -> Result<LibraryMatch> {
            let similarity = self.comparator.compare(library, application)?;
            Ok(LibraryMatch {
                library: library
                    .metadata()
                    .filter(|m| !m.artifact.is_empty())
                    .map_or_else(|| library.label(), |m| m.artifact.clone()),
                version: library
                    .metadata()
                    .map(|m| m.version.clone())
                    .filter(|v| !v.is_empty()),
                source: library.source().map(Path::to_path_buf),
                score: similarity.overall,
                similarity,
            })
        };

        let scored = self.score_all(score)?;

        let mut matches: Vec<LibraryMatch> = scored
            .into_iter()
            .filter(|m| m.score >= detection.min_score)
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.library.cmp(&b.library)));
        if detection.max_results > 0 {
            matches.truncate(detection.max_results);
        }

        info!(
            application = %application.label(),
            candidates = self.libraries.len(),
            detected = matches.len(),
            "library detection finished"
        );
        Ok(matches)
    }

    /// Score every library, on the rayon pool when `matching.parallel` is
    /// set and the `parallel` feature is compiled in.
    fn score_all<F>(&self, score: F) -> Result<Vec<LibraryMatch>>
    where
        F: Fn(&Profile) -> Result<LibraryMatch> + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            if self.comparator.config().matching.parallel {
                return self.libraries.par_iter().map(score).collect();
            }
        }
        self.libraries.iter().map(score).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::builder::{ManagerBuilder, ProfileBuilder};
    use crate::profile::extraction::{ExtractedElement, StaticExtractor};
    use crate::profile::kind::ElementKind;

    fn builder(config: &LibsiftConfig, is_application: bool) -> ManagerBuilder {
        ManagerBuilder::new(config.clone())
            .kinds([ElementKind::CLASS])
            .application(is_application)
    }

    fn build(config: &LibsiftConfig, name: &str, classes: &[&str], is_application: bool) -> Profile {
        let elements = classes
            .iter()
            .map(|c| ExtractedElement::new(ElementKind::CLASS, *c).with_tokens([*c, "common"]))
            .collect();
        ProfileBuilder::new(builder(config, is_application).build().unwrap())
            .artifact(name, "1.0")
            .build(&StaticExtractor::new(elements), Path::new(name))
            .unwrap()
    }

    #[test]
    fn test_ranks_and_filters() {
        let config = LibsiftConfig::default();
        let mut detector = LibraryDetector::new(config.clone());
        detector.add(build(&config, "full", &["A", "B"], false));
        detector.add(build(&config, "half", &["A", "Z"], false));
        detector.add(build(&config, "none", &["X", "Y", "Z"], false));

        let application = build(&config, "app", &["A", "B", "C"], true);
        let matches = detector.detect(&application).unwrap();

        let names: Vec<&str> = matches.iter().map(|m| m.library.as_str()).collect();
        assert_eq!(names, vec!["full", "half"]);
        assert_eq!(matches[0].score, 1.0);
        assert_eq!(matches[1].version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_sequential_detection_matches_parallel() {
        let mut config = LibsiftConfig::default();
        let libraries = [("full", &["A", "B"][..]), ("half", &["A", "Z"][..])];
        let application = build(&config, "app", &["A", "B", "C"], true);

        let mut parallel = LibraryDetector::new(config.clone());
        config.matching.parallel = false;
        let mut sequential = LibraryDetector::new(config.clone());
        for (name, classes) in libraries {
            parallel.add(build(&config, name, classes, false));
            sequential.add(build(&config, name, classes, false));
        }

        let ranked = |detector: &LibraryDetector| -> Vec<(String, f64)> {
            detector
                .detect(&application)
                .unwrap()
                .into_iter()
                .map(|m| (m.library, m.score))
                .collect()
        };
        assert_eq!(ranked(&sequential), ranked(&parallel));
        assert!(!sequential.comparator.config().matching.parallel);
    }

    #[test]
    fn test_load_dir_reads_profiles_with_extension() {
        let config = LibsiftConfig::default();
        let dir = tempfile::tempdir().unwrap();
        build(&config, "lib-a", &["A"], false)
            .save(dir.path().join("a.sift"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut detector = LibraryDetector::new(config.clone());
        let loaded = detector
            .load_dir(dir.path(), || builder(&config, false).build())
            .unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(detector.libraries()[0].label(), "lib-a@1.0");
        assert!(detector.libraries()[0].source().is_some());
    }
}

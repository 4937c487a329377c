//! Configuration types and management for libsift-rs.
//!
//! Every tunable the matching engine consults (per-kind thresholds, the LSH
//! acceptance bound, filter geometry, the algorithm bound to each element
//! kind) lives here and is passed down explicitly. Nothing is read from
//! global state.

pub mod validation;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{LibsiftError, Result};

pub use validation::{validate_positive_usize, validate_unit_range};

/// Main configuration for the fingerprinting and matching engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LibsiftConfig {
    /// Per-kind acceptance thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Similarity algorithm bound to each element kind
    #[serde(default)]
    pub strategies: StrategyConfig,

    /// Locality-sensitive digest settings
    #[serde(default)]
    pub lsh: LshDifferenceConfig,

    /// Approximate membership filter geometry
    #[serde(default)]
    pub bloom: BloomConfig,

    /// Rolling window hash settings
    #[serde(default)]
    pub rolling_hash: RollingHashConfig,

    /// Integer feature vector settings
    #[serde(default)]
    pub feature_vector: FeatureVectorConfig,

    /// Correspondence and assignment settings
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Library detection settings
    #[serde(default)]
    pub detection: DetectionConfig,
}

/// Configuration I/O and validation for [`LibsiftConfig`].
impl LibsiftConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            LibsiftError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            LibsiftError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.lsh.validate()?;
        self.bloom.validate()?;
        self.rolling_hash.validate()?;
        self.feature_vector.validate()?;
        self.detection.validate()?;
        Ok(())
    }
}

/// Minimum similarity required to accept a match, per element kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Threshold used for kinds without an explicit entry
    pub default: f64,

    /// Explicit thresholds keyed by element kind name
    #[serde(default)]
    pub per_kind: BTreeMap<String, f64>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let mut per_kind = BTreeMap::new();
        per_kind.insert("class".to_string(), 0.7);
        per_kind.insert("method".to_string(), 0.8);
        Self {
            default: 0.5,
            per_kind,
        }
    }
}

impl ThresholdConfig {
    /// Uniform threshold for every kind.
    pub fn uniform(threshold: f64) -> Self {
        Self {
            default: threshold,
            per_kind: BTreeMap::new(),
        }
    }

    /// Threshold for the given kind name, falling back to the default.
    pub fn threshold(&self, kind: &str) -> f64 {
        self.per_kind.get(kind).copied().unwrap_or(self.default)
    }

    /// Set the threshold for one kind.
    pub fn with_kind(mut self, kind: impl Into<String>, threshold: f64) -> Self {
        self.per_kind.insert(kind.into(), threshold);
        self
    }

    /// Validate that every threshold is a score in [0, 1]
    pub fn validate(&self) -> Result<()> {
        validate_unit_range(self.default, "thresholds.default")?;
        for (kind, value) in &self.per_kind {
            validate_unit_range(*value, &format!("thresholds.per_kind.{kind}"))?;
        }
        Ok(())
    }
}

/// Fuzzy algorithms that can be bound to an element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Approximate set membership over a bloom filter
    Bloom,
    /// Overlap of rolling window hashes
    RollingHash,
    /// L1 distance between integer feature vectors
    FeatureVector,
    /// Difference between locality-sensitive digests
    LshDigest,
}

/// Mapping from element kind name to the algorithm comparing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Algorithm per element kind name
    pub per_kind: BTreeMap<String, AlgorithmKind>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let mut per_kind = BTreeMap::new();
        per_kind.insert("class".to_string(), AlgorithmKind::Bloom);
        per_kind.insert("method".to_string(), AlgorithmKind::LshDigest);
        per_kind.insert("field".to_string(), AlgorithmKind::FeatureVector);
        per_kind.insert("package".to_string(), AlgorithmKind::RollingHash);
        Self { per_kind }
    }
}

/// Locality-sensitive digest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LshDifferenceConfig {
    /// Differences at or above this bound score 0
    pub upper_bound: u32,

    /// Fewer tokens than this and no digest is computed
    pub min_tokens: usize,
}

impl Default for LshDifferenceConfig {
    fn default() -> Self {
        Self {
            upper_bound: 100,
            min_tokens: 8,
        }
    }
}

impl LshDifferenceConfig {
    /// Validate LSH digest configuration
    pub fn validate(&self) -> Result<()> {
        if self.upper_bound == 0 {
            return Err(LibsiftError::validation_field(
                "lsh.upper_bound must be greater than 0",
                "lsh.upper_bound",
            ));
        }
        validate_positive_usize(self.min_tokens, "lsh.min_tokens")
    }
}

/// Bloom filter geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomConfig {
    /// Filter size in bits
    pub num_bits: usize,

    /// Number of hash functions per inserted token
    pub num_hashes: u32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            num_bits: 1024,
            num_hashes: 3,
        }
    }
}

impl BloomConfig {
    /// Validate the filter geometry
    pub fn validate(&self) -> Result<()> {
        validate_positive_usize(self.num_bits, "bloom.num_bits")?;
        if self.num_hashes == 0 {
            return Err(LibsiftError::validation_field(
                "bloom.num_hashes must be greater than 0",
                "bloom.num_hashes",
            ));
        }
        Ok(())
    }
}

/// Rolling hash configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingHashConfig {
    /// Number of consecutive tokens covered by one window hash
    pub window: usize,
}

impl Default for RollingHashConfig {
    fn default() -> Self {
        Self { window: 4 }
    }
}

impl RollingHashConfig {
    /// Validate the window size
    pub fn validate(&self) -> Result<()> {
        validate_positive_usize(self.window, "rolling_hash.window")
    }
}

/// Integer feature vector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVectorConfig {
    /// Fixed dimension every vector is padded or truncated to
    pub dimension: usize,
}

impl Default for FeatureVectorConfig {
    fn default() -> Self {
        Self { dimension: 16 }
    }
}

impl FeatureVectorConfig {
    /// Validate the vector dimension
    pub fn validate(&self) -> Result<()> {
        validate_positive_usize(self.dimension, "feature_vector.dimension")
    }
}

/// How whole collections are put into correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    /// Best match per application element; a library element may be reused
    Greedy,
    /// Maximum-weight one-to-one assignment
    Optimal,
}

/// Correspondence and assignment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Collection matching mode
    pub mode: MatchingMode,

    /// Elements whose descriptors differ score 0 without consulting the algorithm
    pub require_descriptor_match: bool,

    /// Build similarity matrices with rayon
    pub parallel: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            mode: MatchingMode::Optimal,
            require_descriptor_match: true,
            parallel: true,
        }
    }
}

/// Library detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum overall similarity for a library to be reported
    pub min_score: f64,

    /// Maximum number of libraries reported (0 = unlimited)
    pub max_results: usize,

    /// File extension of persisted library profiles
    pub profile_extension: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_score: 0.3,
            max_results: 10,
            profile_extension: "sift".to_string(),
        }
    }
}

impl DetectionConfig {
    /// Validate detection settings
    pub fn validate(&self) -> Result<()> {
        validate_unit_range(self.min_score, "detection.min_score")?;
        if self.profile_extension.is_empty() {
            return Err(LibsiftError::config_field(
                "profile extension must not be empty",
                "detection.profile_extension",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LibsiftConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.threshold("class"), 0.7);
        assert_eq!(config.thresholds.threshold("package"), 0.5);
        assert_eq!(
            config.strategies.per_kind.get("method"),
            Some(&AlgorithmKind::LshDigest)
        );
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = LibsiftConfig::default();
        config.thresholds.per_kind.insert("class".to_string(), 1.5);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thresholds.per_kind.class"));
    }

    #[test]
    fn test_zero_lsh_bound_rejected() {
        let mut config = LibsiftConfig::default();
        config.lsh.upper_bound = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libsift.yml");

        let mut config = LibsiftConfig::default();
        config.thresholds = ThresholdConfig::uniform(0.4).with_kind("field", 0.9);
        config.matching.mode = MatchingMode::Greedy;
        config.to_yaml_file(&path).unwrap();

        let loaded = LibsiftConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.thresholds.threshold("field"), 0.9);
        assert_eq!(loaded.thresholds.threshold("class"), 0.4);
        assert_eq!(loaded.matching.mode, MatchingMode::Greedy);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "lsh:\n  upper_bound: 40\n  min_tokens: 4\n";
        let config: LibsiftConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.lsh.upper_bound, 40);
        assert_eq!(config.bloom.num_bits, 1024);
        assert_eq!(config.matching.mode, MatchingMode::Optimal);
    }
}

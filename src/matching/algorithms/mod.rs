//! Pluggable fuzzy similarity algorithms.
//!
//! Each algorithm is both a [`BuildStep`](crate::matching::strategy::BuildStep),
//! which derives one blueprint field from an element's extracted features,
//! and a [`SimilarityFunction`](crate::matching::strategy::SimilarityFunction)
//! over that field.

pub mod bloom;
pub mod feature_vector;
pub mod lsh_digest;
pub mod rolling_hash;

use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::codec::registry::TypeRegistry;
use crate::core::config::{AlgorithmKind, LibsiftConfig};
use crate::matching::strategy::Strategy;
use crate::profile::kind::ElementKind;

pub use bloom::{BloomFilter, BloomSimilarity};
pub use feature_vector::FeatureVectorSimilarity;
pub use lsh_digest::{LshDigest, LshDigestSimilarity};
pub use rolling_hash::RollingHashSimilarity;

/// Register the value types the bundled algorithms store in profiles.
pub(crate) fn register_value_types(registry: &mut TypeRegistry) {
    registry.register_builtin::<BloomFilter>();
    registry.register_builtin::<LshDigest>();
}

/// Bind the configured algorithm to `kind`.
pub fn install(strategy: &mut Strategy, kind: ElementKind, algorithm: AlgorithmKind, config: &LibsiftConfig) {
    match algorithm {
        AlgorithmKind::Bloom => {
            strategy.register_algorithm(kind, Arc::new(BloomSimilarity::new(config.bloom.clone())))
        }
        AlgorithmKind::RollingHash => strategy.register_algorithm(
            kind,
            Arc::new(RollingHashSimilarity::new(config.rolling_hash.clone())),
        ),
        AlgorithmKind::FeatureVector => strategy.register_algorithm(
            kind,
            Arc::new(FeatureVectorSimilarity::new(config.feature_vector.clone())),
        ),
        AlgorithmKind::LshDigest => {
            strategy.register_algorithm(kind, Arc::new(LshDigestSimilarity::new(config.lsh.clone())))
        }
    }
}

/// Seeded 64-bit token hash shared by the token-based algorithms.
pub(crate) fn token_hash(token: &str, seed: u64) -> u64 {
    xxh3_64_with_seed(token.as_bytes(), seed)
}

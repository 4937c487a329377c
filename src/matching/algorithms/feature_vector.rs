//! L1 distance between fixed-dimension integer feature vectors.

use crate::codec::registry::factory_of;
use crate::codec::values::IntVectorValue;
use crate::core::config::FeatureVectorConfig;
use crate::core::errors::Result;
use crate::matching::strategy::{BuildStep, ElementRef, SimilarityFunction};
use crate::profile::blueprint::Blueprint;
use crate::profile::element::ProfileElement;
use crate::profile::extraction::ExtractedElement;

/// Manhattan distance; `None` when the dimensions differ.
pub fn l1_distance(a: &[i32], b: &[i32]) -> Option<u64> {
    (a.len() == b.len()).then(|| {
        a.iter()
            .zip(b)
            .map(|(x, y)| (i64::from(*x) - i64::from(*y)).unsigned_abs())
            .sum()
    })
}

/// Feature vector build step; similarity is `1 / (1 + L1)`.
#[derive(Debug, Clone, Default)]
pub struct FeatureVectorSimilarity {
    config: FeatureVectorConfig,
}

impl FeatureVectorSimilarity {
    /// Blueprint field holding the vector.
    pub const FIELD: &'static str = "feature_vector";

    /// Algorithm with the configured dimension.
    pub fn new(config: FeatureVectorConfig) -> Self {
        Self { config }
    }

    /// Pad with zeros or truncate to the configured dimension.
    pub fn fit(&self, vector: &[i32]) -> IntVectorValue {
        let mut fitted = vector.to_vec();
        fitted.resize(self.config.dimension, 0);
        IntVectorValue(fitted)
    }
}

impl BuildStep for FeatureVectorSimilarity {
    fn name(&self) -> &str {
        "feature_vector"
    }

    fn declare_fields(&self, blueprint: &mut Blueprint) -> Result<()> {
        blueprint.add_field(Self::FIELD, factory_of::<IntVectorValue>)?;
        Ok(())
    }

    fn process(
        &self,
        element: &mut ProfileElement,
        extracted: &ExtractedElement,
        blueprint: &Blueprint,
    ) -> Result<()> {
        let vector = self.fit(&extracted.vector);
        element.set_value(blueprint.require_index(Self::FIELD)?, Box::new(vector))
    }
}

impl SimilarityFunction for FeatureVectorSimilarity {
    fn name(&self) -> &str {
        "feature_vector"
    }

    fn similarity(&self, library: &ElementRef<'_>, application: &ElementRef<'_>) -> f64 {
        let (Some(lib), Some(app)) = (
            library.field::<IntVectorValue>(Self::FIELD),
            application.field::<IntVectorValue>(Self::FIELD),
        ) else {
            return 0.0;
        };
        match l1_distance(&lib.0, &app.0) {
            Some(distance) => 1.0 / (1.0 + distance as f64),
            None => 0.0,
        }
    }
}

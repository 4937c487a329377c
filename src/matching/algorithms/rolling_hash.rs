//! Overlap of rolling window hashes.

use crate::codec::registry::factory_of;
use crate::codec::values::HashSetValue;
use crate::core::config::RollingHashConfig;
use crate::core::errors::Result;
use crate::matching::algorithms::token_hash;
use crate::matching::strategy::{BuildStep, ElementRef, SimilarityFunction};
use crate::profile::blueprint::Blueprint;
use crate::profile::element::ProfileElement;
use crate::profile::extraction::ExtractedElement;

const BASE: u64 = 0x0000_0100_0000_01b3;

/// Hash every `window`-token window of `tokens` with a polynomial rolling
/// hash. Streams shorter than the window contribute a single hash over the
/// whole stream; an empty stream contributes nothing.
pub fn window_hashes(tokens: &[String], window: usize) -> HashSetValue {
    if tokens.is_empty() {
        return HashSetValue::default();
    }
    let hashes: Vec<u64> = tokens.iter().map(|t| token_hash(t, 0)).collect();
    let window = window.max(1).min(hashes.len());

    // BASE^(window-1), used to drop the outgoing token.
    let outgoing_weight = (1..window).fold(1u64, |acc, _| acc.wrapping_mul(BASE));

    let mut rolling = hashes[..window]
        .iter()
        .fold(0u64, |acc, h| acc.wrapping_mul(BASE).wrapping_add(*h));
    let mut windows = Vec::with_capacity(hashes.len() - window + 1);
    windows.push(rolling);
    for i in window..hashes.len() {
        rolling = rolling
            .wrapping_sub(hashes[i - window].wrapping_mul(outgoing_weight))
            .wrapping_mul(BASE)
            .wrapping_add(hashes[i]);
        windows.push(rolling);
    }
    HashSetValue::from_hashes(windows)
}

/// Window hash build step; similarity is `|lib ∩ app| / |lib|`.
#[derive(Debug, Clone, Default)]
pub struct RollingHashSimilarity {
    config: RollingHashConfig,
}

impl RollingHashSimilarity {
    /// Blueprint field holding the window hashes.
    pub const FIELD: &'static str = "window_hashes";

    /// Algorithm with the configured window length.
    pub fn new(config: RollingHashConfig) -> Self {
        Self { config }
    }
}

impl BuildStep for RollingHashSimilarity {
    fn name(&self) -> &str {
        "rolling_hash"
    }

    fn declare_fields(&self, blueprint: &mut Blueprint) -> Result<()> {
        blueprint.add_field(Self::FIELD, factory_of::<HashSetValue>)?;
        Ok(())
    }

    fn process(
        &self,
        element: &mut ProfileElement,
        extracted: &ExtractedElement,
        blueprint: &Blueprint,
    ) -> Result<()> {
        let hashes = window_hashes(&extracted.tokens, self.config.window);
        element.set_value(blueprint.require_index(Self::FIELD)?, Box::new(hashes))
    }
}

impl SimilarityFunction for RollingHashSimilarity {
    fn name(&self) -> &str {
        "rolling_hash"
    }

    fn similarity(&self, library: &ElementRef<'_>, application: &ElementRef<'_>) -> f64 {
        let (Some(lib), Some(app)) = (
            library.field::<HashSetValue>(Self::FIELD),
            application.field::<HashSetValue>(Self::FIELD),
        ) else {
            return 0.0;
        };
        match (lib.is_empty(), app.is_empty()) {
            (true, true) => 1.0,
            (true, false) => 0.0,
            _ => lib.intersection_len(app) as f64 / lib.len() as f64,
        }
    }
}

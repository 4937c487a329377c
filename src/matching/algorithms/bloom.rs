//! Approximate set membership over a fixed-size bloom filter.
//!
//! A library element can only contain an application element if the
//! library filter is a bit-superset of the application filter. Bloom filters
//! admit false positives but never false negatives, so a failed superset
//! test is conclusive.

use bitvec::prelude::*;

use crate::codec::registry::{factory_of, TypeRegistry};
use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::codec::values::{FieldValue, TypedValue};
use crate::core::config::BloomConfig;
use crate::core::errors::Result;
use crate::matching::algorithms::token_hash;
use crate::matching::strategy::{BuildStep, ElementRef, SimilarityFunction};
use crate::profile::blueprint::Blueprint;
use crate::profile::element::ProfileElement;
use crate::profile::extraction::ExtractedElement;

const PRIMARY_SEED: u64 = 0;
const SECONDARY_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Fixed-size bloom filter with double hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BloomFilter {
    bits: BitVec<u64, Lsb0>,
    num_hashes: u32,
}

impl BloomFilter {
    /// Empty filter of `num_bits` bits, setting `num_hashes` bits per token.
    pub fn new(num_bits: usize, num_hashes: u32) -> Self {
        Self {
            bits: bitvec![u64, Lsb0; 0; num_bits],
            num_hashes,
        }
    }

    /// Filter sized from `config` holding every token.
    pub fn from_tokens<'t>(config: &BloomConfig, tokens: impl IntoIterator<Item = &'t str>) -> Self {
        let mut filter = Self::new(config.num_bits, config.num_hashes);
        for token in tokens {
            filter.insert(token);
        }
        filter
    }

    fn positions(&self, token: &str) -> impl Iterator<Item = usize> {
        let len = self.bits.len() as u64;
        let h1 = token_hash(token, PRIMARY_SEED);
        let h2 = token_hash(token, SECONDARY_SEED) | 1;
        (0..u64::from(self.num_hashes))
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % len.max(1)) as usize)
    }

    /// Add a token. A zero-width filter ignores it.
    pub fn insert(&mut self, token: &str) {
        if self.bits.is_empty() {
            return;
        }
        let positions: Vec<usize> = self.positions(token).collect();
        for position in positions {
            self.bits.set(position, true);
        }
    }

    /// Membership test; may report false positives.
    pub fn contains(&self, token: &str) -> bool {
        !self.bits.is_empty() && self.positions(token).all(|position| self.bits[position])
    }

    /// Number of set bits.
    pub fn occupancy(&self) -> usize {
        self.bits.count_ones()
    }

    /// Width of the filter in bits.
    pub fn num_bits(&self) -> usize {
        self.bits.len()
    }

    /// Bits set per token.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// True if every bit set in `other` is also set here. Filters of
    /// different geometry are never in a superset relation.
    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.bits.len() == other.bits.len()
            && self.num_hashes == other.num_hashes
            && other.bits.iter_ones().all(|position| self.bits[position])
    }
}

impl FieldValue for BloomFilter {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, _registry: &TypeRegistry) -> Result<()> {
        writer.write_len(self.bits.len())?;
        writer.write_varint(u64::from(self.num_hashes))?;
        let words = self.bits.as_raw_slice();
        writer.write_len(words.len())?;
        for word in words {
            writer.write_u64(*word)?;
        }
        Ok(())
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, _registry: &TypeRegistry) -> Result<()> {
        let num_bits = reader.read_len()?;
        let num_hashes = reader.read_index()?;
        let word_count = reader.read_len()?;
        if word_count != num_bits.div_ceil(64) {
            return Err(reader.error(format!(
                "bloom filter of {num_bits} bits cannot span {word_count} words"
            )));
        }
        let mut words = Vec::with_capacity(word_count.min(1 << 16));
        for _ in 0..word_count {
            words.push(reader.read_u64()?);
        }
        let mut bits = BitVec::<u64, Lsb0>::from_vec(words);
        if bits[num_bits..].any() {
            return Err(reader.error("bloom filter has bits set past its length"));
        }
        bits.truncate(num_bits);
        self.bits = bits;
        self.num_hashes = num_hashes;
        Ok(())
    }
}

impl TypedValue for BloomFilter {
    const TYPE_NAME: &'static str = "libsift.bloom_filter";
}

/// Bloom filter build step and superset similarity.
#[derive(Debug, Clone, Default)]
pub struct BloomSimilarity {
    config: BloomConfig,
}

impl BloomSimilarity {
    /// Blueprint field holding the filter.
    pub const FIELD: &'static str = "bloom";

    /// Algorithm building filters of the configured shape.
    pub fn new(config: BloomConfig) -> Self {
        Self { config }
    }
}

impl BuildStep for BloomSimilarity {
    fn name(&self) -> &str {
        "bloom"
    }

    fn declare_fields(&self, blueprint: &mut Blueprint) -> Result<()> {
        blueprint.add_field(Self::FIELD, factory_of::<BloomFilter>)?;
        Ok(())
    }

    fn process(
        &self,
        element: &mut ProfileElement,
        extracted: &ExtractedElement,
        blueprint: &Blueprint,
    ) -> Result<()> {
        let filter = BloomFilter::from_tokens(&self.config, extracted.tokens.iter().map(String::as_str));
        element.set_value(blueprint.require_index(Self::FIELD)?, Box::new(filter))
    }
}

impl SimilarityFunction for BloomSimilarity {
    fn name(&self) -> &str {
        "bloom"
    }

    fn similarity(&self, library: &ElementRef<'_>, application: &ElementRef<'_>) -> f64 {
        let (Some(lib), Some(app)) = (
            library.field::<BloomFilter>(Self::FIELD),
            application.field::<BloomFilter>(Self::FIELD),
        ) else {
            return 0.0;
        };
        if !lib.is_superset_of(app) {
            return 0.0;
        }
        match lib.occupancy() {
            0 => 1.0,
            occupied => app.occupancy() as f64 / occupied as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BloomConfig {
        BloomConfig {
            num_bits: 256,
            num_hashes: 3,
        }
    }

    #[test]
    fn test_no_false_negatives() {
        let tokens = ["aload_0", "invokespecial", "return", "getfield"];
        let filter = BloomFilter::from_tokens(&config(), tokens);
        assert!(tokens.iter().all(|t| filter.contains(t)));
        assert!(filter.occupancy() <= tokens.len() * 3);
    }

    #[test]
    fn test_superset_implies_membership() {
        let lib_tokens = ["a", "b", "c", "d", "e", "f"];
        let app_tokens = ["b", "d", "f"];
        let lib = BloomFilter::from_tokens(&config(), lib_tokens);
        let app = BloomFilter::from_tokens(&config(), app_tokens);

        assert!(lib.is_superset_of(&app));
        for token in app_tokens {
            assert!(app.contains(token));
            assert!(lib.contains(token));
        }
        assert!(!app.is_superset_of(&lib));
    }

    #[test]
    fn test_geometry_mismatch_is_not_superset() {
        let small = BloomFilter::new(128, 3);
        let large = BloomFilter::new(256, 3);
        assert!(!large.is_superset_of(&small));
        assert!(!BloomFilter::new(128, 2).is_superset_of(&small));
    }

    #[test]
    fn test_encoding_preserves_bits() {
        let registry = TypeRegistry::with_defaults();
        let filter = BloomFilter::from_tokens(
            &BloomConfig {
                num_bits: 100,
                num_hashes: 2,
            },
            ["x", "y", "z"],
        );
        let mut buf = Vec::new();
        filter
            .encode(&mut ProfileWriter::new(&mut buf), &registry)
            .unwrap();

        let mut decoded = BloomFilter::default();
        decoded
            .decode(&mut ProfileReader::new(&mut &buf[..]), &registry)
            .unwrap();
        assert_eq!(decoded, filter);
        assert_eq!(decoded.num_bits(), 100);
    }

    #[test]
    fn test_bits_past_length_are_rejected() {
        let registry = TypeRegistry::with_defaults();
        let mut buf = Vec::new();
        {
            let mut writer = ProfileWriter::new(&mut buf);
            writer.write_len(4).unwrap();
            writer.write_varint(1).unwrap();
            writer.write_len(1).unwrap();
            writer.write_u64(1 << 10).unwrap();
        }
        let err = BloomFilter::default()
            .decode(&mut ProfileReader::new(&mut &buf[..]), &registry)
            .unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_empty_filter_is_inert() {
        let mut filter = BloomFilter::default();
        filter.insert("x");
        assert!(!filter.contains("x"));
        assert_eq!(filter.occupancy(), 0);
    }
}

//! Locality-sensitive digests over token streams.
//!
//! The digest follows the TLSH construction: token trigrams are hashed into
//! 128 buckets, each bucket count is quantized to a 2-bit code relative to
//! the quartiles of all counts, and a coarse log-scaled length class is kept
//! alongside. Two digests are compared by a distance where small length
//! differences are cheap and large ones dominate.

use std::fmt;

use xxhash_rust::xxh3::xxh3_64;

use crate::codec::registry::{factory_of, TypeRegistry};
use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::codec::values::{FieldValue, TypedValue};
use crate::core::config::LshDifferenceConfig;
use crate::core::errors::Result;
use crate::matching::algorithms::token_hash;
use crate::matching::strategy::{BuildStep, ElementRef, SimilarityFunction};
use crate::profile::blueprint::Blueprint;
use crate::profile::element::ProfileElement;
use crate::profile::extraction::ExtractedElement;

const BUCKETS: usize = 128;
const CODE_BYTES: usize = BUCKETS / 4;
const LENGTH_PENALTY: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DigestBody {
    length_class: u8,
    codes: [u8; CODE_BYTES],
}

/// A locality-sensitive digest, absent when the token stream was too short
/// or too uniform to produce one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LshDigest(Option<DigestBody>);

impl LshDigest {
    /// Digest of `tokens`; absent with fewer than `min_tokens` (and never
    /// fewer than 3) tokens.
    pub fn compute(tokens: &[String], min_tokens: usize) -> Self {
        if tokens.len() < min_tokens.max(3) {
            return Self(None);
        }

        let hashes: Vec<u64> = tokens.iter().map(|t| token_hash(t, 0)).collect();
        let mut counts = [0u32; BUCKETS];
        for window in hashes.windows(3) {
            let (a, b, c) = (window[0], window[1], window[2]);
            for mixed in [mix(&[a, b, c]), mix(&[a, b]), mix(&[a, c])] {
                counts[(mixed % BUCKETS as u64) as usize] += 1;
            }
        }

        let mut sorted = counts;
        sorted.sort_unstable();
        let (q1, q2, q3) = (
            sorted[BUCKETS / 4 - 1],
            sorted[BUCKETS / 2 - 1],
            sorted[3 * BUCKETS / 4 - 1],
        );
        if q3 == 0 {
            return Self(None);
        }

        let mut codes = [0u8; CODE_BYTES];
        for (bucket, count) in counts.iter().enumerate() {
            let code = match *count {
                c if c <= q1 => 0,
                c if c <= q2 => 1,
                c if c <= q3 => 2,
                _ => 3,
            };
            codes[bucket / 4] |= code << ((bucket % 4) * 2);
        }

        Self(Some(DigestBody {
            length_class: length_class(tokens.len()),
            codes,
        }))
    }

    /// False when the token stream was too short or too uniform to digest.
    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    /// Distance between two present digests; `None` if either is absent.
    pub fn difference(&self, other: &Self) -> Option<u32> {
        let (a, b) = (self.0.as_ref()?, other.0.as_ref()?);

        let length = u32::from(a.length_class.abs_diff(b.length_class));
        let mut total = if length <= 1 {
            length
        } else {
            length * LENGTH_PENALTY
        };

        for (&x, &y) in a.codes.iter().zip(&b.codes) {
            for shift in (0..8).step_by(2) {
                total += match ((x >> shift) & 3).abs_diff((y >> shift) & 3) {
                    3 => 6,
                    d => u32::from(d),
                };
            }
        }
        Some(total)
    }
}

impl fmt::Display for LshDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("-"),
            Some(body) => {
                write!(f, "{:02X}", body.length_class)?;
                body.codes.iter().try_for_each(|b| write!(f, "{b:02X}"))
            }
        }
    }
}

fn mix(parts: &[u64]) -> u64 {
    let mut bytes = Vec::with_capacity(parts.len() * 8);
    for part in parts {
        bytes.extend_from_slice(&part.to_le_bytes());
    }
    xxh3_64(&bytes)
}

/// Four classes per doubling of the stream length.
fn length_class(len: usize) -> u8 {
    ((len.max(1) as f64).log2() * 4.0).floor().min(255.0) as u8
}

impl FieldValue for LshDigest {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, _registry: &TypeRegistry) -> Result<()> {
        writer.write_bool(self.0.is_some())?;
        if let Some(body) = &self.0 {
            writer.write_u8(body.length_class)?;
            writer.write_bytes(&body.codes)?;
        }
        Ok(())
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, _registry: &TypeRegistry) -> Result<()> {
        self.0 = if reader.read_bool()? {
            let length_class = reader.read_u8()?;
            let mut codes = [0u8; CODE_BYTES];
            reader.read_exact(&mut codes)?;
            Some(DigestBody {
                length_class,
                codes,
            })
        } else {
            None
        };
        Ok(())
    }
}

impl TypedValue for LshDigest {
    const TYPE_NAME: &'static str = "libsift.lsh_digest";
}

/// Digest build step with bounded linear-decay similarity.
#[derive(Debug, Clone, Default)]
pub struct LshDigestSimilarity {
    config: LshDifferenceConfig,
}

impl LshDigestSimilarity {
    /// Blueprint field holding the digest.
    pub const FIELD: &'static str = "lsh_digest";

    /// Algorithm with the configured bound and minimum stream length.
    pub fn new(config: LshDifferenceConfig) -> Self {
        Self { config }
    }

    /// Map a digest pair to `[0, 1]`: both absent is a match, one absent is
    /// not, otherwise linear decay to 0 at the configured bound.
    pub fn score(&self, library: &LshDigest, application: &LshDigest) -> f64 {
        match (library.is_present(), application.is_present()) {
            (false, false) => return 1.0,
            (true, false) | (false, true) => return 0.0,
            (true, true) => {}
        }
        let bound = self.config.upper_bound.max(1);
        match library.difference(application) {
            Some(0) => 1.0,
            Some(diff) if diff < bound => 1.0 - f64::from(diff) / f64::from(bound),
            _ => 0.0,
        }
    }
}

impl BuildStep for LshDigestSimilarity {
    fn name(&self) -> &str {
        "lsh_digest"
    }

    fn declare_fields(&self, blueprint: &mut Blueprint) -> Result<()> {
        blueprint.add_field(Self::FIELD, factory_of::<LshDigest>)?;
        Ok(())
    }

    fn process(
        &self,
        element: &mut ProfileElement,
        extracted: &ExtractedElement,
        blueprint: &Blueprint,
    ) -> Result<()> {
        let digest = LshDigest::compute(&extracted.tokens, self.config.min_tokens);
        element.set_value(blueprint.require_index(Self::FIELD)?, Box::new(digest))
    }
}

impl SimilarityFunction for LshDigestSimilarity {
    fn name(&self) -> &str {
        "lsh_digest"
    }

    fn similarity(&self, library: &ElementRef<'_>, application: &ElementRef<'_>) -> f64 {
        match (
            library.field::<LshDigest>(Self::FIELD),
            application.field::<LshDigest>(Self::FIELD),
        ) {
            (Some(lib), Some(app)) => self.score(lib, app),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stream(len: usize, salt: usize) -> Vec<String> {
        (0..len).map(|i| format!("op{}", (i * 7 + salt) % 23)).collect()
    }

    #[test]
    fn test_short_streams_have_no_digest() {
        assert!(!LshDigest::compute(&stream(5, 0), 8).is_present());
        assert!(!LshDigest::compute(&stream(2, 0), 0).is_present());
        assert!(LshDigest::compute(&stream(400, 0), 8).is_present());
    }

    #[test]
    fn test_identical_streams_have_zero_difference() {
        let a = LshDigest::compute(&stream(300, 1), 8);
        let b = LshDigest::compute(&stream(300, 1), 8);
        assert_eq!(a.difference(&b), Some(0));
        assert_eq!(a.to_string().len(), 2 + 2 * CODE_BYTES);
    }

    #[test]
    fn test_small_edit_is_closer_than_unrelated_stream() {
        let base = stream(300, 1);
        let mut edited = base.clone();
        edited[150] = "nop".into();
        let unrelated: Vec<String> = (0..300).map(|i| format!("x{}", i % 41)).collect();

        let base = LshDigest::compute(&base, 8);
        let near = base.difference(&LshDigest::compute(&edited, 8)).unwrap();
        let far = base.difference(&LshDigest::compute(&unrelated, 8)).unwrap();
        assert!(near < far, "near {near} should be below far {far}");
    }

    #[test]
    fn test_length_class() {
        assert_eq!(length_class(16), 16);
        assert_eq!(length_class(32), 20);
    }

    #[test]
    fn test_score_mapping() {
        let similarity = LshDigestSimilarity::new(LshDifferenceConfig {
            upper_bound: 100,
            min_tokens: 8,
        });
        let absent = LshDigest::default();
        let present = LshDigest::compute(&stream(300, 1), 8);

        assert_eq!(similarity.score(&absent, &absent), 1.0);
        assert_eq!(similarity.score(&present, &absent), 0.0);
        assert_eq!(similarity.score(&absent, &present), 0.0);
        assert_eq!(similarity.score(&present, &present), 1.0);

        let mut shifted = present;
        if let Some(body) = shifted.0.as_mut() {
            body.codes[0] ^= 0b01;
        }
        let diff = present.difference(&shifted).unwrap();
        assert_relative_eq!(
            similarity.score(&present, &shifted),
            1.0 - f64::from(diff) / 100.0
        );
    }

    #[test]
    fn test_encoding_round_trip_of_absent_and_present() {
        let registry = TypeRegistry::with_defaults();
        for digest in [LshDigest::default(), LshDigest::compute(&stream(200, 3), 8)] {
            let mut buf = Vec::new();
            digest
                .encode(&mut ProfileWriter::new(&mut buf), &registry)
                .unwrap();
            let mut decoded = LshDigest::default();
            decoded
                .decode(&mut ProfileReader::new(&mut &buf[..]), &registry)
                .unwrap();
            assert_eq!(decoded, digest);
        }
    }
}

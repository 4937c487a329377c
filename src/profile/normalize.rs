//! Per-kind normalization of extracted features.
//!
//! Normalizers run before build steps and are transient: they shape how a
//! profile is built but are not part of the persisted profile.

use std::collections::BTreeSet;
use std::fmt;

use crate::profile::extraction::ExtractedElement;

/// Rewrites extracted features of one element in place.
pub trait Normalizer: fmt::Debug + Send + Sync {
    /// Name recorded in build information.
    fn name(&self) -> &str;

    /// Rewrite `element` in place.
    fn normalize(&self, element: &mut ExtractedElement);
}

/// Token-stream cleanup: optional lower-casing and a stop list.
#[derive(Debug, Clone, Default)]
pub struct TokenNormalizer {
    lowercase: bool,
    stop_tokens: BTreeSet<String>,
}

impl TokenNormalizer {
    /// Normalizer that changes nothing until configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower-case every token.
    pub fn lowercase(mut self, enabled: bool) -> Self {
        self.lowercase = enabled;
        self
    }

    /// Drop these tokens from every stream.
    pub fn stop_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_tokens.extend(tokens.into_iter().map(Into::into));
        self
    }
}

impl Normalizer for TokenNormalizer {
    fn name(&self) -> &str {
        "tokens"
    }

    fn normalize(&self, element: &mut ExtractedElement) {
        if self.lowercase {
            for token in &mut element.tokens {
                *token = token.to_lowercase();
            }
        }
        if !self.stop_tokens.is_empty() {
            element.tokens.retain(|t| !self.stop_tokens.contains(t));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::kind::ElementKind;

    #[test]
    fn test_lowercase_then_stop_list() {
        let normalizer = TokenNormalizer::new()
            .lowercase(true)
            .stop_tokens(["nop", "pop"]);
        let mut element = ExtractedElement::new(ElementKind::METHOD, "()V")
            .with_tokens(["ALOAD", "NOP", "Invoke", "pop"]);

        normalizer.normalize(&mut element);
        assert_eq!(element.tokens, vec!["aload", "invoke"]);
    }

    #[test]
    fn test_default_is_identity() {
        let mut element =
            ExtractedElement::new(ElementKind::CLASS, "La;").with_tokens(["A", "b"]);
        let before = element.clone();
        TokenNormalizer::default().normalize(&mut element);
        assert_eq!(element, before);
    }
}

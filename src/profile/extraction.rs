//! Interface to the feature-extraction collaborator.
//!
//! Extraction of structure from compiled artifacts lives outside this crate.
//! An extractor hands back, per program element, a descriptor string plus the
//! raw material the similarity algorithms consume: a token stream and an
//! integer feature vector.

use std::path::Path;

use crate::core::errors::Result;
use crate::profile::kind::ElementKind;

/// Raw features of one program element as produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedElement {
    /// Kind of program element
    pub kind: ElementKind,
    /// Type or signature descriptor
    pub descriptor: String,
    /// Token stream, e.g. opcodes or member names
    pub tokens: Vec<String>,
    /// Integer feature vector
    pub vector: Vec<i32>,
}

impl ExtractedElement {
    /// Element with no tokens and an empty vector.
    pub fn new(kind: ElementKind, descriptor: impl Into<String>) -> Self {
        Self {
            kind,
            descriptor: descriptor.into(),
            tokens: Vec::new(),
            vector: Vec::new(),
        }
    }

    /// Replace the token stream.
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the feature vector.
    pub fn with_vector(mut self, vector: impl Into<Vec<i32>>) -> Self {
        self.vector = vector.into();
        self
    }
}

/// Produces extracted elements from a compiled artifact.
pub trait FeatureExtractor: Send + Sync {
    /// Name recorded in build information.
    fn name(&self) -> &str;

    /// Extract every element of `artifact`.
    fn extract(&self, artifact: &Path) -> Result<Vec<ExtractedElement>>;
}

/// Extractor over an in-memory element list; ignores the artifact path.
#[derive(Debug, Clone, Default)]
pub struct StaticExtractor {
    elements: Vec<ExtractedElement>,
}

impl StaticExtractor {
    /// Extractor returning `elements` for any artifact.
    pub fn new(elements: Vec<ExtractedElement>) -> Self {
        Self { elements }
    }
}

impl FeatureExtractor for StaticExtractor {
    fn name(&self) -> &str {
        "static"
    }

    fn extract(&self, _artifact: &Path) -> Result<Vec<ExtractedElement>> {
        Ok(self.elements.clone())
    }
}

//! Thresholded best-match search of one query element against candidates.

use tracing::trace;

use crate::core::errors::Result;
use crate::matching::strategy::{ElementRef, Strategy};

/// Candidates that cleared the threshold for one query, in encounter order,
/// with their scores.
#[derive(Debug, Clone)]
pub struct Correspondence<'a> {
    matches: Vec<ElementRef<'a>>,
    scores: Vec<f64>,
    threshold: f64,
}

impl<'a> Correspondence<'a> {
    /// Score every candidate against `query` and keep those scoring at
    /// least `threshold`. Candidates take the library position in the
    /// comparison unless the profile flags say otherwise.
    pub fn compute<I>(
        query: ElementRef<'a>,
        candidates: I,
        strategy: &Strategy,
        threshold: f64,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = ElementRef<'a>>,
    {
        let mut matches = Vec::new();
        let mut scores = Vec::new();
        let mut examined = 0usize;
        for candidate in candidates {
            examined += 1;
            let score = strategy.compare(&candidate, &query)?;
            if score >= threshold {
                matches.push(candidate);
                scores.push(score);
            }
        }
        trace!(
            kind = %query.kind(),
            examined,
            retained = matches.len(),
            threshold,
            "computed correspondence"
        );
        Ok(Self {
            matches,
            scores,
            threshold,
        })
    }

    /// Number of candidates that cleared the threshold.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// True when no candidate cleared the threshold.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Threshold the candidates were filtered with.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Match and score at position `index`.
    pub fn get(&self, index: usize) -> Option<(ElementRef<'a>, f64)> {
        Some((*self.matches.get(index)?, self.scores[index]))
    }

    /// Best retained score.
    pub fn highest_score(&self) -> Option<f64> {
        self.scores.iter().copied().reduce(f64::max)
    }

    /// Highest-scoring match; ties go to the earliest candidate.
    pub fn best_match(&self) -> Option<(ElementRef<'a>, f64)> {
        let mut best: Option<usize> = None;
        for (index, score) in self.scores.iter().enumerate() {
            if best.map_or(true, |b| *score > self.scores[b]) {
                best = Some(index);
            }
        }
        best.and_then(|index| self.get(index))
    }

    /// Retained candidates with their scores, in encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementRef<'a>, f64)> + '_ {
        self.matches.iter().copied().zip(self.scores.iter().copied())
    }
}

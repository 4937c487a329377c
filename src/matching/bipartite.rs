//! Whole-collection correspondence: greedy best match and maximum-weight
//! one-to-one assignment.
//!
//! Weight matrices are indexed `[library][application]`. Entries are
//! similarity scores in `[0, 1]`; a zero entry never forms a pair.

use pathfinding::kuhn_munkres::kuhn_munkres;
use pathfinding::matrix::Matrix;
use serde::Serialize;
use tracing::debug;

use crate::core::errors::{LibsiftError, Result};

/// Fixed-point scale applied to scores before integer assignment.
pub const WEIGHT_SCALE: f64 = 1_000_000.0;

/// One library element paired with one application element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchedPair {
    /// Index into the library collection
    pub library: usize,
    /// Index into the application collection
    pub application: usize,
    /// Similarity of the pair
    pub score: f64,
}

/// Result of matching two collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    /// Matched pairs ordered by library index
    pub pairs: Vec<MatchedPair>,
    /// Sum of matched scores
    pub total: f64,
    /// Size of the library collection
    pub library_count: usize,
    /// Size of the application collection
    pub application_count: usize,
}

impl Assignment {
    fn from_pairs(mut pairs: Vec<MatchedPair>, library_count: usize, application_count: usize) -> Self {
        pairs.sort_by_key(|p| (p.library, p.application));
        let total = pairs.iter().map(|p| p.score).sum();
        Self {
            pairs,
            total,
            library_count,
            application_count,
        }
    }

    /// Matched weight over the number of library elements; unmatched
    /// library elements count as zero. An empty library scores 0.
    pub fn aggregate(&self) -> f64 {
        if self.library_count == 0 {
            0.0
        } else {
            (self.total / self.library_count as f64).min(1.0)
        }
    }

    /// Number of matched pairs.
    pub fn matched(&self) -> usize {
        self.pairs.len()
    }

    /// Pair containing library element `library`, if any.
    pub fn for_library(&self, library: usize) -> Option<&MatchedPair> {
        self.pairs.iter().find(|p| p.library == library)
    }
}

fn check_shape(weights: &[Vec<f64>], application_count: usize) -> Result<()> {
    match weights.iter().position(|row| row.len() != application_count) {
        Some(row) => Err(LibsiftError::internal(format!(
            "weight row {row} has {} columns, expected {application_count}",
            weights[row].len()
        ))),
        None => Ok(()),
    }
}

fn to_fixed(score: f64) -> i64 {
    if score.is_nan() {
        0
    } else {
        (score.clamp(0.0, 1.0) * WEIGHT_SCALE).round() as i64
    }
}

/// Maximum-weight one-to-one assignment (Kuhn-Munkres).
///
/// No library element is paired with two application elements and vice
/// versa. Pairs whose weight is zero are reported as unmatched.
pub fn optimal_assignment(weights: &[Vec<f64>], application_count: usize) -> Result<Assignment> {
    check_shape(weights, application_count)?;
    let library_count = weights.len();
    if library_count == 0 || application_count == 0 {
        return Ok(Assignment::from_pairs(Vec::new(), library_count, application_count));
    }

    // The solver needs rows <= columns.
    let transpose = library_count > application_count;
    let (rows, columns) = if transpose {
        (application_count, library_count)
    } else {
        (library_count, application_count)
    };
    let oriented = |row: usize, column: usize| {
        if transpose {
            (column, row)
        } else {
            (row, column)
        }
    };

    let mut values = Vec::with_capacity(rows * columns);
    for row in 0..rows {
        for column in 0..columns {
            let (library, application) = oriented(row, column);
            values.push(to_fixed(weights[library][application]));
        }
    }
    let matrix = Matrix::from_vec(rows, columns, values)
        .map_err(|e| LibsiftError::internal(format!("failed to build weight matrix: {e:?}")))?;
    let (_, assigned) = kuhn_munkres(&matrix);

    let pairs: Vec<MatchedPair> = assigned
        .into_iter()
        .enumerate()
        .filter_map(|(row, column)| {
            let (library, application) = oriented(row, column);
            let score = weights[library][application];
            (score > 0.0).then_some(MatchedPair {
                library,
                application,
                score,
            })
        })
        .collect();

    debug!(
        library_count,
        application_count,
        matched = pairs.len(),
        "optimal assignment"
    );
    Ok(Assignment::from_pairs(pairs, library_count, application_count))
}

/// Best library element for each application element. A library element
/// may be chosen by several application elements; ties go to the lowest
/// library index.
pub fn greedy_assignment(weights: &[Vec<f64>], application_count: usize) -> Result<Assignment> {
    check_shape(weights, application_count)?;
    let library_count = weights.len();

    let pairs = (0..application_count)
        .filter_map(|application| {
            let mut best: Option<(usize, f64)> = None;
            for (library, row) in weights.iter().enumerate() {
                let score = row[application];
                if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                    best = Some((library, score));
                }
            }
            best.map(|(library, score)| MatchedPair {
                library,
                application,
                score,
            })
        })
        .collect();

    Ok(Assignment::from_pairs(pairs, library_count, application_count))
}

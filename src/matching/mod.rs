//! Correspondence and matching between profiles.
//!
//! - [`strategy`]: which similarity function and build step apply to each kind
//! - [`algorithms`]: the bundled fuzzy similarity algorithms
//! - [`correspondence`]: thresholded best match of one element against many
//! - [`bipartite`]: greedy and optimal one-to-one matching of whole collections
//! - [`comparator`] and [`detector`]: profile-level comparison and ranking

pub mod algorithms;
pub mod bipartite;
pub mod comparator;
pub mod correspondence;
pub mod detector;
pub mod strategy;

pub use bipartite::{greedy_assignment, optimal_assignment, Assignment, MatchedPair};
pub use comparator::{KindSimilarity, ProfileComparator, ProfileSimilarity};
pub use correspondence::Correspondence;
pub use detector::{LibraryDetector, LibraryMatch};
pub use strategy::{BuildStep, ElementRef, SimilarityFunction, Strategy};

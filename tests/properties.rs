use std::collections::{HashMap, HashSet};
use std::path::Path;

use libsift_rs::matching::algorithms::LshDigest;
use libsift_rs::matching::{greedy_assignment, optimal_assignment, Assignment};
use libsift_rs::{
    Correspondence, ElementKind, ElementRef, ExtractedElement, LibsiftConfig, ManagerBuilder,
    Profile, ProfileBuilder, StaticExtractor,
};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-3;

fn weight_matrix(max: usize) -> impl Strategy<Value = (Vec<Vec<f64>>, usize)> {
    (1..=max, 1..=max).prop_flat_map(|(rows, columns)| {
        let cell = prop_oneof![Just(0.0), 0.0f64..=1.0];
        prop::collection::vec(prop::collection::vec(cell, columns), rows)
            .prop_map(move |weights| (weights, columns))
    })
}

/// Pairs taken in descending weight order whenever both sides are free.
fn injective_greedy_total(weights: &[Vec<f64>]) -> f64 {
    let mut entries: Vec<(f64, usize, usize)> = weights
        .iter()
        .enumerate()
        .flat_map(|(l, row)| row.iter().enumerate().map(move |(a, &w)| (w, l, a)))
        .filter(|(w, _, _)| *w > 0.0)
        .collect();
    entries.sort_by(|x, y| y.0.total_cmp(&x.0));

    let (mut used_l, mut used_a) = (HashSet::new(), HashSet::new());
    let mut total = 0.0;
    for (w, l, a) in entries {
        if !used_l.contains(&l) && !used_a.contains(&a) {
            used_l.insert(l);
            used_a.insert(a);
            total += w;
        }
    }
    total
}

fn zero_below(weights: &[Vec<f64>], threshold: f64) -> Vec<Vec<f64>> {
    weights
        .iter()
        .map(|row| {
            row.iter()
                .map(|&w| if w >= threshold { w } else { 0.0 })
                .collect()
        })
        .collect()
}

fn is_one_to_one(assignment: &Assignment) -> bool {
    let libraries: HashSet<usize> = assignment.pairs.iter().map(|p| p.library).collect();
    let applications: HashSet<usize> = assignment.pairs.iter().map(|p| p.application).collect();
    libraries.len() == assignment.pairs.len() && applications.len() == assignment.pairs.len()
}

fn class_profile(config: &LibsiftConfig, token_sets: &[Vec<String>], is_application: bool) -> Profile {
    let elements = token_sets
        .iter()
        .enumerate()
        .map(|(i, tokens)| {
            ExtractedElement::new(ElementKind::CLASS, format!("LC{i};")).with_tokens(tokens.clone())
        })
        .collect();
    let manager = ManagerBuilder::new(config.clone())
        .kinds([ElementKind::CLASS])
        .application(is_application)
        .build()
        .unwrap();
    ProfileBuilder::new(manager)
        .build(&StaticExtractor::new(elements), Path::new("fixture"))
        .unwrap()
}

/// Descriptor to score of every candidate kept at `threshold`.
fn kept(library: &Profile, query: ElementRef<'_>, threshold: f64) -> HashMap<String, f64> {
    let candidates = library
        .elements(&ElementKind::CLASS)
        .unwrap()
        .iter()
        .map(|e| ElementRef::new(e, library.manager()));
    let correspondence =
        Correspondence::compute(query, candidates, library.manager().strategy(), threshold)
            .unwrap();
    correspondence
        .iter()
        .map(|(candidate, score)| (candidate.descriptor().unwrap().to_string(), score))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn optimal_assignment_is_one_to_one_and_bounded((weights, columns) in weight_matrix(50)) {
        let optimal = optimal_assignment(&weights, columns).unwrap();
        prop_assert!(is_one_to_one(&optimal));
        prop_assert!(optimal.pairs.iter().all(|p| p.score > 0.0));
        prop_assert!(optimal.matched() <= weights.len().min(columns));

        let injective = injective_greedy_total(&weights);
        prop_assert!(optimal.total + TOLERANCE >= injective, "{} < {}", optimal.total, injective);

        let unconstrained = greedy_assignment(&weights, columns).unwrap();
        prop_assert!(optimal.total <= unconstrained.total + TOLERANCE);
        prop_assert!(optimal.aggregate() <= 1.0);
    }

    #[test]
    fn raising_the_threshold_never_raises_the_total(
        (weights, columns) in weight_matrix(12),
        low in 0.0f64..0.5,
        step in 0.0f64..0.5,
    ) {
        let loose = optimal_assignment(&zero_below(&weights, low), columns).unwrap();
        let strict = optimal_assignment(&zero_below(&weights, low + step), columns).unwrap();
        prop_assert!(strict.total <= loose.total + TOLERANCE);
        prop_assert!(strict.pairs.iter().all(|p| p.score >= low + step));
    }

    #[test]
    fn raising_the_threshold_only_drops_best_match_candidates(
        candidates in prop::collection::vec(prop::collection::vec("[a-h]", 0..8), 1..8),
        query in prop::collection::vec("[a-h]", 0..8),
        low in 0.0f64..0.6,
        step in 0.0f64..0.4,
    ) {
        let mut config = LibsiftConfig::default();
        config.matching.require_descriptor_match = false;
        let library = class_profile(&config, &candidates, false);
        let application = class_profile(&config, &[query], true);
        let element = application.elements(&ElementKind::CLASS).unwrap().get(0).unwrap();
        let query = ElementRef::new(element, application.manager());

        let loose = kept(&library, query, low);
        let strict = kept(&library, query, low + step);
        for (descriptor, score) in &strict {
            prop_assert!(*score >= low + step);
            prop_assert_eq!(loose.get(descriptor), Some(score), "{} dropped at {}", descriptor, low);
        }
        for (descriptor, score) in &loose {
            prop_assert!(*score >= low);
            prop_assert_eq!(strict.contains_key(descriptor), *score >= low + step);
        }
    }

    #[test]
    fn digest_difference_is_symmetric(
        a in prop::collection::vec("[a-f]{1,3}", 0..200),
        b in prop::collection::vec("[a-f]{1,3}", 0..200),
    ) {
        let (x, y) = (LshDigest::compute(&a, 8), LshDigest::compute(&b, 8));
        prop_assert_eq!(x.difference(&y), y.difference(&x));
        if x.is_present() {
            prop_assert_eq!(x.difference(&x), Some(0));
        }
    }
}

mod common;

use std::io::Cursor;

use approx::assert_relative_eq;
use common::{build_profile, class_profile, fixture_elements, init_tracing, manager, opcodes};
use libsift_rs::matching::algorithms::BloomFilter;
use libsift_rs::{
    Correspondence, ElementKind, ElementRef, LibraryDetector, LibsiftConfig, MatchingMode,
    Profile, ProfileComparator,
};

#[test]
fn two_of_three_library_classes_found() {
    init_tracing();
    let config = LibsiftConfig::default();
    let library = class_profile(&config, "lib", &["LA;", "LB;", "LC;"], false);
    let application = class_profile(&config, "app", &["LA;", "LB;"], true);

    let result = ProfileComparator::new(config).compare(&library, &application).unwrap();
    let classes = result.kind(&ElementKind::CLASS).unwrap();
    assert_eq!(classes.matched, 2);
    assert!(classes.assignment.pairs.iter().all(|p| p.score == 1.0));
    assert_relative_eq!(classes.aggregate, 2.0 / 3.0);
    assert_relative_eq!(result.overall, 2.0 / 3.0);
}

#[test]
fn greedy_and_optimal_agree_without_contention() {
    let mut config = LibsiftConfig::default();
    let library = class_profile(&config, "lib", &["LA;", "LB;", "LC;"], false);
    let application = class_profile(&config, "app", &["LA;", "LC;"], true);

    let optimal = ProfileComparator::new(config.clone())
        .compare(&library, &application)
        .unwrap();
    config.matching.mode = MatchingMode::Greedy;
    let greedy = ProfileComparator::new(config).compare(&library, &application).unwrap();
    assert_relative_eq!(optimal.overall, greedy.overall);
}

fn first_class(profile: &Profile) -> ElementRef<'_> {
    let element = profile.elements(&ElementKind::CLASS).unwrap().get(0).unwrap();
    ElementRef::new(element, profile.manager())
}

fn class_refs(profile: &Profile) -> Vec<ElementRef<'_>> {
    profile
        .elements(&ElementKind::CLASS)
        .unwrap()
        .iter()
        .map(|e| ElementRef::new(e, profile.manager()))
        .collect()
}

#[test]
fn best_match_over_no_candidates_is_none() {
    let config = LibsiftConfig::default();
    let application = class_profile(&config, "app", &["LA;"], true);
    let query = first_class(&application);

    let strategy = application.manager().strategy();
    let correspondence = Correspondence::compute(query, Vec::new(), strategy, 0.5).unwrap();
    assert!(correspondence.is_empty());
    assert!(correspondence.best_match().is_none());
    assert!(correspondence.highest_score().is_none());
}

#[test]
fn best_match_with_every_candidate_below_threshold_is_none() {
    let config = LibsiftConfig::default();
    let library = class_profile(&config, "lib", &["LX;", "LY;"], false);
    let application = class_profile(&config, "app", &["LA;"], true);

    let strategy = library.manager().strategy();
    let correspondence =
        Correspondence::compute(first_class(&application), class_refs(&library), strategy, 0.7)
            .unwrap();
    assert!(correspondence.best_match().is_none());
}

#[test]
fn best_match_finds_the_identical_class() {
    let config = LibsiftConfig::default();
    let library = class_profile(&config, "lib", &["LX;", "LA;", "LY;"], false);
    let application = class_profile(&config, "app", &["LA;"], true);

    let strategy = library.manager().strategy();
    let correspondence =
        Correspondence::compute(first_class(&application), class_refs(&library), strategy, 0.7)
            .unwrap();
    let (best, score) = correspondence.best_match().unwrap();
    assert_eq!(best.descriptor(), Some("LA;"));
    assert_eq!(score, 1.0);
}

#[test]
fn every_algorithm_scores_a_profile_against_itself_as_one() {
    let config = LibsiftConfig::default();
    let library = build_profile(&config, "lib", fixture_elements(), false);
    let mut bytes = Vec::new();
    library.write_to(&mut bytes).unwrap();
    let mut application =
        Profile::read_from(&mut Cursor::new(bytes), manager(&config, true)).unwrap();
    application.manager_mut().set_application(true);

    let result = ProfileComparator::new(config).compare(&library, &application).unwrap();
    for kind in ElementKind::builtins() {
        let similarity = result.kind(&kind).unwrap();
        assert_eq!(similarity.matched, similarity.library_elements, "{kind}");
        assert_relative_eq!(similarity.aggregate, 1.0);
    }
    assert_relative_eq!(result.overall, 1.0);
}

#[test]
fn small_edits_score_above_unrelated_method_bodies() {
    let mut config = LibsiftConfig::default();
    config.thresholds = libsift_rs::ThresholdConfig::uniform(0.0);
    let method = |tokens: Vec<String>| {
        vec![libsift_rs::ExtractedElement::new(ElementKind::METHOD, "()V").with_tokens(tokens)]
    };
    let library = build_profile(&config, "lib", method(opcodes(4, 300)), false);

    let mut edited = opcodes(4, 300);
    for token in &mut edited[150..160] {
        *token = "nop".to_string();
    }
    let close = build_profile(&config, "close", method(edited), true);
    let far = build_profile(&config, "far", method(opcodes(11, 900)), true);

    let comparator = ProfileComparator::new(config);
    let close_score = comparator.compare(&library, &close).unwrap().overall;
    let far_score = comparator.compare(&library, &far).unwrap().overall;
    assert!(close_score > 0.0);
    assert!(close_score > far_score, "{close_score} <= {far_score}");
}

#[test]
fn bloom_filter_of_more_tokens_covers_fewer() {
    let config = libsift_rs::core::config::BloomConfig::default();
    let library = BloomFilter::from_tokens(&config, ["get", "put", "evict", "size"]);
    let application = BloomFilter::from_tokens(&config, ["get", "put"]);

    assert!(library.is_superset_of(&application));
    assert!(library.contains("evict"));
    assert!(library.occupancy() >= application.occupancy());
    assert!(library.is_superset_of(&library));
}

#[test]
fn detector_ranks_loaded_libraries() {
    init_tracing();
    let config = LibsiftConfig::default();
    let dir = tempfile::tempdir().unwrap();
    class_profile(&config, "guava", &["LA;", "LB;", "LC;", "LD;"], false)
        .save(dir.path().join("guava.sift"))
        .unwrap();
    class_profile(&config, "okio", &["LA;", "LQ;"], false)
        .save(dir.path().join("nested-okio.sift"))
        .unwrap();

    let class_manager = || {
        libsift_rs::ManagerBuilder::new(config.clone())
            .kinds([ElementKind::CLASS])
            .build()
    };
    let mut detector = LibraryDetector::new(config.clone());
    assert_eq!(detector.load_dir(dir.path(), class_manager).unwrap(), 2);

    let application = class_profile(&config, "app", &["LA;", "LB;", "LC;", "LD;", "LZ;"], true);
    let matches = detector.detect(&application).unwrap();
    assert_eq!(matches[0].library, "guava");
    assert_relative_eq!(matches[0].score, 1.0);
    assert_eq!(matches[1].library, "okio");
    assert_relative_eq!(matches[1].score, 0.5);
}

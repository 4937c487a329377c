//! # libsift-rs: structural fingerprinting and library detection
//!
//! Fingerprints compiled artifacts into compact, versioned binary profiles and
//! compares profiles to recognize known third-party library code embedded in
//! unknown applications.
//!
//! - **Profiles**: an extensible set of independently serializable
//!   extensions (interned descriptor table, metadata, one element list per
//!   element kind) owned by a [`ProfileManager`]
//! - **Blueprints**: per-kind, ordered declarations of extra element fields
//! - **Codec**: LEB128 varints, a hash-keyed type registry for typed
//!   constants, and little-endian fixed-width fields
//! - **Matching**: thresholded best-match search, greedy and optimal
//!   (Kuhn-Munkres) one-to-one assignment, and pluggable fuzzy algorithms
//!   (bloom filter superset, rolling hash overlap, feature vector distance,
//!   locality-sensitive digest difference)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │        LibraryDetector  ·  ProfileComparator                  │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Matching          │  Profile                │  Codec          │
//! │ • Strategy         │ • ProfileManager        │ • Varint        │
//! │ • Correspondence   │ • Extensions            │ • Stream        │
//! │ • Bipartite        │ • Blueprints            │ • TypeRegistry  │
//! │ • Algorithms       │ • Descriptor table      │ • Values        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use libsift_rs::{
//!     ElementKind, ExtractedElement, LibsiftConfig, ManagerBuilder, ProfileBuilder,
//!     ProfileComparator, StaticExtractor,
//! };
//!
//! fn main() -> libsift_rs::Result<()> {
//!     let config = LibsiftConfig::default();
//!     let extractor = StaticExtractor::new(vec![
//!         ExtractedElement::new(ElementKind::CLASS, "Lcom/example/Util;")
//!             .with_tokens(["aload_0", "invokespecial", "return"]),
//!     ]);
//!
//!     let library = ProfileBuilder::new(ManagerBuilder::new(config.clone()).build()?)
//!         .artifact("example-util", "1.0")
//!         .build(&extractor, Path::new("example-util.jar"))?;
//!     library.save("example-util.sift")?;
//!
//!     let application = ProfileBuilder::new(
//!         ManagerBuilder::new(config.clone()).application(true).build()?,
//!     )
//!     .build(&extractor, Path::new("app.apk"))?;
//!
//!     let similarity = ProfileComparator::new(config).compare(&library, &application)?;
//!     println!("{}", similarity.to_json()?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Configuration and error handling
pub mod core {
    //! Configuration and error types shared by every module.

    pub mod config;
    pub mod errors;
}

// Binary profile encoding
pub mod codec {
    //! Wire primitives and typed values.

    pub mod registry;
    pub mod stream;
    pub mod values;
    pub mod varint;
}

pub mod matching;
pub mod profile;

// Re-export primary types for convenience
pub use codec::registry::TypeRegistry;
pub use core::config::{LibsiftConfig, MatchingMode, ThresholdConfig};
pub use core::errors::{LibsiftError, Result, ResultExt};
pub use matching::{
    Correspondence, ElementRef, LibraryDetector, LibraryMatch, ProfileComparator,
    ProfileSimilarity, Strategy,
};
pub use profile::{
    ElementKind, ExtractedElement, FeatureExtractor, ManagerBuilder, Profile, ProfileBuilder,
    ProfileManager, Retention, StaticExtractor,
};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build-time feature detection
pub mod features {
    //! Runtime feature detection.

    /// Check if parallel comparison is compiled in
    pub const fn has_parallel() -> bool {
        cfg!(feature = "parallel")
    }
}

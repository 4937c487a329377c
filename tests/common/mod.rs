#![allow(dead_code)]

use std::path::Path;

use libsift_rs::{
    ElementKind, ExtractedElement, LibsiftConfig, ManagerBuilder, Profile, ProfileBuilder,
    ProfileManager, StaticExtractor,
};
use tracing_subscriber::EnvFilter;

/// Route crate logs to the test harness; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pseudo-random opcode stream; equal seeds give equal streams.
pub fn opcodes(seed: u64, len: usize) -> Vec<String> {
    const OPS: [&str; 12] = [
        "aload_0", "aload_1", "iload_2", "invokevirtual", "invokestatic", "getfield",
        "putfield", "ifeq", "goto", "iadd", "new", "areturn",
    ];
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            OPS[(state % OPS.len() as u64) as usize].to_string()
        })
        .collect()
}

pub fn class(descriptor: &str, tokens: &[&str]) -> ExtractedElement {
    ExtractedElement::new(ElementKind::CLASS, descriptor).with_tokens(tokens.iter().copied())
}

/// One artifact's worth of elements across every built-in kind.
pub fn fixture_elements() -> Vec<ExtractedElement> {
    vec![
        class("Lcom/acme/Cache;", &["get", "put", "evict", "size"]),
        class("Lcom/acme/Entry;", &["key", "value", "next"]),
        class("Lcom/acme/Loader;", &["load", "reload", "close"]),
        ExtractedElement::new(ElementKind::METHOD, "(Ljava/lang/Object;)V")
            .with_tokens(opcodes(1, 180)),
        ExtractedElement::new(ElementKind::METHOD, "()I").with_tokens(opcodes(2, 240)),
        ExtractedElement::new(ElementKind::METHOD, "()V").with_tokens(["return"]),
        ExtractedElement::new(ElementKind::FIELD, "Ljava/util/Map;").with_vector([3, 0, 1, 7]),
        ExtractedElement::new(ElementKind::FIELD, "J").with_vector([0, 2]),
        ExtractedElement::new(ElementKind::PACKAGE, "com/acme")
            .with_tokens(["Cache", "Entry", "Loader", "Cache", "Entry"]),
    ]
}

pub fn manager(config: &LibsiftConfig, is_application: bool) -> ProfileManager {
    ManagerBuilder::new(config.clone())
        .application(is_application)
        .build()
        .expect("manager builds from a valid config")
}

pub fn build_profile(
    config: &LibsiftConfig,
    name: &str,
    elements: Vec<ExtractedElement>,
    is_application: bool,
) -> Profile {
    ProfileBuilder::new(manager(config, is_application))
        .artifact(name, "1.0")
        .build(&StaticExtractor::new(elements), Path::new(name))
        .expect("profile builds from fixture elements")
}

/// Profile containing only classes, for scenarios that count matches.
pub fn class_profile(
    config: &LibsiftConfig,
    name: &str,
    classes: &[&str],
    is_application: bool,
) -> Profile {
    let elements = classes
        .iter()
        .map(|c| class(c, &[c, "init", "clinit"]))
        .collect();
    let manager = ManagerBuilder::new(config.clone())
        .kinds([ElementKind::CLASS])
        .application(is_application)
        .build()
        .expect("class-only manager builds");
    ProfileBuilder::new(manager)
        .artifact(name, "1.0")
        .build(&StaticExtractor::new(elements), Path::new(name))
        .expect("class profile builds")
}

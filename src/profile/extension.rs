//! The extension contract: named, independently serializable sub-documents.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::registry::{type_hash, TypeRegistry};
use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::core::errors::Result;
use crate::profile::blueprint::Blueprints;

/// Whether an extension survives serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Persisted and available when comparing
    Runtime,
    /// Build-time only; stripped on save
    Source,
}

/// Shared state extensions need while encoding or decoding.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionContext<'a> {
    /// Registry resolving typed constants
    pub registry: &'a TypeRegistry,
    /// Blueprints describing element fields
    pub blueprints: &'a Blueprints,
}

/// Facts checked after a whole profile has been read.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    /// Number of entries in the descriptor table
    pub descriptor_count: usize,
}

/// A named, independently serializable sub-document of a profile.
pub trait Extension: fmt::Debug + Send + Sync + Any {
    /// Stable name; its hash is the extension's tag on the wire.
    fn name(&self) -> &str;

    /// Wire tag.
    fn tag(&self) -> u32 {
        type_hash(self.name())
    }

    /// Write the payload.
    fn write(&self, writer: &mut ProfileWriter<'_>, ctx: &ExtensionContext<'_>) -> Result<()>;

    /// Replace internal state with a payload read from the stream.
    fn read(&mut self, reader: &mut ProfileReader<'_>, ctx: &ExtensionContext<'_>) -> Result<()>;

    /// Clear internal state so the extension can be reused.
    fn reset(&mut self);

    /// Cross-extension consistency check run after a full read.
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        Ok(())
    }

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcasting support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An extension that exists at most once per manager under a fixed name.
pub trait NamedExtension: Extension + Sized {
    /// Registered name.
    const NAME: &'static str;
}

//! Profile metadata and build information extensions.

use std::any::Any;
use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::codec::values::{FieldValue, MapValue};
use crate::core::errors::Result;
use crate::profile::extension::{Extension, ExtensionContext, NamedExtension};

/// Version of the profile wire layout written by this crate.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Identity of the artifact a profile was built from. Persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMetadata {
    /// Random profile identifier
    pub id: Uuid,
    /// Artifact name
    pub artifact: String,
    /// Artifact version
    pub version: String,
    /// True for application profiles
    pub is_application: bool,
    /// Build time, kept to millisecond precision
    pub created_at: DateTime<Utc>,
    /// Wire layout version
    pub format_version: u32,
    /// Free-form typed attributes
    pub attributes: MapValue,
}

impl ProfileMetadata {
    /// Fresh metadata with a new id, stamped now.
    pub fn new(artifact: impl Into<String>, version: impl Into<String>, is_application: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            artifact: artifact.into(),
            version: version.into(),
            is_application,
            created_at: Utc::now(),
            format_version: CURRENT_FORMAT_VERSION,
            attributes: MapValue::default(),
        }
    }

    /// Set or replace an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Box<dyn FieldValue>) {
        self.attributes.insert(key, value);
    }

    /// Attribute stored under `key`.
    pub fn attribute(&self, key: &str) -> Option<&dyn FieldValue> {
        self.attributes.get(key)
    }

    /// Short `artifact@version` label used in reports.
    pub fn label(&self) -> String {
        if self.version.is_empty() {
            self.artifact.clone()
        } else {
            format!("{}@{}", self.artifact, self.version)
        }
    }
}

impl Default for ProfileMetadata {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            artifact: String::new(),
            version: String::new(),
            is_application: false,
            created_at: DateTime::<Utc>::default(),
            format_version: CURRENT_FORMAT_VERSION,
            attributes: MapValue::default(),
        }
    }
}

impl NamedExtension for ProfileMetadata {
    const NAME: &'static str = "metadata";
}

impl Extension for ProfileMetadata {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn write(&self, writer: &mut ProfileWriter<'_>, ctx: &ExtensionContext<'_>) -> Result<()> {
        writer.write_varint(u64::from(self.format_version))?;
        writer.write_bytes(self.id.as_bytes())?;
        writer.write_str(&self.artifact)?;
        writer.write_str(&self.version)?;
        writer.write_bool(self.is_application)?;
        writer.write_i64(self.created_at.timestamp_millis())?;
        self.attributes.encode(writer, ctx.registry)
    }

    fn read(&mut self, reader: &mut ProfileReader<'_>, ctx: &ExtensionContext<'_>) -> Result<()> {
        let format_version = reader.read_index()?;
        if format_version > CURRENT_FORMAT_VERSION {
            return Err(reader.error(format!(
                "profile format version {format_version} is newer than supported version {CURRENT_FORMAT_VERSION}"
            )));
        }

        let mut id = [0u8; 16];
        reader.read_exact(&mut id)?;
        let artifact = reader.read_string()?;
        let version = reader.read_string()?;
        let is_application = reader.read_bool()?;
        let millis = reader.read_i64()?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| reader.error(format!("timestamp {millis} out of range")))?;

        let mut attributes = MapValue::default();
        attributes.decode(reader, ctx.registry)?;

        *self = Self {
            id: Uuid::from_bytes(id),
            artifact,
            version,
            is_application,
            created_at,
            format_version,
            attributes,
        };
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// How a profile was produced. Build-time only; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildInfo {
    /// Artifact the profile was built from
    pub artifact_path: Option<PathBuf>,
    /// Name of the feature extractor
    pub extractor: String,
    /// Time spent extracting
    pub extraction_millis: u64,
    /// Elements built per kind name
    pub element_counts: BTreeMap<String, usize>,
    /// Normalizers applied, by name
    pub normalizers: Vec<String>,
}

impl NamedExtension for BuildInfo {
    const NAME: &'static str = "build-info";
}

impl Extension for BuildInfo {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn write(&self, writer: &mut ProfileWriter<'_>, _ctx: &ExtensionContext<'_>) -> Result<()> {
        let path = self
            .artifact_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.write_str(&path)?;
        writer.write_str(&self.extractor)?;
        writer.write_varint(self.extraction_millis)?;
        writer.write_len(self.element_counts.len())?;
        for (kind, count) in &self.element_counts {
            writer.write_str(kind)?;
            writer.write_len(*count)?;
        }
        writer.write_len(self.normalizers.len())?;
        for name in &self.normalizers {
            writer.write_str(name)?;
        }
        Ok(())
    }

    fn read(&mut self, reader: &mut ProfileReader<'_>, _ctx: &ExtensionContext<'_>) -> Result<()> {
        let path = reader.read_string()?;
        let extractor = reader.read_string()?;
        let extraction_millis = reader.read_varint()?;
        let kinds = reader.read_len()?;
        let mut element_counts = BTreeMap::new();
        for _ in 0..kinds {
            let kind = reader.read_string()?;
            element_counts.insert(kind, reader.read_len()?);
        }
        let count = reader.read_len()?;
        let mut normalizers = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            normalizers.push(reader.read_string()?);
        }

        *self = Self {
            artifact_path: (!path.is_empty()).then(|| PathBuf::from(path)),
            extractor,
            extraction_millis,
            element_counts,
            normalizers,
        };
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

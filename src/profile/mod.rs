//! Profiles: serializable structural fingerprints of compiled artifacts.
//!
//! A [`Profile`] exclusively owns one [`ProfileManager`], which in turn owns
//! the profile's extensions (descriptor table, metadata, one element list per
//! kind) and the transient configuration used to build them.

pub mod blueprint;
pub mod builder;
pub mod descriptors;
pub mod element;
pub mod elements;
pub mod extension;
pub mod extraction;
pub mod kind;
pub mod manager;
pub mod metadata;
pub mod normalize;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::errors::{LibsiftError, Result};

pub use blueprint::{Blueprint, Blueprints};
pub use builder::{ManagerBuilder, ProfileBuilder};
pub use descriptors::DescriptorTable;
pub use element::ProfileElement;
pub use elements::ElementList;
pub use extension::{Extension, ExtensionContext, NamedExtension, Retention, ValidationContext};
pub use extraction::{ExtractedElement, FeatureExtractor, StaticExtractor};
pub use kind::ElementKind;
pub use manager::ProfileManager;
pub use metadata::{BuildInfo, ProfileMetadata, CURRENT_FORMAT_VERSION};
pub use normalize::{Normalizer, TokenNormalizer};

/// The fingerprint of one artifact.
#[derive(Debug)]
pub struct Profile {
    manager: ProfileManager,
    source: Option<PathBuf>,
}

impl Profile {
    /// Wrap a populated manager.
    pub fn from_manager(manager: ProfileManager) -> Self {
        Self {
            manager,
            source: None,
        }
    }

    /// Load a profile from `path` into `manager`, which must be configured
    /// with every extension the file contains. Errors carry the path.
    pub fn load(path: impl AsRef<Path>, manager: ProfileManager) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            LibsiftError::io(format!("Failed to open profile: {}", path.display()), e)
        })?;
        let mut reader = BufReader::new(file);
        let mut profile =
            Self::read_from(&mut reader, manager).map_err(|e| e.with_path(path.display().to_string()))?;
        profile.source = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            label = %profile.label(),
            "loaded profile"
        );
        Ok(profile)
    }

    /// Read a profile from a stream. The stream must end after the last
    /// extension.
    pub fn read_from(source: &mut dyn Read, mut manager: ProfileManager) -> Result<Self> {
        manager.read_all(source)?;
        let mut trailing = [0u8; 1];
        if source.read(&mut trailing)? != 0 {
            manager.reset();
            return Err(LibsiftError::format("trailing bytes after the last extension"));
        }
        if let Ok(metadata) = manager.get::<ProfileMetadata>() {
            let is_application = metadata.is_application;
            manager.set_application(is_application);
        }
        Ok(Self::from_manager(manager))
    }

    /// Persist atomically: write a sibling temporary file, then rename it.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");
        let file = File::create(&temp_path).map_err(|e| {
            LibsiftError::io(
                format!("Failed to create profile file: {}", temp_path.display()),
                e,
            )
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)
            .and_then(|()| writer.flush().map_err(LibsiftError::from))
            .map_err(|e| {
                let _ = fs::remove_file(&temp_path);
                e.with_path(path.display().to_string())
            })?;
        drop(writer);

        fs::rename(&temp_path, path).map_err(|e| {
            LibsiftError::io(format!("Failed to rename profile file: {}", path.display()), e)
        })?;
        debug!(path = %path.display(), "saved profile");
        Ok(())
    }

    /// Write every runtime extension to `sink`.
    pub fn write_to(&self, sink: &mut dyn Write) -> Result<()> {
        self.manager.write_all(sink)
    }

    /// Manager holding the profile's extensions.
    pub fn manager(&self) -> &ProfileManager {
        &self.manager
    }

    /// Mutable manager.
    pub fn manager_mut(&mut self) -> &mut ProfileManager {
        &mut self.manager
    }

    /// Unwrap the manager.
    pub fn into_manager(self) -> ProfileManager {
        self.manager
    }

    /// File the profile was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Metadata extension, when registered.
    pub fn metadata(&self) -> Option<&ProfileMetadata> {
        self.manager.get::<ProfileMetadata>().ok()
    }

    /// Element list for `kind`.
    pub fn elements(&self, kind: &ElementKind) -> Result<&ElementList> {
        self.manager.elements(kind)
    }

    /// True for application profiles.
    pub fn is_application(&self) -> bool {
        self.manager.is_application()
    }

    /// `artifact@version` from metadata, else the source file name.
    pub fn label(&self) -> String {
        match self.metadata() {
            Some(metadata) if !metadata.artifact.is_empty() => metadata.label(),
            _ => self
                .source
                .as_deref()
                .and_then(Path::file_stem)
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "<unnamed>".to_string()),
        }
    }

    /// Clear every extension.
    pub fn reset(&mut self) {
        self.manager.reset();
        self.source = None;
    }
}

//! Extension registry and whole-profile (de)serialization.
//!
//! Wire layout:
//!
//! ```text
//! [count:i32 LE] { [tag:u32 LE][extension payload] }*
//! ```
//!
//! `count` covers runtime extensions only, written in registration order. A
//! reader must be configured with a superset of the writer's extensions; an
//! unknown tag aborts the read.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::codec::registry::{type_hash, TypeRegistry};
use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::core::errors::{LibsiftError, Result};
use crate::matching::strategy::Strategy;
use crate::profile::blueprint::{Blueprint, Blueprints};
use crate::profile::descriptors::DescriptorTable;
use crate::profile::elements::ElementList;
use crate::profile::extension::{
    Extension, ExtensionContext, NamedExtension, Retention, ValidationContext,
};
use crate::profile::kind::ElementKind;
use crate::profile::normalize::Normalizer;

#[derive(Debug)]
struct RegisteredExtension {
    retention: Retention,
    extension: Box<dyn Extension>,
}

/// Owns every extension of one profile together with the transient build
/// configuration (normalizers, blueprints, strategy).
#[derive(Debug)]
pub struct ProfileManager {
    extensions: IndexMap<u32, RegisteredExtension>,
    normalizers: HashMap<ElementKind, Arc<dyn Normalizer>>,
    blueprints: Blueprints,
    registry: Arc<TypeRegistry>,
    strategy: Arc<Strategy>,
    is_application: bool,
}

impl ProfileManager {
    /// Manager with only the descriptor table registered.
    pub fn new(registry: Arc<TypeRegistry>, strategy: Arc<Strategy>) -> Self {
        let mut manager = Self {
            extensions: IndexMap::new(),
            normalizers: HashMap::new(),
            blueprints: Blueprints::default(),
            registry,
            strategy,
            is_application: false,
        };
        manager.register(Box::new(DescriptorTable::new()), Retention::Runtime);
        manager
    }

    /// Register an extension. The first registration under a name wins;
    /// returns false if the name was already taken.
    pub fn register(&mut self, extension: Box<dyn Extension>, retention: Retention) -> bool {
        let tag = extension.tag();
        if let Some(existing) = self.extensions.get(&tag) {
            if existing.extension.name() != extension.name() {
                warn!(
                    registered = existing.extension.name(),
                    rejected = extension.name(),
                    tag = format_args!("{tag:#010x}"),
                    "extension tag collision"
                );
            }
            return false;
        }
        debug!(name = extension.name(), ?retention, "registered extension");
        self.extensions.insert(
            tag,
            RegisteredExtension {
                retention,
                extension,
            },
        );
        true
    }

    /// True if an extension named `name` is registered.
    pub fn has(&self, name: &str) -> bool {
        self.extensions.contains_key(&type_hash(name))
    }

    /// Retention of the extension named `name`.
    pub fn retention(&self, name: &str) -> Option<Retention> {
        self.extensions.get(&type_hash(name)).map(|r| r.retention)
    }

    /// Registered extension names with their retention, in wire order.
    pub fn extension_names(&self) -> Vec<(String, Retention)> {
        self.extensions
            .values()
            .map(|r| (r.extension.name().to_string(), r.retention))
            .collect()
    }

    /// Extension registered under `name`, downcast to `E`.
    pub fn get_as<E: Extension>(&self, name: &str) -> Result<&E> {
        self.extensions
            .get(&type_hash(name))
            .and_then(|r| r.extension.as_any().downcast_ref::<E>())
            .ok_or_else(|| LibsiftError::not_registered("extension", name))
    }

    /// Mutable extension registered under `name`, downcast to `E`.
    pub fn get_as_mut<E: Extension>(&mut self, name: &str) -> Result<&mut E> {
        self.extensions
            .get_mut(&type_hash(name))
            .and_then(|r| r.extension.as_any_mut().downcast_mut::<E>())
            .ok_or_else(|| LibsiftError::not_registered("extension", name))
    }

    /// The single extension of type `E`.
    pub fn get<E: NamedExtension>(&self) -> Result<&E> {
        self.get_as::<E>(E::NAME)
    }

    /// Mutable access to the single extension of type `E`.
    pub fn get_mut<E: NamedExtension>(&mut self) -> Result<&mut E> {
        self.get_as_mut::<E>(E::NAME)
    }

    /// The descriptor table.
    pub fn descriptors(&self) -> Result<&DescriptorTable> {
        self.get::<DescriptorTable>()
    }

    /// Register an empty element list for `kind`.
    pub fn register_element_list(&mut self, kind: ElementKind) -> bool {
        self.register(Box::new(ElementList::new(kind)), Retention::Runtime)
    }

    /// Element list for `kind`.
    pub fn elements(&self, kind: &ElementKind) -> Result<&ElementList> {
        self.get_as::<ElementList>(&kind.list_extension_name())
            .map_err(|_| LibsiftError::not_registered("element kind", kind.name()))
    }

    /// Mutable element list for `kind`.
    pub fn elements_mut(&mut self, kind: &ElementKind) -> Result<&mut ElementList> {
        self.get_as_mut::<ElementList>(&kind.list_extension_name())
            .map_err(|_| LibsiftError::not_registered("element kind", kind.name()))
    }

    /// Kinds that have an element list, in registration order.
    pub fn element_kinds(&self) -> Vec<ElementKind> {
        self.extensions
            .values()
            .filter_map(|r| r.extension.as_any().downcast_ref::<ElementList>())
            .map(|list| list.kind().clone())
            .collect()
    }

    /// Register the blueprint for its kind; a kind takes one blueprint.
    pub fn register_blueprint(&mut self, blueprint: Blueprint) -> Result<()> {
        self.blueprints.register(blueprint)
    }

    /// Blueprint for `kind`.
    pub fn blueprint(&self, kind: &ElementKind) -> Result<&Blueprint> {
        self.blueprints.get(kind)
    }

    /// Every registered blueprint.
    pub fn blueprints(&self) -> &Blueprints {
        &self.blueprints
    }

    /// Install the normalizer for `kind`, replacing any previous one.
    pub fn register_normalizer(&mut self, kind: ElementKind, normalizer: Arc<dyn Normalizer>) {
        self.normalizers.insert(kind, normalizer);
    }

    /// Normalizer for `kind`, if any.
    pub fn normalizer(&self, kind: &ElementKind) -> Option<&Arc<dyn Normalizer>> {
        self.normalizers.get(kind)
    }

    /// Type registry used for typed constants.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Active strategy.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Replace the active strategy.
    pub fn set_strategy(&mut self, strategy: Arc<Strategy>) {
        self.strategy = strategy;
    }

    /// True for application profiles, false for library profiles.
    pub fn is_application(&self) -> bool {
        self.is_application
    }

    /// Mark the profile as an application or a library.
    pub fn set_application(&mut self, is_application: bool) {
        self.is_application = is_application;
    }

    /// Write every runtime extension.
    pub fn write_all(&self, sink: &mut dyn Write) -> Result<()> {
        let ctx = ExtensionContext {
            registry: &self.registry,
            blueprints: &self.blueprints,
        };
        let runtime: Vec<&RegisteredExtension> = self
            .extensions
            .values()
            .filter(|r| r.retention == Retention::Runtime)
            .collect();
        let count = i32::try_from(runtime.len())
            .map_err(|_| LibsiftError::internal("extension count exceeds i32 range"))?;

        let mut writer = ProfileWriter::new(sink);
        writer.write_i32(count)?;
        for registered in runtime {
            let start = writer.position();
            writer.write_u32(registered.extension.tag())?;
            registered.extension.write(&mut writer, &ctx)?;
            debug!(
                name = registered.extension.name(),
                bytes = writer.position() - start,
                "wrote extension"
            );
        }
        Ok(())
    }

    /// Replace every extension's state with the contents of `source`.
    ///
    /// On failure all extensions are reset, so a partially read profile is
    /// never observable.
    pub fn read_all(&mut self, source: &mut dyn Read) -> Result<()> {
        self.reset();
        let result = self
            .read_extensions(source)
            .and_then(|()| self.validate_references());
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn read_extensions(&mut self, source: &mut dyn Read) -> Result<()> {
        let Self {
            extensions,
            registry,
            blueprints,
            ..
        } = self;
        let ctx = ExtensionContext {
            registry: registry.as_ref(),
            blueprints,
        };

        let mut reader = ProfileReader::new(source);
        let count = reader.read_i32()?;
        if count < 0 {
            return Err(reader.error(format!("negative extension count {count}")));
        }
        if count as usize > extensions.len() {
            return Err(reader.error(format!(
                "extension count {count} exceeds the {} registered extensions",
                extensions.len()
            )));
        }

        let mut seen = HashSet::with_capacity(count as usize);
        for _ in 0..count {
            let tag = reader.read_u32()?;
            if !seen.insert(tag) {
                return Err(reader.error(format!("extension tag {tag:#010x} appears twice")));
            }
            let registered = extensions
                .get_mut(&tag)
                .ok_or_else(|| reader.error(format!("unknown extension tag {tag:#010x}")))?;
            registered.extension.read(&mut reader, &ctx)?;
            debug!(name = registered.extension.name(), "read extension");
        }
        Ok(())
    }

    fn validate_references(&self) -> Result<()> {
        let ctx = ValidationContext {
            descriptor_count: self.descriptors()?.len(),
        };
        self.extensions
            .values()
            .try_for_each(|r| r.extension.validate(&ctx))
    }

    /// Clear every extension's state for reuse.
    pub fn reset(&mut self) {
        for registered in self.extensions.values_mut() {
            registered.extension.reset();
        }
    }
}

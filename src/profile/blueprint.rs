//! Blueprints: per-kind declarations of extra serializable element fields.
//!
//! Declaration order is the wire order. A writer and a reader must declare
//! the same keys in the same order for the same kind, which is why blueprints
//! are assembled by the same build steps on both sides.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::warn;

use crate::codec::registry::{TypeRegistry, ValueFactory};
use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::core::errors::{LibsiftError, Result};
use crate::profile::element::ProfileElement;
use crate::profile::kind::ElementKind;

/// Ordered field declaration for one element kind.
#[derive(Debug, Clone)]
pub struct Blueprint {
    kind: ElementKind,
    fields: IndexMap<String, ValueFactory>,
}

impl Blueprint {
    /// Empty blueprint for `kind`.
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            fields: IndexMap::new(),
        }
    }

    /// Builder-style declaration. Re-declaring a key keeps its original
    /// position and the first factory.
    pub fn add(mut self, key: impl Into<String>, factory: ValueFactory) -> Self {
        let key = key.into();
        if self.add_field(key.clone(), factory).is_err() {
            warn!(kind = %self.kind, key = %key, "field declared twice; keeping first declaration");
        }
        self
    }

    /// Declare a field and return its slot index.
    pub fn add_field(&mut self, key: impl Into<String>, factory: ValueFactory) -> Result<usize> {
        let key = key.into();
        if self.fields.contains_key(&key) {
            return Err(LibsiftError::config_field(
                format!("field '{key}' already declared for {}", self.kind),
                key,
            ));
        }
        self.fields.insert(key, factory);
        Ok(self.fields.len() - 1)
    }

    /// Kind this blueprint is bound to.
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Slot index for `key`.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.fields.get_index_of(key)
    }

    /// Slot index for `key`, failing if it was never declared.
    pub fn require_index(&self, key: &str) -> Result<usize> {
        self.index_of(key).ok_or_else(|| {
            LibsiftError::not_registered("blueprint field", format!("{}.{key}", self.kind))
        })
    }

    /// Declared keys in wire order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fresh element of this kind with every slot empty.
    pub fn instantiate(&self, descriptor: u32) -> ProfileElement {
        ProfileElement::new(self.kind.clone(), descriptor, self.fields.len())
    }

    /// Write the descriptor index followed by every declared field in order.
    pub fn write(
        &self,
        element: &ProfileElement,
        writer: &mut ProfileWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        if element.kind() != &self.kind {
            return Err(LibsiftError::config(format!(
                "blueprint for {} cannot write a {} element",
                self.kind,
                element.kind()
            )));
        }
        if element.field_count() != self.fields.len() {
            return Err(LibsiftError::config(format!(
                "{} element has {} slots but its blueprint declares {}",
                self.kind,
                element.field_count(),
                self.fields.len()
            )));
        }

        writer.write_varint(u64::from(element.descriptor()))?;
        for (index, key) in self.fields.keys().enumerate() {
            let value = element.value(index).ok_or_else(|| {
                LibsiftError::config_field(
                    format!("{} element is missing field '{key}'", self.kind),
                    key.clone(),
                )
            })?;
            value.encode(writer, registry)?;
        }
        Ok(())
    }

    /// Read one element: allocate it, then decode each declared field into a
    /// fresh value from that field's factory.
    pub fn read(
        &self,
        reader: &mut ProfileReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<ProfileElement> {
        let descriptor = reader.read_index()?;
        let mut element = self.instantiate(descriptor);
        for (index, factory) in self.fields.values().enumerate() {
            let mut value = factory();
            value.decode(reader, registry)?;
            element.set_value(index, value)?;
        }
        Ok(element)
    }
}

/// At most one blueprint per element kind.
#[derive(Debug, Clone, Default)]
pub struct Blueprints {
    by_kind: HashMap<ElementKind, Blueprint>,
}

impl Blueprints {
    /// Register a blueprint; a second blueprint for the same kind is refused.
    pub fn register(&mut self, blueprint: Blueprint) -> Result<()> {
        if self.by_kind.contains_key(blueprint.kind()) {
            return Err(LibsiftError::config(format!(
                "a blueprint for {} is already registered",
                blueprint.kind()
            )));
        }
        self.by_kind.insert(blueprint.kind().clone(), blueprint);
        Ok(())
    }

    /// Blueprint for `kind`.
    pub fn get(&self, kind: &ElementKind) -> Result<&Blueprint> {
        self.by_kind
            .get(kind)
            .ok_or_else(|| LibsiftError::not_registered("blueprint", kind.name()))
    }

    /// True if `kind` has a blueprint.
    pub fn contains(&self, kind: &ElementKind) -> bool {
        self.by_kind.contains_key(kind)
    }

    /// Kinds with a blueprint, sorted by name.
    pub fn kinds(&self) -> Vec<ElementKind> {
        let mut kinds: Vec<ElementKind> = self.by_kind.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Number of registered blueprints.
    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    /// True when no blueprint is registered.
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::registry::factory_of;
    use crate::codec::values::{IntValue, IntVectorValue, StringValue};

    fn method_blueprint() -> Blueprint {
        Blueprint::new(ElementKind::METHOD)
            .add("arity", factory_of::<IntValue>)
            .add("shape", factory_of::<IntVectorValue>)
    }

    #[test]
    fn test_declaration_order_is_slot_order() {
        let blueprint = method_blueprint().add("owner", factory_of::<StringValue>);
        assert_eq!(blueprint.keys().collect::<Vec<_>>(), vec!["arity", "shape", "owner"]);
        assert_eq!(blueprint.index_of("owner"), Some(2));
        assert!(blueprint.require_index("missing").is_err());
    }

    #[test]
    fn test_duplicate_key_keeps_first_position() {
        let mut blueprint = method_blueprint();
        assert!(blueprint.add_field("arity", factory_of::<StringValue>).is_err());
        let blueprint = blueprint.add("arity", factory_of::<StringValue>);
        assert_eq!(blueprint.len(), 2);
        assert_eq!(blueprint.index_of("arity"), Some(0));
    }

    #[test]
    fn test_write_then_read_element() {
        let registry = TypeRegistry::with_defaults();
        let blueprint = method_blueprint();
        let mut element = blueprint.instantiate(7);
        element.set_value(0, Box::new(IntValue(2))).unwrap();
        element
            .set_value(1, Box::new(IntVectorValue(vec![1, 0, 4])))
            .unwrap();

        let mut buf = Vec::new();
        blueprint
            .write(&element, &mut ProfileWriter::new(&mut buf), &registry)
            .unwrap();

        let mut cursor = &buf[..];
        let decoded = blueprint
            .read(&mut ProfileReader::new(&mut cursor), &registry)
            .unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn test_write_fails_on_absent_field() {
        let registry = TypeRegistry::with_defaults();
        let blueprint = method_blueprint();
        let mut element = blueprint.instantiate(0);
        element.set_value(0, Box::new(IntValue(1))).unwrap();

        let mut buf = Vec::new();
        let err = blueprint
            .write(&element, &mut ProfileWriter::new(&mut buf), &registry)
            .unwrap_err();
        assert!(err.to_string().contains("shape"));
    }

    #[test]
    fn test_mismatched_reader_declaration_misreads() {
        let registry = TypeRegistry::with_defaults();
        let writer_blueprint = Blueprint::new(ElementKind::FIELD)
            .add("name", factory_of::<StringValue>)
            .add("flags", factory_of::<IntValue>);
        let reader_blueprint = Blueprint::new(ElementKind::FIELD)
            .add("flags", factory_of::<IntValue>)
            .add("name", factory_of::<StringValue>);

        let mut element = writer_blueprint.instantiate(0);
        element
            .set_value(0, Box::new(StringValue("count".into())))
            .unwrap();
        element.set_value(1, Box::new(IntValue(3))).unwrap();
        let mut buf = Vec::new();
        writer_blueprint
            .write(&element, &mut ProfileWriter::new(&mut buf), &registry)
            .unwrap();

        let mut cursor = &buf[..];
        let decoded = reader_blueprint.read(&mut ProfileReader::new(&mut cursor), &registry);
        assert!(decoded.map_or(true, |e| e != element));
    }

    #[test]
    fn test_one_blueprint_per_kind() {
        let mut blueprints = Blueprints::default();
        blueprints.register(method_blueprint()).unwrap();
        assert!(blueprints.register(Blueprint::new(ElementKind::METHOD)).is_err());
        assert!(blueprints.get(&ElementKind::METHOD).is_ok());
        assert!(matches!(
            blueprints.get(&ElementKind::CLASS),
            Err(LibsiftError::NotRegistered { .. })
        ));
    }
}

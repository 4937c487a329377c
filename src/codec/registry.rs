//! Closed registry of constructible value types.
//!
//! A typed constant is written as a 4-byte hash of its type name followed by
//! the payload. The reader resolves the hash against this table, so the set
//! of readable types is exactly what was registered when the registry was
//! built. Registries are built at startup and passed by reference.

use std::collections::HashMap;

use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::codec::values::{
    BoolValue, FieldValue, FloatValue, HashSetValue, IntValue, IntVectorValue, ListValue,
    MapValue, StringValue, TypedValue,
};
use crate::core::errors::{LibsiftError, Result};
use crate::matching::algorithms;

/// Factory producing an empty value ready for decoding.
pub type ValueFactory = fn() -> Box<dyn FieldValue>;

/// Stable 32-bit hash of a type or extension name.
pub fn type_hash(name: &str) -> u32 {
    xxh3_64(name.as_bytes()) as u32
}

/// Factory for any default-constructible typed value.
pub fn factory_of<T: TypedValue>() -> Box<dyn FieldValue> {
    Box::new(T::default())
}

#[derive(Debug, Clone, Copy)]
struct RegisteredType {
    name: &'static str,
    factory: ValueFactory,
}

/// Hash to factory table for typed constants.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<u32, RegisteredType>,
}

impl TypeRegistry {
    /// Registry with no types at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in values and every value type
    /// used by the bundled similarity algorithms.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin::<IntValue>();
        registry.register_builtin::<FloatValue>();
        registry.register_builtin::<BoolValue>();
        registry.register_builtin::<StringValue>();
        registry.register_builtin::<IntVectorValue>();
        registry.register_builtin::<HashSetValue>();
        registry.register_builtin::<ListValue>();
        registry.register_builtin::<MapValue>();
        algorithms::register_value_types(&mut registry);
        registry
    }

    pub(crate) fn register_builtin<T: TypedValue>(&mut self) {
        let previous = self.types.insert(
            type_hash(T::TYPE_NAME),
            RegisteredType {
                name: T::TYPE_NAME,
                factory: factory_of::<T>,
            },
        );
        debug_assert!(
            previous.map_or(true, |p| p.name == T::TYPE_NAME),
            "built-in type hash collision for {}",
            T::TYPE_NAME
        );
    }

    /// Register a typed value. Registering the same name twice is a no-op;
    /// two different names hashing to the same tag is a configuration error.
    pub fn register<T: TypedValue>(&mut self) -> Result<()> {
        self.register_factory(T::TYPE_NAME, factory_of::<T>)
    }

    /// Register a factory under an explicit name.
    pub fn register_factory(&mut self, name: &'static str, factory: ValueFactory) -> Result<()> {
        let hash = type_hash(name);
        match self.types.get(&hash) {
            Some(existing) if existing.name == name => Ok(()),
            Some(existing) => Err(LibsiftError::config(format!(
                "type hash collision between '{}' and '{}' ({hash:#010x})",
                existing.name, name
            ))),
            None => {
                debug!(type_name = name, hash = format_args!("{hash:#010x}"), "registered value type");
                self.types.insert(hash, RegisteredType { name, factory });
                Ok(())
            }
        }
    }

    /// True if a type with this hash is registered.
    pub fn contains(&self, hash: u32) -> bool {
        self.types.contains_key(&hash)
    }

    /// Name registered for a hash.
    pub fn name_of(&self, hash: u32) -> Option<&'static str> {
        self.types.get(&hash).map(|t| t.name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Construct an empty value for a registered hash.
    pub fn create(&self, hash: u32) -> Option<Box<dyn FieldValue>> {
        self.types.get(&hash).map(|t| (t.factory)())
    }

    /// Write `value` as a typed constant: type hash, then payload.
    ///
    /// Writing a type the registry does not know is refused, since no reader
    /// configured like this one could decode it.
    pub fn write_typed(&self, value: &dyn FieldValue, writer: &mut ProfileWriter<'_>) -> Result<()> {
        let hash = type_hash(value.type_name());
        if !self.contains(hash) {
            return Err(LibsiftError::not_registered("value type", value.type_name()));
        }
        writer.write_u32(hash)?;
        value.encode(writer, self)
    }

    /// Read a typed constant. An unknown hash aborts the read, as does
    /// nesting typed constants deeper than
    /// [`MAX_NESTING`](crate::codec::stream::MAX_NESTING).
    pub fn read_typed(&self, reader: &mut ProfileReader<'_>) -> Result<Box<dyn FieldValue>> {
        let offset = reader.position();
        let hash = reader.read_u32()?;
        let mut value = self.create(hash).ok_or_else(|| {
            LibsiftError::format_at(format!("unregistered value type hash {hash:#010x}"), offset)
        })?;
        reader.enter_nested()?;
        let decoded = value.decode(reader, self);
        reader.exit_nested();
        decoded?;
        Ok(value)
    }
}

//! Serializable values carried by blueprint fields and typed constants.
//!
//! A [`FieldValue`] knows how to encode and decode its own payload. Values that
//! may also appear as self-describing typed constants implement
//! [`TypedValue`], which gives them a stable name for the type registry.

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;

use crate::codec::registry::TypeRegistry;
use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::core::errors::Result;

/// A value stored in a profile element field or a typed collection.
pub trait FieldValue: ValueObject + fmt::Debug + Send + Sync {
    /// Stable type name; its hash identifies the type on the wire.
    fn type_name(&self) -> &'static str;

    /// Write the payload (without any type tag).
    fn encode(&self, writer: &mut ProfileWriter<'_>, registry: &TypeRegistry) -> Result<()>;

    /// Replace `self` with a payload read from the stream.
    fn decode(&mut self, reader: &mut ProfileReader<'_>, registry: &TypeRegistry) -> Result<()>;
}

/// Object-safe plumbing shared by every [`FieldValue`].
///
/// Implemented for all `Clone + PartialEq` field values.
pub trait ValueObject {
    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;

    /// Clone behind a box.
    fn clone_value(&self) -> Box<dyn FieldValue>;

    /// Structural equality against another boxed value.
    fn value_eq(&self, other: &dyn FieldValue) -> bool;
}

impl<T> ValueObject for T
where
    T: FieldValue + Clone + PartialEq + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> Box<dyn FieldValue> {
        Box::new(self.clone())
    }

    fn value_eq(&self, other: &dyn FieldValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }
}

impl Clone for Box<dyn FieldValue> {
    fn clone(&self) -> Self {
        self.clone_value()
    }
}

impl PartialEq for Box<dyn FieldValue> {
    fn eq(&self, other: &Self) -> bool {
        self.value_eq(other.as_ref())
    }
}

/// A field value with a registered, stable type name.
pub trait TypedValue: FieldValue + Default + 'static {
    /// Name hashed into the 4-byte type tag.
    const TYPE_NAME: &'static str;
}

/// Downcast a boxed value to a concrete type.
pub fn downcast<T: FieldValue + 'static>(value: &dyn FieldValue) -> Option<&T> {
    value.as_any().downcast_ref::<T>()
}

/// Signed integer constant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntValue(pub i64);

impl FieldValue for IntValue {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, _registry: &TypeRegistry) -> Result<()> {
        writer.write_signed(self.0)
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, _registry: &TypeRegistry) -> Result<()> {
        self.0 = reader.read_signed()?;
        Ok(())
    }
}

impl TypedValue for IntValue {
    const TYPE_NAME: &'static str = "libsift.int";
}

/// Floating point constant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FloatValue(pub f64);

impl FieldValue for FloatValue {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, _registry: &TypeRegistry) -> Result<()> {
        writer.write_f64(self.0)
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, _registry: &TypeRegistry) -> Result<()> {
        self.0 = reader.read_f64()?;
        Ok(())
    }
}

impl TypedValue for FloatValue {
    const TYPE_NAME: &'static str = "libsift.float";
}

/// Boolean constant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolValue(pub bool);

impl FieldValue for BoolValue {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, _registry: &TypeRegistry) -> Result<()> {
        writer.write_bool(self.0)
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, _registry: &TypeRegistry) -> Result<()> {
        self.0 = reader.read_bool()?;
        Ok(())
    }
}

impl TypedValue for BoolValue {
    const TYPE_NAME: &'static str = "libsift.bool";
}

/// String constant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringValue(pub String);

impl FieldValue for StringValue {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, _registry: &TypeRegistry) -> Result<()> {
        writer.write_str(&self.0)
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, _registry: &TypeRegistry) -> Result<()> {
        self.0 = reader.read_string()?;
        Ok(())
    }
}

impl TypedValue for StringValue {
    const TYPE_NAME: &'static str = "libsift.string";
}

/// Fixed-dimension integer feature vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntVectorValue(pub Vec<i32>);

impl FieldValue for IntVectorValue {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, _registry: &TypeRegistry) -> Result<()> {
        writer.write_len(self.0.len())?;
        for component in &self.0 {
            writer.write_signed(i64::from(*component))?;
        }
        Ok(())
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, _registry: &TypeRegistry) -> Result<()> {
        let len = reader.read_len()?;
        let mut components = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            let raw = reader.read_signed()?;
            let component = i32::try_from(raw)
                .map_err(|_| reader.error(format!("vector component {raw} exceeds i32")))?;
            components.push(component);
        }
        self.0 = components;
        Ok(())
    }
}

impl TypedValue for IntVectorValue {
    const TYPE_NAME: &'static str = "libsift.int_vector";
}

/// Sorted, deduplicated set of 64-bit hashes.
///
/// Hashes are delta-encoded as varints, which keeps dense sets small.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashSetValue(Vec<u64>);

impl HashSetValue {
    /// Build from arbitrary hashes, sorting and deduplicating them.
    pub fn from_hashes(hashes: impl IntoIterator<Item = u64>) -> Self {
        let mut hashes: Vec<u64> = hashes.into_iter().collect();
        hashes.sort_unstable();
        hashes.dedup();
        Self(hashes)
    }

    /// Sorted hashes.
    pub fn hashes(&self) -> &[u64] {
        &self.0
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the set holds no hashes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Size of the intersection with `other`, by merge walk.
    pub fn intersection_len(&self, other: &Self) -> usize {
        let (mut i, mut j, mut shared) = (0, 0, 0);
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].cmp(&other.0[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        shared
    }
}

impl FieldValue for HashSetValue {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, _registry: &TypeRegistry) -> Result<()> {
        writer.write_len(self.0.len())?;
        let mut previous = 0u64;
        for hash in &self.0 {
            writer.write_varint(hash - previous)?;
            previous = *hash;
        }
        Ok(())
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, _registry: &TypeRegistry) -> Result<()> {
        let len = reader.read_len()?;
        let mut hashes = Vec::with_capacity(len.min(1 << 16));
        let mut previous = 0u64;
        for index in 0..len {
            let delta = reader.read_varint()?;
            if index > 0 && delta == 0 {
                return Err(reader.error("hash set is not strictly increasing"));
            }
            previous = previous
                .checked_add(delta)
                .ok_or_else(|| reader.error("hash set delta overflows"))?;
            hashes.push(previous);
        }
        self.0 = hashes;
        Ok(())
    }
}

impl TypedValue for HashSetValue {
    const TYPE_NAME: &'static str = "libsift.hash_set";
}

/// Typed collection: every element carries its own type tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListValue(pub Vec<Box<dyn FieldValue>>);

impl FieldValue for ListValue {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, registry: &TypeRegistry) -> Result<()> {
        writer.write_len(self.0.len())?;
        for item in &self.0 {
            registry.write_typed(item.as_ref(), writer)?;
        }
        Ok(())
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, registry: &TypeRegistry) -> Result<()> {
        let len = reader.read_len()?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(registry.read_typed(reader)?);
        }
        self.0 = items;
        Ok(())
    }
}

impl TypedValue for ListValue {
    const TYPE_NAME: &'static str = "libsift.list";
}

/// String-keyed attribute map whose values are typed constants.
///
/// Insertion order is kept and is also the wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapValue(pub IndexMap<String, Box<dyn FieldValue>>);

impl MapValue {
    /// Set or replace the value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Box<dyn FieldValue>) {
        self.0.insert(key.into(), value);
    }

    /// Value under `key`.
    pub fn get(&self, key: &str) -> Option<&dyn FieldValue> {
        self.0.get(key).map(|v| v.as_ref())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

impl FieldValue for MapValue {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn encode(&self, writer: &mut ProfileWriter<'_>, registry: &TypeRegistry) -> Result<()> {
        writer.write_len(self.0.len())?;
        for (key, value) in &self.0 {
            writer.write_str(key)?;
            registry.write_typed(value.as_ref(), writer)?;
        }
        Ok(())
    }

    fn decode(&mut self, reader: &mut ProfileReader<'_>, registry: &TypeRegistry) -> Result<()> {
        let len = reader.read_len()?;
        let mut entries = IndexMap::with_capacity(len.min(256));
        for _ in 0..len {
            let key = reader.read_string()?;
            let value = registry.read_typed(reader)?;
            if entries.insert(key, value).is_some() {
                return Err(reader.error("attribute map repeats a key"));
            }
        }
        self.0 = entries;
        Ok(())
    }
}

impl TypedValue for MapValue {
    const TYPE_NAME: &'static str = "libsift.map";
}

//! Interned descriptor table.
//!
//! Structural signatures repeat heavily across a profile, so each distinct
//! string is stored once together with how many elements referenced it, and
//! everything else refers to it by index. Interning is thread-safe so that
//! parallel extractors can contribute to one table; it is the only
//! synchronized mutation during profile construction.

use std::any::Any;

use lasso::{Capacity, Key, Spur, ThreadedRodeo};
use parking_lot::Mutex;

use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::core::errors::Result;
use crate::profile::extension::{Extension, ExtensionContext, NamedExtension};

/// Descriptor strings and their occurrence counts.
#[derive(Debug)]
pub struct DescriptorTable {
    interner: ThreadedRodeo,
    counts: Mutex<Vec<u32>>,
}

impl DescriptorTable {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            interner: ThreadedRodeo::default(),
            counts: Mutex::new(Vec::new()),
        }
    }

    /// Empty table sized for `capacity` distinct descriptors.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            interner: ThreadedRodeo::with_capacity(Capacity::for_strings(capacity)),
            counts: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Intern `descriptor`, bump its occurrence count and return its index.
    pub fn intern(&self, descriptor: &str) -> u32 {
        let index = self.interner.get_or_intern(descriptor).into_usize();
        let mut counts = self.counts.lock();
        if counts.len() <= index {
            counts.resize(index + 1, 0);
        }
        counts[index] = counts[index].saturating_add(1);
        index as u32
    }

    /// Index of an already-interned descriptor.
    pub fn index_of(&self, descriptor: &str) -> Option<u32> {
        self.interner.get(descriptor).map(|key| key.into_usize() as u32)
    }

    /// Descriptor string at `index`.
    pub fn resolve(&self, index: u32) -> Option<&str> {
        let key = Spur::try_from_usize(index as usize)?;
        self.interner.try_resolve(&key)
    }

    /// Occurrence count of the descriptor at `index`.
    pub fn count(&self, index: u32) -> u32 {
        self.counts
            .lock()
            .get(index as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct descriptors.
    pub fn len(&self) -> usize {
        self.interner.len()
    }

    /// True when nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }

    /// Total number of references across all descriptors.
    pub fn total_occurrences(&self) -> u64 {
        self.counts.lock().iter().map(|c| u64::from(*c)).sum()
    }

    /// `(index, descriptor, count)` in index order.
    pub fn entries(&self) -> Vec<(u32, String, u32)> {
        let counts = self.counts.lock();
        (0..self.len() as u32)
            .filter_map(|index| {
                self.resolve(index).map(|descriptor| {
                    let count = counts.get(index as usize).copied().unwrap_or(0);
                    (index, descriptor.to_string(), count)
                })
            })
            .collect()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NamedExtension for DescriptorTable {
    const NAME: &'static str = "descriptors";
}

impl Extension for DescriptorTable {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn write(&self, writer: &mut ProfileWriter<'_>, _ctx: &ExtensionContext<'_>) -> Result<()> {
        let entries = self.entries();
        writer.write_len(entries.len())?;
        for (_, descriptor, count) in &entries {
            writer.write_str(descriptor)?;
            writer.write_varint(u64::from(*count))?;
        }
        Ok(())
    }

    fn read(&mut self, reader: &mut ProfileReader<'_>, _ctx: &ExtensionContext<'_>) -> Result<()> {
        let len = reader.read_len()?;
        let interner: ThreadedRodeo<Spur> = ThreadedRodeo::with_capacity(Capacity::for_strings(len.min(1 << 16)));
        let mut counts = Vec::with_capacity(len.min(1 << 16));

        for expected in 0..len {
            let descriptor = reader.read_string()?;
            let count = reader.read_index()?;
            let index = interner.get_or_intern(&descriptor).into_usize();
            if index != expected {
                return Err(reader.error(format!("duplicate descriptor '{descriptor}'")));
            }
            counts.push(count);
        }

        self.interner = interner;
        *self.counts.get_mut() = counts;
        Ok(())
    }

    fn reset(&mut self) {
        self.interner = ThreadedRodeo::default();
        self.counts.get_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//! Profile elements: class, method, field and package fingerprints.

use crate::codec::values::{downcast, FieldValue};
use crate::core::errors::{LibsiftError, Result};
use crate::profile::kind::ElementKind;

/// One fingerprinted program element.
///
/// The descriptor is an index into the owning manager's descriptor table.
/// Field slots are addressed by position; the blueprint bound to the
/// element's kind maps field names to positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileElement {
    kind: ElementKind,
    descriptor: u32,
    fields: Vec<Option<Box<dyn FieldValue>>>,
}

impl ProfileElement {
    pub(crate) fn new(kind: ElementKind, descriptor: u32, field_count: usize) -> Self {
        Self {
            kind,
            descriptor,
            fields: vec![None; field_count],
        }
    }

    /// Kind of this element.
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Index into the descriptor table.
    pub fn descriptor(&self) -> u32 {
        self.descriptor
    }

    /// Number of field slots.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Value stored at `index`, if set.
    pub fn value(&self, index: usize) -> Option<&dyn FieldValue> {
        self.fields.get(index)?.as_deref()
    }

    /// Value at `index` downcast to `T`.
    pub fn value_as<T: FieldValue + 'static>(&self, index: usize) -> Option<&T> {
        self.value(index).and_then(downcast::<T>)
    }

    /// Store a value in slot `index`.
    pub fn set_value(&mut self, index: usize, value: Box<dyn FieldValue>) -> Result<()> {
        let slots = self.fields.len();
        let slot = self.fields.get_mut(index).ok_or_else(|| {
            LibsiftError::config(format!(
                "field index {index} out of range for {} element with {slots} fields",
                self.kind
            ))
        })?;
        *slot = Some(value);
        Ok(())
    }

    /// True when every slot has a value.
    pub fn is_complete(&self) -> bool {
        self.fields.iter().all(Option::is_some)
    }
}

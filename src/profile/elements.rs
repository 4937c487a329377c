//! Per-kind element lists.

use std::any::Any;

use crate::codec::stream::{ProfileReader, ProfileWriter};
use crate::core::errors::{LibsiftError, Result};
use crate::profile::element::ProfileElement;
use crate::profile::extension::{Extension, ExtensionContext, ValidationContext};
use crate::profile::kind::ElementKind;

/// All elements of one kind, in insertion order.
///
/// Registered under `elements.<kind>`; the elements themselves are encoded
/// through the blueprint bound to the kind.
#[derive(Debug, Clone)]
pub struct ElementList {
    kind: ElementKind,
    name: String,
    elements: Vec<ProfileElement>,
}

impl ElementList {
    /// Empty list for `kind`.
    pub fn new(kind: ElementKind) -> Self {
        let name = kind.list_extension_name();
        Self {
            kind,
            name,
            elements: Vec::new(),
        }
    }

    /// Kind of the elements held here.
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Append an element and return its position.
    pub fn push(&mut self, element: ProfileElement) -> Result<usize> {
        if element.kind() != &self.kind {
            return Err(LibsiftError::config(format!(
                "cannot add a {} element to the {} list",
                element.kind(),
                self.kind
            )));
        }
        self.elements.push(element);
        Ok(self.elements.len() - 1)
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<&ProfileElement> {
        self.elements.get(index)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when the list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in append order.
    pub fn iter(&self) -> std::slice::Iter<'_, ProfileElement> {
        self.elements.iter()
    }

    /// Elements as a slice.
    pub fn as_slice(&self) -> &[ProfileElement] {
        &self.elements
    }
}

impl<'a> IntoIterator for &'a ElementList {
    type Item = &'a ProfileElement;
    type IntoIter = std::slice::Iter<'a, ProfileElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl Extension for ElementList {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, writer: &mut ProfileWriter<'_>, ctx: &ExtensionContext<'_>) -> Result<()> {
        let blueprint = ctx.blueprints.get(&self.kind)?;
        writer.write_len(self.elements.len())?;
        for element in &self.elements {
            blueprint.write(element, writer, ctx.registry)?;
        }
        Ok(())
    }

    fn read(&mut self, reader: &mut ProfileReader<'_>, ctx: &ExtensionContext<'_>) -> Result<()> {
        let blueprint = ctx.blueprints.get(&self.kind)?;
        let len = reader.read_len()?;
        let mut elements = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            elements.push(blueprint.read(reader, ctx.registry)?);
        }
        self.elements = elements;
        Ok(())
    }

    fn reset(&mut self) {
        self.elements.clear();
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<()> {
        if let Some((position, element)) = self
            .elements
            .iter()
            .enumerate()
            .find(|(_, e)| e.descriptor() as usize >= ctx.descriptor_count)
        {
            return Err(LibsiftError::format(format!(
                "{} element {position} references descriptor {} but the table has {} entries",
                self.kind,
                element.descriptor(),
                ctx.descriptor_count
            )));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//! Element kind identifiers.

use std::borrow::Cow;
use std::fmt;

use serde::{Serialize, Serializer};

/// Identifies the concrete kind of a profile element.
///
/// Kinds key every per-kind table: blueprints, element lists, similarity
/// functions, build steps, normalizers and thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKind {
    name: Cow<'static, str>,
}

impl ElementKind {
    /// Class (type) fingerprints
    pub const CLASS: ElementKind = ElementKind::builtin("class");
    /// Method fingerprints
    pub const METHOD: ElementKind = ElementKind::builtin("method");
    /// Field fingerprints
    pub const FIELD: ElementKind = ElementKind::builtin("field");
    /// Package fingerprints
    pub const PACKAGE: ElementKind = ElementKind::builtin("package");

    const fn builtin(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
        }
    }

    /// The four built-in kinds.
    pub fn builtins() -> [ElementKind; 4] {
        [Self::CLASS, Self::METHOD, Self::FIELD, Self::PACKAGE]
    }

    /// A kind outside the built-in set.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::from_name(&name.into())
    }

    /// Resolve a kind by name; built-in names map to the built-in constants.
    pub fn from_name(name: &str) -> Self {
        Self::builtins()
            .into_iter()
            .find(|kind| kind.name() == name)
            .unwrap_or_else(|| Self {
                name: Cow::Owned(name.to_string()),
            })
    }

    /// Kind name as used in configuration and reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the element list extension holding elements of this kind.
    pub fn list_extension_name(&self) -> String {
        format!("elements.{}", self.name)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for ElementKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(ElementKind::from_name("method"), ElementKind::METHOD);
        assert_eq!(ElementKind::custom("class"), ElementKind::CLASS);
        assert_eq!(ElementKind::CLASS.list_extension_name(), "elements.class");
    }

    #[test]
    fn test_custom_kind() {
        let kind = ElementKind::custom("resource");
        assert_eq!(kind.name(), "resource");
        assert_eq!(kind.to_string(), "resource");
        assert!(!ElementKind::builtins().contains(&kind));
    }
}

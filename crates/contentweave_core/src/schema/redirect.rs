//! Declarative redirect rules.
//!
//! # Responsibility
//! - Describe which properties of a content type are sourced from, and
//!   written to, a related container at a derived path.
//! - Parse property pair declarations once at registration.
//!
//! # Invariants
//! - A pair string is `destination > source`, or one shared path.
//! - A trailing `<` on the destination marks a writeback pair; the marker is
//!   stripped from both sides before the paths are compiled.

use super::RegistryError;
use crate::model::property_path::PropertyPath;
use crate::model::TypeName;

const WRITEBACK_MARKER: char = '<';
const PAIR_SEPARATOR: char = '>';

/// One `destination ↔ source` property mapping of a redirect rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPair {
    /// Path on the primary content.
    pub destination: PropertyPath,
    /// Path on the referenced content (or record, for writebacks).
    pub source: PropertyPath,
    /// Copy `source` back into `destination` after the referenced record is
    /// persisted.
    pub writeback: bool,
}

impl PropertyPair {
    pub fn parse(declaration: &str) -> Result<Self, String> {
        let declaration = declaration.trim();
        let (destination, source) = match declaration.split_once(PAIR_SEPARATOR) {
            Some((destination, source)) => (destination.trim(), source.trim()),
            None => (declaration, declaration),
        };
        if source.contains(PAIR_SEPARATOR) {
            return Err(format!("property pair `{declaration}` has more than one `>`"));
        }

        let writeback = destination.ends_with(WRITEBACK_MARKER);
        if !writeback && source.ends_with(WRITEBACK_MARKER) {
            return Err(format!(
                "property pair `{declaration}` marks only the source side as writeback"
            ));
        }
        let destination = destination.trim_end_matches(WRITEBACK_MARKER);
        let source = source.trim_end_matches(WRITEBACK_MARKER);

        let destination = PropertyPath::parse(destination)
            .map_err(|err| format!("property pair `{declaration}`: {err}"))?;
        let source = PropertyPath::parse(source)
            .map_err(|err| format!("property pair `{declaration}`: {err}"))?;

        Ok(Self {
            destination,
            source,
            writeback,
        })
    }
}

/// Redirects some properties of a type to the container at a derived path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    target_type: Option<TypeName>,
    source_descriptor: String,
    pairs: Vec<PropertyPair>,
    read_only: bool,
}

impl RedirectRule {
    /// Builds a rule. `target_type` defaults to the owning type when `None`.
    pub fn new(
        target_type: Option<&str>,
        source_descriptor: &str,
        property_paths: &[&str],
    ) -> Result<Self, RegistryError> {
        let pairs = property_paths
            .iter()
            .map(|declaration| PropertyPair::parse(declaration))
            .collect::<Result<Vec<_>, _>>()
            .map_err(RegistryError::InvalidRule)?;
        if pairs.is_empty() {
            return Err(RegistryError::InvalidRule(format!(
                "redirect rule `{source_descriptor}` declares no property paths"
            )));
        }
        let target_type = target_type
            .map(TypeName::new)
            .transpose()
            .map_err(|err| RegistryError::InvalidRule(err.to_string()))?;

        Ok(Self {
            target_type,
            source_descriptor: source_descriptor.trim().to_string(),
            pairs,
            read_only: false,
        })
    }

    /// Marks the rule as read-only: it is applied on collate but never written.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn source_descriptor(&self) -> &str {
        self.source_descriptor.as_str()
    }

    pub fn declared_target(&self) -> Option<&TypeName> {
        self.target_type.as_ref()
    }

    /// Type of the referenced content for a rule owned by `owner`.
    pub fn target_type<'a>(&'a self, owner: &'a TypeName) -> &'a TypeName {
        self.target_type.as_ref().unwrap_or(owner)
    }

    pub fn pairs(&self) -> &[PropertyPair] {
        &self.pairs
    }

    pub fn has_writebacks(&self) -> bool {
        self.pairs.iter().any(|pair| pair.writeback)
    }
}

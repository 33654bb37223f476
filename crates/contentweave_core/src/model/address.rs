//! Content addresses and versioned addresses.
//!
//! # Responsibility
//! - Key a content item by logical type plus named path segments.
//! - Convert between addresses and canonical content paths.
//!
//! # Invariants
//! - Segment values are lower-cased on construction.
//! - Equality and hashing ignore segment order.
//! - Canonical path is `/` followed by segment values in stored order.

use super::version::ItemVersion;
use super::TypeName;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Logical location of a content item.
#[derive(Debug, Clone)]
pub struct Address {
    content_type: TypeName,
    segments: Vec<(String, String)>,
}

impl Address {
    /// Creates an address with no segments.
    pub fn new(content_type: TypeName) -> Self {
        Self {
            content_type,
            segments: Vec::new(),
        }
    }

    /// Builds an address from named segments, keeping their order.
    pub fn from_segments<N, V>(
        content_type: TypeName,
        segments: impl IntoIterator<Item = (N, V)>,
    ) -> Self
    where
        N: Into<String>,
        V: AsRef<str>,
    {
        let mut address = Self::new(content_type);
        for (name, value) in segments {
            address.insert(name, value.as_ref());
        }
        address
    }

    /// Parses a content path, naming parts after `segment_names` in order.
    ///
    /// Parts beyond the declared names are named positionally (`_2`, `_3`...).
    pub fn from_path(content_type: TypeName, path: &str, segment_names: &[String]) -> Self {
        let parts = path
            .trim()
            .trim_matches('/')
            .split('/')
            .map(str::trim)
            .filter(|part| !part.is_empty());
        let mut address = Self::new(content_type);
        for (position, part) in parts.enumerate() {
            let name = segment_names
                .get(position)
                .cloned()
                .unwrap_or_else(|| format!("_{position}"));
            address.insert(name, part);
        }
        address
    }

    /// Sets one segment, replacing an existing one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: &str) {
        let name = name.into();
        let value = value.trim().to_lowercase();
        match self
            .segments
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.segments.push((name, value)),
        }
    }

    pub fn content_type(&self) -> &TypeName {
        &self.content_type
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn segments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.segments
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Canonical content path of this address.
    pub fn path(&self) -> String {
        let mut path = String::from("/");
        for (position, (_, value)) in self.segments.iter().enumerate() {
            if position > 0 {
                path.push('/');
            }
            path.push_str(value);
        }
        path
    }

    /// Normalizes segment-name casing against declared names and reorders
    /// segments into declared order.
    pub fn fix_case(&mut self, declared: &[String]) {
        for (name, value) in &mut self.segments {
            if let Some(canonical) = declared.iter().find(|d| d.eq_ignore_ascii_case(name)) {
                name.clone_from(canonical);
            }
            *value = value.to_lowercase();
        }
        self.segments.sort_by_key(|(name, _)| {
            declared
                .iter()
                .position(|d| d == name)
                .unwrap_or(usize::MAX)
        });
    }

    /// Same address under another type.
    pub fn with_type(&self, content_type: TypeName) -> Self {
        Self {
            content_type,
            segments: self.segments.clone(),
        }
    }

    fn canonical_set(&self) -> BTreeMap<String, &str> {
        self.segments
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
            .collect()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.content_type == other.content_type && self.canonical_set() == other.canonical_set()
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.content_type.hash(state);
        self.canonical_set().hash(state);
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.content_type, self.path())
    }
}

/// Address of one specific version of a content item.
///
/// Key type of the in-memory container set during collation: different
/// versions of the same address are different containers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedAddress {
    pub address: Address,
    pub version: ItemVersion,
}

impl VersionedAddress {
    pub fn new(address: Address, version: ItemVersion) -> Self {
        Self { address, version }
    }

    pub fn content_type(&self) -> &TypeName {
        self.address.content_type()
    }
}

impl Display for VersionedAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}?{}", self.address, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, VersionedAddress};
    use crate::model::version::ItemVersion;
    use crate::model::TypeName;
    use std::collections::HashSet;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn equality_ignores_order_and_case() {
        let a = Address::from_segments(
            TypeName::from("Article"),
            [("Section", "News"), ("Slug", "Hello")],
        );
        let b = Address::from_segments(
            TypeName::from("Article"),
            [("slug", "hello"), ("section", "news")],
        );
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn different_types_are_different_addresses() {
        let a = Address::from_path(TypeName::from("A"), "/x", &[]);
        let b = Address::from_path(TypeName::from("B"), "/x", &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn from_path_names_segments_and_round_trips() {
        let declared = names(&["section", "number"]);
        let address = Address::from_path(TypeName::from("Article"), "/A/1/extra", &declared);
        assert_eq!(address.get("section"), Some("a"));
        assert_eq!(address.get("number"), Some("1"));
        assert_eq!(address.get("_2"), Some("extra"));
        assert_eq!(address.path(), "/a/1/extra");
        assert_eq!(address.to_string(), "Article:/a/1/extra");
    }

    #[test]
    fn fix_case_adopts_declared_names_and_order() {
        let declared = names(&["Section", "Slug"]);
        let mut address = Address::from_segments(
            TypeName::from("Article"),
            [("SLUG", "Post"), ("section", "News")],
        );
        address.fix_case(&declared);
        let segments: Vec<_> = address.segments().collect();
        assert_eq!(segments, vec![("Section", "news"), ("Slug", "post")]);
        assert_eq!(address.path(), "/news/post");
    }

    #[test]
    fn root_address_has_slash_path() {
        let address = Address::from_path(TypeName::from("Home"), "/", &[]);
        assert!(address.is_empty());
        assert_eq!(address.path(), "/");
    }

    #[test]
    fn versioned_addresses_differ_by_version() {
        let address = Address::from_path(TypeName::from("Article"), "/a", &[]);
        let en = VersionedAddress::new(address.clone(), ItemVersion::new().with("lang", "en"));
        let fr = VersionedAddress::new(address, ItemVersion::new().with("lang", "fr"));
        assert_ne!(en, fr);
        assert_eq!(en.to_string(), "Article:/a?lang=en");
    }
}

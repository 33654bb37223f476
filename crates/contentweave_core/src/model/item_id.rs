//! Version-independent item identity.
//!
//! # Responsibility
//! - Identify a content item by type plus raw identifier, independent of its
//!   current address or version.
//! - Serialize identities as `<id>:<FullTypeName>`.
//!
//! # Invariants
//! - Neither the id nor the type may be empty.
//! - Raw ids are disambiguated on parse: UUID, then integer, then `'quoted'`
//!   string, then bare string.

use super::version::ItemVersion;
use super::{ModelError, TypeName};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Raw stored identifier of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawId {
    Int(i64),
    Uuid(Uuid),
    Str(String),
}

impl RawId {
    /// Interprets a serialized id; `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(uuid) = Uuid::parse_str(raw) {
            return Some(Self::Uuid(uuid));
        }
        if let Ok(int) = raw.parse::<i64>() {
            return Some(Self::Int(int));
        }
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return Some(Self::Str(raw[1..raw.len() - 1].to_string()));
        }
        Some(Self::Str(raw.to_string()))
    }

    fn is_blank(&self) -> bool {
        matches!(self, Self::Str(value) if value.trim().is_empty())
    }
}

impl Display for RawId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Uuid(value) => write!(f, "{value}"),
            // Strings that would parse back as another kind stay quoted.
            Self::Str(value) => match RawId::parse(value) {
                Some(Self::Str(ref parsed)) if parsed == value => f.write_str(value),
                _ => write!(f, "'{value}'"),
            },
        }
    }
}

impl From<i64> for RawId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Uuid> for RawId {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<&str> for RawId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Identity of a content item across all its versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    content_type: TypeName,
    id: RawId,
}

impl ItemId {
    /// Creates an identity, rejecting empty ids or type names.
    pub fn new(content_type: TypeName, id: impl Into<RawId>) -> Result<Self, ModelError> {
        let id = id.into();
        if content_type.as_str().trim().is_empty() || id.is_blank() {
            return Err(ModelError::InvalidArgument(
                "cannot create ItemId with empty id or type".to_string(),
            ));
        }
        Ok(Self { content_type, id })
    }

    pub fn content_type(&self) -> &TypeName {
        &self.content_type
    }

    pub fn id(&self) -> &RawId {
        &self.id
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.id, self.content_type)
    }
}

impl FromStr for ItemId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ModelError::Format(format!("serialized ItemId in wrong format: `{s}`"));
        let (id_part, type_part) = s.split_once(':').ok_or_else(malformed)?;
        let type_part = type_part.trim();
        let id = RawId::parse(id_part).ok_or_else(malformed)?;
        if type_part.is_empty() || id.is_blank() {
            return Err(malformed());
        }
        Ok(Self {
            content_type: TypeName::from(type_part),
            id,
        })
    }
}

/// Identity of one version of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemVersionedId {
    pub item_id: ItemId,
    pub version: ItemVersion,
}

impl ItemVersionedId {
    pub fn new(item_id: ItemId, version: ItemVersion) -> Self {
        Self { item_id, version }
    }
}

impl Display for ItemVersionedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}?{}", self.item_id, self.version)
    }
}

//! Cross-item references.
//!
//! # Responsibility
//! - Point at another content item by identity and resolve its summary lazily.
//! - Find the items whose reference field points at a given item.

pub mod reference;

use crate::model::ModelError;
use crate::service::collator::CollateError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised by reference resolution and reverse lookups.
#[derive(Debug)]
pub enum ReferenceError {
    /// Data type not allowed, undeclared reference field, or unknown type.
    InvalidArgument(String),
    /// Serialized reference value is malformed.
    Format(String),
    /// Collation failure while resolving summaries or referencing items.
    Collate(CollateError),
}

impl Display for ReferenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid reference argument: {message}"),
            Self::Format(message) => write!(f, "invalid reference value: {message}"),
            Self::Collate(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReferenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Collate(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CollateError> for ReferenceError {
    fn from(value: CollateError) -> Self {
        Self::Collate(value)
    }
}

impl From<ModelError> for ReferenceError {
    fn from(value: ModelError) -> Self {
        match value {
            ModelError::InvalidArgument(message) => Self::InvalidArgument(message),
            ModelError::Format(message) => Self::Format(message),
        }
    }
}

//! Static content type registry and redirect rule table.
//!
//! # Responsibility
//! - Declare, once at startup, how each logical type is addressed, versioned
//!   and which properties it redirects to other containers.
//! - Provide the path algebra used to derive referenced paths.
//!
//! # Invariants
//! - The registry is immutable after construction and shared via `Arc`.
//! - Property paths are compiled during registration, never per call.

use crate::model::property_path::PathError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod content_type;
pub mod path_algebra;
pub mod redirect;

/// Errors raised while declaring content types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two definitions share one type name.
    DuplicateType(String),
    /// Lookup of a type that was never registered.
    UnknownType(String),
    /// A field or reference path failed to compile.
    InvalidPath { type_name: String, source: PathError },
    /// A redirect rule declaration is malformed.
    InvalidRule(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateType(name) => write!(f, "content type already registered: {name}"),
            Self::UnknownType(name) => write!(f, "content type not registered: {name}"),
            Self::InvalidPath { type_name, source } => {
                write!(f, "invalid property path on {type_name}: {source}")
            }
            Self::InvalidRule(message) => write!(f, "invalid redirect rule: {message}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPath { source, .. } => Some(source),
            _ => None,
        }
    }
}

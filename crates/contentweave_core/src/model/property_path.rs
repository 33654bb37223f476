//! Dotted property paths over JSON content.
//!
//! # Responsibility
//! - Parse `Meta.Author` / `Items[0].Title` style paths once.
//! - Read and write values at a path on arbitrary nested content.
//!
//! # Invariants
//! - A compiled path is never empty; the root is not addressable.
//! - Writes create missing intermediate objects but never grow arrays.

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object property access.
    Key(String),
    /// Array element access.
    Index(usize),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}

/// Property path parse and write errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    Empty,
    EmptySegment { path: String, position: usize },
    InvalidIndex { path: String, raw: String },
    UnclosedBracket { path: String },
    TypeMismatch { path: String, expected: &'static str, found: &'static str },
    IndexOutOfBounds { path: String, index: usize, len: usize },
}

impl Display for PathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "property path cannot be empty"),
            Self::EmptySegment { path, position } => {
                write!(f, "empty segment at position {position} in property path `{path}`")
            }
            Self::InvalidIndex { path, raw } => {
                write!(f, "invalid array index `{raw}` in property path `{path}`")
            }
            Self::UnclosedBracket { path } => write!(f, "unclosed bracket in property path `{path}`"),
            Self::TypeMismatch {
                path,
                expected,
                found,
            } => write!(f, "property path `{path}` expected {expected}, found {found}"),
            Self::IndexOutOfBounds { path, index, len } => write!(
                f,
                "property path `{path}` index {index} out of bounds (len {len})"
            ),
        }
    }
}

impl Error for PathError {}

/// Compiled dotted property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// Parses a dotted path. Whitespace around the path is ignored.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        for (position, part) in raw.split('.').enumerate() {
            let part = part.trim();
            let (key, mut rest) = match part.find('[') {
                Some(at) => (&part[..at], &part[at..]),
                None => (part, ""),
            };
            if key.is_empty() && (position > 0 || rest.is_empty()) {
                return Err(PathError::EmptySegment {
                    path: raw.to_string(),
                    position,
                });
            }
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| PathError::UnclosedBracket {
                    path: raw.to_string(),
                })?;
                let digits = &rest[1..close];
                let index = digits.parse::<usize>().map_err(|_| PathError::InvalidIndex {
                    path: raw.to_string(),
                    raw: digits.to_string(),
                })?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(PathError::UnclosedBracket {
                        path: raw.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Reads the value at this path, `None` when any step is missing.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Index(idx), Value::Array(items)) => items.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `value` at this path, creating missing intermediate objects.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<(), PathError> {
        let (last, parents) = self
            .segments
            .split_last()
            .ok_or(PathError::Empty)?;

        let mut current = root;
        for segment in parents {
            current = self.step_mut(current, segment)?;
        }

        match last {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(map) => {
                        map.insert(key.clone(), value);
                        Ok(())
                    }
                    other => Err(self.mismatch("object", other)),
                }
            }
            PathSegment::Index(idx) => match current {
                Value::Array(items) => {
                    let len = items.len();
                    let slot = items.get_mut(*idx).ok_or(PathError::IndexOutOfBounds {
                        path: self.raw.clone(),
                        index: *idx,
                        len,
                    })?;
                    *slot = value;
                    Ok(())
                }
                other => Err(self.mismatch("array", other)),
            },
        }
    }

    /// Copies the value at `from` on `source` into this path on `target`.
    ///
    /// A missing source value is written as JSON `null`.
    pub fn copy_from(
        &self,
        target: &mut Value,
        source: &Value,
        from: &PropertyPath,
    ) -> Result<(), PathError> {
        let value = from.get(source).cloned().unwrap_or(Value::Null);
        self.set(target, value)
    }

    fn step_mut<'a>(
        &self,
        current: &'a mut Value,
        segment: &PathSegment,
    ) -> Result<&'a mut Value, PathError> {
        match segment {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(map) => Ok(map.entry(key.clone()).or_insert(Value::Null)),
                    other => Err(self.mismatch("object", other)),
                }
            }
            PathSegment::Index(idx) => match current {
                Value::Array(items) => {
                    let len = items.len();
                    items.get_mut(*idx).ok_or(PathError::IndexOutOfBounds {
                        path: self.raw.clone(),
                        index: *idx,
                        len,
                    })
                }
                other => Err(self.mismatch("array", other)),
            },
        }
    }

    fn mismatch(&self, expected: &'static str, found: &Value) -> PathError {
        PathError::TypeMismatch {
            path: self.raw.clone(),
            expected,
            found: value_kind(found),
        }
    }
}

impl FromStr for PropertyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for PropertyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Storage contracts for content containers.
//!
//! # Responsibility
//! - Define the storage collaborator the collator fetches from and
//!   persists to (`ContainerStore`).
//! - Provide the bundled SQLite implementation.
//!
//! # Invariants
//! - Fetches only return containers whose version the scope admits.
//! - `persist` assigns `row_id` to every newly inserted container.

use crate::db::DbError;
use crate::model::address::Address;
use crate::model::container::Container;
use crate::model::item_id::ItemId;
use crate::model::version::ItemVersion;
use crate::model::TypeName;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod container_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage errors for container persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Target container does not exist.
    NotFound(String),
    /// Persisted or incoming data cannot form a valid container.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(what) => write!(f, "container not found: {what}"),
            Self::InvalidData(message) => write!(f, "invalid container data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "container repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Options for a persist batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOptions {
    /// Skip container validation before writing.
    pub bypass_checks: bool,
}

/// Storage collaborator used by the collator.
///
/// Batches are unordered and not transactional across containers.
pub trait ContainerStore {
    /// Creates an unsaved container for a type.
    fn new_container(&self, data_type: &TypeName) -> Container;

    /// Containers at any of `addresses` whose version `scope` admits.
    fn fetch_by_addresses(
        &self,
        addresses: &[Address],
        scope: &ItemVersion,
    ) -> RepoResult<Vec<Container>>;

    /// Containers of the identified items whose version `scope` admits.
    fn fetch_by_ids(&self, ids: &[ItemId], scope: &ItemVersion) -> RepoResult<Vec<Container>>;

    /// Containers of one type stored at exactly `path`.
    fn fetch_by_path(
        &self,
        data_type: &TypeName,
        path: &str,
        scope: &ItemVersion,
    ) -> RepoResult<Vec<Container>>;

    /// Every container of the listed types.
    fn fetch_all(&self, types: &[TypeName], scope: &ItemVersion) -> RepoResult<Vec<Container>>;

    /// Inserts or updates containers; returns one `created` flag per input.
    fn persist(
        &self,
        containers: &mut [Container],
        options: PersistOptions,
    ) -> RepoResult<Vec<bool>>;

    fn delete(&self, container: &Container, bypass_checks: bool) -> RepoResult<()>;
}

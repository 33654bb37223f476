//! Content collation engine.
//!
//! Assembles logical content items from persisted containers, following the
//! redirect rules declared per content type, and decomposes edits back into
//! the containers they came from.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod relations;
pub mod repo;
pub mod schema;
pub mod service;

pub use config::{CollatorConfig, DuplicatePolicy};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::address::{Address, VersionedAddress};
pub use model::container::Container;
pub use model::content::{Content, ContentMetadata, Summary};
pub use model::item_id::{ItemId, ItemVersionedId, RawId};
pub use model::property_path::{PathError, PropertyPath};
pub use model::version::ItemVersion;
pub use model::{ModelError, TypeName};
pub use relations::reference::{
    get_references_from, PredicateBuilder, Reference, ReferenceEqualityPredicate,
    ReferenceGetter, ReferenceLookup, SummaryResolver, TypedReference,
};
pub use relations::ReferenceError;
pub use repo::container_repo::SqliteContainerRepository;
pub use repo::{ContainerStore, PersistOptions, RepoError, RepoResult};
pub use schema::content_type::{ContentTypeDef, ContentTypeRegistry};
pub use schema::path_algebra::{PathAlgebra, PatternRedirect};
pub use schema::redirect::{PropertyPair, RedirectRule};
pub use schema::RegistryError;
pub use service::collator::{CollateError, CollateResult, CollatedItems, ContentCollator};
pub use service::events::{
    EventHandler, EventHub, EventPayload, EVENT_CONTENT_MOVE, EVENT_CONTENT_NEW,
    EVENT_GET_CONTAINER,
};
pub use service::version_context::{VersionContext, VersionScope, VersioningMode};

/// Minimal health-check API for checking that the library links.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

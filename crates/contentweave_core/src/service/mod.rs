//! Collation use-cases.
//!
//! - `collator`: forward and backward collation over a container store.
//! - `version_context`: explicit version-resolution scope.
//! - `events`: notification hooks fired by the collator.

pub mod collator;
pub mod events;
pub mod version_context;

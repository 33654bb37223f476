//! Collator configuration.

/// How collation treats two loaded containers at one versioned address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Log a warning and keep the first container.
    #[default]
    TolerateAndLog,
    /// Fail the collation with `CollateError::DuplicateVersionedAddress`.
    Reject,
}

/// Tunables for `ContentCollator`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollatorConfig {
    pub duplicate_policy: DuplicatePolicy,
}

impl CollatorConfig {
    /// Configuration that rejects duplicate versioned addresses.
    pub fn strict() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
        }
    }
}

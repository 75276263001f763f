//! ULID-based identifier generation with prefixes.
//!
//! Identifiers in keepsake follow the pattern: `prefix_ulid`
//! For example: `ver_01hqxyz...` for file versions.
//!
//! Ascending identifiers come from a process-wide monotonic generator, so two
//! identifiers minted in the same millisecond still sort in creation order.

use once_cell::sync::Lazy;
use std::sync::Mutex;
use ulid::{Generator, Ulid};

static GENERATOR: Lazy<Mutex<Generator>> = Lazy::new(|| Mutex::new(Generator::new()));

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Version,
    Watcher,
}

impl IdPrefix {
    /// Get the string prefix for this identifier type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Version => "ver",
            IdPrefix::Watcher => "wch",
        }
    }
}

/// Identifier generation utilities.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    pub fn ascending(prefix: IdPrefix) -> String {
        Self::with_ulid(prefix, next_ulid())
    }

    /// Generate an identifier with a specific ULID (for testing or imports).
    pub fn with_ulid(prefix: IdPrefix, ulid: Ulid) -> String {
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Check if an identifier has the expected prefix.
    pub fn has_prefix(id: &str, prefix: IdPrefix) -> bool {
        id.starts_with(prefix.as_str()) && id.chars().nth(prefix.as_str().len()) == Some('_')
    }

    /// Generate a file version ID.
    pub fn version() -> String {
        Self::ascending(IdPrefix::Version)
    }

    /// Generate a watcher instance ID.
    pub fn watcher() -> String {
        Self::ascending(IdPrefix::Watcher)
    }
}

/// Next ULID from the monotonic generator.
///
/// Falls back to a plain random ULID if the generator overflows its random
/// component within one millisecond or its lock was poisoned.
fn next_ulid() -> Ulid {
    match GENERATOR.lock() {
        Ok(mut generator) => generator.generate().unwrap_or_else(|_| Ulid::new()),
        Err(_) => Ulid::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_id_shape() {
        let id = Identifier::version();
        assert!(id.starts_with("ver_"));
        assert_eq!(id.len(), 30); // "ver_" (4) + ULID (26)
    }

    #[test]
    fn test_ascending_order_within_same_millisecond() {
        let ids: Vec<String> = (0..200).map(|_| Identifier::version()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_has_prefix() {
        let id = Identifier::watcher();
        assert!(Identifier::has_prefix(&id, IdPrefix::Watcher));
        assert!(!Identifier::has_prefix(&id, IdPrefix::Version));
        assert!(!Identifier::has_prefix("verbose", IdPrefix::Version));
    }
}

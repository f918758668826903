//! Test support utilities shared by the workspace's test binaries.
//!
//! Provides unified logging initialization and helpers for generating
//! unique names so tests touching the filesystem stay isolated.

pub mod logging;

use ulid::Ulid;

/// Generate a unique string with the given prefix
///
/// # Examples
/// ```
/// use test_support::unique_str;
///
/// let id1 = unique_str("replica");
/// let id2 = unique_str("replica");
/// assert_ne!(id1, id2);
/// assert!(id1.starts_with("replica-"));
/// ```
pub fn unique_str(prefix: &str) -> String {
    format!("{}-{}", prefix, Ulid::new())
}

/// Generate a unique local database file name with the given prefix
///
/// # Examples
/// ```
/// use test_support::unique_db_name;
///
/// let name = unique_db_name("local");
/// assert!(name.starts_with("local-"));
/// assert!(name.ends_with(".db"));
/// ```
pub fn unique_db_name(prefix: &str) -> String {
    format!("{}.db", unique_str(prefix))
}

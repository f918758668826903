//! Migration scripts and the sources they are loaded from.
//! Used by `replica-db` to feed the migration runner.

pub mod error;
pub mod source;

pub use error::SourceError;
pub use source::{DirSource, EmbeddedSource, Migration, MigrationSource, StaticSource};

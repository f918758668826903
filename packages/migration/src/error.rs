use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read migration source {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("migration {path} is not valid UTF-8")]
    Decode { path: String },

    #[error("embedded migration {path} is listed but could not be read")]
    Missing { path: String },

    #[error("duplicate migration name {name} ({first} and {second})")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
}

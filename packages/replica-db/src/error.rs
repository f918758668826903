use std::fmt;
use std::path::PathBuf;

use migration::SourceError;
use sea_orm::DbErr;
use thiserror::Error;

/// Failure reported by an external collaborator (driver, connector, storage).
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("failed to set up temporary directory for local database: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("failed to create replica connector for {}: {source}", .path.display())]
    Connector {
        path: PathBuf,
        #[source]
        source: DriverError,
    },

    #[error("failed to open database connection: {0}")]
    ConnectionOpen(#[source] DriverError),

    #[error("failed to load migrations: {0}")]
    Source(#[from] SourceError),

    #[error("migrations not enabled")]
    NotEnabled,

    #[error("failed to check migration ledger{}: {source}", for_migration(.migration))]
    LedgerCheck {
        migration: Option<String>,
        #[source]
        source: DbErr,
    },

    #[error("failed to run migration {name}: {source}")]
    MigrationExec {
        name: String,
        #[source]
        source: DbErr,
    },

    /// The script ran but no ledger row was written; a retry executes it again.
    #[error("migration {name} ran but could not be recorded in the ledger (it will run again on retry): {source}")]
    LedgerWrite {
        name: String,
        #[source]
        source: DbErr,
    },

    #[error(transparent)]
    Teardown(#[from] TeardownError),
}

fn for_migration(migration: &Option<String>) -> String {
    match migration {
        Some(name) => format!(" for migration {name}"),
        None => String::new(),
    }
}

impl DbError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Name of the migration this error is about, if any.
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::LedgerCheck { migration, .. } => migration.as_deref(),
            Self::MigrationExec { name, .. } | Self::LedgerWrite { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A resource owned by an opened database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Connection,
    Connector,
    LocalDir(PathBuf),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "failed to close database"),
            Self::Connector => write!(f, "failed to close connector"),
            Self::LocalDir(path) => write!(f, "failed to remove directory {}", path.display()),
        }
    }
}

/// One failed teardown step.
#[derive(Debug)]
pub struct TeardownFailure {
    pub resource: Resource,
    pub source: DriverError,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.source)
    }
}

/// Every teardown step that failed during close, in the order attempted.
#[derive(Debug, Error)]
#[error("{}", render_failures(.failures))]
pub struct TeardownError {
    failures: Vec<TeardownFailure>,
}

fn render_failures(failures: &[TeardownFailure]) -> String {
    let steps: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!("{} teardown step(s) failed: {}", failures.len(), steps.join("; "))
}

impl TeardownError {
    pub(crate) fn new(failures: Vec<TeardownFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<TeardownFailure> {
        self.failures
    }

    /// True when a step for this kind of resource failed (directory paths are ignored).
    pub fn has_failed(&self, resource: &Resource) -> bool {
        self.failures.iter().any(|f| {
            std::mem::discriminant(&f.resource) == std::mem::discriminant(resource)
        })
    }
}

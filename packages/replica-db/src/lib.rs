//! Connection lifecycle for a database served either from a local replica
//! synced with a remote primary or directly from the primary, plus an
//! exactly-once migration runner backed by a `migrations` ledger table.
//!
//! ```ignore
//! let config = DbConfig::new("libsql://db.example.com")
//!     .auth_token(token)
//!     .migrations(Arc::new(EmbeddedSource::<Migrations>::new()));
//! let db = ReplicaDb::open(&config).await?;
//! // ... use db.conn() ...
//! db.close().await?;
//! ```

pub mod config;
pub mod error;
pub mod infra;

pub use config::db;
pub use config::db::{ConnectionMode, DbConfig, DEFAULT_LOCAL_DB_NAME, DEFAULT_SYNC_INTERVAL};
pub use error::{DbError, DriverError, Resource, TeardownError, TeardownFailure};
pub use infra::db::{
    migrate, remote_url, run_migrations, ConnectionProvider, DefaultProvider,
    EmbeddedReplicaProvider, MigrationReport, MigrationStatus, RemoteOnlyProvider, ReplicaDb,
};
pub use migration::{DirSource, EmbeddedSource, Migration, MigrationSource, StaticSource};

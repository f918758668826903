pub mod core;
pub mod drivers;
pub mod embedded;
pub mod ledger;
pub mod lifecycle;
pub mod remote;

pub use self::core::{
    redact_secrets, sanitize_url, Connected, ConnectionProvider, DefaultProvider, LocalDir,
};
pub use drivers::{
    LocalFileConnector, LocalFileDriver, OsTempStorage, RemoteDriver, ReplicaConnector,
    ReplicaDriver, ReplicaSettings, SeaOrmRemoteDriver, TempStorage,
};
pub use embedded::EmbeddedReplicaProvider;
pub use ledger::{
    applied_migrations, ensure_ledger, migrate, migration_status, run_migrations,
    MigrationReport, MigrationStatus, LEDGER_TABLE,
};
pub use lifecycle::ReplicaDb;
pub use remote::{remote_url, RemoteOnlyProvider};

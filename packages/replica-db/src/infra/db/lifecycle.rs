use std::fmt;
use std::path::Path;

use migration::Migration;
use sea_orm::DatabaseConnection;
use tracing::{debug, info, warn};

use crate::config::db::{ConnectionMode, DbConfig};
use crate::error::{DbError, DriverError, Resource, TeardownError, TeardownFailure};
use crate::infra::db::core::{Connected, ConnectionProvider, DefaultProvider, LocalDir};
use crate::infra::db::drivers::ReplicaConnector;
use crate::infra::db::ledger::{
    migration_status, run_migrations, MigrationReport, MigrationStatus,
};

/// An opened database and everything allocated to serve it.
///
/// Release it with [`ReplicaDb::close`]. Dropping it without closing only
/// removes the local directory, since the connection and connector can
/// only be shut down asynchronously.
pub struct ReplicaDb {
    conn: DatabaseConnection,
    connector: Option<Box<dyn ReplicaConnector>>,
    local_dir: Option<LocalDir>,
    mode: ConnectionMode,
    migrations: Option<Vec<Migration>>,
    released: bool,
}

impl ReplicaDb {
    /// Open with the provider for this platform.
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        Self::open_with(&DefaultProvider::default(), config).await
    }

    /// Validate `config`, build through `provider` and, when migrations are
    /// enabled, bring the target up to date.
    ///
    /// Either a fully migrated database is returned or every resource the
    /// build allocated has been released.
    pub async fn open_with<P>(provider: &P, config: &DbConfig) -> Result<Self, DbError>
    where
        P: ConnectionProvider + ?Sized,
    {
        config.validate()?;

        let migrations = match config.migration_source() {
            Some(source) => Some(source.load()?),
            None => None,
        };

        info!(
            "replica_db=open mode={} migrations_enabled={}",
            provider.mode(),
            migrations.is_some()
        );
        let connected = provider.connect(config).await?;
        let db = Self::from_connected(provider.mode(), connected, migrations);

        let outcome = match db.migrations.as_deref() {
            Some(migrations) => run_migrations(&db.conn, migrations).await.map(Some),
            None => Ok(None),
        };

        match outcome {
            Ok(report) => {
                if let Some(report) = report {
                    debug!(
                        "replica_db=migrated applied={} skipped={}",
                        report.applied.len(),
                        report.skipped.len()
                    );
                }
                Ok(db)
            }
            Err(err) => {
                if let Err(teardown) = db.close().await {
                    warn!("replica_db=open_cleanup_failed error={}", teardown);
                }
                Err(err)
            }
        }
    }

    fn from_connected(
        mode: ConnectionMode,
        connected: Connected,
        migrations: Option<Vec<Migration>>,
    ) -> Self {
        let Connected {
            conn,
            connector,
            local_dir,
        } = connected;
        Self {
            conn,
            connector,
            local_dir,
            mode,
            migrations,
            released: false,
        }
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Directory holding the replica file; `None` for remote-only connections.
    pub fn local_dir(&self) -> Option<&Path> {
        self.local_dir.as_ref().map(LocalDir::path)
    }

    pub fn migrations_enabled(&self) -> bool {
        self.migrations.is_some()
    }

    /// Run the migrations loaded at open time again. Already recorded ones are skipped.
    pub async fn migrate(&self) -> Result<MigrationReport, DbError> {
        match self.migrations.as_deref() {
            Some(migrations) => run_migrations(&self.conn, migrations).await,
            None => Err(DbError::NotEnabled),
        }
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus, DbError> {
        match self.migrations.as_deref() {
            Some(migrations) => migration_status(&self.conn, migrations).await,
            None => Err(DbError::NotEnabled),
        }
    }

    /// Close the connection, then the connector, then remove the local
    /// directory. Every step runs even if an earlier one failed.
    pub async fn close(mut self) -> Result<(), TeardownError> {
        self.released = true;
        let mut teardown = Teardown::default();

        let conn = std::mem::replace(&mut self.conn, DatabaseConnection::Disconnected);
        let conn_result = conn.close().await;
        teardown.record(Resource::Connection, conn_result.map_err(Into::into));

        if let Some(mut connector) = self.connector.take() {
            teardown.record(Resource::Connector, connector.close().await);
        }

        if let Some(dir) = self.local_dir.take() {
            let resource = Resource::LocalDir(dir.path().to_path_buf());
            teardown.record(resource, dir.remove().map_err(Into::into));
        }

        let result = teardown.finish();
        match &result {
            Ok(()) => info!("replica_db=closed mode={}", self.mode),
            Err(err) => warn!("replica_db=close_failed mode={} error={}", self.mode, err),
        }
        result
    }
}

impl fmt::Debug for ReplicaDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaDb")
            .field("mode", &self.mode)
            .field("local_dir", &self.local_dir)
            .field("connector", &self.connector.is_some())
            .field("migrations", &self.migrations.as_ref().map(Vec::len))
            .finish()
    }
}

impl Drop for ReplicaDb {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(
            "replica_db=dropped_without_close mode={} (connection and connector not closed)",
            self.mode
        );
        if let Some(dir) = self.local_dir.take() {
            if let Err(e) = dir.remove() {
                warn!(
                    "replica_db=drop_cleanup_failed path={} error={}",
                    dir.path().display(),
                    e
                );
            }
        }
    }
}

/// Collects the outcome of each teardown step.
#[derive(Default)]
struct Teardown {
    failures: Vec<TeardownFailure>,
}

impl Teardown {
    fn record(&mut self, resource: Resource, result: Result<(), DriverError>) {
        match result {
            Ok(()) => debug!("teardown=ok resource={:?}", resource),
            Err(source) => {
                debug!("teardown=failed resource={:?} error={}", resource, source);
                self.failures.push(TeardownFailure { resource, source });
            }
        }
    }

    fn finish(self) -> Result<(), TeardownError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError::new(self.failures))
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::db::{ConnectionMode, DbConfig};
use crate::error::DbError;
use crate::infra::db::core::{
    redact_secrets, sanitize_url, Connected, ConnectionProvider, LocalDir,
};
use crate::infra::db::drivers::{
    LocalFileDriver, OsTempStorage, ReplicaConnector, ReplicaDriver, TempStorage,
};

/// Builds a local replica inside a fresh temporary directory.
///
/// A failed build removes the directory (and closes the connector, if one was
/// opened) before the error is returned.
#[derive(Debug)]
pub struct EmbeddedReplicaProvider<D = LocalFileDriver, S = OsTempStorage> {
    driver: D,
    storage: Arc<S>,
}

impl<D, S> EmbeddedReplicaProvider<D, S> {
    pub fn new(driver: D, storage: S) -> Self {
        Self {
            driver,
            storage: Arc::new(storage),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: Default, S: Default> Default for EmbeddedReplicaProvider<D, S> {
    fn default() -> Self {
        Self::new(D::default(), S::default())
    }
}

fn discard_dir(dir: &LocalDir) {
    if let Err(e) = dir.remove() {
        warn!(
            "replica=cleanup_failed path={} error={}",
            dir.path().display(),
            e
        );
    }
}

async fn discard_connector(connector: &mut dyn ReplicaConnector) {
    if let Err(e) = connector.close().await {
        warn!("replica=cleanup_failed resource=connector error={}", e);
    }
}

#[async_trait]
impl<D, S> ConnectionProvider for EmbeddedReplicaProvider<D, S>
where
    D: ReplicaDriver,
    S: TempStorage + 'static,
{
    fn mode(&self) -> ConnectionMode {
        ConnectionMode::EmbeddedReplica
    }

    async fn connect(&self, config: &DbConfig) -> Result<Connected, DbError> {
        let path = self
            .storage
            .create_dir(config.temp_dir_parent())
            .map_err(DbError::TempDir)?;
        let storage: Arc<dyn TempStorage> = self.storage.clone();
        let local_dir = LocalDir::new(path, storage);
        let local_path = local_dir.path().join(config.resolved_local_db_name());
        let settings = config.replica_settings();
        let secrets = [
            settings.auth_token.as_deref().unwrap_or_default(),
            settings.encryption_key.as_deref().unwrap_or_default(),
        ];

        debug!(
            "replica=open local={} primary={} settings={:?}",
            local_path.display(),
            sanitize_url(config.primary_url()),
            settings
        );

        let mut connector = match self
            .driver
            .open_replica(&local_path, config.primary_url(), &settings)
            .await
        {
            Ok(connector) => connector,
            Err(source) => {
                discard_dir(&local_dir);
                return Err(DbError::Connector {
                    path: local_path,
                    source: redact_secrets(source, &secrets),
                });
            }
        };

        let conn = match connector.connect().await {
            Ok(conn) => conn,
            Err(source) => {
                discard_connector(connector.as_mut()).await;
                discard_dir(&local_dir);
                return Err(DbError::ConnectionOpen(redact_secrets(source, &secrets)));
            }
        };

        info!(
            "replica=ready local={} sync_interval={:?}",
            local_path.display(),
            settings.sync_interval
        );
        Ok(Connected::embedded(conn, connector, local_dir))
    }
}

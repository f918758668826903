//! Narrow capabilities the connection providers call into, and the
//! implementations shipped with this crate.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::debug;

use crate::error::DriverError;
use crate::infra::db::core::sanitize_url;

/// Replica options taken from `DbConfig`. A `None` field was never set and
/// must not be passed on to the underlying driver.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ReplicaSettings {
    pub auth_token: Option<String>,
    /// `None` means periodic sync is off.
    pub sync_interval: Option<Duration>,
    pub encryption_key: Option<String>,
    pub read_your_writes: Option<bool>,
}

impl fmt::Debug for ReplicaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaSettings")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "***"))
            .field("sync_interval", &self.sync_interval)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "***"))
            .field("read_your_writes", &self.read_your_writes)
            .finish()
    }
}

/// Opens replica connectors against a local file and a remote primary.
#[async_trait]
pub trait ReplicaDriver: Send + Sync {
    async fn open_replica(
        &self,
        local_path: &Path,
        primary_url: &str,
        settings: &ReplicaSettings,
    ) -> Result<Box<dyn ReplicaConnector>, DriverError>;
}

/// A live replica. Owns whatever sync machinery the driver runs.
#[async_trait]
pub trait ReplicaConnector: Send + Sync {
    /// Open a connection bound to the replica's local file.
    async fn connect(&self) -> Result<DatabaseConnection, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens a connection straight to the remote primary.
#[async_trait]
pub trait RemoteDriver: Send + Sync {
    async fn open_remote(&self, url: &str) -> Result<DatabaseConnection, DriverError>;
}

/// Allocates and removes process-private directories.
pub trait TempStorage: Send + Sync {
    fn create_dir(&self, parent: Option<&Path>) -> io::Result<PathBuf>;

    fn remove_all(&self, path: &Path) -> io::Result<()>;
}

// ============================================================================
// OsTempStorage
// ============================================================================

/// Fresh `libsql-*` directories under the OS temp dir (or a given parent).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTempStorage;

impl TempStorage for OsTempStorage {
    fn create_dir(&self, parent: Option<&Path>) -> io::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("libsql-");
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir.keep())
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}

// ============================================================================
// LocalFileDriver
// ============================================================================

// sqlx percent-decodes the file name, so these must not appear literally.
const FILE_PATH: &AsciiSet = &CONTROLS.add(b' ').add(b'#').add(b'%').add(b'?');

/// `sqlite://` URL for a database file, created if missing.
fn sqlite_file_url(path: &Path) -> String {
    let path = path.to_string_lossy();
    format!("sqlite://{}?mode=rwc", utf8_percent_encode(&path, FILE_PATH))
}

fn single_connection_options(url: String) -> ConnectOptions {
    let mut opt = ConnectOptions::new(url);
    opt.min_connections(1)
        .max_connections(1)
        .sqlx_logging(false);
    opt
}

/// Serves the replica from a plain SQLite file through sea-orm.
///
/// Nothing is pulled from the primary; the file starts empty and the sync
/// interval is only recorded. Encryption is not available, so a configured
/// encryption key is refused rather than silently ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileDriver;

#[async_trait]
impl ReplicaDriver for LocalFileDriver {
    async fn open_replica(
        &self,
        local_path: &Path,
        primary_url: &str,
        settings: &ReplicaSettings,
    ) -> Result<Box<dyn ReplicaConnector>, DriverError> {
        if settings.encryption_key.is_some() {
            return Err("local file driver cannot encrypt the replica file".into());
        }

        debug!(
            "replica_driver=open local={} primary={} sync_interval={:?} read_your_writes={:?}",
            local_path.display(),
            sanitize_url(primary_url),
            settings.sync_interval,
            settings.read_your_writes
        );

        Ok(Box::new(LocalFileConnector {
            local_path: local_path.to_path_buf(),
        }))
    }
}

#[derive(Debug)]
pub struct LocalFileConnector {
    local_path: PathBuf,
}

impl LocalFileConnector {
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }
}

#[async_trait]
impl ReplicaConnector for LocalFileConnector {
    async fn connect(&self) -> Result<DatabaseConnection, DriverError> {
        let url = sqlite_file_url(&self.local_path);
        let conn = Database::connect(single_connection_options(url)).await?;
        Ok(conn)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        debug!("replica_driver=close local={}", self.local_path.display());
        Ok(())
    }
}

// ============================================================================
// SeaOrmRemoteDriver
// ============================================================================

/// `url` without its `authToken` query parameter.
fn without_auth_token(url: &str) -> Cow<'_, str> {
    let Some((base, query)) = url.split_once('?') else {
        return Cow::Borrowed(url);
    };
    let is_token = |pair: &&str| {
        let key = pair.split_once('=').map_or(*pair, |(key, _)| key);
        key.eq_ignore_ascii_case("authToken")
    };
    if !query.split('&').any(|pair| is_token(&pair)) {
        return Cow::Borrowed(url);
    }

    let kept: Vec<&str> = query.split('&').filter(|pair| !is_token(pair)).collect();
    if kept.is_empty() {
        Cow::Owned(base.to_string())
    } else {
        Cow::Owned(format!("{base}?{}", kept.join("&")))
    }
}

/// Connects to the primary with `sea_orm::Database::connect`.
///
/// sqlx has no way to present a libsql auth token and rejects unknown URL
/// parameters, so `authToken` is removed from the URL before connecting.
#[derive(Debug, Clone, Copy)]
pub struct SeaOrmRemoteDriver {
    max_connections: u32,
}

impl SeaOrmRemoteDriver {
    pub fn with_max_connections(max_connections: u32) -> Self {
        Self { max_connections }
    }
}

impl Default for SeaOrmRemoteDriver {
    fn default() -> Self {
        Self { max_connections: 1 }
    }
}

#[async_trait]
impl RemoteDriver for SeaOrmRemoteDriver {
    async fn open_remote(&self, url: &str) -> Result<DatabaseConnection, DriverError> {
        let target = without_auth_token(url);
        if let Cow::Owned(_) = target {
            debug!("remote_driver=auth_token_not_sent url={}", sanitize_url(url));
        }

        let mut opt = ConnectOptions::new(target.into_owned());
        opt.min_connections(1)
            .max_connections(self.max_connections.max(1))
            .sqlx_logging(false);
        let conn = Database::connect(opt).await?;
        Ok(conn)
    }
}

//! Collaborator doubles for the connection providers.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use replica_db::infra::db::{
    LocalFileDriver, OsTempStorage, RemoteDriver, ReplicaConnector, ReplicaDriver,
    ReplicaSettings, TempStorage,
};
use replica_db::DriverError;
use sea_orm::DatabaseConnection;

use super::db::memory_conn;

#[derive(Debug, Clone)]
pub struct ReplicaCall {
    pub local_path: PathBuf,
    pub primary_url: String,
    pub settings: ReplicaSettings,
}

/// Records every `open_replica` call, then serves a real local file.
/// The encryption key is recorded but not passed on.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    calls: Arc<Mutex<Vec<ReplicaCall>>>,
}

impl RecordingDriver {
    pub fn calls(&self) -> Vec<ReplicaCall> {
        self.calls.lock().expect("calls poisoned").clone()
    }
}

#[async_trait]
impl ReplicaDriver for RecordingDriver {
    async fn open_replica(
        &self,
        local_path: &Path,
        primary_url: &str,
        settings: &ReplicaSettings,
    ) -> Result<Box<dyn ReplicaConnector>, DriverError> {
        self.calls.lock().expect("calls poisoned").push(ReplicaCall {
            local_path: local_path.to_path_buf(),
            primary_url: primary_url.to_string(),
            settings: settings.clone(),
        });

        let forwarded = ReplicaSettings {
            encryption_key: None,
            ..settings.clone()
        };
        LocalFileDriver
            .open_replica(local_path, primary_url, &forwarded)
            .await
    }
}

/// Refuses to build a connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingDriver;

#[async_trait]
impl ReplicaDriver for FailingDriver {
    async fn open_replica(
        &self,
        _local_path: &Path,
        _primary_url: &str,
        _settings: &ReplicaSettings,
    ) -> Result<Box<dyn ReplicaConnector>, DriverError> {
        Err("replica driver unavailable".into())
    }
}

/// Refuses to build a connector, quoting the credentials it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoingDriver;

#[async_trait]
impl ReplicaDriver for EchoingDriver {
    async fn open_replica(
        &self,
        _local_path: &Path,
        primary_url: &str,
        settings: &ReplicaSettings,
    ) -> Result<Box<dyn ReplicaConnector>, DriverError> {
        Err(format!(
            "{primary_url} rejected token {} with key {}",
            settings.auth_token.as_deref().unwrap_or("-"),
            settings.encryption_key.as_deref().unwrap_or("-"),
        )
        .into())
    }
}

/// Builds a connector whose connection is already disconnected, so closing
/// the handle fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedDriver;

struct DisconnectedConnector;

#[async_trait]
impl ReplicaDriver for DisconnectedDriver {
    async fn open_replica(
        &self,
        _local_path: &Path,
        _primary_url: &str,
        _settings: &ReplicaSettings,
    ) -> Result<Box<dyn ReplicaConnector>, DriverError> {
        Ok(Box::new(DisconnectedConnector))
    }
}

#[async_trait]
impl ReplicaConnector for DisconnectedConnector {
    async fn connect(&self) -> Result<DatabaseConnection, DriverError> {
        Ok(DatabaseConnection::Disconnected)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Builds a connector whose `connect` fails; remembers whether it was closed.
#[derive(Debug, Clone, Default)]
pub struct ConnectFailsDriver {
    closed: Arc<AtomicBool>,
}

impl ConnectFailsDriver {
    pub fn connector_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ConnectFailsConnector {
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl ReplicaDriver for ConnectFailsDriver {
    async fn open_replica(
        &self,
        _local_path: &Path,
        _primary_url: &str,
        _settings: &ReplicaSettings,
    ) -> Result<Box<dyn ReplicaConnector>, DriverError> {
        Ok(Box::new(ConnectFailsConnector {
            closed: self.closed.clone(),
        }))
    }
}

#[async_trait]
impl ReplicaConnector for ConnectFailsConnector {
    async fn connect(&self) -> Result<DatabaseConnection, DriverError> {
        Err("connection refused".into())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves a real local file but fails when the connector is closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseFailsDriver;

struct CloseFailsConnector {
    inner: Box<dyn ReplicaConnector>,
}

#[async_trait]
impl ReplicaDriver for CloseFailsDriver {
    async fn open_replica(
        &self,
        local_path: &Path,
        primary_url: &str,
        settings: &ReplicaSettings,
    ) -> Result<Box<dyn ReplicaConnector>, DriverError> {
        let inner = LocalFileDriver
            .open_replica(local_path, primary_url, settings)
            .await?;
        Ok(Box::new(CloseFailsConnector { inner }))
    }
}

#[async_trait]
impl ReplicaConnector for CloseFailsConnector {
    async fn connect(&self) -> Result<DatabaseConnection, DriverError> {
        self.inner.connect().await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.inner.close().await?;
        Err("connector close failed".into())
    }
}

/// Cannot allocate directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingTempStorage;

impl TempStorage for FailingTempStorage {
    fn create_dir(&self, _parent: Option<&Path>) -> io::Result<PathBuf> {
        Err(io::Error::new(io::ErrorKind::Other, "no space left for temp dir"))
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        OsTempStorage.remove_all(path)
    }
}

/// Allocates real directories but refuses to remove them.
#[derive(Debug, Clone, Default)]
pub struct StuckDirStorage {
    remove_attempts: Arc<AtomicUsize>,
}

impl StuckDirStorage {
    pub fn remove_attempts(&self) -> usize {
        self.remove_attempts.load(Ordering::SeqCst)
    }
}

impl TempStorage for StuckDirStorage {
    fn create_dir(&self, parent: Option<&Path>) -> io::Result<PathBuf> {
        OsTempStorage.create_dir(parent)
    }

    fn remove_all(&self, _path: &Path) -> io::Result<()> {
        self.remove_attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "directory is busy",
        ))
    }
}

/// Records the URL it was asked to open and hands back an in-memory database.
#[derive(Debug, Clone, Default)]
pub struct RecordingRemoteDriver {
    urls: Arc<Mutex<Vec<String>>>,
}

impl RecordingRemoteDriver {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("urls poisoned").clone()
    }
}

#[async_trait]
impl RemoteDriver for RecordingRemoteDriver {
    async fn open_remote(&self, url: &str) -> Result<DatabaseConnection, DriverError> {
        self.urls.lock().expect("urls poisoned").push(url.to_string());
        Ok(memory_conn().await?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRemoteDriver;

#[async_trait]
impl RemoteDriver for FailingRemoteDriver {
    async fn open_remote(&self, _url: &str) -> Result<DatabaseConnection, DriverError> {
        Err("primary unreachable".into())
    }
}

/// Fails with a message that quotes the URL it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoingRemoteDriver;

#[async_trait]
impl RemoteDriver for EchoingRemoteDriver {
    async fn open_remote(&self, url: &str) -> Result<DatabaseConnection, DriverError> {
        Err(format!("the connection string '{url}' has no supporting driver").into())
    }
}

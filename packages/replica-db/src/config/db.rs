use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use migration::MigrationSource;

use crate::error::DbError;
use crate::infra::db::core::sanitize_url;
use crate::infra::db::drivers::ReplicaSettings;

/// File name of the replica's local database when none is configured.
pub const DEFAULT_LOCAL_DB_NAME: &str = "local.db";

/// Sync cadence handed to the replica connector when none is configured.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(200);

/// Which topology a connection provider builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Local replica file kept in sync with the remote primary.
    EmbeddedReplica,
    /// Direct connection to the remote primary.
    RemoteOnly,
}

impl ConnectionMode {
    /// The mode `DefaultProvider` builds on this target.
    pub fn platform_default() -> Self {
        if cfg!(any(windows, feature = "remote-only")) {
            Self::RemoteOnly
        } else {
            Self::EmbeddedReplica
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmbeddedReplica => "embedded-replica",
            Self::RemoteOnly => "remote-only",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection and migration settings.
///
/// Every optional setting stays `None` until a setter is called, so an
/// unset value is never forwarded to the driver in place of its own default.
#[derive(Clone)]
pub struct DbConfig {
    primary_url: String,
    local_db_name: Option<String>,
    sync_interval: Option<Duration>,
    auth_token: Option<String>,
    encryption_key: Option<String>,
    read_your_writes: Option<bool>,
    temp_dir_in: Option<PathBuf>,
    migrations: Option<Arc<dyn MigrationSource>>,
}

impl DbConfig {
    pub fn new(primary_url: impl Into<String>) -> Self {
        Self {
            primary_url: primary_url.into(),
            local_db_name: None,
            sync_interval: None,
            auth_token: None,
            encryption_key: None,
            read_your_writes: None,
            temp_dir_in: None,
            migrations: None,
        }
    }

    pub fn local_db_name(mut self, name: impl Into<String>) -> Self {
        self.local_db_name = Some(name.into());
        self
    }

    /// `Duration::ZERO` turns periodic sync off.
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn read_your_writes(mut self, enabled: bool) -> Self {
        self.read_your_writes = Some(enabled);
        self
    }

    /// Parent directory for the replica's private temporary directory.
    pub fn temp_dir_in(mut self, parent: impl Into<PathBuf>) -> Self {
        self.temp_dir_in = Some(parent.into());
        self
    }

    /// Opt into running migrations from `source` when the database is opened.
    pub fn migrations(mut self, source: Arc<dyn MigrationSource>) -> Self {
        self.migrations = Some(source);
        self
    }

    pub fn primary_url(&self) -> &str {
        &self.primary_url
    }

    /// Configured local file name, or [`DEFAULT_LOCAL_DB_NAME`].
    pub fn resolved_local_db_name(&self) -> &str {
        self.local_db_name.as_deref().unwrap_or(DEFAULT_LOCAL_DB_NAME)
    }

    /// Interval the connector should sync at; `None` when sync was turned off.
    pub fn resolved_sync_interval(&self) -> Option<Duration> {
        match self.sync_interval {
            None => Some(DEFAULT_SYNC_INTERVAL),
            Some(interval) if interval.is_zero() => None,
            Some(interval) => Some(interval),
        }
    }

    pub fn auth_token_value(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn temp_dir_parent(&self) -> Option<&Path> {
        self.temp_dir_in.as_deref()
    }

    pub fn migration_source(&self) -> Option<&Arc<dyn MigrationSource>> {
        self.migrations.as_ref()
    }

    pub fn migrations_enabled(&self) -> bool {
        self.migrations.is_some()
    }

    /// Settings forwarded to the replica driver. Unset values stay `None`.
    pub fn replica_settings(&self) -> ReplicaSettings {
        ReplicaSettings {
            auth_token: self.auth_token.clone(),
            sync_interval: self.resolved_sync_interval(),
            encryption_key: self.encryption_key.clone(),
            read_your_writes: self.read_your_writes,
        }
    }

    pub fn validate(&self) -> Result<(), DbError> {
        if self.primary_url.trim().is_empty() {
            return Err(DbError::config("primary URL must not be empty"));
        }

        if let Some(name) = &self.local_db_name {
            validate_local_db_name(name)?;
        }

        if matches!(self.auth_token.as_deref(), Some("")) {
            return Err(DbError::config(
                "auth token was set but is empty; leave it unset instead",
            ));
        }

        if matches!(self.encryption_key.as_deref(), Some("")) {
            return Err(DbError::config(
                "encryption key was set but is empty; leave it unset instead",
            ));
        }

        Ok(())
    }
}

fn validate_local_db_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() {
        return Err(DbError::config("local database name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(DbError::config(format!(
            "local database name '{name}' is not a file name"
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains(std::path::MAIN_SEPARATOR) {
        return Err(DbError::config(format!(
            "local database name '{name}' must not contain a path separator"
        )));
    }
    Ok(())
}

fn redact<T>(value: &Option<T>) -> &'static str {
    if value.is_some() {
        "Some(***)"
    } else {
        "None"
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("primary_url", &sanitize_url(&self.primary_url))
            .field("local_db_name", &self.local_db_name)
            .field("sync_interval", &self.sync_interval)
            .field("auth_token", &redact(&self.auth_token))
            .field("encryption_key", &redact(&self.encryption_key))
            .field("read_your_writes", &self.read_your_writes)
            .field("temp_dir_in", &self.temp_dir_in)
            .field("migrations_enabled", &self.migrations.is_some())
            .finish()
    }
}

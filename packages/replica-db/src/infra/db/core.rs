use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::config::db::{ConnectionMode, DbConfig};
use crate::error::{DbError, DriverError};
use crate::infra::db::drivers::{ReplicaConnector, TempStorage};

/// Builds the live connection for one topology.
///
/// Implementations either return every resource they allocated inside
/// [`Connected`] or release all of them before returning an error.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    fn mode(&self) -> ConnectionMode;

    async fn connect(&self, config: &DbConfig) -> Result<Connected, DbError>;
}

/// Resources produced by a successful build, handed to `ReplicaDb` as a group.
pub struct Connected {
    pub conn: DatabaseConnection,
    pub connector: Option<Box<dyn ReplicaConnector>>,
    pub local_dir: Option<LocalDir>,
}

impl Connected {
    pub fn remote(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            connector: None,
            local_dir: None,
        }
    }

    pub fn embedded(
        conn: DatabaseConnection,
        connector: Box<dyn ReplicaConnector>,
        local_dir: LocalDir,
    ) -> Self {
        Self {
            conn,
            connector: Some(connector),
            local_dir: Some(local_dir),
        }
    }
}

impl fmt::Debug for Connected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connected")
            .field("connector", &self.connector.is_some())
            .field("local_dir", &self.local_dir)
            .finish()
    }
}

/// A temporary directory created for one replica, with the storage that removes it.
pub struct LocalDir {
    path: PathBuf,
    storage: Arc<dyn TempStorage>,
}

impl LocalDir {
    pub fn new(path: PathBuf, storage: Arc<dyn TempStorage>) -> Self {
        Self { path, storage }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively delete the directory.
    pub fn remove(&self) -> io::Result<()> {
        self.storage.remove_all(&self.path)
    }
}

impl fmt::Debug for LocalDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalDir").field(&self.path).finish()
    }
}

#[cfg(not(any(windows, feature = "remote-only")))]
pub type DefaultProvider = crate::infra::db::embedded::EmbeddedReplicaProvider;

#[cfg(any(windows, feature = "remote-only"))]
pub type DefaultProvider = crate::infra::db::remote::RemoteOnlyProvider;

/// Mask credentials in a database URL before it is logged.
///
/// Hides the password of `user:password@host` and the value of an
/// `authToken` query parameter.
pub fn sanitize_url(url: &str) -> String {
    let masked = mask_userinfo(url);

    let Some(query_start) = masked.find('?') else {
        return masked;
    };
    let (base, query) = masked.split_at(query_start + 1);
    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("authToken") => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect();

    format!("{base}{}", pairs.join("&"))
}

/// Replace every occurrence of `secrets` in a driver error's message chain
/// with `***`. An error that mentions none of them is returned untouched.
pub fn redact_secrets(err: DriverError, secrets: &[&str]) -> DriverError {
    let secrets: Vec<&str> = secrets.iter().copied().filter(|s| !s.is_empty()).collect();

    let mut messages = vec![err.to_string()];
    let mut next = err.source();
    while let Some(source) = next {
        let message = source.to_string();
        if !messages.iter().any(|m| m.contains(&message)) {
            messages.push(message);
        }
        next = source.source();
    }

    if !messages.iter().any(|m| secrets.iter().any(|s| m.contains(s))) {
        return err;
    }

    let mut message = messages.join(": ");
    for secret in secrets {
        message = message.replace(secret, "***");
    }
    message.into()
}

fn mask_userinfo(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &url[authority_start..];
    let authority_end = rest
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let authority = &rest[..authority_end];

    let Some(at) = authority.rfind('@') else {
        return url.to_string();
    };
    let Some(colon) = authority[..at].find(':') else {
        return url.to_string();
    };

    format!(
        "{}{}:***{}",
        &url[..authority_start],
        &authority[..colon],
        &rest[at..]
    )
}

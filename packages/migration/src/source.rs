use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;
use tracing::debug;

use crate::error::SourceError;

/// A named migration script. The script body is opaque text, usually SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    name: String,
    script: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
        }
    }

    /// Ledger key for this migration (the source file's base name).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script(&self) -> &str {
        &self.script
    }
}

/// Supplies the ordered set of migrations for a run.
///
/// The order returned by `load` is the order migrations are applied in.
/// Implementations must either return every migration or fail; a partial
/// list is never returned.
pub trait MigrationSource: Send + Sync {
    fn load(&self) -> Result<Vec<Migration>, SourceError>;
}

/// Rejects duplicate names, keeping the first-seen order otherwise.
/// Each entry carries the origin (path or position) used in error messages.
fn into_unique(entries: Vec<(String, Migration)>) -> Result<Vec<Migration>, SourceError> {
    let mut seen: HashMap<String, String> = HashMap::with_capacity(entries.len());
    let mut migrations = Vec::with_capacity(entries.len());

    for (origin, migration) in entries {
        if let Some(first) = seen.get(migration.name()) {
            return Err(SourceError::DuplicateName {
                name: migration.name().to_string(),
                first: first.clone(),
                second: origin,
            });
        }
        seen.insert(migration.name().to_string(), origin);
        migrations.push(migration);
    }

    Ok(migrations)
}

fn decode(path: &str, bytes: Vec<u8>) -> Result<String, SourceError> {
    String::from_utf8(bytes).map_err(|_| SourceError::Decode {
        path: path.to_string(),
    })
}

// ============================================================================
// StaticSource
// ============================================================================

/// An explicit list of migrations, applied exactly in the given order.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    migrations: Vec<Migration>,
}

impl StaticSource {
    pub fn new(migrations: impl IntoIterator<Item = Migration>) -> Self {
        Self {
            migrations: migrations.into_iter().collect(),
        }
    }

    /// Build from `(name, script)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, script)| Migration::new(name, script)),
        )
    }
}

impl MigrationSource for StaticSource {
    fn load(&self) -> Result<Vec<Migration>, SourceError> {
        let entries = self
            .migrations
            .iter()
            .enumerate()
            .map(|(index, m)| (format!("#{index}"), m.clone()))
            .collect();
        into_unique(entries)
    }
}

// ============================================================================
// DirSource
// ============================================================================

/// Migrations read from a directory tree on disk.
///
/// Entries of each directory are visited in lexicographic file-name order and
/// sub-directories are descended into at their position in that order.
/// Directories produce no migration themselves.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SourceError + '_ {
    move |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn walk_dir(dir: &Path, out: &mut Vec<(String, Migration)>) -> Result<(), SourceError> {
    // Symlinks are not followed; a link to a directory is read as a file and fails.
    let mut entries = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?.is_dir()))))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error(dir))?;
    entries.sort_by(|(a, _), (b, _)| a.file_name().cmp(&b.file_name()));

    for (path, is_dir) in entries {
        if is_dir {
            walk_dir(&path, out)?;
            continue;
        }

        let display = path.display().to_string();
        let bytes = fs::read(&path).map_err(io_error(&path))?;
        let script = decode(&display, bytes)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());

        out.push((display, Migration::new(name, script)));
    }

    Ok(())
}

impl MigrationSource for DirSource {
    fn load(&self) -> Result<Vec<Migration>, SourceError> {
        let mut entries = Vec::new();
        walk_dir(&self.root, &mut entries)?;
        debug!(root = %self.root.display(), count = entries.len(), "migration source loaded");
        into_unique(entries)
    }
}

// ============================================================================
// EmbeddedSource
// ============================================================================

/// Migrations bundled into the binary with `rust_embed`.
///
/// ```ignore
/// #[derive(rust_embed::Embed)]
/// #[folder = "migrations/"]
/// struct Migrations;
///
/// let source = EmbeddedSource::<Migrations>::new();
/// ```
pub struct EmbeddedSource<E> {
    _assets: PhantomData<fn() -> E>,
}

impl<E: RustEmbed> EmbeddedSource<E> {
    pub fn new() -> Self {
        Self {
            _assets: PhantomData,
        }
    }
}

impl<E: RustEmbed> Default for EmbeddedSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EmbeddedSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedSource")
            .field("assets", &std::any::type_name::<E>())
            .finish()
    }
}

/// Component-wise comparison of `/`-separated embedded paths.
/// Matches the depth-first, name-ordered walk of `DirSource`.
fn embedded_path_order(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

impl<E: RustEmbed> MigrationSource for EmbeddedSource<E> {
    fn load(&self) -> Result<Vec<Migration>, SourceError> {
        let mut paths: Vec<String> = E::iter().map(|p| p.into_owned()).collect();
        paths.sort_by(|a, b| embedded_path_order(a, b));

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let file = E::get(&path).ok_or_else(|| SourceError::Missing { path: path.clone() })?;
            let script = decode(&path, file.data.into_owned())?;
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            entries.push((path, Migration::new(name, script)));
        }

        debug!(
            assets = std::any::type_name::<E>(),
            count = entries.len(),
            "migration source loaded"
        );
        into_unique(entries)
    }
}

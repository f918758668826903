use std::path::PathBuf;

use migration::DirSource;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement,
};

/// Private in-memory SQLite database. One pooled connection so every
/// statement sees the same database.
pub async fn memory_conn() -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.min_connections(1)
        .max_connections(1)
        .sqlx_logging(false);
    Database::connect(opt).await
}

pub async fn table_exists(conn: &impl ConnectionTrait, table: &str) -> Result<bool, DbErr> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "SELECT name FROM sqlite_master WHERE type='table' AND name = ?",
        [table.into()],
    );
    Ok(conn.query_one(stmt).await?.is_some())
}

pub async fn count_rows(conn: &impl ConnectionTrait, table: &str) -> Result<i64, DbErr> {
    let stmt = Statement::from_string(
        DbBackend::Sqlite,
        format!("SELECT COUNT(*) AS n FROM {table}"),
    );
    let row = conn
        .query_one(stmt)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("no count row for {table}")))?;
    row.try_get::<i64>("", "n")
}

/// Fixture tree shipped with the `migration` package.
pub fn fixture_source() -> DirSource {
    DirSource::new(fixture_dir())
}

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../migration/tests/fixtures/migrations")
}

/// Number of entries directly inside `dir`.
pub fn entry_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

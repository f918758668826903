//! The `migrations` ledger table and the runner that applies pending
//! migrations against it.
//!
//! Each migration is applied as its own unit: the script runs, then its name
//! is recorded. A name is recorded only after its script succeeded, and a
//! recorded name is never executed again.

use std::collections::HashSet;

use migration::{Migration, MigrationSource};
use sea_orm::{ConnectionTrait, DbErr, Statement};
use tracing::{debug, info, warn};

use crate::error::DbError;

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "migrations";

const LEDGER_EXISTS_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type='table' AND name='migrations'";
const CREATE_LEDGER_SQL: &str = "CREATE TABLE migrations (name TEXT NOT NULL)";
const SELECT_APPLIED_SQL: &str = "SELECT name FROM migrations WHERE name = ?";
const INSERT_APPLIED_SQL: &str = "INSERT INTO migrations (name) VALUES (?)";
const LIST_APPLIED_SQL: &str = "SELECT name FROM migrations ORDER BY rowid";

/// Outcome of one migration run. Names are in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub ledger_created: bool,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Which migrations of a source are already recorded in the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: Vec<String>,
    pub pending: Vec<String>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

fn ledger_check(migration: Option<&str>) -> impl FnOnce(DbErr) -> DbError + '_ {
    move |source| DbError::LedgerCheck {
        migration: migration.map(str::to_string),
        source,
    }
}

async fn ledger_exists<C: ConnectionTrait>(conn: &C) -> Result<bool, DbError> {
    let stmt = Statement::from_string(conn.get_database_backend(), LEDGER_EXISTS_SQL);
    let row = conn.query_one(stmt).await.map_err(ledger_check(None))?;
    Ok(row.is_some())
}

/// Create the ledger table if it is missing. Returns `true` when it was created.
pub async fn ensure_ledger<C: ConnectionTrait>(conn: &C) -> Result<bool, DbError> {
    if ledger_exists(conn).await? {
        debug!("ledger=present table={}", LEDGER_TABLE);
        return Ok(false);
    }

    conn.execute_unprepared(CREATE_LEDGER_SQL)
        .await
        .map_err(ledger_check(None))?;
    info!("ledger=created table={}", LEDGER_TABLE);
    Ok(true)
}

async fn is_applied<C: ConnectionTrait>(conn: &C, name: &str) -> Result<bool, DbError> {
    let stmt = Statement::from_sql_and_values(
        conn.get_database_backend(),
        SELECT_APPLIED_SQL,
        [name.into()],
    );
    let row = conn.query_one(stmt).await.map_err(ledger_check(Some(name)))?;
    Ok(row.is_some())
}

async fn record_applied<C: ConnectionTrait>(conn: &C, name: &str) -> Result<(), DbError> {
    let stmt = Statement::from_sql_and_values(
        conn.get_database_backend(),
        INSERT_APPLIED_SQL,
        [name.into()],
    );
    conn.execute(stmt)
        .await
        .map_err(|source| DbError::LedgerWrite {
            name: name.to_string(),
            source,
        })?;
    Ok(())
}

/// Apply every migration not yet in the ledger, in the given order.
///
/// Stops at the first failure. Migrations before the failing one stay
/// recorded; the failing one and everything after it are not.
pub async fn run_migrations<C: ConnectionTrait>(
    conn: &C,
    migrations: &[Migration],
) -> Result<MigrationReport, DbError> {
    info!("migrate=start count={}", migrations.len());

    let mut report = MigrationReport {
        ledger_created: ensure_ledger(conn).await?,
        ..MigrationReport::default()
    };

    for migration in migrations {
        let name = migration.name();

        if is_applied(conn, name).await? {
            debug!("migration=skip name={}", name);
            report.skipped.push(name.to_string());
            continue;
        }

        debug!("migration=apply name={}", name);
        if let Err(source) = conn.execute_unprepared(migration.script()).await {
            warn!("migration=failed name={} error={}", name, source);
            return Err(DbError::MigrationExec {
                name: name.to_string(),
                source,
            });
        }

        if let Err(err) = record_applied(conn, name).await {
            warn!(
                "migration=unrecorded name={} error={} (script ran; a retry will run it again)",
                name, err
            );
            return Err(err);
        }

        info!("migration=applied name={}", name);
        report.applied.push(name.to_string());
    }

    info!(
        "migrate=done applied={} skipped={} ledger_created={}",
        report.applied.len(),
        report.skipped.len(),
        report.ledger_created
    );
    Ok(report)
}

/// Load `source` and run it. Fails with `NotEnabled`, touching nothing,
/// when no source was given.
pub async fn migrate<C: ConnectionTrait>(
    conn: &C,
    source: Option<&dyn MigrationSource>,
) -> Result<MigrationReport, DbError> {
    let Some(source) = source else {
        return Err(DbError::NotEnabled);
    };
    let migrations = source.load()?;
    run_migrations(conn, &migrations).await
}

/// Recorded migration names in the order they were applied.
/// Empty when the ledger does not exist; the ledger is not created.
pub async fn applied_migrations<C: ConnectionTrait>(conn: &C) -> Result<Vec<String>, DbError> {
    if !ledger_exists(conn).await? {
        return Ok(Vec::new());
    }

    let stmt = Statement::from_string(conn.get_database_backend(), LIST_APPLIED_SQL);
    let rows = conn.query_all(stmt).await.map_err(ledger_check(None))?;
    rows.iter()
        .map(|row| row.try_get::<String>("", "name"))
        .collect::<Result<Vec<_>, DbErr>>()
        .map_err(ledger_check(None))
}

/// Split `migrations` into recorded and pending names without changing anything.
pub async fn migration_status<C: ConnectionTrait>(
    conn: &C,
    migrations: &[Migration],
) -> Result<MigrationStatus, DbError> {
    let recorded: HashSet<String> = applied_migrations(conn).await?.into_iter().collect();

    let (applied, pending): (Vec<_>, Vec<_>) = migrations
        .iter()
        .map(|m| m.name().to_string())
        .partition(|name| recorded.contains(name));

    Ok(MigrationStatus { applied, pending })
}

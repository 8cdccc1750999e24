//! Ordered, append-only schema migrations. Each migration is fully applied
//! inside its own transaction or not applied at all; virtual-table migrations
//! that need a capability the engine might lack are recorded as `skipped`
//! rather than `applied`, so reopening the same database doesn't retry (and
//! doesn't silently pretend they ran).
//!
//! Version bookkeeping lives in a dedicated `kb_schema_version` table rather
//! than `PRAGMA user_version`, because the applied/skipped distinction must
//! survive reopen and `user_version` has no room for it.

pub(crate) mod v001_entities;
mod v002_graph;
mod v003_fts_mirror;
mod v004_spatial_index;

use kb_core::errors::StoreResult;
use kb_core::models::CapabilityVector;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    Applied,
    Skipped,
}

impl MigrationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
        }
    }
}

fn ensure_version_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kb_schema_version (
            version INTEGER PRIMARY KEY,
            status TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        ) STRICT;",
    )?;
    Ok(())
}

fn record(conn: &Connection, version: u32, status: MigrationStatus) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO kb_schema_version (version, status) VALUES (?1, ?2)",
        rusqlite::params![version, status.as_str()],
    )?;
    Ok(())
}

fn status_of(conn: &Connection, version: u32) -> StoreResult<Option<MigrationStatus>> {
    let result = conn.query_row(
        "SELECT status FROM kb_schema_version WHERE version = ?1",
        [version],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(s) if s == "applied" => Ok(Some(MigrationStatus::Applied)),
        Ok(_) => Ok(Some(MigrationStatus::Skipped)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Highest applied version, inferring `0` for a database with no bookkeeping
/// table and no `entities` table (a brand-new database), or `1` for a
/// pre-bookkeeping database that already has core tables — the same
/// defensive legacy-presence inference this codebase's schema-version lookups
/// already use.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let has_version_table: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'kb_schema_version'",
        [],
        |row| row.get(0),
    )?;
    if has_version_table {
        let max: Option<u32> = conn.query_row(
            "SELECT MAX(version) FROM kb_schema_version WHERE status = 'applied'",
            [],
            |row| row.get(0),
        )?;
        return Ok(max.unwrap_or(0));
    }

    let has_entities: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'entities'",
        [],
        |row| row.get(0),
    )?;
    Ok(if has_entities { 1 } else { 0 })
}

fn apply_in_transaction(
    conn: &mut Connection,
    version: u32,
    sql: &str,
) -> StoreResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.execute(
        "INSERT OR REPLACE INTO kb_schema_version (version, status) VALUES (?1, 'applied')",
        [version],
    )?;
    tx.commit()?;
    Ok(())
}

/// Run every unapplied core (capability-independent) migration up to
/// [`LATEST_VERSION`]'s non-conditional entries. Conditional (capability
/// gated) migrations are applied separately via [`run_conditional`] once the
/// capability vector is known.
pub fn run_core(conn: &mut Connection, embedding_dims: u32) -> StoreResult<u32> {
    ensure_version_table(conn)?;
    let mut version = current_version(conn)?;

    if version < 1 {
        info!(from = version, to = 1, "applying core entity/observation/relation schema");
        apply_in_transaction(conn, 1, &v001_entities::sql(embedding_dims))?;
        version = 1;
    }
    if version < 2 {
        info!(from = version, to = 2, "applying bi-temporal graph schema");
        apply_in_transaction(conn, 2, v002_graph::SQL)?;
        version = 2;
    }
    Ok(version)
}

/// Apply (or record as skipped) the migrations gated on an optional engine
/// capability. Must run after [`run_core`] and after the capability vector has
/// been probed.
pub fn run_conditional(conn: &mut Connection, caps: &CapabilityVector) -> StoreResult<u32> {
    ensure_version_table(conn)?;
    let mut version = current_version(conn)?;

    if status_of(conn, 3)?.is_none() {
        if caps.has_fts {
            info!("installing FTS mirror for graph_entities");
            apply_in_transaction(conn, 3, v003_fts_mirror::SQL)?;
        } else {
            info!("hasFts absent, skipping FTS mirror migration");
            record(conn, 3, MigrationStatus::Skipped)?;
        }
    }
    if status_of(conn, 3)? == Some(MigrationStatus::Applied) {
        version = version.max(3);
    }

    if status_of(conn, 4)?.is_none() {
        if caps.has_rtree {
            info!("installing spatial index virtual table");
            apply_in_transaction(conn, 4, v004_spatial_index::SQL)?;
        } else {
            info!("hasRtree absent, skipping spatial index migration");
            record(conn, 4, MigrationStatus::Skipped)?;
        }
    }
    if status_of(conn, 4)? == Some(MigrationStatus::Applied) {
        version = version.max(4);
    }

    Ok(version)
}

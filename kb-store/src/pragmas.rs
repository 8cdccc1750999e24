//! Session pragma tuning, applied to every connection immediately after open
//! and again after migration.

use kb_core::config::PragmaConfig;
use kb_core::errors::StoreResult;
use rusqlite::Connection;

/// Configure a read-write connection with the tuned pragma set.
pub fn configure_connection(conn: &Connection, cfg: &PragmaConfig) -> StoreResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = {journal_mode};
        PRAGMA synchronous = {sync_mode};
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        PRAGMA cache_size = {cache_size};
        PRAGMA mmap_size = 268435456;
        PRAGMA temp_store = {temp_store};
        PRAGMA wal_autocheckpoint = 1000;
        ",
        journal_mode = cfg.journal_mode,
        sync_mode = cfg.sync_mode,
        cache_size = cfg.cache_size,
        temp_store = cfg.temp_store,
    ))?;
    Ok(())
}

/// Same pragma set as [`configure_connection`] plus `query_only = ON`, so that
/// an accidental write through a reader connection is rejected by the engine
/// rather than relied upon by convention.
pub fn configure_readonly_connection(conn: &Connection, cfg: &PragmaConfig) -> StoreResult<()> {
    configure_connection(conn, cfg)?;
    conn.execute_batch("PRAGMA query_only = ON;")?;
    Ok(())
}

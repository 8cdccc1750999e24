//! Dimension reconciler: the on-disk declared width always wins over
//! configuration, because a project's embedding column is fixed at creation
//! time and every later open must agree with what is actually stored.

use kb_core::errors::StoreResult;
use rusqlite::Connection;
use tracing::warn;

// The CHECK clause this crate's own migration emits (see
// migrations::v001_entities) has a single fixed shape, so a plain substring
// scan is enough here and avoids pulling in a regex dependency for one parse.

/// Reconcile `configured_dims` against the persisted schema for `entities`.
/// Returns the dimension that should actually be used, warning when it
/// differs from what the caller asked for.
pub fn reconcile(conn: &Connection, configured_dims: u32) -> StoreResult<u32> {
    if let Some(declared) = declared_dims_from_schema(conn)? {
        if declared != configured_dims {
            warn!(
                configured = configured_dims,
                persisted = declared,
                "embedding dimension mismatch; persisted width wins"
            );
        }
        return Ok(declared);
    }

    if let Some(inferred) = infer_dims_from_existing_row(conn)? {
        return Ok(inferred);
    }

    Ok(configured_dims)
}

fn declared_dims_from_schema(conn: &Connection) -> StoreResult<Option<u32>> {
    let sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'entities'",
            [],
            |row| row.get(0),
        )
        .ok();

    let Some(sql) = sql else {
        return Ok(None);
    };

    // Matches the `CHECK (length(embedding) = <bytes>)` clause this crate's
    // own migration emits.
    let needle = "length(embedding) = ";
    let Some(idx) = sql.find(needle) else {
        return Ok(None);
    };
    let rest = &sql[idx + needle.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Ok(None);
    }
    let bytes: u32 = digits.parse().unwrap_or(0);
    if bytes == 0 || bytes % 4 != 0 {
        return Ok(None);
    }
    Ok(Some(bytes / 4))
}

fn infer_dims_from_existing_row(conn: &Connection) -> StoreResult<Option<u32>> {
    let has_table: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'entities'",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }

    let len: Option<i64> = conn
        .query_row("SELECT length(embedding) FROM entities LIMIT 1", [], |row| row.get(0))
        .ok();
    match len {
        Some(n) if n > 0 && n % 4 == 0 => Ok(Some((n / 4) as u32)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_with_dims(conn: &Connection, dims: u32) {
        conn.execute_batch(&crate::migrations::v001_entities::sql(dims))
            .unwrap();
    }

    #[test]
    fn persisted_width_wins_over_configured() {
        let conn = Connection::open_in_memory().unwrap();
        schema_with_dims(&conn, 4);
        let resolved = reconcile(&conn, 8).unwrap();
        assert_eq!(resolved, 4, "persisted width must win over the requested 8");
    }

    #[test]
    fn falls_back_to_row_inference_when_check_unparseable() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE entities (
                name TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO entities (name, entity_type, embedding, created_at, updated_at)
             VALUES ('e1', 't', randomblob(12), '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        let resolved = reconcile(&conn, 4).unwrap();
        assert_eq!(resolved, 3, "12 bytes / 4 = 3 dims inferred from the stored row");
    }

    #[test]
    fn configured_dims_stand_when_no_schema_or_rows_exist() {
        let conn = Connection::open_in_memory().unwrap();
        let resolved = reconcile(&conn, 6).unwrap();
        assert_eq!(resolved, 6);
    }
}

//! The bi-temporal knowledge graph: entities, edges, and the append-only
//! event log that mirrors every successful mutation. Grounded on this
//! codebase's existing event-emission convention (one event per mutation,
//! written in the same transaction), generalized from a single flat
//! `memories` table to edge-level bi-temporality.

use chrono::{DateTime, Utc};
use kb_core::errors::{StoreError, StoreResult};
use kb_core::models::{AsOfQuery, GraphEdge, GraphEntity, GraphEventKind};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

/// Insert a new graph entity or update an existing one by id. Callers that
/// want a fresh id should pass `None`.
pub fn upsert_entity(
    conn: &Connection,
    id: Option<Uuid>,
    kind: &str,
    name: &str,
    summary: &str,
    attrs: serde_json::Value,
) -> StoreResult<GraphEntity> {
    let id = id.unwrap_or_else(Uuid::new_v4);
    let now = Utc::now();
    conn.execute(
        "INSERT INTO graph_entities (id, kind, name, summary, attrs, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(id) DO UPDATE SET
            kind = excluded.kind,
            name = excluded.name,
            summary = excluded.summary,
            attrs = excluded.attrs,
            updated_at = excluded.updated_at",
        rusqlite::params![
            id.to_string(),
            kind,
            name,
            summary,
            attrs.to_string(),
            now.to_rfc3339(),
        ],
    )?;
    emit_event(conn, id, GraphEventKind::EntityUpserted, serde_json::json!({"kind": kind, "name": name}))?;
    Ok(GraphEntity {
        id,
        kind: kind.to_string(),
        name: name.to_string(),
        summary: summary.to_string(),
        attrs,
        created_at: now,
        updated_at: now,
    })
}

/// Fails with `ConstraintError` if `src == dst` or a currently-valid edge with
/// identical `(src, dst, rel)` already exists — callers must invalidate or
/// close the old one first.
pub fn create_edge(
    conn: &Connection,
    src_id: Uuid,
    dst_id: Uuid,
    rel: &str,
    attrs: serde_json::Value,
    valid_from: DateTime<Utc>,
    provenance: serde_json::Value,
) -> StoreResult<GraphEdge> {
    if src_id == dst_id {
        return Err(StoreError::ConstraintError(
            "edge src_id and dst_id must differ".into(),
        ));
    }

    let existing_current: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM graph_edges
         WHERE src_id = ?1 AND dst_id = ?2 AND rel = ?3
           AND valid_to IS NULL AND invalidated_at IS NULL",
        rusqlite::params![src_id.to_string(), dst_id.to_string(), rel],
        |row| row.get(0),
    )?;
    if existing_current {
        return Err(StoreError::ConstraintError(format!(
            "a currently-valid edge ({src_id}, {dst_id}, {rel}) already exists"
        )));
    }

    let id = Uuid::new_v4();
    let ingested_at = Utc::now();
    conn.execute(
        "INSERT INTO graph_edges (id, src_id, dst_id, rel, attrs, valid_from, valid_to, ingested_at, invalidated_at, provenance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, NULL, ?8)",
        rusqlite::params![
            id.to_string(),
            src_id.to_string(),
            dst_id.to_string(),
            rel,
            attrs.to_string(),
            valid_from.to_rfc3339(),
            ingested_at.to_rfc3339(),
            provenance.to_string(),
        ],
    )?;
    emit_event(
        conn,
        id,
        GraphEventKind::EdgeCreated,
        serde_json::json!({"src_id": src_id, "dst_id": dst_id, "rel": rel}),
    )?;
    Ok(GraphEdge {
        id,
        src_id,
        dst_id,
        rel: rel.to_string(),
        attrs,
        valid_from,
        valid_to: None,
        ingested_at,
        invalidated_at: None,
        provenance,
    })
}

/// Sets `valid_to`; must satisfy `valid_to > valid_from` or fails with
/// `ConstraintError`.
pub fn close_edge(conn: &Connection, edge_id: Uuid, valid_to: DateTime<Utc>) -> StoreResult<()> {
    let edge = get_edge(conn, edge_id)?;
    if valid_to <= edge.valid_from {
        return Err(StoreError::ConstraintError(format!(
            "valid_to ({valid_to}) must be after valid_from ({})",
            edge.valid_from
        )));
    }
    let affected = conn.execute(
        "UPDATE graph_edges SET valid_to = ?1 WHERE id = ?2",
        rusqlite::params![valid_to.to_rfc3339(), edge_id.to_string()],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound(format!("edge {edge_id}")));
    }
    emit_event(
        conn,
        edge_id,
        GraphEventKind::EdgeClosed,
        serde_json::json!({"valid_to": valid_to}),
    )?;
    Ok(())
}

/// Sets `invalidated_at` to `at`; fails with `ConstraintError` if the edge is
/// already invalidated (invalidation is monotonic) or if `at` precedes
/// `ingested_at`.
pub fn invalidate_edge(conn: &Connection, edge_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
    let edge = get_edge(conn, edge_id)?;
    if edge.invalidated_at.is_some() {
        return Err(StoreError::ConstraintError(format!(
            "edge {edge_id} is already invalidated"
        )));
    }
    if at < edge.ingested_at {
        return Err(StoreError::ConstraintError(format!(
            "invalidated_at ({at}) must not precede ingested_at ({})",
            edge.ingested_at
        )));
    }
    let affected = conn.execute(
        "UPDATE graph_edges SET invalidated_at = ?1 WHERE id = ?2",
        rusqlite::params![at.to_rfc3339(), edge_id.to_string()],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound(format!("edge {edge_id}")));
    }
    emit_event(conn, edge_id, GraphEventKind::EdgeInvalidated, serde_json::json!({"at": at}))?;
    Ok(())
}

pub fn get_edge(conn: &Connection, edge_id: Uuid) -> StoreResult<GraphEdge> {
    conn.query_row(
        "SELECT id, src_id, dst_id, rel, attrs, valid_from, valid_to, ingested_at, invalidated_at, provenance
         FROM graph_edges WHERE id = ?1",
        [edge_id.to_string()],
        row_to_edge,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("edge {edge_id}")))
}

/// `Current` projection: edges with `valid_to IS NULL AND invalidated_at IS NULL`.
pub fn current_edges(conn: &Connection) -> StoreResult<Vec<GraphEdge>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, src_id, dst_id, rel, attrs, valid_from, valid_to, ingested_at, invalidated_at, provenance
         FROM graph_edges WHERE valid_to IS NULL AND invalidated_at IS NULL",
    )?;
    let rows = stmt.query_map([], row_to_edge)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// `As-of(T)` projection, computed in SQL directly from the invariant in
/// [`GraphEdge::is_valid_as_of`](kb_core::models::GraphEdge::is_valid_as_of)
/// rather than filtering every row in Rust.
pub fn edges_as_of(conn: &Connection, t: DateTime<Utc>) -> StoreResult<Vec<GraphEdge>> {
    let t = t.to_rfc3339();
    let mut stmt = conn.prepare_cached(
        "SELECT id, src_id, dst_id, rel, attrs, valid_from, valid_to, ingested_at, invalidated_at, provenance
         FROM graph_edges
         WHERE valid_from <= ?1
           AND (valid_to IS NULL OR valid_to > ?1)
           AND (invalidated_at IS NULL OR invalidated_at > ?1)",
    )?;
    let rows = stmt.query_map([&t], row_to_edge)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Same projection as [`edges_as_of`], taking the typed [`AsOfQuery`] wrapper
/// rather than a bare timestamp — the entry point callers outside this crate
/// are expected to use.
pub fn query_as_of(conn: &Connection, query: &AsOfQuery) -> StoreResult<Vec<GraphEdge>> {
    edges_as_of(conn, query.at)
}

/// Substring search over graph entities. Always computes the plain `LIKE`
/// result set; when `has_fts` is true, additionally runs the FTS5 mirror
/// query and appends any extra matches (deduplicated by id) after the `LIKE`
/// ordering, so the FTS path can only add to the result, never replace or
/// reorder it — the superset property this codebase's open search-ranking
/// question resolves to (see DESIGN.md).
pub fn search_entities(conn: &Connection, name_substring: &str, has_fts: bool, limit: u32) -> StoreResult<Vec<GraphEntity>> {
    let pattern = format!("%{name_substring}%");
    let mut stmt = conn.prepare_cached(
        "SELECT id, kind, name, summary, attrs, created_at, updated_at
         FROM graph_entities WHERE name LIKE ?1 ORDER BY name LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![pattern, limit], row_to_graph_entity)?;
    let mut results = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for row in rows {
        let entity = row?;
        seen.insert(entity.id);
        results.push(entity);
    }

    if has_fts {
        let fts_query = format!("{name_substring}*");
        let mut fts_stmt = conn.prepare_cached(
            "SELECT e.id, e.kind, e.name, e.summary, e.attrs, e.created_at, e.updated_at
             FROM graph_entities_fts f
             JOIN graph_entities e ON e.id = f.id
             WHERE f.name MATCH ?1
             LIMIT ?2",
        )?;
        if let Ok(rows) = fts_stmt.query_map(rusqlite::params![fts_query, limit], row_to_graph_entity) {
            for row in rows.flatten() {
                if seen.insert(row.id) {
                    results.push(row);
                }
            }
        }
    }

    Ok(results)
}

fn emit_event(
    conn: &Connection,
    subject_id: Uuid,
    kind: GraphEventKind,
    delta: serde_json::Value,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO graph_events (subject_id, recorded_at, kind, delta) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![subject_id.to_string(), Utc::now().to_rfc3339(), kind.as_str(), delta.to_string()],
    )?;
    Ok(())
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<GraphEdge> {
    let parse = |s: String| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    };
    let id: String = row.get(0)?;
    let src_id: String = row.get(1)?;
    let dst_id: String = row.get(2)?;
    let attrs: String = row.get(4)?;
    let valid_from: String = row.get(5)?;
    let valid_to: Option<String> = row.get(6)?;
    let ingested_at: String = row.get(7)?;
    let invalidated_at: Option<String> = row.get(8)?;
    let provenance: String = row.get(9)?;
    Ok(GraphEdge {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        src_id: Uuid::parse_str(&src_id).unwrap_or_default(),
        dst_id: Uuid::parse_str(&dst_id).unwrap_or_default(),
        rel: row.get(3)?,
        attrs: serde_json::from_str(&attrs).unwrap_or(serde_json::Value::Null),
        valid_from: parse(valid_from),
        valid_to: valid_to.map(parse),
        ingested_at: parse(ingested_at),
        invalidated_at: invalidated_at.map(parse),
        provenance: serde_json::from_str(&provenance).unwrap_or(serde_json::Value::Null),
    })
}

fn row_to_graph_entity(row: &rusqlite::Row) -> rusqlite::Result<GraphEntity> {
    let parse = |s: String| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    };
    let id: String = row.get(0)?;
    let attrs: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(GraphEntity {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        kind: row.get(1)?,
        name: row.get(2)?,
        summary: row.get(3)?,
        attrs: serde_json::from_str(&attrs).unwrap_or(serde_json::Value::Null),
        created_at: parse(created_at),
        updated_at: parse(updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;
    use chrono::TimeZone;

    fn fresh_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrations::run_core(&mut conn, 4).unwrap();
        conn
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn create_edge_rejects_self_loop() {
        let conn = fresh_conn();
        let a = upsert_entity(&conn, None, "k", "a", "", serde_json::json!({})).unwrap();
        let result = create_edge(&conn, a.id, a.id, "rel", serde_json::json!({}), t(1), serde_json::json!({}));
        assert!(matches!(result, Err(StoreError::ConstraintError(_))));
    }

    #[test]
    fn create_edge_rejects_duplicate_current_edge() {
        let conn = fresh_conn();
        let a = upsert_entity(&conn, None, "k", "a", "", serde_json::json!({})).unwrap();
        let b = upsert_entity(&conn, None, "k", "b", "", serde_json::json!({})).unwrap();
        create_edge(&conn, a.id, b.id, "rel", serde_json::json!({}), t(1), serde_json::json!({})).unwrap();
        let second = create_edge(&conn, a.id, b.id, "rel", serde_json::json!({}), t(2), serde_json::json!({}));
        assert!(matches!(second, Err(StoreError::ConstraintError(_))));
    }

    #[test]
    fn as_of_projection_matches_bi_temporal_scenario() {
        let conn = fresh_conn();
        let a = upsert_entity(&conn, None, "k", "a", "", serde_json::json!({})).unwrap();
        let b = upsert_entity(&conn, None, "k", "b", "", serde_json::json!({})).unwrap();
        let edge = create_edge(&conn, a.id, b.id, "rel", serde_json::json!({}), t(10), serde_json::json!({})).unwrap();
        close_edge(&conn, edge.id, t(30)).unwrap();

        let at_20 = edges_as_of(&conn, t(20)).unwrap();
        assert_eq!(at_20.len(), 1, "edge should be visible at t=20");

        let at_40 = edges_as_of(&conn, t(40)).unwrap();
        assert!(at_40.is_empty(), "edge should not be visible after valid_to");

        let via_query = query_as_of(&conn, &AsOfQuery::new(t(20))).unwrap();
        assert_eq!(via_query, at_20, "the typed AsOfQuery entry point must agree with edges_as_of");
    }

    #[test]
    fn current_edges_excludes_closed_and_invalidated() {
        let conn = fresh_conn();
        let a = upsert_entity(&conn, None, "k", "a", "", serde_json::json!({})).unwrap();
        let b = upsert_entity(&conn, None, "k", "b", "", serde_json::json!({})).unwrap();
        let c = upsert_entity(&conn, None, "k", "c", "", serde_json::json!({})).unwrap();

        let still_open = create_edge(&conn, a.id, b.id, "rel", serde_json::json!({}), t(1), serde_json::json!({})).unwrap();
        let closed = create_edge(&conn, a.id, c.id, "rel", serde_json::json!({}), t(1), serde_json::json!({})).unwrap();
        close_edge(&conn, closed.id, t(5)).unwrap();
        let invalidated = create_edge(&conn, b.id, c.id, "rel", serde_json::json!({}), t(1), serde_json::json!({})).unwrap();
        invalidate_edge(&conn, invalidated.id, t(5)).unwrap();

        let current = current_edges(&conn).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, still_open.id);
    }

    #[test]
    fn invalidate_is_monotone() {
        let conn = fresh_conn();
        let a = upsert_entity(&conn, None, "k", "a", "", serde_json::json!({})).unwrap();
        let b = upsert_entity(&conn, None, "k", "b", "", serde_json::json!({})).unwrap();
        let edge = create_edge(&conn, a.id, b.id, "rel", serde_json::json!({}), t(1), serde_json::json!({})).unwrap();

        invalidate_edge(&conn, edge.id, t(5)).unwrap();
        let second = invalidate_edge(&conn, edge.id, t(6));
        assert!(matches!(second, Err(StoreError::ConstraintError(_))));
    }

    #[test]
    fn close_edge_requires_valid_to_after_valid_from() {
        let conn = fresh_conn();
        let a = upsert_entity(&conn, None, "k", "a", "", serde_json::json!({})).unwrap();
        let b = upsert_entity(&conn, None, "k", "b", "", serde_json::json!({})).unwrap();
        let edge = create_edge(&conn, a.id, b.id, "rel", serde_json::json!({}), t(10), serde_json::json!({})).unwrap();
        let result = close_edge(&conn, edge.id, t(5));
        assert!(matches!(result, Err(StoreError::ConstraintError(_))));
    }

    #[test]
    fn every_mutation_emits_an_event() {
        let conn = fresh_conn();
        let a = upsert_entity(&conn, None, "k", "a", "", serde_json::json!({})).unwrap();
        let b = upsert_entity(&conn, None, "k", "b", "", serde_json::json!({})).unwrap();
        let edge = create_edge(&conn, a.id, b.id, "rel", serde_json::json!({}), t(1), serde_json::json!({})).unwrap();
        close_edge(&conn, edge.id, t(2)).unwrap();
        invalidate_edge(&conn, edge.id, t(3)).unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM graph_events", [], |r| r.get(0)).unwrap();
        // 2 upserts + create + close + invalidate
        assert_eq!(count, 5);
    }
}

//! Bi-temporal knowledge graph: entities, edges, and the append-only event
//! log. Unlike the FTS mirror and spatial index, this schema has no optional
//! dependency and is always created.

pub const SQL: &str = "
    CREATE TABLE graph_entities (
        id TEXT PRIMARY KEY NOT NULL,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        attrs TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    ) STRICT;

    CREATE TABLE graph_edges (
        id TEXT PRIMARY KEY NOT NULL,
        src_id TEXT NOT NULL REFERENCES graph_entities(id),
        dst_id TEXT NOT NULL REFERENCES graph_entities(id),
        rel TEXT NOT NULL,
        attrs TEXT NOT NULL DEFAULT '{}',
        valid_from TEXT NOT NULL,
        valid_to TEXT,
        ingested_at TEXT NOT NULL,
        invalidated_at TEXT,
        provenance TEXT NOT NULL DEFAULT '{}',
        CHECK (src_id <> dst_id),
        CHECK (valid_to IS NULL OR valid_to > valid_from),
        CHECK (invalidated_at IS NULL OR invalidated_at >= ingested_at)
    ) STRICT;

    CREATE INDEX idx_graph_edges_src ON graph_edges(src_id);
    CREATE INDEX idx_graph_edges_dst ON graph_edges(dst_id);
    CREATE INDEX idx_graph_edges_current ON graph_edges(src_id, dst_id, rel)
        WHERE valid_to IS NULL AND invalidated_at IS NULL;

    CREATE TABLE graph_events (
        event_id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id TEXT NOT NULL,
        recorded_at TEXT NOT NULL,
        kind TEXT NOT NULL,
        delta TEXT NOT NULL DEFAULT '{}'
    ) STRICT;

    CREATE INDEX idx_graph_events_subject ON graph_events(subject_id);
";

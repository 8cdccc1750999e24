//! Core entity/observation/relation tables. The embedding dimension is baked
//! in as a documented comment and enforced by a `CHECK` on byte length;
//! later reopens read the dimension back out via the dimension reconciler
//! rather than from this constant.

pub fn sql(embedding_dims: u32) -> String {
    let embedding_bytes = embedding_dims as i64 * 4;
    format!(
        "
        -- embedding dims: {embedding_dims}
        CREATE TABLE entities (
            name TEXT PRIMARY KEY NOT NULL,
            entity_type TEXT NOT NULL,
            embedding BLOB NOT NULL CHECK (length(embedding) = {embedding_bytes}),
            metadata TEXT NOT NULL DEFAULT '{{}}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        ) STRICT;

        CREATE TABLE observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_name TEXT NOT NULL REFERENCES entities(name) ON DELETE CASCADE,
            content TEXT NOT NULL,
            embedding BLOB,
            created_at TEXT NOT NULL
        ) STRICT;

        CREATE TABLE relations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL REFERENCES entities(name) ON DELETE CASCADE,
            target TEXT NOT NULL REFERENCES entities(name) ON DELETE CASCADE,
            relation_type TEXT NOT NULL,
            created_at TEXT NOT NULL
        ) STRICT;

        CREATE INDEX idx_observations_entity ON observations(entity_name);
        CREATE INDEX idx_relations_source ON relations(source);
        CREATE INDEX idx_relations_target ON relations(target);
        "
    )
}

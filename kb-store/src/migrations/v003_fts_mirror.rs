//! Full-text mirror for `graph_entities`, installed only when `hasFts`
//! probes true. Triggers keep it synchronized on every INSERT/UPDATE/DELETE;
//! `searchEntities` treats it as an opt-in accelerator whose result set must
//! be a superset of the plain `LIKE` scan (see DESIGN.md).

pub const SQL: &str = "
    CREATE VIRTUAL TABLE graph_entities_fts USING fts5(
        id UNINDEXED,
        kind,
        name,
        summary,
        content = 'graph_entities',
        content_rowid = 'rowid'
    );

    CREATE TRIGGER trg_graph_entities_fts_insert AFTER INSERT ON graph_entities BEGIN
        INSERT INTO graph_entities_fts(rowid, id, kind, name, summary)
        VALUES (new.rowid, new.id, new.kind, new.name, new.summary);
    END;

    CREATE TRIGGER trg_graph_entities_fts_update AFTER UPDATE ON graph_entities BEGIN
        INSERT INTO graph_entities_fts(graph_entities_fts, rowid, id, kind, name, summary)
        VALUES ('delete', old.rowid, old.id, old.kind, old.name, old.summary);
        INSERT INTO graph_entities_fts(rowid, id, kind, name, summary)
        VALUES (new.rowid, new.id, new.kind, new.name, new.summary);
    END;

    CREATE TRIGGER trg_graph_entities_fts_delete AFTER DELETE ON graph_entities BEGIN
        INSERT INTO graph_entities_fts(graph_entities_fts, rowid, id, kind, name, summary)
        VALUES ('delete', old.rowid, old.id, old.kind, old.name, old.summary);
    END;
";

use chrono::Utc;
use kb_core::errors::StoreResult;
use kb_core::models::Relation;

use super::Querier;

impl<'c> Querier<'c> {
    pub fn create_relation(&self, source: &str, target: &str, relation_type: &str) -> StoreResult<Relation> {
        let now = Utc::now();
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO relations (source, target, relation_type, created_at) VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(rusqlite::params![source, target, relation_type, now.to_rfc3339()])?;
        let id = self.conn.last_insert_rowid();
        Ok(Relation {
            id,
            source: source.to_string(),
            target: target.to_string(),
            relation_type: relation_type.to_string(),
            created_at: now,
        })
    }

    pub fn list_relations_from(&self, source: &str) -> StoreResult<Vec<Relation>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, source, target, relation_type, created_at FROM relations WHERE source = ?1",
        )?;
        let rows = stmt.query_map([source], row_to_relation)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_relations_to(&self, target: &str) -> StoreResult<Vec<Relation>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, source, target, relation_type, created_at FROM relations WHERE target = ?1",
        )?;
        let rows = stmt.query_map([target], row_to_relation)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn row_to_relation(row: &rusqlite::Row) -> rusqlite::Result<Relation> {
    let created_at: String = row.get(4)?;
    Ok(Relation {
        id: row.get(0)?,
        source: row.get(1)?,
        target: row.get(2)?,
        relation_type: row.get(3)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

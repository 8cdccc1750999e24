use chrono::Utc;
use kb_core::errors::StoreResult;
use kb_core::models::Observation;

use super::Querier;

impl<'c> Querier<'c> {
    pub fn create_observation(
        &self,
        entity_name: &str,
        content: &str,
        embedding: Option<&[u8]>,
    ) -> StoreResult<Observation> {
        let now = Utc::now();
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO observations (entity_name, content, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(rusqlite::params![entity_name, content, embedding, now.to_rfc3339()])?;
        let id = self.conn.last_insert_rowid();
        Ok(Observation {
            id,
            entity_name: entity_name.to_string(),
            content: content.to_string(),
            embedding: embedding.map(|b| b.to_vec()),
            created_at: now,
        })
    }

    /// Most recent `limit` observations for `entity_name`, newest first.
    pub fn list_observations(&self, entity_name: &str, limit: u32) -> StoreResult<Vec<Observation>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, entity_name, content, embedding, created_at
             FROM observations WHERE entity_name = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![entity_name, limit], row_to_observation)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_observations(&self, entity_name: &str) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM observations WHERE entity_name = ?1",
            [entity_name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn row_to_observation(row: &rusqlite::Row) -> rusqlite::Result<Observation> {
    let created_at: String = row.get(4)?;
    Ok(Observation {
        id: row.get(0)?,
        entity_name: row.get(1)?,
        content: row.get(2)?,
        embedding: row.get(3)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

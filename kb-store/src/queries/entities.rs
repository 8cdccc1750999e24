use chrono::Utc;
use kb_core::errors::{StoreError, StoreResult};
use kb_core::models::Entity;
use rusqlite::OptionalExtension;

use super::Querier;

impl<'c> Querier<'c> {
    pub fn create_entity(
        &self,
        name: &str,
        entity_type: &str,
        embedding: &[u8],
        metadata: serde_json::Value,
    ) -> StoreResult<Entity> {
        let now = Utc::now();
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO entities (name, entity_type, embedding, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )?;
        stmt.execute(rusqlite::params![
            name,
            entity_type,
            embedding,
            metadata.to_string(),
            now.to_rfc3339(),
        ])?;
        Ok(Entity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            embedding: embedding.to_vec(),
            metadata,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_entity(&self, name: &str) -> StoreResult<Entity> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT name, entity_type, embedding, metadata, created_at, updated_at
             FROM entities WHERE name = ?1",
        )?;
        let entity = stmt
            .query_row([name], row_to_entity)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("entity {name}")))?;
        Ok(entity)
    }

    pub fn update_entity(
        &self,
        name: &str,
        embedding: Option<&[u8]>,
        metadata: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let affected = match (embedding, metadata) {
            (Some(emb), Some(meta)) => {
                let mut stmt = self.conn.prepare_cached(
                    "UPDATE entities SET embedding = ?1, metadata = ?2, updated_at = ?3 WHERE name = ?4",
                )?;
                stmt.execute(rusqlite::params![emb, meta.to_string(), now, name])?
            }
            (Some(emb), None) => {
                let mut stmt = self
                    .conn
                    .prepare_cached("UPDATE entities SET embedding = ?1, updated_at = ?2 WHERE name = ?3")?;
                stmt.execute(rusqlite::params![emb, now, name])?
            }
            (None, Some(meta)) => {
                let mut stmt = self
                    .conn
                    .prepare_cached("UPDATE entities SET metadata = ?1, updated_at = ?2 WHERE name = ?3")?;
                stmt.execute(rusqlite::params![meta.to_string(), now, name])?
            }
            (None, None) => return Ok(()),
        };
        if affected == 0 {
            return Err(StoreError::NotFound(format!("entity {name}")));
        }
        Ok(())
    }

    /// Deletes the entity; `ON DELETE CASCADE` on `observations`/`relations`
    /// removes dependents, provided `foreign_keys` is on for this connection
    /// (the pragma tuner always sets it).
    pub fn delete_entity(&self, name: &str) -> StoreResult<usize> {
        let mut stmt = self.conn.prepare_cached("DELETE FROM entities WHERE name = ?1")?;
        Ok(stmt.execute([name])?)
    }
}

pub(crate) fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<Entity> {
    let metadata_text: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(Entity {
        name: row.get(0)?,
        entity_type: row.get(1)?,
        embedding: row.get(2)?,
        metadata: serde_json::from_str(&metadata_text).unwrap_or(serde_json::Value::Null),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

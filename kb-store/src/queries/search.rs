use kb_core::errors::StoreResult;
use kb_core::models::{Entity, Observation};

use super::entities::row_to_entity;
use super::Querier;

impl<'c> Querier<'c> {
    /// Matches entities against both filters when present; an absent filter
    /// is a wildcard. The flat `entities` table has no full-text mirror (the
    /// FTS mirror in this schema is scoped to the bi-temporal graph's
    /// entities — see `graph::search_entities`), so substring matching is
    /// always a `LIKE` scan here.
    pub fn search_entities(
        &self,
        type_filter: Option<&str>,
        name_substring: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> StoreResult<Vec<Entity>> {
        let type_pattern = type_filter.unwrap_or("%");
        let name_pattern = match name_substring {
            Some(s) => format!("%{s}%"),
            None => "%".to_string(),
        };
        let type_is_wildcard = type_filter.is_none();

        let mut stmt = self.conn.prepare_cached(
            "SELECT name, entity_type, embedding, metadata, created_at, updated_at
             FROM entities
             WHERE (?1 = 1 OR entity_type = ?2)
               AND name LIKE ?3
             ORDER BY name
             LIMIT ?4 OFFSET ?5",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![type_is_wildcard, type_pattern, name_pattern, limit, offset],
            row_to_entity,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The entity plus its most recent `limit` observations and a total
    /// observation count.
    pub fn get_entity_with_observations(
        &self,
        name: &str,
        limit: u32,
    ) -> StoreResult<(Entity, Vec<Observation>, u64)> {
        let entity = self.get_entity(name)?;
        let observations = self.list_observations(name, limit)?;
        let total = self.count_observations(name)?;
        Ok((entity, observations, total))
    }
}

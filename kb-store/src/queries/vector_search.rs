//! Vector search over stored entity embeddings: an always-available
//! in-process cosine fallback, plus a native top-k path gated on the
//! `hasVectorTopK` capability. No vector extension is bundled by default, so
//! the gated path ordinarily fails `CapabilityMissing` and
//! `search_by_embedding` is what callers actually exercise in practice.

use kb_core::errors::{StoreError, StoreResult};
use kb_core::models::{CapabilityVector, Entity};

use super::entities::row_to_entity;
use super::Querier;

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

impl<'c> Querier<'c> {
    /// Cosine-similarity search over every stored entity embedding. Rows
    /// whose embedding byte length doesn't match `query`'s dimension are
    /// skipped; non-positive similarities are filtered; results are ordered
    /// by similarity descending and capped at `limit`.
    pub fn search_by_embedding(&self, query: &[f32], limit: u32) -> StoreResult<Vec<(Entity, f64)>> {
        if query.iter().all(|v| *v == 0.0) {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT name, entity_type, embedding, metadata, created_at, updated_at FROM entities",
        )?;
        let rows = stmt.query_map([], row_to_entity)?;

        let mut scored = Vec::new();
        for row in rows {
            let entity = row?;
            let candidate = Entity::decode_embedding(&entity.embedding);
            if let Some(sim) = cosine_similarity(query, &candidate) {
                if sim > 0.0 {
                    scored.push((entity, sim));
                }
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit as usize);
        Ok(scored)
    }

    /// Top-k query over the entity embedding index using the engine's native
    /// vector distance function, gated on `caps.has_vector_top_k`. Fails
    /// `CapabilityMissing` rather than silently degrading to
    /// [`Querier::search_by_embedding`] — callers that want the transparent
    /// fallback call that directly.
    pub fn vector_top_k(
        &self,
        caps: &CapabilityVector,
        query: &[f32],
        k: u32,
    ) -> StoreResult<Vec<(Entity, f64)>> {
        if !caps.has_vector_top_k {
            return Err(StoreError::CapabilityMissing("hasVectorTopK".into()));
        }

        let query_bytes = Entity::encode_embedding(query);
        let mut stmt = self.conn.prepare_cached(
            "SELECT name, entity_type, embedding, metadata, created_at, updated_at,
                    vec_distance_cosine(embedding, ?1) AS dist
             FROM entities
             ORDER BY dist ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![query_bytes, k], |row| {
            let entity = row_to_entity(row)?;
            let dist: f64 = row.get(6)?;
            Ok((entity, 1.0 - dist))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;
    use rusqlite::Connection;

    fn fresh_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrations::run_core(&mut conn, 3).unwrap();
        conn
    }

    fn put(q: &Querier, name: &str, vec: &[f32]) {
        let emb = Entity::encode_embedding(vec);
        q.create_entity(name, "t", &emb, serde_json::json!({})).unwrap();
    }

    #[test]
    fn exact_match_ranks_first() {
        let conn = fresh_conn();
        let q = Querier::new(&conn);
        put(&q, "a", &[1.0, 0.0, 0.0]);
        put(&q, "b", &[0.9, 0.1, 0.0]);
        put(&q, "c", &[0.0, 0.0, 1.0]);

        let results = q.search_by_embedding(&[1.0, 0.0, 0.0], 10).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0.name, "a");
    }

    #[test]
    fn zero_norm_query_returns_empty() {
        let conn = fresh_conn();
        let q = Querier::new(&conn);
        put(&q, "a", &[1.0, 0.0, 0.0]);
        let results = q.search_by_embedding(&[0.0, 0.0, 0.0], 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_skipped() {
        let conn = fresh_conn();
        let q = Querier::new(&conn);
        put(&q, "three-d", &[1.0, 0.0, 0.0]);
        let results = q.search_by_embedding(&[1.0, 0.0], 10).unwrap();
        assert!(results.is_empty(), "2D query over a 3D-only store finds no matching rows");
    }

    #[test]
    fn negative_similarity_is_filtered() {
        let conn = fresh_conn();
        let q = Querier::new(&conn);
        put(&q, "a", &[-1.0, 0.0, 0.0]);
        let results = q.search_by_embedding(&[1.0, 0.0, 0.0], 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn limit_is_respected() {
        let conn = fresh_conn();
        let q = Querier::new(&conn);
        for i in 0..10 {
            put(&q, &format!("e{i}"), &[1.0, 0.1 * i as f32, 0.0]);
        }
        let results = q.search_by_embedding(&[1.0, 0.0, 0.0], 4).unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn native_top_k_fails_capability_missing_without_the_flag() {
        let conn = fresh_conn();
        let q = Querier::new(&conn);
        put(&q, "a", &[1.0, 0.0, 0.0]);
        let caps = CapabilityVector {
            has_vector_top_k: false,
            ..CapabilityVector::unchecked()
        };
        let result = q.vector_top_k(&caps, &[1.0, 0.0, 0.0], 5);
        assert!(matches!(result, Err(StoreError::CapabilityMissing(_))));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bi-temporal edge between two [`GraphEntity`](super::GraphEntity) nodes.
///
/// `valid_from`/`valid_to` are event time — when the fact holds in the world.
/// `ingested_at`/`invalidated_at` are knowledge time — when the store believed
/// it. History is never rewritten: corrections happen by inserting a new edge
/// and invalidating the old one, never by editing `valid_from`/`ingested_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: Uuid,
    pub src_id: Uuid,
    pub dst_id: Uuid,
    pub rel: String,
    pub attrs: serde_json::Value,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    pub invalidated_at: Option<DateTime<Utc>>,
    pub provenance: serde_json::Value,
}

impl GraphEdge {
    /// `Current` projection: open-ended and never invalidated.
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none() && self.invalidated_at.is_none()
    }

    /// `As-of(T)` projection: simultaneously world-valid and believed-valid at `t`.
    pub fn is_valid_as_of(&self, t: DateTime<Utc>) -> bool {
        let world_valid = self.valid_from <= t && self.valid_to.map(|vt| vt > t).unwrap_or(true);
        let knowledge_valid = self.invalidated_at.map(|ia| ia > t).unwrap_or(true);
        world_valid && knowledge_valid
    }
}

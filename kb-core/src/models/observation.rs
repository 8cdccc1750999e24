use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamped observation attached to an [`Entity`](super::Entity).
/// Cascades on entity delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub entity_name: String,
    pub content: String,
    pub embedding: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

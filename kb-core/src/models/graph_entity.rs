use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A node in the bi-temporal knowledge graph, kept synchronized with a
/// full-text mirror keyed by `(kind, name, summary)` when `hasFts` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub summary: String,
    pub attrs: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

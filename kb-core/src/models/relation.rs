use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed edge between two entities. Cascades on either endpoint's delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub created_at: DateTime<Utc>,
}

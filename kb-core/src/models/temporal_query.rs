use chrono::{DateTime, Utc};

/// Projects the graph as it was simultaneously world-valid and believed-valid
/// at `at`. See [`GraphEdge::is_valid_as_of`](super::GraphEdge::is_valid_as_of).
#[derive(Debug, Clone, Copy)]
pub struct AsOfQuery {
    pub at: DateTime<Utc>,
}

impl AsOfQuery {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

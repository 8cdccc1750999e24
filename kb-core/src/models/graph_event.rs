use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The atomic unit of the graph engine's append-only audit log. Every
/// successful graph mutation produces exactly one `GraphEvent` in the same
/// transaction as the mutation it records. Purely observational: the graph
/// engine never reads its own event log back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEvent {
    pub event_id: i64,
    pub subject_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub kind: GraphEventKind,
    pub delta: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphEventKind {
    EntityUpserted,
    EdgeCreated,
    EdgeClosed,
    EdgeInvalidated,
}

impl GraphEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityUpserted => "entity_upserted",
            Self::EdgeCreated => "edge_created",
            Self::EdgeClosed => "edge_closed",
            Self::EdgeInvalidated => "edge_invalidated",
        }
    }
}

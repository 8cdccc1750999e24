mod capability;
mod entity;
mod graph_edge;
mod graph_entity;
mod graph_event;
mod observation;
mod project;
mod relation;
mod temporal_query;

pub use capability::CapabilityVector;
pub use entity::Entity;
pub use graph_edge::GraphEdge;
pub use graph_entity::GraphEntity;
pub use graph_event::{GraphEvent, GraphEventKind};
pub use observation::Observation;
pub use project::Project;
pub use relation::Relation;
pub use temporal_query::AsOfQuery;

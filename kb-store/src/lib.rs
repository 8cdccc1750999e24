//! Pool registry, migrator, capability prober, and bi-temporal graph engine
//! for the multi-project embedded knowledge store, built on `rusqlite`.

pub mod capabilities;
pub mod dimension;
pub mod graph;
pub mod migrations;
pub mod pool;
pub mod pragmas;
pub mod queries;
pub mod registry;
pub mod tx;

pub use registry::Registry;

pub use kb_core::errors::{StoreError, StoreResult};

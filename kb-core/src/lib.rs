pub mod cancel;
pub mod config;
pub mod errors;
pub mod models;

pub use cancel::CancellationToken;
pub use errors::{StoreError, StoreResult};

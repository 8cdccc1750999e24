//! Typed, parameter-bound accessors for entity/observation/relation CRUD and
//! search. Each operation uses `Connection::prepare_cached`, so a statement
//! is compiled once per connection and reused for the connection's lifetime,
//! giving every query a named, pre-compiled statement without hand-rolling a
//! statement cache.
//!
//! [`Querier`] wraps a `&Connection` (or a `&Transaction`, which derefs to
//! one) so rebinding to a transaction is simply constructing a new `Querier`
//! over the transaction handle — the statement cache lives on the underlying
//! `Connection` either way, so prepared statements are shared automatically.

pub mod entities;
pub mod observations;
pub mod relations;
pub mod search;
pub mod vector_search;

use rusqlite::Connection;

/// A thin handle over a connection (or transaction) exposing the prepared
/// CRUD and search operations.
pub struct Querier<'c> {
    pub(crate) conn: &'c Connection,
}

impl<'c> Querier<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

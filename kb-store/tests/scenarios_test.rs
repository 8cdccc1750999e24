//! End-to-end scenarios for the multi-project knowledge store, one per
//! concrete scenario from this codebase's bi-temporal storage spec:
//! multi-project isolation, dimension reconciliation, bi-temporal as-of,
//! invalidation monotonicity, capability absence, and transaction rollback.

use chrono::{TimeZone, Utc};
use kb_core::config::StoreConfig;
use kb_core::errors::StoreError;
use kb_core::models::{CapabilityVector, Entity};
use kb_store::queries::Querier;
use kb_store::registry::Registry;
use kb_store::{graph, migrations};
use rusqlite::Connection;

/// Route `tracing` output through `tracing-subscriber` when these tests run
/// with `--nocapture`, the same entry point this codebase's own binaries use
/// (`tracing_subscriber::fmt::init`), just fallible so parallel test threads
/// don't panic on a second initialization attempt.
fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn registry_in(dir: &std::path::Path, dims: u32) -> Registry {
    init_test_logging();
    let mut cfg = StoreConfig::default();
    cfg.multi_project_mode = true;
    cfg.projects_dir = Some(dir.to_path_buf());
    cfg.embedding_dims = dims;
    Registry::new(cfg).unwrap()
}

#[test]
fn multi_project_isolation() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(dir.path(), 4);

    let pool_a = registry.get_pool("a").unwrap();
    let emb = Entity::encode_embedding(&[1.0, 2.0, 3.0, 4.0]);
    pool_a
        .with_writer(|conn| {
            let q = Querier::new(conn);
            q.create_entity("x", "concept", &emb, serde_json::json!({}))?;
            Ok(())
        })
        .unwrap();

    let pool_b = registry.get_pool("b").unwrap();
    let result = pool_b.with_writer(|conn| {
        let q = Querier::new(conn);
        q.get_entity("x")
    });
    assert!(
        matches!(result, Err(StoreError::NotFound(_))),
        "entity created in project 'a' must not be visible from project 'b'"
    );
}

#[test]
fn dimension_reconciliation_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let registry = registry_in(dir.path(), 4);
        let pool = registry.get_pool("acme").unwrap();
        assert_eq!(pool.embedding_dims(), 4);
        let emb = Entity::encode_embedding(&[1.0, 2.0, 3.0, 4.0]);
        pool.with_writer(|conn| {
            Querier::new(conn).create_entity("seed", "t", &emb, serde_json::json!({}))?;
            Ok(())
        })
        .unwrap();
    }

    // Reopen the same on-disk project under a config asking for dims=8; the
    // persisted width (4) must win.
    let registry = registry_in(dir.path(), 8);
    let pool = registry.get_pool("acme").unwrap();
    assert_eq!(pool.embedding_dims(), 4, "persisted dimension must survive reopen under a different config");

    let sixteen_bytes = vec![0u8; 16];
    let result = pool.with_writer(|conn| {
        Querier::new(conn).create_entity("bad", "t", &sixteen_bytes, serde_json::json!({}))
    });
    assert!(result.is_err(), "a 16-byte (8-dim) embedding must be rejected by the 4-dim CHECK constraint");

    let four_bytes_times_four = Entity::encode_embedding(&[9.0, 9.0, 9.0, 9.0]);
    pool.with_writer(|conn| {
        Querier::new(conn).create_entity("good", "t", &four_bytes_times_four, serde_json::json!({}))
    })
    .unwrap();
}

#[test]
fn bitemporal_as_of_projection() {
    let mut conn = Connection::open_in_memory().unwrap();
    migrations::run_core(&mut conn, 4).unwrap();

    let t = |secs: i64| Utc.timestamp_opt(secs, 0).unwrap();
    let a = graph::upsert_entity(&conn, None, "file", "a.rs", "", serde_json::json!({})).unwrap();
    let b = graph::upsert_entity(&conn, None, "file", "b.rs", "", serde_json::json!({})).unwrap();
    let edge = graph::create_edge(&conn, a.id, b.id, "imports", serde_json::json!({}), t(1), serde_json::json!({})).unwrap();
    graph::close_edge(&conn, edge.id, t(3)).unwrap();

    let as_of_2 = graph::edges_as_of(&conn, t(2)).unwrap();
    assert_eq!(as_of_2.len(), 1, "edge should still be world-valid and believed-valid at t=2");

    let as_of_4 = graph::edges_as_of(&conn, t(4)).unwrap();
    assert!(as_of_4.is_empty(), "edge closed at t=3 must not appear in an as-of(4) projection");
}

#[test]
fn invalidation_is_monotone() {
    let mut conn = Connection::open_in_memory().unwrap();
    migrations::run_core(&mut conn, 4).unwrap();

    let t = |secs: i64| Utc.timestamp_opt(secs, 0).unwrap();
    let a = graph::upsert_entity(&conn, None, "file", "a.rs", "", serde_json::json!({})).unwrap();
    let b = graph::upsert_entity(&conn, None, "file", "b.rs", "", serde_json::json!({})).unwrap();
    let edge = graph::create_edge(&conn, a.id, b.id, "imports", serde_json::json!({}), t(1), serde_json::json!({})).unwrap();

    graph::invalidate_edge(&conn, edge.id, t(5)).unwrap();
    let second = graph::invalidate_edge(&conn, edge.id, t(6));
    assert!(matches!(second, Err(StoreError::ConstraintError(_))), "a second invalidation must be rejected");
}

#[test]
fn capability_absence_fails_vector_top_k_explicitly() {
    let mut conn = Connection::open_in_memory().unwrap();
    migrations::run_core(&mut conn, 4).unwrap();
    let q = Querier::new(&conn);

    let caps = CapabilityVector {
        has_vector_top_k: false,
        ..CapabilityVector::unchecked()
    };
    let result = q.vector_top_k(&caps, &[1.0, 0.0, 0.0, 0.0], 5);
    assert!(matches!(result, Err(StoreError::CapabilityMissing(_))));
}

#[test]
fn transaction_rollback_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_in(dir.path(), 4);

    let result: Result<(), StoreError> = registry.with_tx("acme", |conn| {
        let q = Querier::new(conn);
        let emb = Entity::encode_embedding(&[1.0, 1.0, 1.0, 1.0]);
        q.create_entity("doomed", "t", &emb, serde_json::json!({}))?;
        Err(StoreError::ConstraintError("deliberate failure".into()))
    });
    assert!(result.is_err());

    let pool = registry.get_pool("acme").unwrap();
    let found = pool.with_writer(|conn| Querier::new(conn).get_entity("doomed"));
    assert!(
        matches!(found, Err(StoreError::NotFound(_))),
        "an entity created inside a rolled-back transaction must not be visible afterward"
    );
}

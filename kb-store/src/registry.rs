//! Per-project connection pool registry. Two independent locks guard two
//! independent pieces of state — the `project -> pool` map and the cached
//! capability vector — and any code path that needs both always acquires the
//! pool map lock first, matching this codebase's established lock-ordering
//! convention for avoiding deadlock between sibling `RwLock`s.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use kb_core::config::StoreConfig;
use kb_core::errors::{StoreError, StoreResult};
use kb_core::models::{CapabilityVector, Project};
use tracing::info;

use crate::pool::ConnectionPool;
use crate::{capabilities, dimension, migrations};

/// Owns every open per-project pool plus the engine's probed capability
/// vector. Cheap to clone behind an `Arc` by callers that need to share it
/// across threads; internally all sharing is via the two `RwLock`s.
pub struct Registry {
    config: StoreConfig,
    pools: RwLock<HashMap<String, Arc<ConnectionPool>>>,
    capabilities: RwLock<Option<CapabilityVector>>,
}

impl Registry {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pools: RwLock::new(HashMap::new()),
            capabilities: RwLock::new(None),
        })
    }

    /// The engine's capability vector, probed once on first use and cached
    /// for the registry's lifetime (a property of the SQLite build, not of
    /// any particular project's database).
    pub fn capabilities(&self) -> CapabilityVector {
        {
            let cached = self.capabilities.read().expect("capability cache lock poisoned");
            if let Some(caps) = *cached {
                return caps;
            }
        }
        let mut cached = self.capabilities.write().expect("capability cache lock poisoned");
        if let Some(caps) = *cached {
            return caps;
        }
        let caps = capabilities::probe();
        info!(?caps, "probed engine capabilities");
        *cached = Some(caps);
        caps
    }

    /// Fetch the pool for `project`, opening and migrating it on first
    /// access. Concurrent first-access callers race to acquire the pool map
    /// write lock; the loser's re-check finds the winner's pool already
    /// inserted and returns that one instead of opening a second connection
    /// set to the same database.
    pub fn get_pool(&self, project: &str) -> StoreResult<Arc<ConnectionPool>> {
        self.get_pool_cancellable(project, &kb_core::CancellationToken::none())
    }

    /// Same as [`Registry::get_pool`], but checks `token` before the fast-path
    /// read and again before paying the cost of first-access creation —
    /// opening, migrating, tuning, and probing a brand-new project pool is the
    /// one case where the write lock is held across several round-trips,
    /// so it is also the case most worth bailing out of early.
    pub fn get_pool_cancellable(
        &self,
        project: &str,
        token: &kb_core::CancellationToken,
    ) -> StoreResult<Arc<ConnectionPool>> {
        token.check()?;
        let project = self.normalize_project_name(project)?;

        {
            let pools = self.pools.read().expect("pool map lock poisoned");
            if let Some(pool) = pools.get(project) {
                return Ok(Arc::clone(pool));
            }
        }

        token.check()?;
        let mut pools = self.pools.write().expect("pool map lock poisoned");
        if let Some(pool) = pools.get(project) {
            return Ok(Arc::clone(pool));
        }

        let pool = Arc::new(self.open_and_migrate(project)?);
        pools.insert(project.to_string(), Arc::clone(&pool));
        Ok(pool)
    }

    /// Open (or reuse) `project`'s pool and run `f` inside a read-write
    /// transaction on its writer connection, composed from
    /// [`Registry::get_pool`] and [`crate::tx::with_tx`].
    pub fn with_tx<T>(&self, project: &str, f: impl FnOnce(&rusqlite::Connection) -> StoreResult<T>) -> StoreResult<T> {
        let pool = self.get_pool(project)?;
        pool.with_writer_mut(|conn| crate::tx::with_tx(conn, f))
    }

    /// Same as [`Registry::with_tx`], but opens a read-only transaction on a
    /// pooled reader connection — the reader is already `PRAGMA query_only`'d,
    /// so a write attempted inside `f` is rejected by the engine rather than
    /// merely by convention.
    pub fn with_tx_read_only<T>(
        &self,
        project: &str,
        f: impl FnOnce(&rusqlite::Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let pool = self.get_pool(project)?;
        pool.with_reader(|conn| crate::tx::with_tx_read_only(conn, f))
    }

    /// Idempotent: closing an already-closed (or never-opened) project is not
    /// an error.
    pub fn close(&self, project: &str) -> StoreResult<()> {
        let project = self.normalize_project_name(project)?;
        let mut pools = self.pools.write().expect("pool map lock poisoned");
        if let Some(pool) = pools.remove(project) {
            pool.checkpoint()?;
        }
        Ok(())
    }

    pub fn close_all(&self) -> StoreResult<()> {
        let mut pools = self.pools.write().expect("pool map lock poisoned");
        for (_, pool) in pools.drain() {
            pool.checkpoint()?;
        }
        Ok(())
    }

    /// Resolves the caller-supplied project name to the key actually used
    /// for the pool map and the on-disk layout. In single-project mode every
    /// input collapses to [`Project::DEFAULT_NAME`] — a project owns exactly
    /// one pool, and that pool's name is `default`. In multi-project mode the
    /// name is passed through unchanged, except that empty is rejected: there
    /// is no implicit project to fall back to once more than one can exist.
    fn normalize_project_name<'a>(&self, project: &'a str) -> StoreResult<&'a str> {
        if self.config.multi_project_mode {
            if project.is_empty() {
                return Err(StoreError::BadConfig(
                    "project name must not be empty in multi-project mode".into(),
                ));
            }
            Ok(project)
        } else {
            Ok(Project::DEFAULT_NAME)
        }
    }

    fn open_and_migrate(&self, project: &str) -> StoreResult<ConnectionPool> {
        let dsn = self.config.resolve_project_dsn(project)?;

        if self.config.multi_project_mode {
            if let Some(dir) = self.config.projects_dir.as_ref().map(|d| d.join(project)) {
                std::fs::create_dir_all(&dir)?;
            }
        }

        let is_in_memory = dsn.contains(":memory:") || dsn.is_empty();
        let pool_cfg = self.config.pool.clone().with_zeros_as_defaults();
        let pool = if is_in_memory {
            ConnectionPool::open_in_memory(&self.config.pragma)?
        } else {
            ConnectionPool::open(&dsn, &self.config.pragma, &pool_cfg)?
        };

        let caps = self.capabilities();
        let resolved_dims = pool.with_writer_mut(|conn| {
            migrations::run_core(conn, self.config.embedding_dims).map_err(|e| {
                StoreError::InitError {
                    project: project.to_string(),
                    reason: e.to_string(),
                }
            })?;
            migrations::run_conditional(conn, &caps).map_err(|e| StoreError::InitError {
                project: project.to_string(),
                reason: e.to_string(),
            })?;
            dimension::reconcile(conn, self.config.embedding_dims).map_err(|e| StoreError::InitError {
                project: project.to_string(),
                reason: e.to_string(),
            })
        })?;
        pool.set_embedding_dims(resolved_dims);

        info!(
            project,
            dsn = %pool.dsn(),
            embedding_dims = resolved_dims,
            "opened and migrated project pool",
        );
        Ok(pool)
    }
}

//! Per-project connection pool: one writer connection guarded by a mutex, and
//! a round-robin set of read-only connections. Grounded on this codebase's
//! existing `ConnectionPool` shape — single writer, `Vec<Mutex<Connection>>`
//! readers, atomic round-robin index — generalized with configurable pool
//! sizing and connection lifetimes.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use kb_core::config::{PoolConfig, PragmaConfig};
use kb_core::errors::{StoreError, StoreResult};
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

struct PooledConnection {
    conn: Connection,
    opened_at: Instant,
}

/// A pool of connections to a single project's database.
pub struct ConnectionPool {
    dsn: String,
    pragma: PragmaConfig,
    writer: Mutex<PooledConnection>,
    readers: Vec<Mutex<PooledConnection>>,
    read_index: AtomicUsize,
    in_memory: bool,
    idle_lifetime: Duration,
    hard_lifetime: Duration,
    /// The reconciled embedding dimension for this project, set once by the
    /// registry right after migration and read thereafter.
    embedding_dims: AtomicU32,
}

impl ConnectionPool {
    /// Open a file-backed pool: one read-write writer, `cfg.max_idle` read-only
    /// readers (clamped to a sane minimum of 1).
    pub fn open(dsn: &str, pragma: &PragmaConfig, cfg: &PoolConfig) -> StoreResult<Self> {
        let in_memory = dsn.contains(":memory:") || dsn.is_empty();
        let writer_conn = Connection::open(dsn).map_err(|source| StoreError::OpenError {
            project: dsn.to_string(),
            source,
        })?;
        super::pragmas::configure_connection(&writer_conn, pragma)?;

        let read_pool_size = if in_memory { 0 } else { cfg.max_idle.max(1) };
        let mut readers = Vec::with_capacity(read_pool_size as usize);
        if !in_memory {
            for _ in 0..read_pool_size {
                let reader = Connection::open_with_flags(
                    dsn,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(|source| StoreError::OpenError {
                    project: dsn.to_string(),
                    source,
                })?;
                super::pragmas::configure_readonly_connection(&reader, pragma)?;
                readers.push(Mutex::new(PooledConnection {
                    conn: reader,
                    opened_at: Instant::now(),
                }));
            }
        }

        Ok(Self {
            dsn: dsn.to_string(),
            pragma: pragma.clone(),
            writer: Mutex::new(PooledConnection {
                conn: writer_conn,
                opened_at: Instant::now(),
            }),
            readers,
            read_index: AtomicUsize::new(0),
            in_memory,
            idle_lifetime: Duration::from_secs(cfg.idle_sec),
            hard_lifetime: Duration::from_secs(cfg.lifetime_sec),
            embedding_dims: AtomicU32::new(0),
        })
    }

    /// Open an in-memory pool. Shared-cache across connections would impose
    /// table-level locking, so in-memory mode routes all reads through the
    /// single writer connection instead of spreading across a reader set.
    pub fn open_in_memory(pragma: &PragmaConfig) -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenError {
            project: ":memory:".to_string(),
            source,
        })?;
        super::pragmas::configure_connection(&conn, pragma)?;
        Ok(Self {
            dsn: ":memory:".to_string(),
            pragma: pragma.clone(),
            writer: Mutex::new(PooledConnection {
                conn,
                opened_at: Instant::now(),
            }),
            readers: Vec::new(),
            read_index: AtomicUsize::new(0),
            in_memory: true,
            idle_lifetime: Duration::from_secs(PoolConfig::default().idle_sec),
            hard_lifetime: Duration::from_secs(PoolConfig::default().lifetime_sec),
            embedding_dims: AtomicU32::new(0),
        })
    }

    /// The reconciled embedding dimension for this project, set once by the
    /// registry right after migration.
    pub fn embedding_dims(&self) -> u32 {
        self.embedding_dims.load(Ordering::Acquire)
    }

    pub(crate) fn set_embedding_dims(&self, dims: u32) {
        self.embedding_dims.store(dims, Ordering::Release);
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Run `f` with exclusive access to the writer connection.
    pub fn with_writer<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.writer.lock().expect("writer mutex poisoned");
        f(&guard.conn)
    }

    /// Run `f` with a round-robin reader connection, falling back to the
    /// writer when no dedicated readers exist (in-memory mode, or a
    /// zero-sized read pool).
    pub fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        if self.readers.is_empty() {
            return self.with_writer(f);
        }
        let idx = self.read_index.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let guard = self.readers[idx].lock().expect("reader mutex poisoned");
        if guard.opened_at.elapsed() > self.hard_lifetime {
            debug!(dsn = %self.dsn, reader = idx, "reader connection past hard lifetime, using as-is this round");
        }
        f(&guard.conn)
    }

    /// Run `f` with exclusive, mutable access to the writer connection.
    /// Needed for `Connection::transaction`, which rusqlite requires `&mut
    /// Connection` for; ordinary statement execution should prefer
    /// [`ConnectionPool::with_writer`].
    pub fn with_writer_mut<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.writer.lock().expect("writer mutex poisoned");
        f(&mut guard.conn)
    }

    /// Best-effort WAL checkpoint, issued by callers who need durability
    /// guarantees before closing or reopening a pool.
    pub fn checkpoint(&self) -> StoreResult<()> {
        self.with_writer(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_routes_reads_through_writer() {
        let pool = ConnectionPool::open_in_memory(&PragmaConfig::default()).unwrap();
        pool.with_writer(|conn| {
            conn.execute_batch("CREATE TABLE t (v INTEGER)")?;
            conn.execute("INSERT INTO t VALUES (1)", [])?;
            Ok(())
        })
        .unwrap();
        let v: i64 = pool
            .with_reader(|conn| Ok(conn.query_row("SELECT v FROM t", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(v, 1);
    }

    #[test]
    fn file_backed_pool_readers_see_committed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let dsn = format!("file:{}", path.to_string_lossy());
        let pool = ConnectionPool::open(&dsn, &PragmaConfig::default(), &PoolConfig::default())
            .unwrap();
        pool.with_writer(|conn| {
            conn.execute_batch("CREATE TABLE t (v INTEGER)")?;
            conn.execute("INSERT INTO t VALUES (42)", [])?;
            Ok(())
        })
        .unwrap();
        let v: i64 = pool
            .with_reader(|conn| Ok(conn.query_row("SELECT v FROM t", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn reader_round_robins_across_the_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let dsn = format!("file:{}", path.to_string_lossy());
        let mut cfg = PoolConfig::default();
        cfg.max_idle = 3;
        let pool = ConnectionPool::open(&dsn, &PragmaConfig::default(), &cfg).unwrap();
        assert_eq!(pool.readers.len(), 3);
        for _ in 0..6 {
            pool.with_reader(|conn| Ok(conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?))
                .unwrap();
        }
    }
}

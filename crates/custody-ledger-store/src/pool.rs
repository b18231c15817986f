//! A small pool of SQLite connections.
//!
//! Every call checks out a connection of its own, so reads never queue
//! behind each other or behind appends to other subjects. SQLite's file
//! locking arbitrates writers: appends open `BEGIN IMMEDIATE` transactions
//! and wait out contention through the busy timeout.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::migration;

/// How long a connection waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connections kept open between calls.
pub const MAX_IDLE: usize = 8;

static MEMORY_DATABASES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    /// Shared in-memory database (`memdb` VFS), alive while any connection is.
    Memory(String),
}

pub(crate) struct ConnectionPool {
    target: Target,
    idle: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    /// Pool over a database file, switched to WAL so readers never block
    /// the writer.
    pub(crate) fn file(path: &Path) -> Result<Self> {
        let target = Target::File(path.to_path_buf());
        let conn = connect(&target)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened sqlite store");
        Self::with_first(target, conn)
    }

    /// Pool over a fresh in-memory database private to this pool.
    pub(crate) fn memory() -> Result<Self> {
        let n = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
        let uri = format!("file:/custody-ledger-{}-{n}?vfs=memdb", std::process::id());
        let target = Target::Memory(uri);
        let conn = connect(&target)?;
        Self::with_first(target, conn)
    }

    fn with_first(target: Target, mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        Ok(Self {
            target,
            idle: Mutex::new(vec![conn]),
        })
    }

    /// Run `f` on a checked-out connection, returning it to the pool after.
    pub(crate) fn with<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let idle = self.idle.lock()?.pop();
        let mut conn = match idle {
            Some(conn) => conn,
            None => connect(&self.target)?,
        };

        let result = f(&mut conn);

        let mut idle = self.idle.lock()?;
        if idle.len() < MAX_IDLE {
            idle.push(conn);
        }
        result
    }

    #[cfg(test)]
    fn idle_len(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

fn connect(target: &Target) -> Result<Connection> {
    let conn = match target {
        Target::File(path) => Connection::open(path)?,
        Target::Memory(uri) => Connection::open(uri)?,
    };
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn count(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))?)
    }

    #[test]
    fn test_memory_connections_share_one_database() {
        let pool = ConnectionPool::memory().unwrap();

        // Hold one connection while another writes through a second one.
        pool.with(|outer| {
            pool.with(|inner| {
                inner.execute(
                    "INSERT INTO subjects (subject_id, head_seq, head_hash, archived, created_at, updated_at)
                     VALUES ('PKG-1', 0, x'00', 0, 0, 0)",
                    [],
                )?;
                Ok(())
            })?;
            assert_eq!(count(outer)?, 1);
            Ok(())
        })
        .unwrap();

        assert_eq!(pool.idle_len(), 2);
    }

    #[test]
    fn test_memory_pools_are_isolated() {
        let a = ConnectionPool::memory().unwrap();
        let b = ConnectionPool::memory().unwrap();
        a.with(|conn| {
            conn.execute(
                "INSERT INTO subjects (subject_id, head_seq, head_hash, archived, created_at, updated_at)
                 VALUES ('PKG-1', 0, x'00', 0, 0, 0)",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(b.with(|conn| count(conn)).unwrap(), 0);
    }

    #[test]
    fn test_file_pool_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::file(&dir.path().join("pool.db")).unwrap();
        let mode: String = pool
            .with(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_reads_run_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(ConnectionPool::file(&dir.path().join("pool.db")).unwrap());
        let barrier = Arc::new(Barrier::new(4));

        // Every reader waits for all four to be inside a checkout at once;
        // a pool that serialized callers would deadlock here.
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    pool.with(|conn| {
                        barrier.wait();
                        count(conn)
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 0);
        }
    }

    #[test]
    fn test_idle_connections_are_capped() {
        let pool = ConnectionPool::memory().unwrap();
        fn nest(pool: &ConnectionPool, depth: usize) -> Result<()> {
            if depth == 0 {
                return Ok(());
            }
            pool.with(|_| nest(pool, depth - 1))
        }
        nest(&pool, MAX_IDLE + 4).unwrap();
        assert_eq!(pool.idle_len(), MAX_IDLE);
    }
}

//! Database handle shared by the projection and the cursor store.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{info, instrument};

use graysky_core::Result;
use graysky_core::error::{Error, StorageError};

use crate::schema;

pub(crate) fn map_sqlite(err: rusqlite::Error) -> Error {
    Error::Storage(StorageError::Database {
        message: err.to_string(),
    })
}

pub(crate) fn map_io(err: std::io::Error) -> Error {
    Error::Storage(StorageError::Io {
        message: err.to_string(),
    })
}

/// A SQLite connection plus the single-consumer lock for its file.
///
/// Cloning is cheap; clones share the connection. All queries run on the
/// blocking thread pool.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
    _lock: Option<Arc<File>>,
}

impl Database {
    /// Open or create the database at `path`.
    ///
    /// Takes an exclusive lock on `<path>.lock` for the lifetime of the
    /// handle, so a second ingress process pointed at the same file fails
    /// instead of sharing the cursor.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(map_io)?;
        }

        let lock = acquire_lock(path)?;

        let conn = Connection::open(path).map_err(map_sqlite)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA busy_timeout=5000;",
        )
        .map_err(map_sqlite)?;
        schema::init_schema(&conn).map_err(map_sqlite)?;

        info!(path = %path.display(), "Opened database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
            _lock: Some(Arc::new(lock)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite)?;
        schema::init_schema(&conn).map_err(map_sqlite)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
            _lock: None,
        })
    }

    /// Path of the database file, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            Error::Storage(StorageError::Task {
                message: e.to_string(),
            })
        })?
        .map_err(map_sqlite)
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut lock = path.as_os_str().to_owned();
    lock.push(".lock");
    PathBuf::from(lock)
}

fn acquire_lock(path: &Path) -> Result<File> {
    let lock_path = lock_path(path);
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(map_io)?;

    match lock_file.try_lock_exclusive() {
        Ok(()) => Ok(lock_file),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            Err(Error::Storage(StorageError::Locked {
                path: path.display().to_string(),
            }))
        }
        Err(e) => Err(map_io(e)),
    }
}

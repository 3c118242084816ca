//! Session Registry
//!
//! Tracks which objects have open sessions so that writers stay exclusive
//! and lifecycle operations can refuse busy paths.
//!
//! Lifecycle operations take a [`LifecycleHold`] on the subtrees they
//! mutate. Holds and session leases are checked under the same lock:
//! a hold is refused while a session is open below it, and a session is
//! refused while a hold covers its object.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, TileError};

/// Open sessions of one object
#[derive(Debug, Default, Clone, Copy)]
struct Holders {
    readers: usize,
    writer: bool,
}

#[derive(Debug, Default)]
struct Table {
    sessions: HashMap<PathBuf, Holders>,
    /// Subtrees under mutation by a lifecycle call
    held: Vec<PathBuf>,
}

/// Registry of open sessions keyed by object path
#[derive(Debug, Default)]
pub struct SessionRegistry {
    table: Mutex<Table>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a session on `path`
    ///
    /// At most one writer per path; readers are unlimited. Fails with
    /// `Busy` while a lifecycle call holds `path` or one of its ancestors.
    pub fn acquire(self: &Arc<Self>, path: &Path, write: bool) -> Result<SessionLease> {
        let mut table = self.table.lock();
        if table.held.iter().any(|held| path.starts_with(held)) {
            return Err(TileError::Busy(path.to_path_buf()));
        }

        let holders = table.sessions.entry(path.to_path_buf()).or_default();
        if write {
            if holders.writer {
                return Err(TileError::ConcurrentWrite(path.to_path_buf()));
            }
            holders.writer = true;
        } else {
            holders.readers += 1;
        }

        Ok(SessionLease {
            registry: Arc::clone(self),
            path: path.to_path_buf(),
            write,
            released: false,
        })
    }

    /// Reserve `paths` and their subtrees for a lifecycle call
    ///
    /// Fails with `Busy` if a session is open at or below any of them, or
    /// if another hold overlaps one of them. Either all paths are held or
    /// none is.
    pub fn hold(self: &Arc<Self>, paths: &[&Path]) -> Result<LifecycleHold> {
        let mut table = self.table.lock();
        for &path in paths {
            let in_use = table.sessions.keys().any(|open| open.starts_with(path));
            let overlaps = table
                .held
                .iter()
                .any(|held| held.starts_with(path) || path.starts_with(held));
            if in_use || overlaps {
                return Err(TileError::Busy(path.to_path_buf()));
            }
        }

        let paths: Vec<PathBuf> = paths.iter().map(|p| p.to_path_buf()).collect();
        table.held.extend(paths.iter().cloned());

        Ok(LifecycleHold {
            registry: Arc::clone(self),
            paths,
        })
    }

    /// Number of open sessions on exactly `path`
    pub fn open_sessions(&self, path: &Path) -> usize {
        self.table
            .lock()
            .sessions
            .get(path)
            .map(|h| h.readers + usize::from(h.writer))
            .unwrap_or(0)
    }

    fn release(&self, path: &Path, write: bool) {
        let mut table = self.table.lock();
        if let Some(holders) = table.sessions.get_mut(path) {
            if write {
                holders.writer = false;
            } else {
                holders.readers = holders.readers.saturating_sub(1);
            }
            if holders.readers == 0 && !holders.writer {
                table.sessions.remove(path);
            }
        }
    }

    fn unhold(&self, paths: &[PathBuf]) {
        let mut table = self.table.lock();
        for path in paths {
            if let Some(pos) = table.held.iter().position(|held| held == path) {
                table.held.swap_remove(pos);
            }
        }
    }
}

/// Registration of one session; released explicitly or on drop
#[derive(Debug)]
pub struct SessionLease {
    registry: Arc<SessionRegistry>,
    path: PathBuf,
    write: bool,
    released: bool,
}

impl SessionLease {
    pub fn release(&mut self) {
        if !self.released {
            self.registry.release(&self.path, self.write);
            self.released = true;
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Exclusive reservation of subtrees for the duration of a lifecycle call
#[derive(Debug)]
pub struct LifecycleHold {
    registry: Arc<SessionRegistry>,
    paths: Vec<PathBuf>,
}

impl Drop for LifecycleHold {
    fn drop(&mut self) {
        self.registry.unhold(&self.paths);
    }
}

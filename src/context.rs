//! Status-code facade
//!
//! Wraps a [`StorageManager`] for callers that want a status code for
//! control flow and a separately fetched error object for diagnostics.
//! The last error belongs to the context, not to the process.
//!
//! ```text
//! let status = ctx.clear("");
//! if status == Status::Err {
//!     let err = ctx.error_last().unwrap();
//!     eprintln!("{}", err.message());   // "Error: Invalid directory argument is empty"
//!     err.free();
//! }
//! ```

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{ErrorKind, Result, TileError};
use crate::hierarchy::ObjectKind;
use crate::manager::StorageManager;
use crate::schema::Schema;
use crate::session::{IterStep, Mode, Range, Session};

/// Return code of every context call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    Err = -1,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// A detached error object
///
/// Owned by the caller once fetched; `free` (or dropping it) releases it.
#[derive(Debug)]
pub struct LastError {
    kind: ErrorKind,
    message: String,
}

impl LastError {
    fn from_error(error: &TileError) -> Self {
        Self {
            kind: error.kind(),
            message: format!("Error: {}", error),
        }
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Release the error object
    pub fn free(self) {}
}

/// A manager plus its last-error slot
pub struct Context {
    manager: StorageManager,
    last_error: Mutex<Option<LastError>>,
}

impl Context {
    /// Initialize from an optional config file
    ///
    /// A missing or malformed file falls back to the default config.
    pub fn init(config_file: Option<&Path>) -> Result<Self> {
        Self::with_config(Config::load_or_default(config_file))
    }

    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            manager: StorageManager::init(config)?,
            last_error: Mutex::new(None),
        })
    }

    /// The wrapped manager
    pub fn manager(&self) -> &StorageManager {
        &self.manager
    }

    /// Take the error left by the last failed call
    pub fn error_last(&self) -> Option<LastError> {
        self.last_error.lock().take()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn workspace_create(&self, path: &str) -> Status {
        self.status(self.manager.create_workspace(path))
    }

    pub fn group_create(&self, path: &str) -> Status {
        self.status(self.manager.create_group(path))
    }

    pub fn array_create(&self, path: &str, schema: &Schema) -> Status {
        self.status(self.manager.create_array(path, schema))
    }

    pub fn metadata_create(&self, path: &str, schema: &Schema) -> Status {
        self.status(self.manager.create_metadata(path, schema))
    }

    pub fn clear(&self, path: &str) -> Status {
        self.status(self.manager.clear(path))
    }

    pub fn delete(&self, path: &str) -> Status {
        self.status(self.manager.delete(path))
    }

    pub fn move_path(&self, old_path: &str, new_path: &str, force: bool) -> Status {
        self.status(self.manager.move_object(old_path, new_path, force))
    }

    pub fn ls(&self, parent: &str, out: &mut Vec<(String, ObjectKind)>) -> Status {
        self.fill(self.manager.ls(parent), out)
    }

    pub fn ls_workspaces(&self, out: &mut Vec<PathBuf>) -> Status {
        self.fill(self.manager.ls_workspaces(), out)
    }

    pub fn load_schema(&self, path: &str, out: &mut Option<Schema>) -> Status {
        self.fill(self.manager.load_schema(path).map(Some), out)
    }

    // =========================================================================
    // Access
    // =========================================================================

    pub fn open(
        &self,
        path: &str,
        mode: Mode,
        range: Option<Range>,
        attributes: &[&str],
        out: &mut Option<Session>,
    ) -> Status {
        self.fill(self.manager.open(path, mode, range, attributes).map(Some), out)
    }

    pub fn iterate(
        &self,
        session: &mut Session,
        buffers: &mut [&mut [u8]],
        out: &mut IterStep,
    ) -> Status {
        self.fill(session.iterate(buffers), out)
    }

    pub fn write(&self, session: &mut Session, buffers: &[&[u8]]) -> Status {
        self.status(session.write(buffers))
    }

    pub fn finalize(&self, session: &mut Session) -> Status {
        self.status(session.finalize())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn status<T>(&self, result: Result<T>) -> Status {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => self.fail(e),
        }
    }

    fn fill<T>(&self, result: Result<T>, out: &mut T) -> Status {
        match result {
            Ok(value) => {
                *out = value;
                Status::Ok
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&self, error: TileError) -> Status {
        tracing::debug!("Context call failed: {}", error);
        *self.last_error.lock() = Some(LastError::from_error(&error));
        Status::Err
    }
}

//! Access sessions on arrays and metadata

use crate::error::{Result, TileError};
use crate::hierarchy::{self, Classification, ObjectKind};
use crate::schema;
use crate::session::{self, Mode, Range, Session, SessionParams};
use crate::storage;

use super::StorageManager;

impl StorageManager {
    /// Open an array or metadata object
    ///
    /// `range` constrains arrays only; an empty `attributes` selection means
    /// every field. Read sessions see the cells present at this call.
    pub fn open(
        &self,
        path: &str,
        mode: Mode,
        range: Option<Range>,
        attributes: &[&str],
    ) -> Result<Session> {
        let (dir, kind) = self.existing(path)?;
        if !kind.is_dataset() {
            return Err(TileError::TypeMismatch {
                path: dir,
                expected: "array or metadata".to_string(),
                found: kind,
            });
        }

        let schema = schema::load(&dir).map_err(|e| match e {
            TileError::NotFound(msg) => TileError::Schema(msg),
            other => other,
        })?;

        if let Some(range) = &range {
            range.validate(&schema)?;
        }
        let fields = session::resolve_fields(&schema, mode, attributes)?;

        // Register before reading so a clear can not slip in between.
        let lease = self.sessions.acquire(&dir, mode.is_write())?;
        // A delete or move may have finished between classify and acquire.
        if hierarchy::classify(&dir) != Classification::Object(kind) {
            return Err(super::invalid_path(&dir));
        }

        let params = SessionParams {
            path: dir,
            kind,
            mode,
            schema,
            range,
            fields,
        };

        let session = if mode.is_read() {
            let snapshot = storage::load_snapshot(&params.path, &params.schema)?;
            Session::reader(params, snapshot, lease)
        } else {
            Session::writer(params, lease, self.config.fragment_sync)
        };

        tracing::debug!(?mode, "Opened {} session on {}", kind, session.path().display());
        Ok(session)
    }

    /// Open an array, refusing any other kind
    pub fn open_array(
        &self,
        path: &str,
        mode: Mode,
        range: Option<Range>,
        attributes: &[&str],
    ) -> Result<Session> {
        self.expect_kind(path, ObjectKind::Array)?;
        self.open(path, mode, range, attributes)
    }

    /// Open a metadata object, refusing any other kind
    pub fn open_metadata(&self, path: &str, mode: Mode, attributes: &[&str]) -> Result<Session> {
        self.expect_kind(path, ObjectKind::Metadata)?;
        self.open(path, mode, None, attributes)
    }

    fn expect_kind(&self, path: &str, expected: ObjectKind) -> Result<()> {
        let (dir, found) = self.existing(path)?;
        if found != expected {
            return Err(TileError::TypeMismatch {
                path: dir,
                expected: expected.to_string(),
                found,
            });
        }
        Ok(())
    }
}

//! Session Module
//!
//! An opened array or metadata object. The mode is fixed at open and
//! decides which calls are legal for the lifetime of the session.
//!
//! ## State Machine
//! ```text
//!   open ──► Open ──► Active ──► Finalized
//!              │        ▲  │
//!              │        └──┘  write / iterate
//!              └─────────────► Finalized
//! ```
//! Nothing leaves `Finalized`; a fresh `open` is required.
//!
//! ## Modes
//! - `Write`: cells must arrive in strictly increasing native order
//! - `WriteUnsorted`: any order, sorted on finalize (last write of a key wins)
//! - `Read` / `ReadReverse`: pull projected cells through caller buffers

pub mod cell;
pub mod codec;
mod registry;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, TileError};
use crate::hierarchy::ObjectKind;
use crate::schema::Schema;
use crate::storage;

pub use cell::{Cell, CellKey, Range};
pub use codec::Field;
pub use registry::{LifecycleHold, SessionLease, SessionRegistry};

/// Access mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Write,
    WriteUnsorted,
    Read,
    ReadReverse,
}

impl Mode {
    pub fn is_write(self) -> bool {
        matches!(self, Mode::Write | Mode::WriteUnsorted)
    }

    pub fn is_read(self) -> bool {
        !self.is_write()
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Active,
    Finalized,
}

/// Outcome of one `iterate` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterStep {
    /// Bytes written into each buffer, in field order
    pub filled: Vec<usize>,
    /// No data remains; every `filled` entry is zero
    pub done: bool,
}

/// Everything a session is opened with
pub(crate) struct SessionParams {
    pub path: PathBuf,
    pub kind: ObjectKind,
    pub mode: Mode,
    pub schema: Schema,
    pub range: Option<Range>,
    pub fields: Vec<Field>,
}

/// Mode-specific state
enum Io {
    Read {
        /// Filtered cells in delivery order, captured at open
        cells: Vec<Cell>,
        cursor: usize,
        exhausted: bool,
    },
    Write {
        pending: Vec<Cell>,
    },
}

/// An open, mode-fixed handle on an array or metadata object
pub struct Session {
    path: PathBuf,
    kind: ObjectKind,
    mode: Mode,
    schema: Schema,
    range: Option<Range>,
    fields: Vec<Field>,
    state: SessionState,
    io: Io,
    lease: SessionLease,
    fragment_sync: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a read session over an already loaded snapshot
    pub(crate) fn reader(params: SessionParams, snapshot: Vec<Cell>, lease: SessionLease) -> Self {
        let mut cells: Vec<Cell> = match &params.range {
            Some(range) => snapshot
                .into_iter()
                .filter(|cell| match &cell.key {
                    CellKey::Coords(coords) => range.contains(coords),
                    CellKey::Key(_) => true,
                })
                .collect(),
            None => snapshot,
        };
        if params.mode == Mode::ReadReverse {
            cells.reverse();
        }

        let io = Io::Read {
            cells,
            cursor: 0,
            exhausted: false,
        };
        Self::with_io(params, io, lease, false)
    }

    /// Open a write session
    pub(crate) fn writer(params: SessionParams, lease: SessionLease, fragment_sync: bool) -> Self {
        let io = Io::Write {
            pending: Vec::new(),
        };
        Self::with_io(params, io, lease, fragment_sync)
    }

    fn with_io(params: SessionParams, io: Io, lease: SessionLease, fragment_sync: bool) -> Self {
        let SessionParams {
            path,
            kind,
            mode,
            schema,
            range,
            fields,
        } = params;

        Self {
            path,
            kind,
            mode,
            schema,
            range,
            fields,
            state: SessionState::Open,
            io,
            lease,
            fragment_sync,
        }
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append cells decoded from one buffer per field
    ///
    /// Returns the number of cells accepted. In `Write` mode the first
    /// out-of-order cell stops the call; cells before it stay accepted.
    pub fn write(&mut self, buffers: &[&[u8]]) -> Result<usize> {
        self.ensure_usable()?;
        self.ensure_write()?;

        let cells = codec::decode_cells(&self.schema, &self.fields, buffers)?;
        let count = cells.len();
        for cell in cells {
            self.push_cell(cell)?;
        }
        Ok(count)
    }

    /// Append a single cell
    pub fn write_cell(&mut self, cell: Cell) -> Result<()> {
        self.ensure_usable()?;
        self.ensure_write()?;
        self.push_cell(cell)
    }

    fn push_cell(&mut self, cell: Cell) -> Result<()> {
        cell::check_cell(&self.schema, &cell)?;
        if let (Some(range), CellKey::Coords(coords)) = (&self.range, &cell.key) {
            if !range.contains(coords) {
                return Err(TileError::invalid(format!(
                    "Coordinates {:?} fall outside the session range",
                    coords
                )));
            }
        }

        let Io::Write { pending } = &mut self.io else {
            return Err(TileError::invalid(format!(
                "Cannot write through a {:?} session on {}",
                self.mode,
                self.path.display()
            )));
        };

        if self.mode == Mode::Write {
            if let Some(last) = pending.last() {
                if cell::compare_keys(&self.schema, &last.key, &cell.key).is_ge() {
                    return Err(TileError::OrderingViolation(format!(
                        "{:?} does not follow {:?} in {}",
                        cell.key,
                        last.key,
                        self.path.display()
                    )));
                }
            }
        }

        pending.push(cell);
        self.state = SessionState::Active;
        Ok(())
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Fill `buffers` (one per field) with as many whole cells as fit
    ///
    /// Picks up where the previous call stopped. Once every cell has been
    /// delivered, one more call reports `done` with zero sizes; calling
    /// again after that is an error.
    pub fn iterate(&mut self, buffers: &mut [&mut [u8]]) -> Result<IterStep> {
        self.ensure_usable()?;
        if buffers.len() != self.fields.len() {
            return Err(TileError::invalid(format!(
                "Expected {} buffers, got {}",
                self.fields.len(),
                buffers.len()
            )));
        }

        let field_count = self.fields.len();
        let Io::Read {
            cells,
            cursor,
            exhausted,
        } = &mut self.io
        else {
            return Err(TileError::invalid(format!(
                "Session on {} was opened for writing and cannot iterate",
                self.path.display()
            )));
        };

        if *exhausted {
            return Err(TileError::IteratorExhausted(self.path.clone()));
        }
        self.state = SessionState::Active;

        if *cursor >= cells.len() {
            *exhausted = true;
            return Ok(IterStep {
                filled: vec![0; field_count],
                done: true,
            });
        }

        let mut filled = vec![0usize; field_count];
        let mut delivered = 0;

        while let Some(cell) = cells.get(*cursor) {
            let fits = self.fields.iter().zip(&filled).zip(buffers.iter()).all(
                |((&field, &used), buffer)| {
                    used + codec::encoded_len(&self.schema, field, cell) <= buffer.len()
                },
            );
            if !fits {
                break;
            }

            let slots = self.fields.iter().zip(filled.iter_mut()).zip(buffers.iter_mut());
            for ((&field, used), buffer) in slots {
                let start = *used;
                *used += codec::encode_into(&self.schema, field, cell, &mut buffer[start..]);
            }
            *cursor += 1;
            delivered += 1;
        }

        if delivered == 0 {
            return Err(TileError::invalid(format!(
                "Buffers are too small to hold the next cell of {}",
                self.path.display()
            )));
        }

        Ok(IterStep {
            filled,
            done: false,
        })
    }

    /// Iterate through owned buffers of the given capacities
    pub fn buffered(&mut self, capacities: &[usize]) -> Result<BufferIterator<'_>> {
        self.ensure_usable()?;
        if self.mode.is_write() {
            return Err(self.wrong_mode("iterate"));
        }
        if capacities.len() != self.fields.len() {
            return Err(TileError::invalid(format!(
                "Expected {} buffer capacities, got {}",
                self.fields.len(),
                capacities.len()
            )));
        }

        Ok(BufferIterator {
            buffers: capacities.iter().map(|&cap| vec![0u8; cap]).collect(),
            session: self,
            stopped: false,
        })
    }

    // =========================================================================
    // Finalize
    // =========================================================================

    /// Finish the session
    ///
    /// Write sessions sort (if unsorted) and persist their cells as one
    /// fragment; read sessions just release their snapshot. Calling it again
    /// is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == SessionState::Finalized {
            return Ok(());
        }

        match &mut self.io {
            Io::Write { pending } => {
                if self.mode == Mode::WriteUnsorted {
                    sort_last_write_wins(&self.schema, pending);
                }
                let fragment = storage::write_fragment(&self.path, pending.as_slice(), self.fragment_sync)?;
                tracing::debug!(
                    mode = ?self.mode,
                    cells = pending.len(),
                    fragment = fragment.as_ref().map(|f| f.id),
                    "Finalized write session on {}",
                    self.path.display()
                );
                pending.clear();
            }
            Io::Read { cells, .. } => {
                cells.clear();
                cells.shrink_to_fit();
            }
        }

        self.lease.release();
        self.state = SessionState::Finalized;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn range(&self) -> Option<&Range> {
        self.range.as_ref()
    }

    /// Fields in buffer order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field names in buffer order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name(&self.schema)).collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_usable(&self) -> Result<()> {
        if self.state == SessionState::Finalized {
            return Err(TileError::SessionFinalized(self.path.clone()));
        }
        Ok(())
    }

    fn ensure_write(&self) -> Result<()> {
        if self.mode.is_read() {
            return Err(self.wrong_mode("write"));
        }
        Ok(())
    }

    fn wrong_mode(&self, op: &str) -> TileError {
        TileError::invalid(format!(
            "Cannot {} through a {:?} session on {}",
            op,
            self.mode,
            self.path.display()
        ))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Finalized {
            return;
        }
        if let Io::Write { pending } = &self.io {
            if !pending.is_empty() {
                tracing::warn!(
                    cells = pending.len(),
                    "Discarding un-finalized writes to {}",
                    self.path.display()
                );
            }
        }
    }
}

/// Sort by native order; among equal keys keep the latest write
fn sort_last_write_wins(schema: &Schema, cells: &mut Vec<Cell>) {
    // Stable sort keeps arrival order inside runs of equal keys.
    cells.sort_by(|a, b| cell::compare_keys(schema, &a.key, &b.key));

    let mut deduped: Vec<Cell> = Vec::with_capacity(cells.len());
    for cell in cells.drain(..) {
        match deduped.last_mut() {
            Some(last) if last.key == cell.key => *last = cell,
            _ => deduped.push(cell),
        }
    }
    *cells = deduped;
}

/// Resolve a caller's attribute selection into buffer fields
///
/// An empty selection means every field: the key field first, then the
/// attributes in schema order. Write sessions must cover every field.
pub(crate) fn resolve_fields(
    schema: &Schema,
    mode: Mode,
    attributes: &[&str],
) -> Result<Vec<Field>> {
    if attributes.is_empty() {
        let mut fields = vec![Field::Key];
        fields.extend((0..schema.attributes.len()).map(Field::Attribute));
        return Ok(fields);
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(attributes.len());
    for &name in attributes {
        let field = if name == schema.key_field() {
            Field::Key
        } else {
            schema
                .attribute_index(name)
                .map(Field::Attribute)
                .ok_or_else(|| {
                    TileError::invalid(format!(
                        "'{}' is not an attribute of '{}'",
                        name, schema.name
                    ))
                })?
        };
        if !seen.insert(field) {
            return Err(TileError::invalid(format!(
                "Attribute '{}' is selected twice",
                name
            )));
        }
        fields.push(field);
    }

    if mode.is_write() && fields.len() != schema.attributes.len() + 1 {
        return Err(TileError::invalid(format!(
            "Write sessions must supply '{}' and every attribute of '{}'",
            schema.key_field(),
            schema.name
        )));
    }

    Ok(fields)
}

/// Pull iterator over a read session with buffers it owns
///
/// Borrows the session, so it cannot outlive it. Each item holds the
/// filled part of every buffer for one `iterate` call.
pub struct BufferIterator<'s> {
    session: &'s mut Session,
    buffers: Vec<Vec<u8>>,
    stopped: bool,
}

impl Iterator for BufferIterator<'_> {
    type Item = Result<Vec<Vec<u8>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped {
            return None;
        }

        let mut slices: Vec<&mut [u8]> =
            self.buffers.iter_mut().map(|b| b.as_mut_slice()).collect();
        match self.session.iterate(&mut slices) {
            Ok(step) if step.done => {
                self.stopped = true;
                None
            }
            Ok(step) => Some(Ok(self
                .buffers
                .iter()
                .zip(&step.filled)
                .map(|(buffer, &len)| buffer[..len].to_vec())
                .collect())),
            Err(e) => {
                self.stopped = true;
                Some(Err(e))
            }
        }
    }
}

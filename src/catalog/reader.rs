//! Catalog Reader
//!
//! Handles reading frames from the master catalog file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;

use super::entry::{FrameHeader, HEADER_SIZE, MAX_ENTRY_SIZE};
use super::CatalogEntry;

/// What was found at one frame position
#[derive(Debug)]
pub enum Frame {
    /// A well-formed entry
    Valid(CatalogEntry),

    /// A complete frame whose CRC or payload does not check out
    Corrupted { offset: u64, sequence: u64 },

    /// An incomplete frame at the end of the file (interrupted append)
    Torn { offset: u64 },
}

/// Reads frames from the catalog file in append order
pub struct CatalogReader {
    reader: BufReader<File>,
    /// Byte offset of the next frame
    position: u64,
    /// Set once a torn frame has been returned
    finished: bool,
}

impl CatalogReader {
    /// Open a catalog file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            finished: false,
        })
    }

    /// Offset just past the last complete frame read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` at a clean end of file.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        let offset = self.position;

        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut self.reader, &mut header)? {
            0 => return Ok(None),
            n if n < HEADER_SIZE => return Ok(Some(self.torn(offset))),
            _ => {}
        }
        let header = FrameHeader::parse(&header);

        if header.len > MAX_ENTRY_SIZE {
            // A length this large cannot have been written by us; nothing
            // after it can be framed reliably.
            return Ok(Some(self.torn(offset)));
        }

        let mut payload = vec![0u8; header.len as usize];
        if read_full(&mut self.reader, &mut payload)? < payload.len() {
            return Ok(Some(self.torn(offset)));
        }
        self.position += (HEADER_SIZE + payload.len()) as u64;

        if crc32fast::hash(&payload) != header.crc {
            return Ok(Some(Frame::Corrupted {
                offset,
                sequence: header.sequence,
            }));
        }

        match CatalogEntry::deserialize(&payload) {
            Ok(entry) if entry.sequence == header.sequence => Ok(Some(Frame::Valid(entry))),
            _ => Ok(Some(Frame::Corrupted {
                offset,
                sequence: header.sequence,
            })),
        }
    }

    /// Collect every valid entry, ignoring damaged frames
    pub fn entries(mut self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        while let Some(frame) = self.next_frame()? {
            if let Frame::Valid(entry) = frame {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn torn(&mut self, offset: u64) -> Frame {
        self.finished = true;
        Frame::Torn { offset }
    }
}

/// Read until `buf` is full or EOF; returns bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

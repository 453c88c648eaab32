//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{ChargeError, Result};

use super::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset of the next entry
    position: u64,
}

/// Outcome of reading one frame
pub(crate) enum Frame {
    Entry(WalEntry, u64),
    /// Clean end of file at a frame boundary
    End,
    /// Header or data cut short
    Partial,
    /// Frame complete but CRC or body invalid
    Corrupt(ChargeError),
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// `Ok(None)` at end of file, including a torn final entry; an error
    /// for a corrupt entry.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry, _) => Ok(Some(entry)),
            Frame::End | Frame::Partial => Ok(None),
            Frame::Corrupt(err) => Err(err),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Byte offset just past the last entry returned
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        let got = read_full(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(Frame::End);
        }
        if got < HEADER_SIZE {
            return Ok(Frame::Partial);
        }

        let (lsn, _, len) = WalEntry::parse_header(&header);
        if len > MAX_ENTRY_SIZE {
            return Ok(Frame::Corrupt(ChargeError::WalCorruption(format!(
                "entry {} claims {} bytes",
                lsn, len
            ))));
        }
        let mut frame = vec![0u8; HEADER_SIZE + len];
        frame[..HEADER_SIZE].copy_from_slice(&header);
        if read_full(&mut self.reader, &mut frame[HEADER_SIZE..])? < len {
            return Ok(Frame::Partial);
        }

        match WalEntry::deserialize(&frame) {
            Ok(entry) => {
                self.position += frame.len() as u64;
                Ok(Frame::Entry(entry, self.position))
            }
            Err(err) => Ok(Frame::Corrupt(err)),
        }
    }
}

/// Larger length fields can only come from a damaged header
const MAX_ENTRY_SIZE: usize = 64 * 1024 * 1024;

/// Fill `buf` as far as the file allows, returning the bytes read
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

/// Iterator over WAL entries
///
/// Stops after the first error.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

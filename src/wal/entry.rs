//! WAL Entry definitions
//!
//! Defines the structure of individual journal entries and their on-disk
//! framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::entities::ItemType;
use crate::error::{ChargeError, Result};

/// Size of the fixed entry header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The backend mutation to replay
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Backend mutations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Replace a marshaled record
    SetItem {
        item: ItemType,
        key: String,
        value: Vec<u8>,
    },

    /// Delete a record
    RemoveItem { item: ItemType, key: String },

    /// Add a destination id to several prefix entries
    AddReverse {
        destination_id: String,
        prefixes: Vec<String>,
    },

    /// Drop a destination id from one prefix entry
    RemoveReverse {
        destination_id: String,
        prefix: String,
    },

    /// Drop every record
    Flush,
}

/// The part of an entry covered by the CRC and the length field
#[derive(Serialize, Deserialize)]
struct EntryBody {
    operation: Operation,
    timestamp: u64,
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Frame the entry as `LSN | CRC | Len | Data`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = self.body_bytes()?;
        let crc = Self::crc_of(self.lsn, &data);

        let mut buf = Vec::with_capacity(HEADER_SIZE + data.len());
        buf.extend_from_slice(&self.lsn.to_le_bytes());
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&data);
        Ok(buf)
    }

    /// Parse one framed entry from the start of `bytes`
    ///
    /// Trailing bytes after the entry are ignored.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ChargeError::WalCorruption(format!(
                "entry header truncated: {} bytes",
                bytes.len()
            )));
        }

        let (lsn, crc, len) = Self::parse_header(&bytes[..HEADER_SIZE]);
        let end = HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(ChargeError::WalCorruption(format!(
                "entry {} data truncated: want {} bytes, have {}",
                lsn,
                len,
                bytes.len() - HEADER_SIZE
            )));
        }

        let data = &bytes[HEADER_SIZE..end];
        let actual = Self::crc_of(lsn, data);
        if actual != crc {
            return Err(ChargeError::WalCorruption(format!(
                "entry {} crc mismatch: stored {:08x}, computed {:08x}",
                lsn, crc, actual
            )));
        }

        let body: EntryBody = bincode::deserialize(data)?;
        Ok(Self {
            lsn,
            operation: body.operation,
            timestamp: body.timestamp,
        })
    }

    /// Total framed size in bytes
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + self.body_bytes()?.len())
    }

    /// CRC32 over the LSN and the data section
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(Self::crc_of(self.lsn, &self.body_bytes()?))
    }

    /// Split a header into (lsn, crc, data length)
    pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, usize) {
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&header[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&header[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&header[12..16]);
        (
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len) as usize,
        )
    }

    fn body_bytes(&self) -> Result<Vec<u8>> {
        let body = EntryBody {
            operation: self.operation.clone(),
            timestamp: self.timestamp,
        };
        Ok(bincode::serialize(&body)?)
    }

    fn crc_of(lsn: u64, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }
}

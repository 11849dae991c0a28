//! # Fixed-Layout Record Codec
//!
//! Converts log records and the ring header to and from their on-medium
//! byte layout. Both are 8 bytes, little-endian, with no padding:
//!
//! ```text
//! entry:    | timestamp u32 | kind u8 | value u8 | extra u16 |
//! metadata: | count u16 | head u16 | last_reset_epoch u32 |
//! ```
//!
//! The codec performs no validation beyond length. Whatever bit pattern is
//! stored decodes to *some* value; deciding whether that value is plausible
//! is the log manager's job.

use crate::log_manager::RingMetadata;
use crate::{EntryKind, LogEntry};

/// Encoded size of one [`LogEntry`].
pub const ENTRY_SIZE: usize = 8;

/// Encoded size of the [`RingMetadata`] header.
pub const METADATA_SIZE: usize = 8;

pub fn encode(entry: &LogEntry) -> [u8; ENTRY_SIZE] {
    let mut buf = [0u8; ENTRY_SIZE];
    buf[0..4].copy_from_slice(&entry.timestamp.to_le_bytes());
    buf[4] = entry.kind.to_byte();
    buf[5] = entry.value;
    buf[6..8].copy_from_slice(&entry.extra.to_le_bytes());
    buf
}

pub fn decode(bytes: &[u8; ENTRY_SIZE]) -> LogEntry {
    LogEntry {
        timestamp: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        kind: EntryKind::from_byte(bytes[4]),
        value: bytes[5],
        extra: u16::from_le_bytes([bytes[6], bytes[7]]),
    }
}

pub fn encode_metadata(meta: &RingMetadata) -> [u8; METADATA_SIZE] {
    let mut buf = [0u8; METADATA_SIZE];
    buf[0..2].copy_from_slice(&meta.count.to_le_bytes());
    buf[2..4].copy_from_slice(&meta.head.to_le_bytes());
    buf[4..8].copy_from_slice(&meta.last_reset_epoch.to_le_bytes());
    buf
}

pub fn decode_metadata(bytes: &[u8; METADATA_SIZE]) -> RingMetadata {
    RingMetadata {
        count: u16::from_le_bytes([bytes[0], bytes[1]]),
        head: u16::from_le_bytes([bytes[2], bytes[3]]),
        last_reset_epoch: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
    }
}

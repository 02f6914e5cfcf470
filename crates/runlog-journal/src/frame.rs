//! On-disk layout of a run log.
//!
//! ```text
//! file   := header frame*
//! header := "RLG1" version:u16le flags:u16le zero:[u8; 8]
//! frame  := kind:u8 zero:[u8; 3] len:u32le payload:[u8; len]
//! ```
//!
//! Every frame carries its own length, so a log can be walked frame by frame
//! and the byte offset of any frame boundary is a valid place to resume.

use crate::errors::JournalError;

/// Magic bytes opening every run log.
pub const MAGIC: &[u8; 4] = b"RLG1";

/// Format version written by this crate.
pub const VERSION: u16 = 0x0001;

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Size of a frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload a single frame may carry (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Kind byte of a JSON-encoded record frame.
pub const FRAME_KIND_RECORD: u8 = 0x01;

/// The file header.
///
/// Only the version varies; magic, flags and the reserved tail are fixed,
/// and any other value makes the file unreadable rather than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    /// Format version.
    pub version: u16,
}

impl JournalHeader {
    /// Header for the format this crate writes.
    pub const CURRENT: JournalHeader = JournalHeader { version: VERSION };

    /// Encodes the header.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes
    }

    /// Decodes and validates a header.
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self, JournalError> {
        let invalid = |reason: String| Err(JournalError::InvalidHeader(reason));

        if &bytes[..4] != MAGIC {
            return invalid(format!("invalid magic: {:?}", &bytes[..4]));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return invalid(format!(
                "unsupported version: 0x{:04x}, expected 0x{:04x}",
                version, VERSION
            ));
        }
        if bytes[6..].iter().any(|&b| b != 0) {
            return invalid("non-zero flags or reserved bytes".to_string());
        }
        Ok(Self { version })
    }

    /// Whether `bytes` is the start of a header that was cut short, as left
    /// behind by a crash while the file was being created.
    pub fn is_torn_prefix(bytes: &[u8]) -> bool {
        bytes.len() < HEADER_SIZE && Self::CURRENT.encode().starts_with(bytes)
    }
}

/// Kind of a frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A JSON-encoded run record.
    Record,
    /// A kind this version does not know; readers step over it.
    Unknown(u8),
}

impl From<u8> for FrameKind {
    fn from(byte: u8) -> Self {
        match byte {
            FRAME_KIND_RECORD => FrameKind::Record,
            other => FrameKind::Unknown(other),
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Record => FRAME_KIND_RECORD,
            FrameKind::Unknown(byte) => byte,
        }
    }
}

/// Header preceding each payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload kind.
    pub kind: FrameKind,
    /// Payload length in bytes.
    pub len: u32,
}

impl FrameHeader {
    /// Header for a payload of `len` bytes, rejecting oversized payloads.
    pub fn for_payload(kind: FrameKind, len: usize) -> Result<Self, JournalError> {
        match u32::try_from(len) {
            Ok(len) if len <= MAX_PAYLOAD_SIZE => Ok(Self { kind, len }),
            _ => Err(JournalError::PayloadTooLarge {
                size: len as u64,
                max: MAX_PAYLOAD_SIZE,
            }),
        }
    }

    /// Bytes the whole frame occupies, header included.
    pub fn encoded_len(&self) -> u64 {
        FRAME_HEADER_SIZE as u64 + u64::from(self.len)
    }

    /// Offset just past this frame when it starts at `start`.
    pub fn end_from(&self, start: u64) -> u64 {
        start + self.encoded_len()
    }

    /// Encodes the header.
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        bytes[0] = self.kind.into();
        bytes[4..].copy_from_slice(&self.len.to_le_bytes());
        bytes
    }

    /// Decodes a frame header found at byte `offset` of the file.
    ///
    /// Errors carry `offset` so a corrupt frame can be located on disk.
    pub fn decode(bytes: &[u8; FRAME_HEADER_SIZE], offset: u64) -> Result<Self, JournalError> {
        if bytes[1..4] != [0, 0, 0] {
            return Err(JournalError::InvalidFrame {
                offset,
                reason: "non-zero reserved bytes".to_string(),
            });
        }
        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if len > MAX_PAYLOAD_SIZE {
            return Err(JournalError::InvalidFrame {
                offset,
                reason: format!("payload size {} exceeds maximum {}", len, MAX_PAYLOAD_SIZE),
            });
        }
        Ok(Self {
            kind: FrameKind::from(bytes[0]),
            len,
        })
    }
}

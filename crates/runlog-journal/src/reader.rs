//! Journal reader implementation.

use crate::errors::JournalError;
use crate::frame::{FrameHeader, FrameKind, JournalHeader, FRAME_HEADER_SIZE, HEADER_SIZE};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;

/// Read mode for handling truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Strict mode: truncated frames are errors.
    Strict,
    /// Permissive mode: truncation is treated as end-of-file.
    Permissive,
}

/// Journal reader for reading records from a journal file.
///
/// The reader works against a snapshot of the file length taken at open time,
/// so bytes appended afterwards are never observed by this reader. A frame
/// that extends past that length is a truncated frame:
/// - [`ReadMode::Strict`] - Truncated frames are errors
/// - [`ReadMode::Permissive`] - Truncation is treated as end-of-file
///
/// # Example
///
/// ```rust
/// use runlog_journal::{JournalReader, JournalWriter, ReadMode, WriteOptions};
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("run.log");
/// JournalWriter::open(&path, WriteOptions::default())?.append_record(&"hello")?;
///
/// let mut reader = JournalReader::open(&path, ReadMode::Strict)?;
/// while let Some(record) = reader.read_record::<String>()? {
///     println!("Record: {}", record);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalReader {
    file: File,
    mode: ReadMode,
    position: u64,
    len: u64,
}

impl JournalReader {
    /// Opens a journal file for reading.
    ///
    /// The file header is validated and the reader is positioned at the first
    /// record frame after the header. In permissive mode a file shorter than
    /// the header (a crash during creation) reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`](crate::JournalError) if:
    /// - File cannot be opened
    /// - File header is invalid
    /// - I/O error occurs
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<Self, JournalError> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();

        if len < HEADER_SIZE as u64 {
            if mode == ReadMode::Strict {
                return Err(JournalError::InvalidHeader(format!(
                    "header too short: {} bytes",
                    len
                )));
            }
        } else {
            Self::read_header(&mut file)?;
        }

        Ok(Self {
            file,
            mode,
            position: HEADER_SIZE as u64,
            len,
        })
    }

    fn read_header(file: &mut File) -> Result<JournalHeader, JournalError> {
        file.seek(io::SeekFrom::Start(0))?;
        let mut header_bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;
        JournalHeader::decode(&header_bytes)
    }

    /// Returns the current read position in the file.
    ///
    /// Always the start of a frame (or end of the readable data), so it can be
    /// handed back to [`seek_to`](Self::seek_to) later.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the file length observed when the reader was opened.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the file held no bytes beyond the header when opened.
    pub fn is_empty(&self) -> bool {
        self.len <= HEADER_SIZE as u64
    }

    /// Moves the reader to a frame boundary previously reported by
    /// [`position`](Self::position).
    pub fn seek_to(&mut self, offset: u64) -> Result<(), JournalError> {
        if offset < HEADER_SIZE as u64 {
            return Err(JournalError::InvalidFrame {
                offset,
                reason: "offset points inside the file header".to_string(),
            });
        }
        self.position = offset;
        Ok(())
    }

    fn truncated(&self) -> Result<Option<FrameHeader>, JournalError> {
        match self.mode {
            ReadMode::Permissive => Ok(None),
            ReadMode::Strict => Err(JournalError::TruncatedFrame {
                offset: self.position,
            }),
        }
    }

    /// Reads the frame header at the current position without consuming it.
    ///
    /// Returns `Ok(None)` at end-of-file, and also when the whole frame does
    /// not fit in the file in permissive mode.
    fn peek_frame(&mut self) -> Result<Option<FrameHeader>, JournalError> {
        if self.position >= self.len {
            return Ok(None);
        }
        if self.position + FRAME_HEADER_SIZE as u64 > self.len {
            return self.truncated();
        }

        self.file.seek(io::SeekFrom::Start(self.position))?;
        let mut frame_header_bytes = [0u8; FRAME_HEADER_SIZE];
        self.file.read_exact(&mut frame_header_bytes)?;
        let frame = FrameHeader::decode(&frame_header_bytes, self.position)?;

        if frame.end_from(self.position) > self.len {
            return self.truncated();
        }
        Ok(Some(frame))
    }

    /// Reads the next frame from the journal.
    ///
    /// Returns `Ok(None)` when end-of-file is reached (or truncation in permissive mode).
    pub fn read_frame(&mut self) -> Result<Option<(FrameKind, Vec<u8>)>, JournalError> {
        let Some(frame) = self.peek_frame()? else {
            return Ok(None);
        };

        // peek_frame left the file cursor at the start of the payload
        let mut payload = vec![0u8; frame.len as usize];
        self.file.read_exact(&mut payload)?;
        self.position += frame.encoded_len();

        Ok(Some((frame.kind, payload)))
    }

    /// Skips the next record without decoding it.
    ///
    /// Unknown frame kinds are stepped over and do not count. Returns `false`
    /// when there was no record left to skip.
    pub fn skip_record(&mut self) -> Result<bool, JournalError> {
        loop {
            match self.peek_frame()? {
                None => return Ok(false),
                Some(frame) => {
                    self.position += frame.encoded_len();
                    if frame.kind == FrameKind::Record {
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// Reads and decodes the next record from the journal.
    ///
    /// Skips unknown frame kinds and returns `Ok(None)` at end-of-file.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`](crate::JournalError) if:
    /// - Frame structure is invalid
    /// - The payload does not decode as `T`
    /// - Truncation detected (in strict mode)
    /// - I/O error occurs
    pub fn read_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, JournalError> {
        loop {
            match self.read_frame()? {
                None => return Ok(None),
                Some((FrameKind::Record, payload)) => {
                    return Ok(Some(serde_json::from_slice(&payload)?));
                }
                Some((FrameKind::Unknown(_), _)) => continue,
            }
        }
    }
}

//! Journal writer implementation.

use crate::errors::JournalError;
use crate::frame::{FrameHeader, FrameKind, JournalHeader, HEADER_SIZE};
use crate::reader::{JournalReader, ReadMode};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

/// Options for journal writing.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Whether to fsync after each append (default: false).
    pub sync: bool,
}

/// Journal writer for append-only record storage.
///
/// The writer appends records to a journal file in a framed, append-only
/// manner. Records are JSON-encoded inside record frames. Opening a missing
/// file creates it and writes the file header.
///
/// # Example
///
/// ```rust
/// use runlog_journal::{JournalWriter, WriteOptions};
/// use serde_json::json;
///
/// let dir = tempfile::tempdir()?;
/// let mut writer = JournalWriter::open(dir.path().join("run.log"), WriteOptions::default())?;
/// writer.append_record(&json!({"event_type": "step_start", "step": "load"}))?;
/// writer.finish()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalWriter {
    file: File,
    sync: bool,
}

impl JournalWriter {
    /// Opens or creates a journal file for appending.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`](crate::JournalError) if:
    /// - File cannot be opened/created
    /// - Existing file is not a valid journal
    /// - File is not empty but too small to hold a header
    pub fn open<P: AsRef<Path>>(path: P, options: WriteOptions) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .open(path)?;

        let mut writer = Self {
            file,
            sync: options.sync,
        };

        let len = writer.file.metadata()?.len();
        if len == 0 {
            writer.write_header()?;
        } else if len < HEADER_SIZE as u64 {
            return Err(JournalError::FileNotEmpty);
        } else {
            let mut header_bytes = [0u8; HEADER_SIZE];
            writer.file.seek(io::SeekFrom::Start(0))?;
            writer.file.read_exact(&mut header_bytes)?;
            JournalHeader::decode(&header_bytes)?;
            writer.file.seek(io::SeekFrom::End(0))?;
        }

        Ok(writer)
    }

    /// Cuts a journal back to its last complete frame.
    ///
    /// A crash in the middle of an append leaves a torn frame at the end of
    /// the file, and a crash during creation leaves a torn header. Appending
    /// after either would glue the new frame onto the torn bytes, so callers
    /// run this once before resuming appends to a file they did not write.
    /// A torn header is cut back to an empty file, which [`open`](Self::open)
    /// then initializes.
    ///
    /// Returns the number of bytes discarded. A missing file is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`](crate::JournalError) if the header is not a
    /// journal header (or a torn prefix of one), if a complete frame is
    /// corrupt, or on I/O failure.
    pub fn repair<P: AsRef<Path>>(path: P) -> Result<u64, JournalError> {
        let path = path.as_ref();
        let len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let keep = if len < HEADER_SIZE as u64 {
            let bytes = fs::read(path)?;
            if !JournalHeader::is_torn_prefix(&bytes) {
                return Err(JournalError::InvalidHeader(format!(
                    "header too short: {} bytes",
                    len
                )));
            }
            0
        } else {
            let mut reader = JournalReader::open(path, ReadMode::Permissive)?;
            while reader.skip_record()? {}
            reader.position()
        };

        if keep < len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(keep)?;
            file.sync_all()?;
        }
        Ok(len - keep)
    }

    fn write_header(&mut self) -> Result<(), JournalError> {
        self.file.write_all(&JournalHeader::CURRENT.encode())?;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), JournalError> {
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Appends one record to the journal as a `Record` frame.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`](crate::JournalError) if:
    /// - The record cannot be JSON-encoded
    /// - The encoded record exceeds the maximum payload size
    /// - I/O error occurs
    pub fn append_record<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<(), JournalError> {
        let payload = serde_json::to_vec(record)?;
        self.append_raw(FrameKind::Record, &payload)
    }

    /// Appends a raw frame with the given kind and payload.
    ///
    /// Header and payload go out in one write so a reader sees either the
    /// whole frame or a truncated tail, never an interleaving.
    pub fn append_raw(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), JournalError> {
        let frame = FrameHeader::for_payload(kind, payload.len())?;

        let mut buf = Vec::with_capacity(frame.encoded_len() as usize);
        buf.extend_from_slice(&frame.encode());
        buf.extend_from_slice(payload);
        self.file.write_all(&buf)?;

        self.flush()
    }

    /// Finishes writing and closes the file.
    pub fn finish(mut self) -> Result<(), JournalError> {
        self.flush()
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        let _ = self.file.flush();
        if self.sync {
            let _ = self.file.sync_all();
        }
    }
}

//! Append-only journal format for run event logs.
//!
//! This crate provides:
//! - Framed, append-only storage for serialized run records
//! - Reader/writer APIs with strict and permissive modes
//! - Byte-offset positioning so callers can resume a scan without re-reading
//!
//! ## Quick Start
//!
//! ```rust
//! use runlog_journal::{JournalReader, JournalWriter, ReadMode, WriteOptions};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("run-1.log");
//!
//! let mut writer = JournalWriter::open(&path, WriteOptions::default())?;
//! writer.append_record(&json!({"event_type": "run_start"}))?;
//! writer.finish()?;
//!
//! let mut reader = JournalReader::open(&path, ReadMode::Permissive)?;
//! while let Some(record) = reader.read_record::<serde_json::Value>()? {
//!     println!("Read record: {}", record["event_type"]);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Key Types
//!
//! - [`JournalWriter`] - Append records to journal files
//! - [`JournalReader`] - Read records from journal files
//! - [`FrameHeader`] - Self-delimiting frame header preceding each payload

#![deny(missing_docs)]

/// Error types for journal operations.
pub mod errors;
/// Frame structure and serialization.
pub mod frame;
/// Journal reader implementation.
pub mod reader;
/// Journal writer implementation.
pub mod writer;

pub use errors::JournalError;
pub use frame::{FrameHeader, FrameKind, JournalHeader};
pub use reader::{JournalReader, ReadMode};
pub use writer::{JournalWriter, WriteOptions};

//! Append-only record log.
//!
//! Version records are write-once and never deleted, so the log *is* the
//! database: every created record is appended as one framed entry, and
//! opening the store replays the log into the in-memory index.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [ENTRY 1: codec-framed LogEntry]
//! [ENTRY 2: codec-framed LogEntry]
//! ...
//! ```
//!
//! Only a torn or checksum-damaged tail is cut off on open. An entry whose
//! checksum holds but which does not decode fails the open instead.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Error as IoError, ErrorKind, Result as IoResult, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::version::SimulationVersion;

use super::codec::{self, FrameError};

/// A single entry in the record log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    /// When this entry was written.
    pub written_at: DateTime<Utc>,
    /// The record that was created.
    pub record: SimulationVersion,
}

/// Outcome of reading a log back from disk.
#[derive(Debug, Default)]
pub struct Replay {
    /// Entries that decoded cleanly, in log order.
    pub entries: Vec<LogEntry>,
    /// Byte offset just past the last good entry.
    pub valid_len: u64,
    /// Bytes after `valid_len` that were torn or corrupt.
    pub discarded_bytes: u64,
}

/// File a record log appends to.
pub trait LogSink: Write {
    /// Flushes written data to durable storage.
    fn sync(&mut self) -> IoResult<()>;

    /// Cuts the sink back to `len` bytes.
    fn truncate(&mut self, len: u64) -> IoResult<()>;
}

impl LogSink for File {
    fn sync(&mut self) -> IoResult<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> IoResult<()> {
        self.set_len(len)
    }
}

/// Append-only log of created records.
///
/// Not internally synchronized; the owning store serializes writers.
/// A failed append is rolled back to the last complete entry; if that
/// rollback fails too, the log refuses further appends until reopened.
#[derive(Debug)]
pub struct RecordLog<F = File> {
    path: PathBuf,
    sink: F,
    sequence: u64,
    valid_len: u64,
    sync_on_write: bool,
    poisoned: bool,
}

impl RecordLog<File> {
    /// Open or create a log, returning it together with its replayed entries.
    ///
    /// A torn or corrupt tail is cut off so new appends stay readable.
    ///
    /// # Errors
    /// `InvalidData` for a foreign file or an intact entry that does not
    /// decode; other I/O errors as reported.
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<(Self, Replay)> {
        let needs_header = !path.exists() || std::fs::metadata(path)?.len() == 0;
        if needs_header {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            codec::write_header(&mut file)?;
            file.sync_all()?;
        }

        let replay = Self::replay(path)?;
        if replay.discarded_bytes > 0 {
            warn!(
                path = %path.display(),
                discarded_bytes = replay.discarded_bytes,
                recovered = replay.entries.len(),
                "record log has a damaged tail; truncating"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        let sequence = replay.entries.last().map_or(0, |e| e.sequence);
        let file = OpenOptions::new().append(true).open(path)?;

        Ok((
            Self {
                path: path.to_path_buf(),
                sink: file,
                sequence,
                valid_len: replay.valid_len,
                sync_on_write,
                poisoned: false,
            },
            replay,
        ))
    }

    /// Read every intact entry of the log at `path`.
    ///
    /// Stops at the first torn or corrupt entry.
    ///
    /// # Errors
    /// `InvalidData` if an entry passes its checksum but does not decode;
    /// cutting it off would drop committed records.
    pub fn replay(path: &Path) -> IoResult<Replay> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        codec::read_header(&mut reader)?;

        let mut replay = Replay {
            entries: Vec::new(),
            valid_len: codec::HEADER_LEN,
            discarded_bytes: 0,
        };

        while replay.valid_len < file_len {
            let after_sequence = replay.entries.last().map_or(0, |last| last.sequence);
            match codec::decode::<LogEntry>(&mut reader) {
                Ok((entry, consumed)) => {
                    replay.valid_len += consumed;
                    replay.entries.push(entry);
                }
                Err(e) if e.is_damage() => {
                    warn!(after_sequence, error = %e, "stopping record log replay at damaged entry");
                    break;
                }
                Err(FrameError::Undecodable(e)) => {
                    return Err(IoError::new(
                        ErrorKind::InvalidData,
                        format!(
                            "record log entry at offset {} (after sequence {after_sequence}) is intact but cannot be decoded: {e}",
                            replay.valid_len
                        ),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        replay.discarded_bytes = file_len - replay.valid_len;
        Ok(replay)
    }
}

impl<F: LogSink> RecordLog<F> {
    /// Append a created record; returns the entry's sequence number.
    ///
    /// # Errors
    /// The write error, after the partial entry is rolled back; or
    /// `Other` once the log is poisoned.
    pub fn append(&mut self, record: &SimulationVersion) -> IoResult<u64> {
        if self.poisoned {
            return Err(IoError::new(
                ErrorKind::Other,
                "record log refused append after an unrecoverable write failure; reopen the store",
            ));
        }

        let candidate = self.sequence + 1;
        let entry = LogEntry {
            sequence: candidate,
            written_at: Utc::now(),
            record: record.clone(),
        };
        let encoded = codec::encode(&entry)?;

        if let Err(e) = self.write_frame(&encoded) {
            self.roll_back(&e);
            return Err(e);
        }

        self.valid_len += encoded.len() as u64;
        self.sequence = candidate;
        Ok(candidate)
    }

    fn write_frame(&mut self, frame: &[u8]) -> IoResult<()> {
        self.sink.write_all(frame)?;
        self.sink.flush()?;
        if self.sync_on_write {
            self.sink.sync()?;
        }
        Ok(())
    }

    fn roll_back(&mut self, cause: &IoError) {
        match self.sink.truncate(self.valid_len) {
            Ok(()) => warn!(
                path = %self.path.display(),
                valid_len = self.valid_len,
                error = %cause,
                "append failed; record log rolled back to last complete entry"
            ),
            Err(e) => {
                self.poisoned = true;
                error!(
                    path = %self.path.display(),
                    error = %cause,
                    rollback_error = %e,
                    "append failed and could not be rolled back; record log poisoned"
                );
            }
        }
    }

    /// Sequence number of the last appended entry.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Byte length of the complete entries, header included.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// Returns true if a failed rollback stopped further appends.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

//! Framing for log entries.
//!
//! Each entry is JSON wrapped in a length prefix and a CRC32 trailer:
//!
//! ```text
//! [version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
//! ```
//!
//! Files start with `[MAGIC: 4 bytes][version: 1 byte]`.

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Current frame version.
pub const CODEC_VERSION: u8 = 1;

/// Magic bytes identifying a simlineage log.
pub const MAGIC: [u8; 4] = *b"SIML";

/// Header length in bytes.
pub const HEADER_LEN: u64 = 5;

/// Largest accepted entry body (16 MiB); simulation payloads are documents, not blobs.
const MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024;

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Frames a value.
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let data = serde_json::to_vec(value)
        .map_err(|e| IoError::new(ErrorKind::InvalidData, format!("serialization failed: {e}")))?;

    if data.len() > MAX_ENTRY_SIZE {
        return Err(IoError::new(
            ErrorKind::InvalidInput,
            format!("entry size {} exceeds maximum {MAX_ENTRY_SIZE}", data.len()),
        ));
    }
    #[allow(clippy::cast_possible_truncation)]
    let len = data.len() as u32;

    let mut out = Vec::with_capacity(1 + 4 + data.len() + 4);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&checksum(&data).to_le_bytes());
    Ok(out)
}

/// Why a frame could not be read.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame ends early: a write that never completed.
    #[error("frame is cut short: {0}")]
    Torn(#[source] IoError),

    /// Version, length or checksum do not add up.
    #[error("frame is corrupt: {0}")]
    Corrupt(String),

    /// The checksum holds but the body is not a valid entry.
    #[error("entry passed its checksum but could not be decoded: {0}")]
    Undecodable(#[source] serde_json::Error),

    /// The reader itself failed.
    #[error(transparent)]
    Io(IoError),
}

impl FrameError {
    /// Returns true if the frame is damaged on disk rather than unreadable
    /// by this build.
    #[must_use]
    pub fn is_damage(&self) -> bool {
        matches!(self, Self::Torn(_) | Self::Corrupt(_))
    }
}

impl From<FrameError> for IoError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Torn(e) | FrameError::Io(e) => e,
            other => IoError::new(ErrorKind::InvalidData, other),
        }
    }
}

fn read_part(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), FrameError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            FrameError::Torn(e)
        } else {
            FrameError::Io(e)
        }
    })
}

/// Reads one framed value, verifying its checksum.
///
/// # Errors
/// - `Torn` when the frame is cut short
/// - `Corrupt` on version, size or checksum mismatch
/// - `Undecodable` when an intact body does not deserialize
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> Result<(T, u64), FrameError> {
    let mut version = [0u8; 1];
    read_part(reader, &mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(FrameError::Corrupt(format!(
            "unsupported frame version: {} (expected {CODEC_VERSION})",
            version[0]
        )));
    }

    let mut len_bytes = [0u8; 4];
    read_part(reader, &mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_ENTRY_SIZE {
        return Err(FrameError::Corrupt(format!(
            "entry size {len} exceeds maximum {MAX_ENTRY_SIZE}"
        )));
    }

    let mut data = vec![0u8; len];
    read_part(reader, &mut data)?;

    let mut crc_bytes = [0u8; 4];
    read_part(reader, &mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(&data);
    if stored != computed {
        return Err(FrameError::Corrupt(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x}"
        )));
    }

    let value = serde_json::from_slice(&data).map_err(FrameError::Undecodable)?;
    Ok((value, (1 + 4 + len + 4) as u64))
}

/// Writes the file header.
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION])
}

/// Reads and checks the file header, returning its version byte.
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("not a simlineage log: expected magic {MAGIC:?}, got {magic:?}"),
        ));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    Ok(version[0])
}

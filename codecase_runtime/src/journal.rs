//! Append-only playthrough journal — binary protobuf log.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only — no mutation, no reordering
//!   - fsync after every write
//!   - Sequence strictly increasing (validated on append)
//!   - Envelopes with schema_version != 1 are rejected by the engine on replay
//!   - The whole file is removed when its playthrough is discarded

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use tracing::{debug, warn};

use codecase_engine::commands::CommandEnvelope;

use crate::proto_bridge::{command_to_proto, proto_to_command};
use crate::proto_types::ProtoCommandEnvelope;

/// Largest accepted frame.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal i/o: {0}")]
    Io(#[from] io::Error),
    #[error("journal sequence violation: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },
    #[error("corrupt journal at byte {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },
}

/// Append-only command log backed by a binary file.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    last_sequence: u64,
}

impl Journal {
    /// Open or create a journal at the given path.
    /// Reads existing frames to determine the last sequence number.
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let last_sequence = if path.exists() {
            Self::read_all_from_file(path)?
                .last()
                .map(|e| e.sequence)
                .unwrap_or(0)
        } else {
            0
        };

        debug!(path = %path.display(), last_sequence, "journal opened");
        Ok(Self {
            path: path.to_path_buf(),
            last_sequence,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single envelope.
    ///
    /// Validates strict sequence ordering.
    /// Writes a length-prefixed protobuf frame and fsyncs.
    pub fn append(&mut self, envelope: &CommandEnvelope) -> Result<(), JournalError> {
        let expected = self.last_sequence + 1;
        if envelope.sequence != expected {
            return Err(JournalError::SequenceViolation {
                expected,
                got: envelope.sequence,
            });
        }

        let buf = command_to_proto(envelope).encode_to_vec();
        if buf.len() > MAX_FRAME_LEN {
            return Err(JournalError::Corrupt {
                offset: 0,
                reason: format!("frame of {} bytes exceeds {}", buf.len(), MAX_FRAME_LEN),
            });
        }
        let len = buf.len() as u32;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let start = file.metadata()?.len();
        if let Err(err) = write_frame(&mut file, len, &buf) {
            // Drop the torn frame so the file still ends on a boundary.
            if let Err(trunc) = file.set_len(start) {
                warn!(path = %self.path.display(), error = %trunc, "torn frame left in journal");
            }
            return Err(err.into());
        }

        self.last_sequence = envelope.sequence;
        Ok(())
    }

    /// Load every envelope in sequence order.
    pub fn load_all(&self) -> Result<Vec<CommandEnvelope>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Self::read_all_from_file(&self.path)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Delete the journal file. Missing files are not an error.
    pub fn remove(self) -> Result<(), JournalError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read every frame from a file, validating frame integrity and order.
    ///
    /// A zero-length frame is legal: it is an envelope whose fields are all
    /// defaults, which the bridge then rejects as missing a command.
    fn read_all_from_file(path: &Path) -> Result<Vec<CommandEnvelope>, JournalError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut envelopes: Vec<CommandEnvelope> = Vec::new();
        let mut len_buf = [0u8; 4];
        let mut offset: u64 = 0;

        loop {
            match read_prefix(&mut reader, &mut len_buf) {
                Ok(Prefix::Eof) => break,
                Ok(Prefix::Partial) => {
                    return Err(JournalError::Corrupt {
                        offset,
                        reason: "truncated length prefix".to_string(),
                    })
                }
                Ok(Prefix::Full) => {}
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_FRAME_LEN {
                return Err(JournalError::Corrupt {
                    offset,
                    reason: format!("invalid frame length {}", len),
                });
            }

            let mut frame = vec![0u8; len];
            reader.read_exact(&mut frame).map_err(|e| JournalError::Corrupt {
                offset,
                reason: format!("truncated frame: {}", e),
            })?;

            let proto = ProtoCommandEnvelope::decode(frame.as_slice()).map_err(|e| {
                JournalError::Corrupt {
                    offset,
                    reason: format!("protobuf decode error: {}", e),
                }
            })?;
            let envelope = proto_to_command(&proto).map_err(|e| JournalError::Corrupt {
                offset,
                reason: e.to_string(),
            })?;

            let expected = envelopes.last().map(|e| e.sequence).unwrap_or(0) + 1;
            if envelope.sequence != expected {
                return Err(JournalError::SequenceViolation {
                    expected,
                    got: envelope.sequence,
                });
            }

            envelopes.push(envelope);
            offset += 4 + len as u64;
        }

        Ok(envelopes)
    }
}

enum Prefix {
    Full,
    Partial,
    Eof,
}

/// Fill `buf` from `reader`, distinguishing a clean end of file from a
/// prefix cut short.
fn read_prefix(reader: &mut impl Read, buf: &mut [u8; 4]) -> io::Result<Prefix> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(match filled {
        0 => Prefix::Eof,
        4 => Prefix::Full,
        _ => Prefix::Partial,
    })
}

fn write_frame(file: &mut File, len: u32, buf: &[u8]) -> io::Result<()> {
    {
        let mut writer = BufWriter::new(&mut *file);
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(buf)?;
        writer.flush()?;
    }
    file.sync_all()
}

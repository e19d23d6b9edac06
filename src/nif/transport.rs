//! Collaborator interfaces to the engine transport.
//!
//! The codec never owns engine handles. A transport hands out raw buffers
//! through these traits and takes them back once the decoded data has been
//! copied out of them.

use crate::nif::codec::time::NotesTime;
use crate::nif::format::collection::ReadEntriesInfo;
use crate::nif::types::error::{NifError, Result};
use crate::nif::types::models::ReadMask;

/// A buffer returned by the transport with its declared length.
///
/// The allocation may be larger than the declared length; only the declared
/// prefix is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBuffer {
    data: Vec<u8>,
    declared_length: usize,
}

impl RawBuffer {
    /// # Errors
    /// Returns [`NifError::Transport`] if `declared_length` exceeds the data.
    pub fn new(data: Vec<u8>, declared_length: usize) -> Result<Self> {
        if declared_length > data.len() {
            return Err(NifError::Transport(format!(
                "declared length {} exceeds the {}-byte buffer",
                declared_length,
                data.len()
            )));
        }
        Ok(Self {
            data,
            declared_length,
        })
    }

    pub fn declared_length(&self) -> usize {
        self.declared_length
    }

    /// The declared prefix of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.declared_length]
    }

    pub fn is_empty(&self) -> bool {
        self.declared_length == 0
    }
}

impl From<Vec<u8>> for RawBuffer {
    fn from(data: Vec<u8>) -> Self {
        let declared_length = data.len();
        Self {
            data,
            declared_length,
        }
    }
}

/// Parameters of one entry read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    /// Tumbler of the entry to start from, such as `"0"` or `"2.1"`.
    pub position: String,
    /// Entries to move past before the first one returned.
    pub skip: u32,
    pub max_entries: u32,
    pub read_mask: ReadMask,
    /// Only return entries modified since this time.
    pub diff_time: Option<NotesTime>,
}

/// The raw result of an entry read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub buffer: RawBuffer,
    pub info: ReadEntriesInfo,
}

/// Result of a keyed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMatch {
    /// Position of the first matching entry.
    pub position: String,
    pub match_count: u32,
}

/// Reads pages of collection entries.
pub trait EntrySource {
    fn read_entries(&mut self, request: &ReadRequest) -> Result<ReadResponse>;

    /// Gives a buffer back once nothing refers to it any more.
    fn release(&mut self, buffer: RawBuffer);
}

/// Finds entries by an encoded search key buffer.
pub trait KeyLookup {
    fn find_by_key(&mut self, key_buffer: &[u8]) -> Result<Option<KeyMatch>>;
}

/// Stores an encoded view format.
pub trait FormatSink {
    fn save_view_format(&mut self, buffer: &[u8]) -> Result<()>;
}

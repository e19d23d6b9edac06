//! Low-level byte reading and writing utilities.
//!
//! Every structure in the format is a packed little-endian record. Decoders
//! walk a [`ByteCursor`] forward over the caller's buffer; encoders append to
//! a [`BufferBuilder`] and patch length fields once the final size is known.

use byteorder::{ByteOrder, LittleEndian};

use super::types::error::{NifError, Result};

/// Maximum number of bytes rendered into a corruption report.
const DUMP_WINDOW: usize = 64;

/// Renders `bytes[start..start + len]` as offset-prefixed rows of 16 hex bytes.
///
/// The window is clamped to the buffer and to [`DUMP_WINDOW`] bytes.
pub fn hex_dump(bytes: &[u8], start: usize, len: usize) -> String {
    let start = start.min(bytes.len());
    let end = start.saturating_add(len.min(DUMP_WINDOW)).min(bytes.len());
    if start == end {
        return format!("  {:08x}: <end of buffer>", start);
    }

    bytes[start..end]
        .chunks(16)
        .enumerate()
        .map(|(row, chunk)| format!("  {:08x}: {}", start + row * 16, hex::encode(chunk)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Forward-only reader over a borrowed buffer.
///
/// Reads hand out sub-slices that keep the lifetime of the source buffer, so
/// decoded values can refer to the bytes without copying them.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    structure: &'static str,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8], structure: &'static str) -> Self {
        Self {
            buf,
            pos: 0,
            structure,
        }
    }

    /// Changes the structure name reported in corruption errors.
    pub fn set_structure(&mut self, structure: &'static str) {
        self.structure = structure;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The full underlying buffer, independent of the current position.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Builds a corruption error pointing at the current position.
    pub fn corrupt(&self, details: impl Into<String>) -> NifError {
        self.corrupt_at(self.pos, details)
    }

    /// Builds a corruption error pointing at `offset`, with a dump of the bytes from there.
    pub fn corrupt_at(&self, offset: usize, details: impl Into<String>) -> NifError {
        NifError::Corrupt {
            structure: self.structure,
            offset,
            details: details.into(),
            dump: hex_dump(self.buf, offset, DUMP_WINDOW),
        }
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(self.corrupt(format!(
                "need {} bytes, but only {} remain",
                needed,
                self.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Reads a length field whose width depends on the table variant (2 or 4 bytes).
    pub fn read_length(&mut self, width: usize) -> Result<u32> {
        match width {
            2 => Ok(self.read_u16()? as u32),
            4 => self.read_u32(),
            _ => Err(self.corrupt(format!("invalid length width: {}", width))),
        }
    }

    /// Returns the next two bytes as a `u16` without consuming them.
    pub fn peek_u16(&self) -> Option<u16> {
        if self.remaining() < 2 {
            return None;
        }
        Some(LittleEndian::read_u16(&self.buf[self.pos..self.pos + 2]))
    }

    /// Returns the next `len` bytes without consuming them.
    pub fn peek(&self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        Ok(&self.buf[self.pos..self.pos + len])
    }

    /// Consumes and returns the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Consumes `len` bytes and returns a cursor limited to them.
    ///
    /// The returned cursor reports offsets relative to the same origin as
    /// `self`, so errors inside a nested record still point into the
    /// caller's buffer.
    pub fn bounded(&mut self, len: usize) -> Result<ByteCursor<'a>> {
        self.ensure(len)?;
        let start = self.pos;
        self.pos += len;
        Ok(ByteCursor {
            buf: &self.buf[..start + len],
            pos: start,
            structure: self.structure,
        })
    }
}

/// Placeholder for a length field written before its value is known.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    offset: usize,
    width: usize,
}

/// Append-only little-endian writer with back-patchable length fields.
#[derive(Debug, Default)]
pub struct BufferBuilder {
    buf: Vec<u8>,
}

impl BufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Reserves a zeroed length field of `width` bytes to be filled in later.
    pub fn reserve(&mut self, width: usize) -> Slot {
        let slot = Slot {
            offset: self.buf.len(),
            width,
        };
        self.buf.resize(self.buf.len() + width, 0);
        slot
    }

    /// Fills a reserved slot with its final value.
    pub fn patch(&mut self, slot: Slot, field: &'static str, value: usize) -> Result<()> {
        let target = &mut self.buf[slot.offset..slot.offset + slot.width];
        match slot.width {
            2 => LittleEndian::write_u16(target, checked_u16(field, value)?),
            4 => LittleEndian::write_u32(target, checked_u32(field, value)?),
            _ => {
                return Err(NifError::InvalidArgument(format!(
                    "invalid slot width: {}",
                    slot.width
                )));
            }
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub fn checked_u8(field: &'static str, value: usize) -> Result<u8> {
    u8::try_from(value).map_err(|_| NifError::Overflow {
        field,
        value: value as u64,
        max: u8::MAX as u64,
    })
}

pub fn checked_u16(field: &'static str, value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| NifError::Overflow {
        field,
        value: value as u64,
        max: u16::MAX as u64,
    })
}

pub fn checked_u32(field: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| NifError::Overflow {
        field,
        value: value as u64,
        max: u32::MAX as u64,
    })
}

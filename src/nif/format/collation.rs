//! Collation (sort definition) decoding.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ u16 buffer_size, u16 items, u8 flags, u8 0x44 │ header
//! ├──────────────────────────────────────────────┤
//! │ items × (u8 flags, u8 0x66, u8 type,          │ descriptors
//! │          u16 name_offset, u16 name_length)    │
//! ├──────────────────────────────────────────────┤
//! │ column names                                  │ string table
//! └──────────────────────────────────────────────┘
//! ```

use log::{debug, info, trace};

use crate::nif::codec::value::LmbcsText;
use crate::nif::types::error::{NifError, Result};
use crate::nif::types::models::CollateType;
use crate::nif::utils::{ByteCursor, hex_dump};

pub const COLLATION_SIGNATURE: u8 = 0x44;
pub const DESCRIPTOR_SIGNATURE: u8 = 0x66;

const HEADER_SIZE: usize = 6;
const DESCRIPTOR_SIZE: usize = 7;

/// Index-wide collation flags.
pub mod collation_flags {
    pub const UNIQUE: u8 = 0x01;
    pub const FLAT_INDEX: u8 = 0x02;
    pub const EMULATE_V3: u8 = 0x04;
    pub const BUILD_ON_DEMAND: u8 = 0x08;
    pub const RECOMPUTE_NOT_DELETED: u8 = 0x10;
}

/// Per-column descriptor flags.
pub mod descriptor_flags {
    pub const DESCENDING: u8 = 0x01;
    pub const CASE_INSENSITIVE: u8 = 0x02;
    pub const IGNORE_PREFIXES: u8 = 0x04;
    pub const ACCENT_INSENSITIVE: u8 = 0x10;
    pub const PERMUTED: u8 = 0x20;
    pub const PERMUTED_PAIRWISE: u8 = 0x40;
    pub const FLAT_IN_V5: u8 = 0x80;
}

/// Sort definition of one collation column.
#[derive(Debug, Clone, PartialEq)]
pub struct CollateDescriptor<'a> {
    pub flags: u8,
    pub collate_type: CollateType,
    /// Offset of the name inside the string table.
    pub name_offset: u16,
    pub name: LmbcsText<'a>,
}

impl CollateDescriptor<'_> {
    pub fn is_descending(&self) -> bool {
        self.flags & descriptor_flags::DESCENDING != 0
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.flags & descriptor_flags::CASE_INSENSITIVE == 0
    }

    pub fn is_accent_sensitive(&self) -> bool {
        self.flags & descriptor_flags::ACCENT_INSENSITIVE == 0
    }

    pub fn is_permuted(&self) -> bool {
        self.flags & descriptor_flags::PERMUTED != 0
    }
}

/// A decoded collation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollationInfo<'a> {
    pub flags: u8,
    pub buffer_size: u16,
    pub descriptors: Vec<CollateDescriptor<'a>>,
}

impl CollationInfo<'_> {
    pub fn is_unique(&self) -> bool {
        self.flags & collation_flags::UNIQUE != 0
    }

    pub fn is_flat(&self) -> bool {
        self.flags & collation_flags::FLAT_INDEX != 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Decodes a collation buffer.
///
/// Collation is read-only; there is no matching encoder.
///
/// # Errors
/// - A corruption error with a hex dump if a signature, size or name reference is wrong
/// - [`NifError::UnknownCollateType`] naming the column whose collate type is unknown
pub fn decode_collation(buf: &[u8]) -> Result<CollationInfo<'_>> {
    info!("Decoding collation ({} bytes)", buf.len());
    let mut cursor = ByteCursor::new(buf, "collation");

    // Step 1: Header
    let buffer_size = cursor.read_u16()?;
    let items = cursor.read_u16()? as usize;
    let flags = cursor.read_u8()?;
    let signature_offset = cursor.position();
    let signature = cursor.read_u8()?;
    if signature != COLLATION_SIGNATURE {
        return Err(cursor.corrupt_at(
            signature_offset,
            format!(
                "signature {:#04x} does not match {:#04x}",
                signature, COLLATION_SIGNATURE
            ),
        ));
    }
    if buffer_size as usize > buf.len() {
        return Err(cursor.corrupt_at(
            0,
            format!(
                "declared buffer size {} exceeds the {} bytes supplied",
                buffer_size,
                buf.len()
            ),
        ));
    }
    debug!("Collation header: buffer_size={}, items={}, flags={:#04x}", buffer_size, items, flags);

    if items == 0 {
        return Ok(CollationInfo {
            flags,
            buffer_size,
            descriptors: Vec::new(),
        });
    }

    // Step 2: Descriptors
    let mut raw_descriptors = Vec::with_capacity(items);
    for column in 0..items {
        let record_offset = cursor.position();
        let descriptor_flags = cursor.read_u8()?;
        let descriptor_signature = cursor.read_u8()?;
        if descriptor_signature != DESCRIPTOR_SIGNATURE {
            return Err(cursor.corrupt_at(
                record_offset,
                format!(
                    "descriptor #{} signature {:#04x} does not match {:#04x}",
                    column, descriptor_signature, DESCRIPTOR_SIGNATURE
                ),
            ));
        }
        let raw_type = cursor.read_u8()?;
        let collate_type =
            CollateType::try_from(raw_type).map_err(|_| NifError::UnknownCollateType {
                column,
                value: raw_type,
                dump: hex_dump(buf, record_offset, DESCRIPTOR_SIZE),
            })?;
        let name_offset = cursor.read_u16()?;
        let name_length = cursor.read_u16()?;
        trace!(
            "Descriptor #{}: type={:?}, flags={:#04x}, name at {}+{}",
            column, collate_type, descriptor_flags, name_offset, name_length
        );
        raw_descriptors.push((descriptor_flags, collate_type, name_offset, name_length));
    }

    // Step 3: Names, resolved against the string table
    let table_start = HEADER_SIZE + items * DESCRIPTOR_SIZE;
    let table_end = buffer_size as usize;
    if table_end < table_start {
        return Err(cursor.corrupt_at(
            0,
            format!(
                "buffer size {} leaves no room for {} descriptors",
                buffer_size, items
            ),
        ));
    }
    let string_table = &buf[table_start..table_end];

    let descriptors = raw_descriptors
        .into_iter()
        .enumerate()
        .map(|(column, (flags, collate_type, name_offset, name_length))| {
            let start = name_offset as usize;
            let end = start + name_length as usize;
            let name = string_table.get(start..end).ok_or_else(|| {
                cursor.corrupt_at(
                    table_start,
                    format!(
                        "name of column #{} ({}..{}) lies outside the {}-byte string table",
                        column,
                        start,
                        end,
                        string_table.len()
                    ),
                )
            })?;
            Ok(CollateDescriptor {
                flags,
                collate_type,
                name_offset,
                name: LmbcsText::borrowed(name),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CollationInfo {
        flags,
        buffer_size,
        descriptors,
    })
}

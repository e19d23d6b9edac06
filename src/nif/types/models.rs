//! Core enumerations and flag sets shared by the structure codecs.
//!
//! This module defines the closed vocabularies of the wire format:
//! - Primitive value type tags
//! - Table length variants
//! - Collection read-mask and signal flag sets
//! - Collation comparison types
//! - Universal note ids

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};

use super::error::{NifError, Result};
use crate::nif::utils::{BufferBuilder, ByteCursor};

pub const TYPE_ERROR: u16 = 0x0100;
pub const TYPE_UNAVAILABLE: u16 = 0x0200;
pub const TYPE_NUMBER: u16 = 0x0300;
pub const TYPE_NUMBER_RANGE: u16 = 0x0301;
pub const TYPE_TIME: u16 = 0x0400;
pub const TYPE_TIME_RANGE: u16 = 0x0401;
pub const TYPE_TEXT: u16 = 0x0500;
pub const TYPE_TEXT_LIST: u16 = 0x0501;

/// Primitive value types carried in item tables.
///
/// The set is fixed by the protocol. Tags outside of it are not an error at
/// this level; they decode to [`ItemValue::Unknown`](crate::ItemValue::Unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    TextList,
    Number,
    NumberRange,
    Time,
    TimeRange,
    Error,
    Unavailable,
}

impl ValueType {
    /// The 2-byte tag that prefixes a value of this type.
    pub fn tag(&self) -> u16 {
        match self {
            ValueType::Text => TYPE_TEXT,
            ValueType::TextList => TYPE_TEXT_LIST,
            ValueType::Number => TYPE_NUMBER,
            ValueType::NumberRange => TYPE_NUMBER_RANGE,
            ValueType::Time => TYPE_TIME,
            ValueType::TimeRange => TYPE_TIME_RANGE,
            ValueType::Error => TYPE_ERROR,
            ValueType::Unavailable => TYPE_UNAVAILABLE,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            TYPE_TEXT => Some(Self::Text),
            TYPE_TEXT_LIST => Some(Self::TextList),
            TYPE_NUMBER => Some(Self::Number),
            TYPE_NUMBER_RANGE => Some(Self::NumberRange),
            TYPE_TIME => Some(Self::Time),
            TYPE_TIME_RANGE => Some(Self::TimeRange),
            TYPE_ERROR => Some(Self::Error),
            TYPE_UNAVAILABLE => Some(Self::Unavailable),
            _ => None,
        }
    }
}

/// Length-field width of an item table.
///
/// - `Standard`: 16-bit total length and 16-bit item lengths
/// - `Large`: 32-bit total length and 32-bit item lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableVariant {
    #[default]
    Standard,
    Large,
}

impl TableVariant {
    /// Returns the byte width of the total-length and per-item length fields.
    pub fn length_width(&self) -> usize {
        match self {
            TableVariant::Standard => 2,
            TableVariant::Large => 4,
        }
    }

    /// Returns the size of the table header (total length + item count).
    pub fn header_size(&self) -> usize {
        self.length_width() + 2
    }

    /// Largest value a length field of this variant can hold.
    pub fn max_length(&self) -> u64 {
        match self {
            TableVariant::Standard => u16::MAX as u64,
            TableVariant::Large => u32::MAX as u64,
        }
    }
}

impl fmt::Display for TableVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TableVariant::Standard => write!(f, "standard"),
            TableVariant::Large => write!(f, "large"),
        }
    }
}

/// Set of per-entry fields requested from a collection lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReadMask(u32);

impl ReadMask {
    pub const NOTE_ID: ReadMask = ReadMask(0x0000_0001);
    pub const NOTE_UNID: ReadMask = ReadMask(0x0000_0002);
    pub const NOTE_CLASS: ReadMask = ReadMask(0x0000_0004);
    pub const INDEX_SIBLINGS: ReadMask = ReadMask(0x0000_0008);
    pub const INDEX_CHILDREN: ReadMask = ReadMask(0x0000_0010);
    pub const INDEX_DESCENDANTS: ReadMask = ReadMask(0x0000_0020);
    pub const INDEX_ANY_UNREAD: ReadMask = ReadMask(0x0000_0040);
    pub const INDENT_LEVELS: ReadMask = ReadMask(0x0000_0080);
    pub const COLLECTION_STATS: ReadMask = ReadMask(0x0000_0100);
    pub const SCORE: ReadMask = ReadMask(0x0000_0200);
    pub const INDEX_UNREAD: ReadMask = ReadMask(0x0000_0400);
    pub const SUMMARY_VALUES: ReadMask = ReadMask(0x0000_2000);
    pub const INDEX_POSITION: ReadMask = ReadMask(0x0000_4000);
    pub const SUMMARY: ReadMask = ReadMask(0x0000_8000);

    const ENTRY_FIELDS: u32 = 0x0000_E6FF;

    pub const fn empty() -> Self {
        ReadMask(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        ReadMask(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: ReadMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: ReadMask) -> Self {
        ReadMask(self.0 | other.0)
    }

    pub const fn without(self, other: ReadMask) -> Self {
        ReadMask(self.0 & !other.0)
    }

    /// True when only note ids are requested, which selects the flat-array fast path.
    pub const fn is_note_id_only(&self) -> bool {
        self.0 == Self::NOTE_ID.0
    }

    /// True when at least one per-entry field is requested.
    pub const fn has_entry_fields(&self) -> bool {
        self.0 & Self::ENTRY_FIELDS != 0
    }
}

impl BitOr for ReadMask {
    type Output = ReadMask;

    fn bitor(self, rhs: ReadMask) -> ReadMask {
        self.union(rhs)
    }
}

impl BitOrAssign for ReadMask {
    fn bitor_assign(&mut self, rhs: ReadMask) {
        self.0 |= rhs.0;
    }
}

/// Status bits the engine reports alongside a page of collection entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignalFlags(u16);

impl SignalFlags {
    pub const DEFN_ITEM_MODIFIED: u16 = 0x0001;
    pub const VIEW_ITEM_MODIFIED: u16 = 0x0002;
    pub const INDEX_MODIFIED: u16 = 0x0004;
    pub const UNREADLIST_MODIFIED: u16 = 0x0008;
    pub const DATABASE_MODIFIED: u16 = 0x0010;
    pub const MORE_TO_DO: u16 = 0x0020;
    pub const VIEW_TIME_RELATIVE: u16 = 0x0040;
    pub const NOT_SUPPORTED: u16 = 0x0080;
    pub const VIEW_HAS_READER_FIELDS: u16 = 0x0100;

    pub const ANY_CONFLICT: u16 = Self::DEFN_ITEM_MODIFIED
        | Self::VIEW_ITEM_MODIFIED
        | Self::INDEX_MODIFIED
        | Self::UNREADLIST_MODIFIED
        | Self::DATABASE_MODIFIED;
    pub const ANY_NON_DATA_CONFLICT: u16 = Self::ANY_CONFLICT & !Self::DATABASE_MODIFIED;

    pub const fn new(bits: u16) -> Self {
        SignalFlags(bits)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    fn has(&self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    /// More entries are available beyond this page.
    pub fn has_more_to_do(&self) -> bool {
        self.has(Self::MORE_TO_DO)
    }

    pub fn is_database_modified(&self) -> bool {
        self.has(Self::DATABASE_MODIFIED)
    }

    /// The view's design (collation, selection) changed since the last read.
    pub fn is_defining_item_modified(&self) -> bool {
        self.has(Self::DEFN_ITEM_MODIFIED)
    }

    /// A non-defining view item (e.g. the format) changed since the last read.
    pub fn is_other_item_modified(&self) -> bool {
        self.has(Self::VIEW_ITEM_MODIFIED)
    }

    pub fn is_view_index_modified(&self) -> bool {
        self.has(Self::INDEX_MODIFIED)
    }

    pub fn is_unread_list_modified(&self) -> bool {
        self.has(Self::UNREADLIST_MODIFIED)
    }

    /// Time-relative views are never current, so `DATABASE_MODIFIED` is always set for them.
    pub fn is_view_time_relative(&self) -> bool {
        self.has(Self::VIEW_TIME_RELATIVE)
    }

    pub fn is_not_supported(&self) -> bool {
        self.has(Self::NOT_SUPPORTED)
    }

    pub fn has_reader_fields(&self) -> bool {
        self.has(Self::VIEW_HAS_READER_FIELDS)
    }

    pub fn has_any_conflict(&self) -> bool {
        self.has(Self::ANY_CONFLICT)
    }

    /// Any modification signal other than `DATABASE_MODIFIED`.
    pub fn has_any_non_data_conflict(&self) -> bool {
        self.has(Self::ANY_NON_DATA_CONFLICT)
    }
}

/// Comparison type of one collation column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollateType {
    Key,
    NoteId,
    Tumbler,
    Category,
}

impl TryFrom<u8> for CollateType {
    type Error = NifError;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Key),
            3 => Ok(Self::NoteId),
            6 => Ok(Self::Tumbler),
            7 => Ok(Self::Category),
            _ => Err(NifError::InvalidArgument(format!(
                "Unknown collate type: {}",
                value
            ))),
        }
    }
}

impl From<CollateType> for u8 {
    fn from(value: CollateType) -> u8 {
        match value {
            CollateType::Key => 0,
            CollateType::NoteId => 3,
            CollateType::Tumbler => 6,
            CollateType::Category => 7,
        }
    }
}

/// Universal note id: the creating file's timestamp plus the note's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Unid {
    pub file: [u32; 2],
    pub note: [u32; 2],
}

impl Unid {
    /// Wire size of a UNID.
    pub const SIZE: usize = 16;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            file: [cursor.read_u32()?, cursor.read_u32()?],
            note: [cursor.read_u32()?, cursor.read_u32()?],
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) {
        out.put_u32(self.file[0]);
        out.put_u32(self.file[1]);
        out.put_u32(self.note[0]);
        out.put_u32(self.note[1]);
    }

    pub fn is_zero(&self) -> bool {
        *self == Unid::default()
    }
}

impl fmt::Display for Unid {
    /// 32 upper-case hex digits, high word of each timestamp first.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:08X}{:08X}{:08X}{:08X}",
            self.file[1], self.file[0], self.note[1], self.note[0]
        )
    }
}

impl FromStr for Unid {
    type Err = NifError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 32 {
            return Err(NifError::InvalidArgument(format!(
                "UNID must be 32 hex digits, got {} characters",
                s.len()
            )));
        }
        let bytes = hex::decode(s)
            .map_err(|e| NifError::InvalidArgument(format!("Invalid UNID '{}': {}", s, e)))?;
        Ok(Self {
            file: [BigEndian::read_u32(&bytes[4..8]), BigEndian::read_u32(&bytes[0..4])],
            note: [BigEndian::read_u32(&bytes[12..16]), BigEndian::read_u32(&bytes[8..12])],
        })
    }
}

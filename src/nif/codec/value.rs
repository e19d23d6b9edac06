//! Primitive value codec.
//!
//! A tagged value is a `u16` type tag followed by a payload whose length is
//! supplied by the owning table. Values decoded from a buffer borrow their
//! bytes from it; [`ItemValue::into_owned`] detaches them.

use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use log::trace;

use super::lmbcs;
use super::time::{NotesTime, TIME_SIZE};
use crate::nif::types::error::Result;
use crate::nif::types::models::*;
use crate::nif::utils::{BufferBuilder, ByteCursor, checked_u16};

/// Size of the type tag preceding every value.
pub const TAG_SIZE: usize = 2;

/// LMBCS text that is converted to a `String` on first access.
///
/// Equality compares the raw bytes, which is what round-trips on the wire.
#[derive(Clone, Default)]
pub struct LmbcsText<'a> {
    raw: Cow<'a, [u8]>,
    decoded: OnceLock<String>,
}

impl<'a> LmbcsText<'a> {
    /// Wraps LMBCS bytes without converting them.
    pub fn borrowed(raw: &'a [u8]) -> Self {
        Self {
            raw: Cow::Borrowed(raw),
            decoded: OnceLock::new(),
        }
    }

    /// Wraps owned LMBCS bytes without converting them.
    pub fn from_bytes(raw: Vec<u8>) -> Self {
        Self {
            raw: Cow::Owned(raw),
            decoded: OnceLock::new(),
        }
    }

    /// Encodes `text` to LMBCS, keeping the original string as the cached decoding.
    pub fn from_text(text: &str) -> Self {
        let decoded = OnceLock::new();
        let _ = decoded.set(text.to_string());
        Self {
            raw: Cow::Owned(lmbcs::encode(text)),
            decoded,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The decoded text. Conversion happens once; later calls return the cached string.
    pub fn as_str(&self) -> &str {
        self.decoded.get_or_init(|| lmbcs::decode(&self.raw))
    }

    pub fn into_owned(self) -> LmbcsText<'static> {
        LmbcsText {
            raw: Cow::Owned(self.raw.into_owned()),
            decoded: self.decoded,
        }
    }
}

impl PartialEq for LmbcsText<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for LmbcsText<'_> {}

impl fmt::Debug for LmbcsText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for LmbcsText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for LmbcsText<'static> {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

impl From<String> for LmbcsText<'static> {
    fn from(value: String) -> Self {
        Self::from_text(&value)
    }
}

/// One element of a number or time range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeEntry<T> {
    Single(T),
    Pair(T, T),
}

/// A decoded primitive value.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue<'a> {
    Text(LmbcsText<'a>),
    TextList(Vec<LmbcsText<'a>>),
    Number(f64),
    /// Singles first, then pairs, as stored on the wire.
    NumberRange(Vec<RangeEntry<f64>>),
    Time(NotesTime),
    /// Singles first, then pairs, as stored on the wire.
    TimeRange(Vec<RangeEntry<NotesTime>>),
    /// Placeholder the engine writes for a value it could not compute or inline.
    Error { code: Option<u16> },
    Unavailable,
    /// A tag outside the known set, kept verbatim so it re-encodes unchanged.
    Unknown { type_tag: u16, raw: Cow<'a, [u8]> },
}

impl<'a> ItemValue<'a> {
    pub fn text(text: &str) -> Self {
        ItemValue::Text(LmbcsText::from_text(text))
    }

    pub fn text_list<S: AsRef<str>>(entries: &[S]) -> Self {
        ItemValue::TextList(
            entries
                .iter()
                .map(|s| LmbcsText::from_text(s.as_ref()))
                .collect(),
        )
    }

    /// The wire tag of this value.
    pub fn type_tag(&self) -> u16 {
        match self {
            ItemValue::Unknown { type_tag, .. } => *type_tag,
            known => known.value_type().map(|t| t.tag()).unwrap_or_default(),
        }
    }

    /// The primitive type, or `None` for [`ItemValue::Unknown`].
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            ItemValue::Text(_) => Some(ValueType::Text),
            ItemValue::TextList(_) => Some(ValueType::TextList),
            ItemValue::Number(_) => Some(ValueType::Number),
            ItemValue::NumberRange(_) => Some(ValueType::NumberRange),
            ItemValue::Time(_) => Some(ValueType::Time),
            ItemValue::TimeRange(_) => Some(ValueType::TimeRange),
            ItemValue::Error { .. } => Some(ValueType::Error),
            ItemValue::Unavailable => Some(ValueType::Unavailable),
            ItemValue::Unknown { .. } => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ItemValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<Vec<&str>> {
        match self {
            ItemValue::TextList(entries) => Some(entries.iter().map(|e| e.as_str()).collect()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ItemValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NotesTime> {
        match self {
            ItemValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// True for the placeholders that mark a value the engine did not deliver.
    pub fn is_error_or_unavailable(&self) -> bool {
        matches!(self, ItemValue::Error { .. } | ItemValue::Unavailable)
    }

    /// Number of payload bytes this value occupies, excluding the tag.
    pub fn payload_len(&self) -> usize {
        match self {
            ItemValue::Text(text) => text.len(),
            ItemValue::TextList(entries) => {
                2 + entries.len() * 2 + entries.iter().map(|e| e.len()).sum::<usize>()
            }
            ItemValue::Number(_) => 8,
            ItemValue::NumberRange(entries) => range_len(entries, 8),
            ItemValue::Time(_) => TIME_SIZE,
            ItemValue::TimeRange(entries) => range_len(entries, TIME_SIZE),
            ItemValue::Error { code } => code.map_or(0, |_| 2),
            ItemValue::Unavailable => 0,
            ItemValue::Unknown { raw, .. } => raw.len(),
        }
    }

    /// Number of bytes this value occupies in a table, including the tag.
    pub fn encoded_len(&self) -> usize {
        TAG_SIZE + self.payload_len()
    }

    /// Detaches the value from the buffer it was decoded from.
    pub fn into_owned(self) -> ItemValue<'static> {
        match self {
            ItemValue::Text(text) => ItemValue::Text(text.into_owned()),
            ItemValue::TextList(entries) => {
                ItemValue::TextList(entries.into_iter().map(LmbcsText::into_owned).collect())
            }
            ItemValue::Number(n) => ItemValue::Number(n),
            ItemValue::NumberRange(entries) => ItemValue::NumberRange(entries),
            ItemValue::Time(t) => ItemValue::Time(t),
            ItemValue::TimeRange(entries) => ItemValue::TimeRange(entries),
            ItemValue::Error { code } => ItemValue::Error { code },
            ItemValue::Unavailable => ItemValue::Unavailable,
            ItemValue::Unknown { type_tag, raw } => ItemValue::Unknown {
                type_tag,
                raw: Cow::Owned(raw.into_owned()),
            },
        }
    }
}

impl fmt::Display for ItemValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ItemValue::Text(text) => write!(f, "{:?}", text.as_str()),
            ItemValue::TextList(entries) => {
                let items: Vec<String> = entries.iter().map(|e| format!("{:?}", e.as_str())).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ItemValue::Number(n) => write!(f, "{}", n),
            ItemValue::NumberRange(entries) => fmt_range(f, entries),
            ItemValue::Time(t) => write!(f, "{}", t),
            ItemValue::TimeRange(entries) => fmt_range(f, entries),
            ItemValue::Error { code: Some(code) } => write!(f, "<error {:#06x}>", code),
            ItemValue::Error { code: None } => write!(f, "<error>"),
            ItemValue::Unavailable => write!(f, "<unavailable>"),
            ItemValue::Unknown { type_tag, raw } => {
                write!(f, "<type {:#06x}: {}>", type_tag, hex::encode(raw))
            }
        }
    }
}

fn fmt_range<T: fmt::Display>(f: &mut fmt::Formatter, entries: &[RangeEntry<T>]) -> fmt::Result {
    let items: Vec<String> = entries
        .iter()
        .map(|entry| match entry {
            RangeEntry::Single(v) => v.to_string(),
            RangeEntry::Pair(lower, upper) => format!("{}..{}", lower, upper),
        })
        .collect();
    write!(f, "[{}]", items.join(", "))
}

fn range_len<T>(entries: &[RangeEntry<T>], element_size: usize) -> usize {
    4 + entries
        .iter()
        .map(|entry| match entry {
            RangeEntry::Single(_) => element_size,
            RangeEntry::Pair(..) => element_size * 2,
        })
        .sum::<usize>()
}

/// Decodes a standalone payload for `type_tag`.
///
/// # Errors
/// Returns a corruption error if the payload does not fit the fixed layout of
/// a known type. Unknown tags never fail.
pub fn decode_value(type_tag: u16, payload: &[u8]) -> Result<ItemValue<'_>> {
    let mut cursor = ByteCursor::new(payload, "item value");
    read_value(&mut cursor, type_tag, payload.len())
}

/// Reads a payload of `len` bytes for `type_tag` from `cursor`.
pub(crate) fn read_value<'a>(
    cursor: &mut ByteCursor<'a>,
    type_tag: u16,
    len: usize,
) -> Result<ItemValue<'a>> {
    let start = cursor.position();
    let mut payload = cursor.bounded(len)?;
    trace!("Decoding value: tag={:#06x}, {} payload bytes at offset {}", type_tag, len, start);

    let value = match ValueType::from_tag(type_tag) {
        None => ItemValue::Unknown {
            type_tag,
            raw: Cow::Borrowed(payload.take(len)?),
        },
        Some(ValueType::Text) => ItemValue::Text(LmbcsText::borrowed(payload.take(len)?)),
        Some(ValueType::TextList) => ItemValue::TextList(read_text_list(&mut payload)?),
        Some(ValueType::Number) => ItemValue::Number(payload.read_f64()?),
        Some(ValueType::NumberRange) => {
            ItemValue::NumberRange(read_range(&mut payload, |c| c.read_f64())?)
        }
        Some(ValueType::Time) => ItemValue::Time(NotesTime::read(&mut payload)?),
        Some(ValueType::TimeRange) => ItemValue::TimeRange(read_range(&mut payload, NotesTime::read)?),
        Some(ValueType::Error) => match len {
            0 => ItemValue::Error { code: None },
            _ => ItemValue::Error {
                code: Some(payload.read_u16()?),
            },
        },
        Some(ValueType::Unavailable) => {
            payload.skip(len)?;
            ItemValue::Unavailable
        }
    };

    if !payload.is_empty() {
        return Err(payload.corrupt(format!(
            "{} trailing bytes after value of type {:#06x}",
            payload.remaining(),
            type_tag
        )));
    }
    Ok(value)
}

fn read_text_list<'a>(cursor: &mut ByteCursor<'a>) -> Result<Vec<LmbcsText<'a>>> {
    let count = cursor.read_u16()? as usize;
    let lengths = (0..count)
        .map(|_| cursor.read_u16().map(usize::from))
        .collect::<Result<Vec<_>>>()?;
    lengths
        .into_iter()
        .map(|len| cursor.take(len).map(LmbcsText::borrowed))
        .collect()
}

fn read_range<T>(
    cursor: &mut ByteCursor<'_>,
    mut read_one: impl FnMut(&mut ByteCursor<'_>) -> Result<T>,
) -> Result<Vec<RangeEntry<T>>> {
    let list_entries = cursor.read_u16()? as usize;
    let range_entries = cursor.read_u16()? as usize;
    let mut entries = Vec::with_capacity(list_entries + range_entries);
    for _ in 0..list_entries {
        entries.push(RangeEntry::Single(read_one(cursor)?));
    }
    for _ in 0..range_entries {
        let lower = read_one(cursor)?;
        let upper = read_one(cursor)?;
        entries.push(RangeEntry::Pair(lower, upper));
    }
    Ok(entries)
}

/// Encodes a value into its tag and payload bytes.
///
/// # Errors
/// Returns an overflow error if a list is too long for its `u16` count.
pub fn encode_value(value: &ItemValue<'_>) -> Result<(u16, Vec<u8>)> {
    let mut out = BufferBuilder::with_capacity(value.payload_len());
    write_payload(&mut out, value)?;
    Ok((value.type_tag(), out.finish()))
}

/// Appends the tag and payload of `value`.
pub(crate) fn write_value(out: &mut BufferBuilder, value: &ItemValue<'_>) -> Result<()> {
    out.put_u16(value.type_tag());
    write_payload(out, value)
}

fn write_payload(out: &mut BufferBuilder, value: &ItemValue<'_>) -> Result<()> {
    match value {
        ItemValue::Text(text) => out.put_bytes(text.as_bytes()),
        ItemValue::TextList(entries) => {
            out.put_u16(checked_u16("text list entry count", entries.len())?);
            for entry in entries {
                out.put_u16(checked_u16("text list entry length", entry.len())?);
            }
            for entry in entries {
                out.put_bytes(entry.as_bytes());
            }
        }
        ItemValue::Number(n) => out.put_f64(*n),
        ItemValue::NumberRange(entries) => write_range(out, entries, |o, n| o.put_f64(*n))?,
        ItemValue::Time(t) => t.write(out),
        ItemValue::TimeRange(entries) => write_range(out, entries, |o, t| t.write(o))?,
        ItemValue::Error { code } => {
            if let Some(code) = code {
                out.put_u16(*code);
            }
        }
        ItemValue::Unavailable => {}
        ItemValue::Unknown { raw, .. } => out.put_bytes(raw),
    }
    Ok(())
}

fn write_range<T>(
    out: &mut BufferBuilder,
    entries: &[RangeEntry<T>],
    write_one: impl Fn(&mut BufferBuilder, &T),
) -> Result<()> {
    let singles: Vec<&T> = entries
        .iter()
        .filter_map(|e| match e {
            RangeEntry::Single(v) => Some(v),
            RangeEntry::Pair(..) => None,
        })
        .collect();
    let pairs: Vec<(&T, &T)> = entries
        .iter()
        .filter_map(|e| match e {
            RangeEntry::Pair(lower, upper) => Some((lower, upper)),
            RangeEntry::Single(_) => None,
        })
        .collect();

    out.put_u16(checked_u16("range list entries", singles.len())?);
    out.put_u16(checked_u16("range pair entries", pairs.len())?);
    for value in singles {
        write_one(out, value);
    }
    for (lower, upper) in pairs {
        write_one(out, lower);
        write_one(out, upper);
    }
    Ok(())
}

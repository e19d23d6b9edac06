//! Item-value tables (positional rows) and item tables (named rows).
//!
//! Both start with a header of `total_length` and `item_count`, followed by a
//! length array and the values. The [`TableVariant`] selects 16-bit or 32-bit
//! length fields. A zero item length marks a value that is absent from the
//! row; it carries no type tag.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::{debug, info, trace};

use crate::nif::codec::value::{ItemValue, LmbcsText, TAG_SIZE, read_value, write_value};
use crate::nif::types::error::{NifError, Result};
use crate::nif::types::models::TableVariant;
use crate::nif::utils::{BufferBuilder, ByteCursor, checked_u16};

/// A positional row of values.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemValueTable<'a> {
    pub variant: TableVariant,
    /// The `total_length` header field: bytes from the header start to the end of the last value.
    pub total_length: u32,
    pub values: Vec<Option<ItemValue<'a>>>,
}

impl<'a> ItemValueTable<'a> {
    /// Builds a table from values, computing the total length it will encode to.
    ///
    /// # Errors
    /// Returns an overflow error if the row does not fit the variant's length fields.
    pub fn from_values(variant: TableVariant, values: Vec<Option<ItemValue<'a>>>) -> Result<Self> {
        let total = variant.header_size()
            + values.len() * variant.length_width()
            + values.iter().flatten().map(ItemValue::encoded_len).sum::<usize>();
        let total_length = checked_total(variant, total)?;
        Ok(Self {
            variant,
            total_length,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at `index`; `None` when out of range or absent from the row.
    pub fn get(&self, index: usize) -> Option<&ItemValue<'a>> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&ItemValue<'a>>> {
        self.values.iter().map(Option::as_ref)
    }

    pub fn into_owned(self) -> ItemValueTable<'static> {
        ItemValueTable {
            variant: self.variant,
            total_length: self.total_length,
            values: self
                .values
                .into_iter()
                .map(|v| v.map(ItemValue::into_owned))
                .collect(),
        }
    }

    /// Reads one table at the cursor position.
    pub(crate) fn read(cursor: &mut ByteCursor<'a>, variant: TableVariant) -> Result<Self> {
        let start = cursor.position();
        let width = variant.length_width();

        // Step 1: Header
        let total_length = cursor.read_length(width)?;
        check_fits(cursor, start, total_length)?;
        let count = cursor.read_u16()? as usize;
        trace!(
            "Item value table at {}: total_length={}, count={}, variant={}",
            start, total_length, count, variant
        );

        // Step 2: Length array
        let lengths = (0..count)
            .map(|_| cursor.read_length(width).map(|l| l as usize))
            .collect::<Result<Vec<_>>>()?;

        // Step 3: Values, in a single forward pass
        let values = lengths
            .into_iter()
            .map(|len| read_item(cursor, len))
            .collect::<Result<Vec<_>>>()?;

        check_consumed("item value table", cursor, start, total_length)?;
        Ok(Self {
            variant,
            total_length,
            values,
        })
    }

    /// Two-pass encode: header and length slots are reserved, then patched once the values are written.
    pub(crate) fn write(&self, out: &mut BufferBuilder) -> Result<()> {
        let start = out.position();
        let width = self.variant.length_width();

        let total_slot = out.reserve(width);
        out.put_u16(checked_u16("item count", self.values.len())?);
        let length_slots: Vec<_> = self.values.iter().map(|_| out.reserve(width)).collect();

        for (slot, value) in length_slots.into_iter().zip(&self.values) {
            let value_start = out.position();
            if let Some(value) = value {
                write_value(out, value)?;
            }
            let value_len = out.position() - value_start;
            out.patch(slot, "item length", value_len)?;
        }

        let total = out.position() - start;
        out.patch(total_slot, "table total length", total)
    }

    /// Encodes the table into a new buffer.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = BufferBuilder::with_capacity(self.total_length as usize);
        self.write(&mut out)?;
        debug!("Encoded {} item value table: {} values, {} bytes", self.variant, self.values.len(), out.position());
        Ok(out.finish())
    }
}

/// A row of named values, such as a document summary.
///
/// Name lookup is case-insensitive; when a name repeats, the first item wins.
#[derive(Debug, Clone)]
pub struct ItemTable<'a> {
    pub variant: TableVariant,
    pub total_length: u32,
    pub names: Vec<LmbcsText<'a>>,
    pub values: Vec<Option<ItemValue<'a>>>,
    index: OnceLock<HashMap<String, usize>>,
}

impl PartialEq for ItemTable<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.variant == other.variant
            && self.total_length == other.total_length
            && self.names == other.names
            && self.values == other.values
    }
}

impl<'a> ItemTable<'a> {
    /// Builds a table from `(name, value)` pairs, computing its encoded total length.
    ///
    /// # Errors
    /// Returns an overflow error if the row does not fit the variant's length fields.
    pub fn from_items<S: AsRef<str>>(
        variant: TableVariant,
        items: impl IntoIterator<Item = (S, Option<ItemValue<'a>>)>,
    ) -> Result<Self> {
        let (names, values): (Vec<LmbcsText<'a>>, Vec<Option<ItemValue<'a>>>) = items
            .into_iter()
            .map(|(name, value)| (LmbcsText::from_text(name.as_ref()), value))
            .unzip();
        let descriptor_size = 2 + variant.length_width();
        let total = variant.header_size()
            + names.len() * descriptor_size
            + names.iter().map(LmbcsText::len).sum::<usize>()
            + values.iter().flatten().map(ItemValue::encoded_len).sum::<usize>();
        let total_length = checked_total(variant, total)?;
        Ok(Self {
            variant,
            total_length,
            names,
            values,
            index: OnceLock::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(LmbcsText::as_str)
    }

    /// Position of the first item called `name`, ignoring case.
    pub fn position(&self, name: &str) -> Option<usize> {
        let index = self.index.get_or_init(|| {
            let mut map = HashMap::with_capacity(self.names.len());
            for (i, item_name) in self.names.iter().enumerate() {
                map.entry(item_name.as_str().to_lowercase()).or_insert(i);
            }
            map
        });
        index.get(&name.to_lowercase()).copied()
    }

    /// The value of the first item called `name`; `None` when missing or absent.
    pub fn get(&self, name: &str) -> Option<&ItemValue<'a>> {
        self.position(name)
            .and_then(|i| self.values.get(i))
            .and_then(Option::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterates `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ItemValue<'a>>)> {
        self.names
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub fn into_owned(self) -> ItemTable<'static> {
        ItemTable {
            variant: self.variant,
            total_length: self.total_length,
            names: self.names.into_iter().map(LmbcsText::into_owned).collect(),
            values: self
                .values
                .into_iter()
                .map(|v| v.map(ItemValue::into_owned))
                .collect(),
            index: self.index,
        }
    }

    pub(crate) fn read(cursor: &mut ByteCursor<'a>, variant: TableVariant) -> Result<Self> {
        let start = cursor.position();
        let width = variant.length_width();

        // Step 1: Header
        let total_length = cursor.read_length(width)?;
        check_fits(cursor, start, total_length)?;
        let count = cursor.read_u16()? as usize;
        trace!(
            "Item table at {}: total_length={}, count={}, variant={}",
            start, total_length, count, variant
        );

        // Step 2: (name length, value length) descriptors
        let mut descriptors = Vec::with_capacity(count);
        for _ in 0..count {
            let name_len = cursor.read_u16()? as usize;
            let value_len = cursor.read_length(width)? as usize;
            descriptors.push((name_len, value_len));
        }

        // Step 3: Each item's name, immediately followed by its value
        let mut names = Vec::with_capacity(count);
        let mut values = Vec::with_capacity(count);
        for (name_len, value_len) in descriptors {
            names.push(LmbcsText::borrowed(cursor.take(name_len)?));
            values.push(read_item(cursor, value_len)?);
        }

        check_consumed("item table", cursor, start, total_length)?;
        Ok(Self {
            variant,
            total_length,
            names,
            values,
            index: OnceLock::new(),
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) -> Result<()> {
        if self.names.len() != self.values.len() {
            return Err(NifError::CountMismatch {
                item_type: "item table names",
                expected: self.values.len() as u64,
                found: self.names.len() as u64,
            });
        }
        let start = out.position();
        let width = self.variant.length_width();

        let total_slot = out.reserve(width);
        out.put_u16(checked_u16("item count", self.values.len())?);
        let mut value_slots = Vec::with_capacity(self.values.len());
        for name in &self.names {
            out.put_u16(checked_u16("item name length", name.len())?);
            value_slots.push(out.reserve(width));
        }

        for ((name, value), slot) in self.names.iter().zip(&self.values).zip(value_slots) {
            out.put_bytes(name.as_bytes());
            let value_start = out.position();
            if let Some(value) = value {
                write_value(out, value)?;
            }
            let value_len = out.position() - value_start;
            out.patch(slot, "item length", value_len)?;
        }

        let total = out.position() - start;
        out.patch(total_slot, "table total length", total)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = BufferBuilder::with_capacity(self.total_length as usize);
        self.write(&mut out)?;
        debug!("Encoded {} item table: {} items, {} bytes", self.variant, self.values.len(), out.position());
        Ok(out.finish())
    }
}

fn read_item<'a>(cursor: &mut ByteCursor<'a>, len: usize) -> Result<Option<ItemValue<'a>>> {
    match len {
        0 => Ok(None),
        1 => Err(cursor.corrupt("item length 1 is too short for a type tag")),
        _ => {
            let tag = cursor.read_u16()?;
            read_value(cursor, tag, len - TAG_SIZE).map(Some)
        }
    }
}

fn check_fits(cursor: &ByteCursor<'_>, start: usize, total_length: u32) -> Result<()> {
    let available = cursor.buffer().len() - start;
    if total_length as usize > available {
        return Err(cursor.corrupt_at(
            start,
            format!(
                "declared total length {} exceeds the {} bytes available",
                total_length, available
            ),
        ));
    }
    Ok(())
}

fn check_consumed(
    context: &'static str,
    cursor: &ByteCursor<'_>,
    start: usize,
    total_length: u32,
) -> Result<()> {
    let consumed = cursor.position() - start;
    if consumed != total_length as usize {
        return Err(NifError::SizeMismatch {
            context,
            declared: total_length as u64,
            consumed: consumed as u64,
        });
    }
    Ok(())
}

fn checked_total(variant: TableVariant, total: usize) -> Result<u32> {
    if total as u64 > variant.max_length() {
        return Err(NifError::Overflow {
            field: "table total length",
            value: total as u64,
            max: variant.max_length(),
        });
    }
    Ok(total as u32)
}

/// Decodes a positional table of the given variant from the start of `buf`.
///
/// Values borrow from `buf`; call [`ItemValueTable::into_owned`] to detach them.
///
/// # Errors
/// Returns a corruption error if the header, a length, or a value does not
/// fit the buffer, or if the consumed size differs from `total_length`.
pub fn decode_table(buf: &[u8], variant: TableVariant) -> Result<ItemValueTable<'_>> {
    info!("Decoding {} item value table ({} bytes)", variant, buf.len());
    let mut cursor = ByteCursor::new(buf, "item value table");
    let table = ItemValueTable::read(&mut cursor, variant)?;
    if !cursor.is_empty() {
        debug!("{} bytes after item value table ignored", cursor.remaining());
    }
    Ok(table)
}

/// Decodes a positional table with 32-bit lengths.
pub fn decode_table_large(buf: &[u8]) -> Result<ItemValueTable<'_>> {
    decode_table(buf, TableVariant::Large)
}

/// Decodes a named table of the given variant from the start of `buf`.
pub fn decode_item_table(buf: &[u8], variant: TableVariant) -> Result<ItemTable<'_>> {
    info!("Decoding {} item table ({} bytes)", variant, buf.len());
    let mut cursor = ByteCursor::new(buf, "item table");
    let table = ItemTable::read(&mut cursor, variant)?;
    if !cursor.is_empty() {
        debug!("{} bytes after item table ignored", cursor.remaining());
    }
    Ok(table)
}

/// Decodes a named table with 32-bit value lengths.
pub fn decode_item_table_large(buf: &[u8]) -> Result<ItemTable<'_>> {
    decode_item_table(buf, TableVariant::Large)
}

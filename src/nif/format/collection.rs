//! Collection (view index) lookup pages.
//!
//! A page holds an optional statistics block followed by `returned` entries.
//! Each entry carries exactly the fields selected by the read mask, in a fixed
//! order. The page buffer is consumed completely; any leftover bytes mean the
//! buffer does not match the mask it was decoded with.

use std::borrow::Cow;

use log::{debug, info, trace};

use super::item_table::{ItemTable, ItemValueTable};
use crate::nif::codec::time::NotesTime;
use crate::nif::codec::value::ItemValue;
use crate::nif::types::error::{NifError, Result};
use crate::nif::types::models::{ReadMask, SignalFlags, TableVariant, Unid};
use crate::nif::utils::ByteCursor;

/// Index-wide statistics, sent ahead of the entries when requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionStats {
    pub top_level_entries: u32,
    pub last_modified: NotesTime,
}

/// Position of an entry in the index hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionPosition {
    pub level: u16,
    pub min_level: u8,
    pub max_level: u8,
    /// One component per level, `level + 1` in total.
    pub tumbler: Vec<u32>,
}

impl std::fmt::Display for CollectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let parts: Vec<String> = self.tumbler.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// One row of a collection page. Fields not requested by the read mask are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionEntry<'a> {
    pub note_id: Option<u32>,
    pub unid: Option<Unid>,
    pub note_class: Option<u16>,
    pub sibling_count: Option<u32>,
    pub child_count: Option<u32>,
    pub descendant_count: Option<u32>,
    pub any_unread: Option<bool>,
    pub indent_level: Option<u16>,
    pub ft_score: Option<u16>,
    pub is_unread: Option<bool>,
    pub position: Option<CollectionPosition>,
    pub column_values: Option<ItemValueTable<'a>>,
    pub summary: Option<ItemTable<'a>>,
}

/// Fallback used to fetch a summary value the engine did not inline.
pub trait ItemRecovery {
    /// Reads `item_name` directly from note `note_id`; `Ok(None)` if the note has no such item.
    fn recover_item(&self, note_id: u32, item_name: &str) -> Result<Option<ItemValue<'static>>>;
}

impl<'a> CollectionEntry<'a> {
    /// The named summary value, exactly as delivered in the page.
    pub fn summary_value(&self, name: &str) -> Option<&ItemValue<'a>> {
        self.summary.as_ref().and_then(|s| s.get(name))
    }

    /// The named summary value, recovered through `recovery` if the engine sent a placeholder.
    ///
    /// Recovery runs only for `Error` and `Unavailable` values, and only when
    /// the entry carries a note id.
    ///
    /// # Errors
    /// Returns [`NifError::ItemUnavailable`] when the value is a placeholder
    /// and could not be recovered, or the error reported by `recovery`.
    pub fn summary_value_or_recover(
        &self,
        name: &str,
        recovery: &dyn ItemRecovery,
    ) -> Result<Option<Cow<'_, ItemValue<'a>>>> {
        let Some(value) = self.summary_value(name) else {
            return Ok(None);
        };
        if !value.is_error_or_unavailable() {
            return Ok(Some(Cow::Borrowed(value)));
        }

        let unavailable = || NifError::ItemUnavailable {
            note_id: self.note_id.unwrap_or_default(),
            item: name.to_string(),
        };
        let note_id = self.note_id.ok_or_else(unavailable)?;
        debug!("Recovering item '{}' of note {:#x} by direct read", name, note_id);
        match recovery.recover_item(note_id, name)? {
            Some(recovered) => Ok(Some(Cow::Owned(recovered))),
            None => Err(unavailable()),
        }
    }

    pub fn into_owned(self) -> CollectionEntry<'static> {
        CollectionEntry {
            note_id: self.note_id,
            unid: self.unid,
            note_class: self.note_class,
            sibling_count: self.sibling_count,
            child_count: self.child_count,
            descendant_count: self.descendant_count,
            any_unread: self.any_unread,
            indent_level: self.indent_level,
            ft_score: self.ft_score,
            is_unread: self.is_unread,
            position: self.position,
            column_values: self.column_values.map(ItemValueTable::into_owned),
            summary: self.summary.map(ItemTable::into_owned),
        }
    }
}

/// Out-of-band results returned with a page by the read call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadEntriesInfo {
    pub skipped: u32,
    pub returned: u32,
    pub signal_flags: SignalFlags,
    /// Where the next read should continue, if the engine reported it.
    pub cursor_position: Option<String>,
    pub index_modified_sequence: u32,
    pub diff_time: Option<NotesTime>,
}

/// One decoded page of collection entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionLookupPage<'a> {
    pub stats: Option<CollectionStats>,
    pub entries: Vec<CollectionEntry<'a>>,
    pub skipped: u32,
    pub returned: u32,
    pub signal_flags: SignalFlags,
    pub cursor_position: Option<String>,
    pub index_modified_sequence: u32,
    pub diff_time: Option<NotesTime>,
}

impl<'a> CollectionLookupPage<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CollectionEntry<'a>> {
        self.entries.iter()
    }

    pub fn has_more_to_do(&self) -> bool {
        self.signal_flags.has_more_to_do()
    }

    pub fn is_database_modified(&self) -> bool {
        self.signal_flags.is_database_modified()
    }

    pub fn is_defining_item_modified(&self) -> bool {
        self.signal_flags.is_defining_item_modified()
    }

    pub fn is_other_item_modified(&self) -> bool {
        self.signal_flags.is_other_item_modified()
    }

    pub fn is_view_index_modified(&self) -> bool {
        self.signal_flags.is_view_index_modified()
    }

    pub fn is_view_time_relative(&self) -> bool {
        self.signal_flags.is_view_time_relative()
    }

    pub fn has_reader_fields(&self) -> bool {
        self.signal_flags.has_reader_fields()
    }

    pub fn has_any_non_data_conflict(&self) -> bool {
        self.signal_flags.has_any_non_data_conflict()
    }

    /// Position of the last entry, used to continue a scan on the next page.
    pub fn last_position(&self) -> Option<&CollectionPosition> {
        self.entries.last().and_then(|e| e.position.as_ref())
    }

    /// Detaches every entry from the transport buffer so it can be released.
    pub fn into_owned(self) -> CollectionLookupPage<'static> {
        CollectionLookupPage {
            stats: self.stats,
            entries: self.entries.into_iter().map(CollectionEntry::into_owned).collect(),
            skipped: self.skipped,
            returned: self.returned,
            signal_flags: self.signal_flags,
            cursor_position: self.cursor_position,
            index_modified_sequence: self.index_modified_sequence,
            diff_time: self.diff_time,
        }
    }
}

/// Decodes one page of collection entries.
///
/// # Arguments
/// * `buf` - The page buffer, exactly as long as its declared length
/// * `read_mask` - The fields requested when the page was read
/// * `info` - Counts and signal flags returned alongside the buffer
/// * `summary_variant` - Table variant of the summary values and summaries
///
/// # Errors
/// Returns a corruption error if a field does not fit the buffer, if a summary
/// table is inconsistent, or if bytes are left once every entry is read.
pub fn decode_page<'a>(
    buf: &'a [u8],
    read_mask: ReadMask,
    info: &ReadEntriesInfo,
    summary_variant: TableVariant,
) -> Result<CollectionLookupPage<'a>> {
    info!(
        "Decoding collection page: {} bytes, {} entries, mask={:#06x}, signal={:#06x}",
        buf.len(),
        info.returned,
        read_mask.bits(),
        info.signal_flags.bits()
    );
    let mut cursor = ByteCursor::new(buf, "collection page");

    // Step 1: Statistics come first, when requested
    let stats = if read_mask.contains(ReadMask::COLLECTION_STATS) {
        let stats = CollectionStats {
            top_level_entries: cursor.read_u32()?,
            last_modified: NotesTime::read(&mut cursor)?,
        };
        debug!("Collection stats: {} top-level entries", stats.top_level_entries);
        Some(stats)
    } else {
        None
    };

    // Step 2: Entries
    let entry_mask = read_mask.without(ReadMask::COLLECTION_STATS);
    let count = info.returned as usize;
    let entries = if entry_mask.is_note_id_only() {
        read_note_ids(&mut cursor, count)?
    } else if !entry_mask.has_entry_fields() {
        debug!("No entry fields requested, {} entries carry nothing", count);
        Vec::new()
    } else {
        // Every entry field is at least two bytes wide
        if count > cursor.remaining() / 2 {
            return Err(cursor.corrupt(format!(
                "{} entries cannot fit in the {} remaining bytes",
                count,
                cursor.remaining()
            )));
        }
        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            trace!("Entry #{} at offset {}", index, cursor.position());
            entries.push(read_entry(&mut cursor, entry_mask, summary_variant)?);
        }
        entries
    };

    // Step 3: The mask must account for every byte
    if !cursor.is_empty() {
        return Err(NifError::SizeMismatch {
            context: "collection page",
            declared: buf.len() as u64,
            consumed: cursor.position() as u64,
        });
    }

    Ok(CollectionLookupPage {
        stats,
        entries,
        skipped: info.skipped,
        returned: info.returned,
        signal_flags: info.signal_flags,
        cursor_position: info.cursor_position.clone(),
        index_modified_sequence: info.index_modified_sequence,
        diff_time: info.diff_time,
    })
}

/// Note-id-only pages are a flat `u32` array.
fn read_note_ids<'a>(cursor: &mut ByteCursor<'a>, count: usize) -> Result<Vec<CollectionEntry<'a>>> {
    let len = count
        .checked_mul(4)
        .ok_or_else(|| cursor.corrupt(format!("{} note ids overflow the page length", count)))?;
    let ids = cursor.take(len)?;
    Ok(ids
        .chunks_exact(4)
        .map(|chunk| CollectionEntry {
            note_id: Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
            ..Default::default()
        })
        .collect())
}

fn read_entry<'a>(
    cursor: &mut ByteCursor<'a>,
    mask: ReadMask,
    summary_variant: TableVariant,
) -> Result<CollectionEntry<'a>> {
    let mut entry = CollectionEntry::default();

    if mask.contains(ReadMask::NOTE_ID) {
        entry.note_id = Some(cursor.read_u32()?);
    }
    if mask.contains(ReadMask::NOTE_UNID) {
        entry.unid = Some(Unid::read(cursor)?);
    }
    if mask.contains(ReadMask::NOTE_CLASS) {
        entry.note_class = Some(cursor.read_u16()?);
    }
    if mask.contains(ReadMask::INDEX_SIBLINGS) {
        entry.sibling_count = Some(cursor.read_u32()?);
    }
    if mask.contains(ReadMask::INDEX_CHILDREN) {
        entry.child_count = Some(cursor.read_u32()?);
    }
    if mask.contains(ReadMask::INDEX_DESCENDANTS) {
        entry.descendant_count = Some(cursor.read_u32()?);
    }
    if mask.contains(ReadMask::INDEX_ANY_UNREAD) {
        entry.any_unread = Some(cursor.read_u16()? != 0);
    }
    if mask.contains(ReadMask::INDENT_LEVELS) {
        entry.indent_level = Some(cursor.read_u16()?);
    }
    if mask.contains(ReadMask::SCORE) {
        entry.ft_score = Some(cursor.read_u16()?);
    }
    if mask.contains(ReadMask::INDEX_UNREAD) {
        entry.is_unread = Some(cursor.read_u16()? != 0);
    }
    if mask.contains(ReadMask::INDEX_POSITION) {
        entry.position = Some(read_position(cursor)?);
    }
    if mask.contains(ReadMask::SUMMARY_VALUES) {
        entry.column_values = Some(ItemValueTable::read(cursor, summary_variant)?);
    }
    if mask.contains(ReadMask::SUMMARY) {
        entry.summary = Some(ItemTable::read(cursor, summary_variant)?);
    }
    Ok(entry)
}

fn read_position(cursor: &mut ByteCursor<'_>) -> Result<CollectionPosition> {
    let level = cursor.read_u16()?;
    let min_level = cursor.read_u8()?;
    let max_level = cursor.read_u8()?;
    let tumbler = (0..=level as usize)
        .map(|_| cursor.read_u32())
        .collect::<Result<Vec<_>>>()?;
    Ok(CollectionPosition {
        level,
        min_level,
        max_level,
        tumbler,
    })
}

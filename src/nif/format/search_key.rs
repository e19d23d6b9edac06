//! Search key encoding for keyed index lookups.
//!
//! The key buffer is an item table with empty names: a header, one
//! `(name length, value length)` descriptor per key, then the tagged values.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use log::{debug, info, warn};

use crate::nif::codec::time::NotesTime;
use crate::nif::codec::value::{ItemValue, RangeEntry, write_value};
use crate::nif::types::error::{NifError, Result};
use crate::nif::utils::{BufferBuilder, checked_u16};

/// The date components a key actually carries.
///
/// A date without a time of day stays date-only on the wire; it is not
/// stored as midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDate {
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
}

impl KeyDate {
    /// # Errors
    /// Returns an error if the date or zone offset cannot be stored in the two-word form.
    pub fn to_notes_time(&self) -> Result<NotesTime> {
        match self {
            KeyDate::Date(date) => NotesTime::from_date(*date),
            KeyDate::Time(time) => Ok(NotesTime::from_time(*time)),
            KeyDate::DateTime(datetime) => NotesTime::from_datetime(datetime),
        }
    }
}

impl From<NaiveDate> for KeyDate {
    fn from(value: NaiveDate) -> Self {
        KeyDate::Date(value)
    }
}

impl From<NaiveTime> for KeyDate {
    fn from(value: NaiveTime) -> Self {
        KeyDate::Time(value)
    }
}

impl From<DateTime<FixedOffset>> for KeyDate {
    fn from(value: DateTime<FixedOffset>) -> Self {
        KeyDate::DateTime(value)
    }
}

/// One lookup key.
///
/// Range keys encode correctly, but the engine does not accept them for
/// keyed lookups.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchKey {
    Text(String),
    Number(f64),
    Date(KeyDate),
    DateRange(KeyDate, KeyDate),
    /// Must hold exactly two bounds.
    NumberRange(Vec<f64>),
}

impl SearchKey {
    fn is_range(&self) -> bool {
        matches!(self, SearchKey::DateRange(..) | SearchKey::NumberRange(_))
    }

    fn to_value(&self) -> Result<ItemValue<'static>> {
        Ok(match self {
            SearchKey::Text(text) => ItemValue::text(text),
            SearchKey::Number(number) => ItemValue::Number(*number),
            SearchKey::Date(date) => ItemValue::Time(date.to_notes_time()?),
            SearchKey::DateRange(lower, upper) => ItemValue::TimeRange(vec![RangeEntry::Pair(
                lower.to_notes_time()?,
                upper.to_notes_time()?,
            )]),
            SearchKey::NumberRange(bounds) => match bounds.as_slice() {
                [lower, upper] => ItemValue::NumberRange(vec![RangeEntry::Pair(*lower, *upper)]),
                _ => {
                    return Err(NifError::InvalidArgument(format!(
                        "A number range key needs exactly 2 values, got {}",
                        bounds.len()
                    )));
                }
            },
        })
    }
}

impl From<&str> for SearchKey {
    fn from(value: &str) -> Self {
        SearchKey::Text(value.to_string())
    }
}

impl From<String> for SearchKey {
    fn from(value: String) -> Self {
        SearchKey::Text(value)
    }
}

impl From<f64> for SearchKey {
    fn from(value: f64) -> Self {
        SearchKey::Number(value)
    }
}

impl From<KeyDate> for SearchKey {
    fn from(value: KeyDate) -> Self {
        SearchKey::Date(value)
    }
}

impl From<NaiveDate> for SearchKey {
    fn from(value: NaiveDate) -> Self {
        SearchKey::Date(KeyDate::Date(value))
    }
}

impl From<NaiveTime> for SearchKey {
    fn from(value: NaiveTime) -> Self {
        SearchKey::Date(KeyDate::Time(value))
    }
}

impl From<DateTime<FixedOffset>> for SearchKey {
    fn from(value: DateTime<FixedOffset>) -> Self {
        SearchKey::Date(KeyDate::DateTime(value))
    }
}

/// Encodes lookup keys into a key buffer.
///
/// Every key is validated before any output is produced.
///
/// # Errors
/// Returns [`NifError::InvalidArgument`] if the list is empty, if any key is
/// `None`, or if a number range does not hold exactly two values.
pub fn encode_search_keys(keys: &[Option<SearchKey>]) -> Result<Vec<u8>> {
    if keys.is_empty() {
        return Err(NifError::InvalidArgument("At least one search key is required".to_string()));
    }
    let values = keys
        .iter()
        .enumerate()
        .map(|(index, key)| {
            let key = key.as_ref().ok_or_else(|| {
                NifError::InvalidArgument(format!("Search key #{} is null", index))
            })?;
            if key.is_range() {
                warn!("Search key #{} is a range; keyed lookups do not support ranges", index);
            }
            key.to_value()
        })
        .collect::<Result<Vec<_>>>()?;
    info!("Encoding {} search keys", values.len());

    // Descriptors and payloads are built as two streams and joined under the header
    let mut descriptors = BufferBuilder::with_capacity(values.len() * 4);
    let mut payloads = BufferBuilder::new();
    for value in &values {
        let start = payloads.position();
        write_value(&mut payloads, value)?;
        descriptors.put_u16(0);
        descriptors.put_u16(checked_u16("search key length", payloads.position() - start)?);
    }

    let mut out = BufferBuilder::with_capacity(4 + descriptors.position() + payloads.position());
    let total_slot = out.reserve(2);
    out.put_u16(checked_u16("search key count", values.len())?);
    out.put_bytes(descriptors.as_slice());
    out.put_bytes(payloads.as_slice());
    let total = out.position();
    out.patch(total_slot, "search key buffer length", total)?;

    debug!("Search key buffer: {} bytes", total);
    Ok(out.finish())
}

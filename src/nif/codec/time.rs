//! Two-word timestamp ("innards") conversion.
//!
//! Word 0 holds hundredths of a second since midnight GMT. Word 1 holds the
//! Julian day number in bits 0-23 and the zone the value was written in above
//! that. Either word may be the all-ones sentinel, meaning the value carries
//! no time ([`ALLDAY`]) or no date ([`ANYDAY`]).

use std::fmt;

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike,
};

use crate::nif::utils::{BufferBuilder, ByteCursor};
use crate::nif::types::error::{NifError, Result};

/// Word 0 sentinel: the value has no time of day.
pub const ALLDAY: u32 = 0xFFFF_FFFF;
/// Word 1 sentinel: the value has no date.
pub const ANYDAY: u32 = 0xFFFF_FFFF;

/// Julian day number of 0000-12-31 in the proleptic Gregorian calendar.
const JULIAN_DAY_OFFSET: i64 = 1_721_425;
const TICKS_PER_DAY: u32 = 8_640_000;

const JULIAN_MASK: u32 = 0x00FF_FFFF;
const ZONE_HOURS_SHIFT: u32 = 24;
const ZONE_HOURS_MASK: u32 = 0x0F;
const ZONE_QUARTER_SECONDS: u32 = 900;
const ZONE_QUARTERS_SHIFT: u32 = 28;
const ZONE_QUARTERS_MASK: u32 = 0x03;
const ZONE_EAST_BIT: u32 = 1 << 30;
const ZONE_DST_BIT: u32 = 1 << 31;

/// Encoded size of a timestamp on the wire.
pub const TIME_SIZE: usize = 8;

/// A timestamp in its two-word wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotesTime {
    pub innards: [u32; 2],
}

impl NotesTime {
    pub const fn from_innards(innards: [u32; 2]) -> Self {
        Self { innards }
    }

    /// A date-only value. The time word is [`ALLDAY`], not midnight.
    ///
    /// # Errors
    /// Returns [`NifError::Overflow`] if the Julian day does not fit 24 bits.
    pub fn from_date(date: NaiveDate) -> Result<Self> {
        Ok(Self {
            innards: [ALLDAY, julian_day(date)?],
        })
    }

    /// A time-only value. The date word is [`ANYDAY`].
    pub fn from_time(time: NaiveTime) -> Self {
        Self {
            innards: [ticks(time), ANYDAY],
        }
    }

    /// A full date-time. The instant is stored in GMT and the offset in the zone bits.
    ///
    /// # Errors
    /// - [`NifError::Overflow`] if the Julian day does not fit 24 bits
    /// - [`NifError::InvalidArgument`] if the offset is 16 hours or more, or not
    ///   a whole number of quarter hours
    pub fn from_datetime(value: &DateTime<FixedOffset>) -> Result<Self> {
        let utc = value.naive_utc();
        let offset = value.offset().local_minus_utc();
        Ok(Self {
            innards: [ticks(utc.time()), julian_day(utc.date())? | zone_bits(offset)?],
        })
    }

    pub fn has_date(&self) -> bool {
        self.innards[1] != ANYDAY
    }

    pub fn has_time(&self) -> bool {
        self.innards[0] != ALLDAY
    }

    /// The stored GMT date, if any.
    pub fn date(&self) -> Option<NaiveDate> {
        if !self.has_date() {
            return None;
        }
        let days = (self.innards[1] & JULIAN_MASK) as i64 - JULIAN_DAY_OFFSET;
        NaiveDate::from_num_days_from_ce_opt(i32::try_from(days).ok()?)
    }

    /// The stored GMT time of day, if any.
    pub fn time(&self) -> Option<NaiveTime> {
        if !self.has_time() || self.innards[0] >= TICKS_PER_DAY {
            return None;
        }
        let ticks = self.innards[0];
        NaiveTime::from_num_seconds_from_midnight_opt(ticks / 100, (ticks % 100) * 10_000_000)
    }

    /// The zone offset recorded in the date word, in seconds east of GMT.
    ///
    /// Daylight saving adds one hour.
    pub fn zone_offset_seconds(&self) -> i32 {
        if !self.has_date() {
            return 0;
        }
        let word = self.innards[1];
        let hours = ((word >> ZONE_HOURS_SHIFT) & ZONE_HOURS_MASK) as i32;
        let quarters = ((word >> ZONE_QUARTERS_SHIFT) & ZONE_QUARTERS_MASK) as i32;
        let magnitude = hours * 3600 + quarters * 900;
        let standard = if word & ZONE_EAST_BIT != 0 { magnitude } else { -magnitude };
        if word & ZONE_DST_BIT != 0 {
            standard + 3600
        } else {
            standard
        }
    }

    /// The full date-time in the zone it was written in; `None` unless both words are set.
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let utc = NaiveDateTime::new(self.date()?, self.time()?);
        let offset = FixedOffset::east_opt(self.zone_offset_seconds())?;
        Some(offset.from_utc_datetime(&utc))
    }

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            innards: [cursor.read_u32()?, cursor.read_u32()?],
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) {
        out.put_u32(self.innards[0]);
        out.put_u32(self.innards[1]);
    }
}

impl TryFrom<NaiveDate> for NotesTime {
    type Error = NifError;
    fn try_from(value: NaiveDate) -> Result<Self> {
        Self::from_date(value)
    }
}

impl From<NaiveTime> for NotesTime {
    fn from(value: NaiveTime) -> Self {
        Self::from_time(value)
    }
}

impl TryFrom<DateTime<FixedOffset>> for NotesTime {
    type Error = NifError;
    fn try_from(value: DateTime<FixedOffset>) -> Result<Self> {
        Self::from_datetime(&value)
    }
}

impl fmt::Display for NotesTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(datetime) = self.to_datetime() {
            return write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S%.3f %:z"));
        }
        match (self.date(), self.time()) {
            (Some(date), None) => write!(f, "{}", date),
            (None, Some(time)) => write!(f, "{}", time),
            _ => write!(f, "[{:08X}:{:08X}]", self.innards[0], self.innards[1]),
        }
    }
}

fn julian_day(date: NaiveDate) -> Result<u32> {
    let day = date.num_days_from_ce() as i64 + JULIAN_DAY_OFFSET;
    if !(0..=JULIAN_MASK as i64).contains(&day) {
        return Err(NifError::Overflow {
            field: "julian day",
            value: day.unsigned_abs(),
            max: JULIAN_MASK as u64,
        });
    }
    Ok(day as u32)
}

fn ticks(time: NaiveTime) -> u32 {
    // Leap-second nanoseconds (>= 1s) are folded into the last hundredth.
    let hundredths = (time.nanosecond() / 10_000_000).min(99);
    time.num_seconds_from_midnight() * 100 + hundredths
}

fn zone_bits(offset_seconds: i32) -> Result<u32> {
    let magnitude = offset_seconds.unsigned_abs();
    let hours = magnitude / 3600;
    if hours > ZONE_HOURS_MASK || magnitude % ZONE_QUARTER_SECONDS != 0 {
        return Err(NifError::InvalidArgument(format!(
            "Zone offset of {} seconds cannot be stored in quarter hours below 16 hours",
            offset_seconds
        )));
    }
    let quarters = (magnitude % 3600) / ZONE_QUARTER_SECONDS;
    let mut bits = (hours << ZONE_HOURS_SHIFT) | (quarters << ZONE_QUARTERS_SHIFT);
    if offset_seconds > 0 {
        bits |= ZONE_EAST_BIT;
    }
    Ok(bits)
}

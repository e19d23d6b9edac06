//! Fixed records of the view format and their variable-length tails.

use log::trace;

use crate::nif::codec::value::LmbcsText;
use crate::nif::types::error::Result;
use crate::nif::types::models::Unid;
use crate::nif::utils::{BufferBuilder, ByteCursor, checked_u8, checked_u16, checked_u32};

pub const VIEW_FORMAT_VERSION: u8 = 1;

pub const COLUMN_FORMAT_SIGNATURE: u16 = 0x4356;
pub const COLUMN_FORMAT2_SIGNATURE: u16 = 0x4357;
pub const COLUMN_FORMAT3_SIGNATURE: u16 = 0x4358;
pub const COLUMN_FORMAT4_SIGNATURE: u16 = 0x4359;
pub const COLUMN_FORMAT5_SIGNATURE: u16 = 0x435A;
pub const COLUMN_FORMAT6_SIGNATURE: u16 = 0x435B;
pub const TABLE_FORMAT2_SIGNATURE: u16 = 0x2BAD;
pub const BACKGROUND_SIGNATURE: u16 = 0xFFF1;

/// Column `flags3` bits announcing the optional per-column parts.
pub mod flags3 {
    pub const HIDE_WHEN_FORMULA: u16 = 0x0008;
    pub const TWISTIE_RESOURCE: u16 = 0x0010;
    pub const DATE_FORMAT: u16 = 0x0040;
    pub const NUMBER_FORMAT: u16 = 0x0080;
    pub const NAMES_FORMAT: u16 = 0x0800;
    pub const SHARED_COLUMN: u16 = 0x2000;
    pub const FORMAT6: u16 = 0x8000;

    /// Bits the encoder derives from the parts a column carries.
    pub const PRESENCE_MASK: u16 = HIDE_WHEN_FORMULA
        | TWISTIE_RESOURCE
        | DATE_FORMAT
        | NUMBER_FORMAT
        | NAMES_FORMAT
        | SHARED_COLUMN
        | FORMAT6;
}

fn expect_signature(cursor: &ByteCursor<'_>, found: u16, expected: u16, record: &str) -> Result<()> {
    if found != expected {
        return Err(cursor.corrupt_at(
            cursor.position().saturating_sub(2),
            format!(
                "{} signature {:#06x} does not match {:#06x}",
                record, found, expected
            ),
        ));
    }
    Ok(())
}

fn read_text(cursor: &mut ByteCursor<'_>, len: usize) -> Result<LmbcsText<'static>> {
    Ok(LmbcsText::from_bytes(cursor.take(len)?.to_vec()))
}

/// A color entry: flags plus four components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub flags: u16,
    pub components: [u8; 4],
}

impl Color {
    pub const SIZE: usize = 6;

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let flags = cursor.read_u16()?;
        let raw = cursor.take(4)?;
        Ok(Self {
            flags,
            components: [raw[0], raw[1], raw[2], raw[3]],
        })
    }

    fn write(&self, out: &mut BufferBuilder) {
        out.put_u16(self.flags);
        out.put_bytes(&self.components);
    }
}

/// Legacy number display settings embedded in the column format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumberFormat {
    pub digits: u8,
    pub format: u8,
    pub attributes: u8,
    pub unused: u8,
}

/// Legacy time display settings embedded in the column format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeFormat {
    pub date: u8,
    pub time: u8,
    pub zone: u8,
    pub structure: u8,
}

/// Stage 1: table-level format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFormat {
    pub item_sequence_number: u16,
    pub flags: u16,
    pub flags2: u16,
}

impl TableFormat {
    pub const SIZE: usize = 10;

    /// Returns the record and the declared column count.
    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<(Self, usize)> {
        let version = cursor.read_u8()?;
        if version != VIEW_FORMAT_VERSION {
            return Err(cursor.corrupt_at(
                cursor.position() - 1,
                format!("unsupported view format version {}", version),
            ));
        }
        let _spare = cursor.read_u8()?;
        let columns = cursor.read_u16()? as usize;
        let table = Self {
            item_sequence_number: cursor.read_u16()?,
            flags: cursor.read_u16()?,
            flags2: cursor.read_u16()?,
        };
        Ok((table, columns))
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder, columns: usize) -> Result<()> {
        out.put_u8(VIEW_FORMAT_VERSION);
        out.put_u8(0);
        out.put_u16(checked_u16("column count", columns)?);
        out.put_u16(self.item_sequence_number);
        out.put_u16(self.flags);
        out.put_u16(self.flags2);
        Ok(())
    }
}

/// Stage 2: basic column geometry plus item name, title, formula and constant value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnFormat {
    pub flags1: u16,
    pub display_width: u16,
    pub font_id: u32,
    pub flags2: u16,
    pub number_format: NumberFormat,
    pub time_format: TimeFormat,
    pub format_data_type: u16,
    pub list_separator: u16,
    pub item_name: LmbcsText<'static>,
    pub title: LmbcsText<'static>,
    /// Compiled formula, kept verbatim.
    pub formula: Vec<u8>,
    pub constant_value: Vec<u8>,
}

impl ColumnFormat {
    pub const SIZE: usize = 32;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        // Tentative read of the fixed part to learn the tail sizes
        let fixed = cursor.peek(Self::SIZE)?;
        let size_at = |offset: usize| u16::from_le_bytes([fixed[offset], fixed[offset + 1]]) as usize;
        let tail = size_at(4) + size_at(6) + size_at(8) + size_at(10);

        let mut record = cursor.bounded(Self::SIZE + tail)?;
        let signature = record.read_u16()?;
        expect_signature(&record, signature, COLUMN_FORMAT_SIGNATURE, "column format")?;
        let flags1 = record.read_u16()?;
        let item_name_size = record.read_u16()? as usize;
        let title_size = record.read_u16()? as usize;
        let formula_size = record.read_u16()? as usize;
        let constant_value_size = record.read_u16()? as usize;
        let display_width = record.read_u16()?;
        let font_id = record.read_u32()?;
        let flags2 = record.read_u16()?;
        let number_format = NumberFormat {
            digits: record.read_u8()?,
            format: record.read_u8()?,
            attributes: record.read_u8()?,
            unused: record.read_u8()?,
        };
        let time_format = TimeFormat {
            date: record.read_u8()?,
            time: record.read_u8()?,
            zone: record.read_u8()?,
            structure: record.read_u8()?,
        };
        let format_data_type = record.read_u16()?;
        let list_separator = record.read_u16()?;

        let column = Self {
            flags1,
            display_width,
            font_id,
            flags2,
            number_format,
            time_format,
            format_data_type,
            list_separator,
            item_name: read_text(&mut record, item_name_size)?,
            title: read_text(&mut record, title_size)?,
            formula: record.take(formula_size)?.to_vec(),
            constant_value: record.take(constant_value_size)?.to_vec(),
        };
        trace!(
            "Column format: item='{}', title='{}', formula={} bytes",
            column.item_name, column.title, formula_size
        );
        Ok(column)
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) -> Result<()> {
        out.put_u16(COLUMN_FORMAT_SIGNATURE);
        out.put_u16(self.flags1);
        out.put_u16(checked_u16("column item name", self.item_name.len())?);
        out.put_u16(checked_u16("column title", self.title.len())?);
        out.put_u16(checked_u16("column formula", self.formula.len())?);
        out.put_u16(checked_u16("column constant value", self.constant_value.len())?);
        out.put_u16(self.display_width);
        out.put_u32(self.font_id);
        out.put_u16(self.flags2);
        out.put_bytes(&[
            self.number_format.digits,
            self.number_format.format,
            self.number_format.attributes,
            self.number_format.unused,
        ]);
        out.put_bytes(&[
            self.time_format.date,
            self.time_format.time,
            self.time_format.zone,
            self.time_format.structure,
        ]);
        out.put_u16(self.format_data_type);
        out.put_u16(self.list_separator);
        out.put_bytes(self.item_name.as_bytes());
        out.put_bytes(self.title.as_bytes());
        out.put_bytes(&self.formula);
        out.put_bytes(&self.constant_value);
        Ok(())
    }
}

/// Stage 3: table-level fonts, colors and row layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFormat2 {
    pub background_color: u16,
    pub v2_border_color: u16,
    pub title_font: u32,
    pub unread_font: u32,
    pub totals_font: u32,
    pub auto_update_seconds: u16,
    pub v2_background_color: u16,
    pub lines_per_row: u8,
    pub lines_per_header: u8,
    pub spacing: u8,
    pub min_rows: u8,
}

impl TableFormat2 {
    pub const SIZE: usize = 28;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let length = cursor.read_u16()? as usize;
        if length < Self::SIZE {
            return Err(cursor.corrupt_at(start, format!("table format 2 length {} is below {}", length, Self::SIZE)));
        }
        let background_color = cursor.read_u16()?;
        let v2_border_color = cursor.read_u16()?;
        let title_font = cursor.read_u32()?;
        let unread_font = cursor.read_u32()?;
        let totals_font = cursor.read_u32()?;
        let auto_update_seconds = cursor.read_u16()?;
        let v2_background_color = cursor.read_u16()?;
        let signature = cursor.read_u16()?;
        expect_signature(cursor, signature, TABLE_FORMAT2_SIGNATURE, "table format 2")?;
        let table = Self {
            background_color,
            v2_border_color,
            title_font,
            unread_font,
            totals_font,
            auto_update_seconds,
            v2_background_color,
            lines_per_row: cursor.read_u8()?,
            lines_per_header: cursor.read_u8()?,
            spacing: cursor.read_u8()?,
            min_rows: cursor.read_u8()?,
        };
        cursor.skip(length - Self::SIZE)?;
        Ok(table)
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) {
        out.put_u16(Self::SIZE as u16);
        out.put_u16(self.background_color);
        out.put_u16(self.v2_border_color);
        out.put_u32(self.title_font);
        out.put_u32(self.unread_font);
        out.put_u32(self.totals_font);
        out.put_u16(self.auto_update_seconds);
        out.put_u16(self.v2_background_color);
        out.put_u16(TABLE_FORMAT2_SIGNATURE);
        out.put_bytes(&[self.lines_per_row, self.lines_per_header, self.spacing, self.min_rows]);
    }
}

/// Stage 3: per-column fonts, colors, resort target and the `flags3` presence bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnFormat2 {
    pub header_font_id: u32,
    pub resort_to_view: Unid,
    pub second_resort_column: u16,
    pub flags3: u16,
    pub custom_order: u16,
    pub custom_hidden_flags: u16,
    pub column_color: Color,
    pub header_font_color: Color,
}

/// Sizes of the stage 4 blobs announced by a [`ColumnFormat2`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ColumnBlobSizes {
    pub hide_when_formula: usize,
    pub twistie_resource: usize,
}

impl ColumnFormat2 {
    pub const SIZE: usize = 46;

    pub fn has(&self, bit: u16) -> bool {
        self.flags3 & bit != 0
    }

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<(Self, ColumnBlobSizes)> {
        let signature = cursor.read_u16()?;
        expect_signature(cursor, signature, COLUMN_FORMAT2_SIGNATURE, "column format 2")?;
        let header_font_id = cursor.read_u32()?;
        let resort_to_view = Unid::read(cursor)?;
        let second_resort_column = cursor.read_u16()?;
        let flags3 = cursor.read_u16()?;
        let sizes = ColumnBlobSizes {
            hide_when_formula: cursor.read_u16()? as usize,
            twistie_resource: cursor.read_u16()? as usize,
        };
        let format2 = Self {
            header_font_id,
            resort_to_view,
            second_resort_column,
            flags3,
            custom_order: cursor.read_u16()?,
            custom_hidden_flags: cursor.read_u16()?,
            column_color: Color::read(cursor)?,
            header_font_color: Color::read(cursor)?,
        };
        Ok((format2, sizes))
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder, sizes: ColumnBlobSizes) -> Result<()> {
        out.put_u16(COLUMN_FORMAT2_SIGNATURE);
        out.put_u32(self.header_font_id);
        self.resort_to_view.write(out);
        out.put_u16(self.second_resort_column);
        out.put_u16(self.flags3);
        out.put_u16(checked_u16("hide-when formula", sizes.hide_when_formula)?);
        out.put_u16(checked_u16("twistie resource", sizes.twistie_resource)?);
        out.put_u16(self.custom_order);
        out.put_u16(self.custom_hidden_flags);
        self.column_color.write(out);
        self.header_font_color.write(out);
        Ok(())
    }
}

/// Stage 5: table colors and margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFormat3 {
    pub flags: u32,
    pub background_color: Color,
    pub alternate_background_color: Color,
    pub grid_color: Color,
    pub margin_top: u16,
    pub margin_left: u16,
    pub margin_right: u16,
    pub margin_bottom: u16,
    pub margin_background_color: Color,
    pub header_background_color: Color,
    pub margin_top_under: u16,
    pub unread_color: Color,
    pub totals_color: Color,
    pub max_rows: u16,
}

impl TableFormat3 {
    pub const SIZE: usize = 60;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let length = cursor.peek_u16().unwrap_or_default() as usize;
        if length < Self::SIZE {
            return Err(cursor.corrupt_at(start, format!("table format 3 length {} is below {}", length, Self::SIZE)));
        }
        let mut record = cursor.bounded(length)?;
        record.skip(2)?;
        Ok(Self {
            flags: record.read_u32()?,
            background_color: Color::read(&mut record)?,
            alternate_background_color: Color::read(&mut record)?,
            grid_color: Color::read(&mut record)?,
            margin_top: record.read_u16()?,
            margin_left: record.read_u16()?,
            margin_right: record.read_u16()?,
            margin_bottom: record.read_u16()?,
            margin_background_color: Color::read(&mut record)?,
            header_background_color: Color::read(&mut record)?,
            margin_top_under: record.read_u16()?,
            unread_color: Color::read(&mut record)?,
            totals_color: Color::read(&mut record)?,
            max_rows: record.read_u16()?,
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) {
        out.put_u16(Self::SIZE as u16);
        out.put_u32(self.flags);
        self.background_color.write(out);
        self.alternate_background_color.write(out);
        self.grid_color.write(out);
        out.put_u16(self.margin_top);
        out.put_u16(self.margin_left);
        out.put_u16(self.margin_right);
        out.put_u16(self.margin_bottom);
        self.margin_background_color.write(out);
        self.header_background_color.write(out);
        out.put_u16(self.margin_top_under);
        self.unread_color.write(out);
        self.totals_color.write(out);
        out.put_u16(self.max_rows);
    }
}

/// Stage 6: table repeat settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFormat4 {
    pub flags: u32,
    pub repeat_type: u8,
}

impl TableFormat4 {
    pub const SIZE: usize = 12;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let length = cursor.peek_u16().unwrap_or_default() as usize;
        if length < Self::SIZE {
            return Err(cursor.corrupt_at(start, format!("table format 4 length {} is below {}", length, Self::SIZE)));
        }
        let mut record = cursor.bounded(length)?;
        record.skip(2)?;
        let flags = record.read_u32()?;
        let repeat_type = record.read_u8()?;
        Ok(Self { flags, repeat_type })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) {
        out.put_u16(Self::SIZE as u16);
        out.put_u32(self.flags);
        out.put_u8(self.repeat_type);
        out.put_u8(0);
        out.put_u32(0);
    }
}

/// Stage 7: background image resource, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackgroundResource {
    pub payload: Vec<u8>,
}

impl BackgroundResource {
    const HEADER_SIZE: usize = 4;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let signature = cursor.read_u16()?;
        expect_signature(cursor, signature, BACKGROUND_SIGNATURE, "background resource")?;
        let length = cursor.read_u16()? as usize;
        if length < Self::HEADER_SIZE {
            return Err(cursor.corrupt_at(start, format!("background record length {} is too short", length)));
        }
        Ok(Self {
            payload: cursor.take(length - Self::HEADER_SIZE)?.to_vec(),
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) -> Result<()> {
        out.put_u16(BACKGROUND_SIGNATURE);
        out.put_u16(checked_u16("background resource", Self::HEADER_SIZE + self.payload.len())?);
        out.put_bytes(&self.payload);
        Ok(())
    }
}

/// Stage 8: per-column date/time display rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnDateFormat {
    pub preference: u16,
    pub flags: u32,
    pub flags2: u32,
    pub day_of_week: u8,
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub date_show: u8,
    pub date_special: u8,
    pub time_show: u8,
    pub time_zone: u8,
    pub date_separator1: LmbcsText<'static>,
    pub date_separator2: LmbcsText<'static>,
    pub date_separator3: LmbcsText<'static>,
    pub time_separator: LmbcsText<'static>,
}

impl ColumnDateFormat {
    pub const SIZE: usize = 26;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let fixed = cursor.peek(Self::SIZE)?;
        let tail: usize = fixed[16..20].iter().map(|&b| b as usize).sum();

        let mut record = cursor.bounded(Self::SIZE + tail)?;
        let signature = record.read_u16()?;
        expect_signature(&record, signature, COLUMN_FORMAT3_SIGNATURE, "column date format")?;
        let preference = record.read_u16()?;
        let flags = record.read_u32()?;
        let flags2 = record.read_u32()?;
        let day_of_week = record.read_u8()?;
        let year = record.read_u8()?;
        let month = record.read_u8()?;
        let day = record.read_u8()?;
        let separator_sizes = [
            record.read_u8()? as usize,
            record.read_u8()? as usize,
            record.read_u8()? as usize,
            record.read_u8()? as usize,
        ];
        let date_show = record.read_u8()?;
        let date_special = record.read_u8()?;
        let time_show = record.read_u8()?;
        let time_zone = record.read_u8()?;
        let _unused = record.read_u16()?;
        Ok(Self {
            preference,
            flags,
            flags2,
            day_of_week,
            year,
            month,
            day,
            date_show,
            date_special,
            time_show,
            time_zone,
            date_separator1: read_text(&mut record, separator_sizes[0])?,
            date_separator2: read_text(&mut record, separator_sizes[1])?,
            date_separator3: read_text(&mut record, separator_sizes[2])?,
            time_separator: read_text(&mut record, separator_sizes[3])?,
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) -> Result<()> {
        out.put_u16(COLUMN_FORMAT3_SIGNATURE);
        out.put_u16(self.preference);
        out.put_u32(self.flags);
        out.put_u32(self.flags2);
        out.put_bytes(&[self.day_of_week, self.year, self.month, self.day]);
        out.put_u8(checked_u8("date separator 1", self.date_separator1.len())?);
        out.put_u8(checked_u8("date separator 2", self.date_separator2.len())?);
        out.put_u8(checked_u8("date separator 3", self.date_separator3.len())?);
        out.put_u8(checked_u8("time separator", self.time_separator.len())?);
        out.put_bytes(&[self.date_show, self.date_special, self.time_show, self.time_zone]);
        out.put_u16(0);
        out.put_bytes(self.date_separator1.as_bytes());
        out.put_bytes(self.date_separator2.as_bytes());
        out.put_bytes(self.date_separator3.as_bytes());
        out.put_bytes(self.time_separator.as_bytes());
        Ok(())
    }
}

/// Stage 9: per-column number display rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnNumberFormat {
    pub multiplier: f64,
    pub digits: u8,
    pub format: u8,
    pub attributes: u16,
    pub thousands_group_size: u16,
    pub currency_flags: u16,
    pub iso_country: u32,
    pub decimal_symbol: LmbcsText<'static>,
    pub thousands_separator: LmbcsText<'static>,
    pub negative_symbol: LmbcsText<'static>,
    pub currency_symbol: LmbcsText<'static>,
}

impl ColumnNumberFormat {
    pub const SIZE: usize = 32;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let fixed = cursor.peek(Self::SIZE)?;
        let size_at = |offset: usize| u16::from_le_bytes([fixed[offset], fixed[offset + 1]]) as usize;
        let tail = size_at(14) + size_at(16) + size_at(18) + size_at(24);

        let mut record = cursor.bounded(Self::SIZE + tail)?;
        let signature = record.read_u16()?;
        expect_signature(&record, signature, COLUMN_FORMAT4_SIGNATURE, "column number format")?;
        let multiplier = record.read_f64()?;
        let digits = record.read_u8()?;
        let format = record.read_u8()?;
        let attributes = record.read_u16()?;
        let decimal_len = record.read_u16()? as usize;
        let thousands_len = record.read_u16()? as usize;
        let negative_len = record.read_u16()? as usize;
        let thousands_group_size = record.read_u16()?;
        let currency_flags = record.read_u16()?;
        let currency_len = record.read_u16()? as usize;
        let iso_country = record.read_u32()?;
        let _unused = record.read_u16()?;
        Ok(Self {
            multiplier,
            digits,
            format,
            attributes,
            thousands_group_size,
            currency_flags,
            iso_country,
            decimal_symbol: read_text(&mut record, decimal_len)?,
            thousands_separator: read_text(&mut record, thousands_len)?,
            negative_symbol: read_text(&mut record, negative_len)?,
            currency_symbol: read_text(&mut record, currency_len)?,
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) -> Result<()> {
        out.put_u16(COLUMN_FORMAT4_SIGNATURE);
        out.put_f64(self.multiplier);
        out.put_u8(self.digits);
        out.put_u8(self.format);
        out.put_u16(self.attributes);
        out.put_u16(checked_u16("decimal symbol", self.decimal_symbol.len())?);
        out.put_u16(checked_u16("thousands separator", self.thousands_separator.len())?);
        out.put_u16(checked_u16("negative symbol", self.negative_symbol.len())?);
        out.put_u16(self.thousands_group_size);
        out.put_u16(self.currency_flags);
        out.put_u16(checked_u16("currency symbol", self.currency_symbol.len())?);
        out.put_u32(self.iso_country);
        out.put_u16(0);
        out.put_bytes(self.decimal_symbol.as_bytes());
        out.put_bytes(self.thousands_separator.as_bytes());
        out.put_bytes(self.negative_symbol.as_bytes());
        out.put_bytes(self.currency_symbol.as_bytes());
        Ok(())
    }
}

/// Stage 10: per-column names display rules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnNamesFormat {
    pub flags: u32,
    /// Column holding the distinguished name used for online presence.
    pub dn_column_name: LmbcsText<'static>,
}

impl ColumnNamesFormat {
    pub const SIZE: usize = 28;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let fixed = cursor.peek(Self::SIZE)?;
        let length = u32::from_le_bytes([fixed[2], fixed[3], fixed[4], fixed[5]]) as usize;
        let dn_len = u16::from_le_bytes([fixed[10], fixed[11]]) as usize;
        if length < Self::SIZE + dn_len {
            return Err(cursor.corrupt_at(
                start,
                format!("names format length {} cannot hold a {}-byte column name", length, dn_len),
            ));
        }

        let mut record = cursor.bounded(length)?;
        let signature = record.read_u16()?;
        expect_signature(&record, signature, COLUMN_FORMAT5_SIGNATURE, "column names format")?;
        record.skip(4)?;
        let flags = record.read_u32()?;
        record.skip(2 + 16)?;
        let dn_column_name = read_text(&mut record, dn_len)?;
        if !record.is_empty() {
            trace!("Skipping {} unknown bytes in names format", record.remaining());
        }
        Ok(Self {
            flags,
            dn_column_name,
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) -> Result<()> {
        let dn_len = checked_u16("names format column", self.dn_column_name.len())?;
        out.put_u16(COLUMN_FORMAT5_SIGNATURE);
        out.put_u32(checked_u32("names format", Self::SIZE + dn_len as usize)?);
        out.put_u32(self.flags);
        out.put_u16(dn_len);
        out.put_bytes(&[0u8; 16]);
        out.put_bytes(self.dn_column_name.as_bytes());
        Ok(())
    }
}

/// Stage 13: extended column format with opaque trailing data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnFormat6 {
    pub flags: u32,
    pub if_view_is_narrow_do: u16,
    pub attach_point_column: u16,
    /// Bytes following the fixed record, kept verbatim.
    pub extension: Vec<u8>,
}

impl ColumnFormat6 {
    pub const SIZE: usize = 30;

    pub(crate) fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let fixed = cursor.peek(Self::SIZE)?;
        let length = u32::from_le_bytes([fixed[2], fixed[3], fixed[4], fixed[5]]) as usize;
        if length < Self::SIZE {
            return Err(cursor.corrupt_at(start, format!("format 6 length {} is below {}", length, Self::SIZE)));
        }

        let mut record = cursor.bounded(length)?;
        let signature = record.read_u16()?;
        expect_signature(&record, signature, COLUMN_FORMAT6_SIGNATURE, "column format 6")?;
        record.skip(4)?;
        let flags = record.read_u32()?;
        let if_view_is_narrow_do = record.read_u16()?;
        let attach_point_column = record.read_u16()?;
        record.skip(16)?;
        let extension = record.take(length - Self::SIZE)?.to_vec();
        Ok(Self {
            flags,
            if_view_is_narrow_do,
            attach_point_column,
            extension,
        })
    }

    pub(crate) fn write(&self, out: &mut BufferBuilder) -> Result<()> {
        out.put_u16(COLUMN_FORMAT6_SIGNATURE);
        out.put_u32(checked_u32("format 6", Self::SIZE + self.extension.len())?);
        out.put_u32(self.flags);
        out.put_u16(self.if_view_is_narrow_do);
        out.put_u16(self.attach_point_column);
        out.put_bytes(&[0u8; 16]);
        out.put_bytes(&self.extension);
        Ok(())
    }
}

/// Reads a `u16`-length-prefixed LMBCS string.
pub(crate) fn read_prefixed_text(cursor: &mut ByteCursor<'_>) -> Result<LmbcsText<'static>> {
    let len = cursor.read_u16()? as usize;
    read_text(cursor, len)
}

pub(crate) fn write_prefixed_text(out: &mut BufferBuilder, field: &'static str, text: &LmbcsText<'_>) -> Result<()> {
    out.put_u16(checked_u16(field, text.len())?);
    out.put_bytes(text.as_bytes());
    Ok(())
}

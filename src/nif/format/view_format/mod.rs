//! View format codec.
//!
//! A view format is a chain of stages. The first two are mandatory; every
//! later stage is attempted only while bytes remain, because older views
//! simply end early. From stage 4 on, per-column parts are also gated by the
//! column's `flags3` bits.
//!
//! ```text
//!  1  table format
//!  2  column format × columns          (+ name, title, formula, constant)
//!  3  table format 2, column format 2 × columns
//!  4  hide-when formula / twistie resource, per flagged column
//!  5  table format 3
//!  6  table format 4
//!  7  background resource               (recognised by signature)
//!  8  date format, per flagged column
//!  9  number format, per flagged column
//! 10  names format, per flagged column
//! 11  shared column alias, per flagged column
//! 12  legacy alias remnants             (skipped)
//! 13  format 6, per flagged column
//! ```
//!
//! The decoder and the encoder walk the same [`STAGES`] list, so both always
//! agree on the order of the optional sections.

pub mod structs;

use log::{debug, info, trace, warn};

use self::structs::*;
use crate::nif::codec::value::LmbcsText;
use crate::nif::types::error::{NifError, Result};
use crate::nif::utils::{BufferBuilder, ByteCursor};

/// A complete view format.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewFormat {
    pub table: TableFormat,
    pub table2: Option<TableFormat2>,
    pub table3: Option<TableFormat3>,
    pub table4: Option<TableFormat4>,
    pub background: Option<BackgroundResource>,
    pub columns: Vec<ViewColumn>,
}

/// One column and all of its optional extension parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewColumn {
    pub format: ColumnFormat,
    pub format2: Option<ColumnFormat2>,
    pub hide_when_formula: Option<Vec<u8>>,
    pub twistie_resource: Option<Vec<u8>>,
    pub date_format: Option<ColumnDateFormat>,
    pub number_format: Option<ColumnNumberFormat>,
    pub names_format: Option<ColumnNamesFormat>,
    pub shared_column_alias: Option<LmbcsText<'static>>,
    pub format6: Option<ColumnFormat6>,
}

impl ViewColumn {
    pub fn new(format: ColumnFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// The `flags3` word as it will be encoded.
    ///
    /// Presence bits follow the parts the column carries; every other bit is
    /// taken from `format2`.
    pub fn flags3(&self) -> u16 {
        let passthrough = self.format2.map_or(0, |f| f.flags3) & !flags3::PRESENCE_MASK;
        let presence = [
            (self.hide_when_formula.is_some(), flags3::HIDE_WHEN_FORMULA),
            (self.twistie_resource.is_some(), flags3::TWISTIE_RESOURCE),
            (self.date_format.is_some(), flags3::DATE_FORMAT),
            (self.number_format.is_some(), flags3::NUMBER_FORMAT),
            (self.names_format.is_some(), flags3::NAMES_FORMAT),
            (self.shared_column_alias.is_some(), flags3::SHARED_COLUMN),
            (self.format6.is_some(), flags3::FORMAT6),
        ];
        presence
            .iter()
            .filter(|(present, _)| *present)
            .fold(passthrough, |acc, (_, bit)| acc | bit)
    }

    fn encoded_format2(&self) -> ColumnFormat2 {
        ColumnFormat2 {
            flags3: self.flags3(),
            ..self.format2.unwrap_or_default()
        }
    }

    fn blob_sizes(&self) -> ColumnBlobSizes {
        ColumnBlobSizes {
            hide_when_formula: self.hide_when_formula.as_ref().map_or(0, Vec::len),
            twistie_resource: self.twistie_resource.as_ref().map_or(0, Vec::len),
        }
    }
}

/// The stages of a view format, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    TableFormat,
    ColumnFormats,
    TableFormat2,
    HideWhenAndTwisties,
    TableFormat3,
    TableFormat4,
    Background,
    DateFormats,
    NumberFormats,
    NamesFormats,
    SharedColumnAliases,
    GhostAliases,
    ExtendedFormats,
}

const STAGES: [Stage; 13] = [
    Stage::TableFormat,
    Stage::ColumnFormats,
    Stage::TableFormat2,
    Stage::HideWhenAndTwisties,
    Stage::TableFormat3,
    Stage::TableFormat4,
    Stage::Background,
    Stage::DateFormats,
    Stage::NumberFormats,
    Stage::NamesFormats,
    Stage::SharedColumnAliases,
    Stage::GhostAliases,
    Stage::ExtendedFormats,
];

impl Stage {
    fn is_mandatory(self) -> bool {
        matches!(self, Stage::TableFormat | Stage::ColumnFormats)
    }

    /// Whether `format` holds anything this stage has to write.
    fn has_content(self, format: &ViewFormat) -> bool {
        let any = |f: fn(&ViewColumn) -> bool| format.columns.iter().any(f);
        match self {
            Stage::TableFormat | Stage::ColumnFormats => true,
            Stage::TableFormat2 => format.table2.is_some() || any(|c| c.format2.is_some()),
            Stage::HideWhenAndTwisties => {
                any(|c| c.hide_when_formula.is_some() || c.twistie_resource.is_some())
            }
            Stage::TableFormat3 => format.table3.is_some(),
            Stage::TableFormat4 => format.table4.is_some(),
            Stage::Background => format.background.is_some(),
            Stage::DateFormats => any(|c| c.date_format.is_some()),
            Stage::NumberFormats => any(|c| c.number_format.is_some()),
            Stage::NamesFormats => any(|c| c.names_format.is_some()),
            Stage::SharedColumnAliases => any(|c| c.shared_column_alias.is_some()),
            Stage::GhostAliases => false,
            Stage::ExtendedFormats => any(|c| c.format6.is_some()),
        }
    }
}

struct Decoder<'a> {
    cursor: ByteCursor<'a>,
    format: ViewFormat,
    column_count: usize,
    blob_sizes: Vec<ColumnBlobSizes>,
}

impl<'a> Decoder<'a> {
    fn run(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::TableFormat => {
                self.cursor.set_structure("view table format");
                let (table, column_count) = TableFormat::read(&mut self.cursor)?;
                self.format.table = table;
                self.column_count = column_count;
            }
            Stage::ColumnFormats => {
                self.cursor.set_structure("view column format");
                for index in 0..self.column_count {
                    trace!("Column #{} format at offset {}", index, self.cursor.position());
                    let format = ColumnFormat::read(&mut self.cursor)?;
                    self.format.columns.push(ViewColumn::new(format));
                }
            }
            Stage::TableFormat2 => {
                self.cursor.set_structure("view table format 2");
                self.format.table2 = Some(TableFormat2::read(&mut self.cursor)?);
                self.cursor.set_structure("view column format 2");
                for column in &mut self.format.columns {
                    let (format2, sizes) = ColumnFormat2::read(&mut self.cursor)?;
                    column.format2 = Some(format2);
                    self.blob_sizes.push(sizes);
                }
            }
            Stage::HideWhenAndTwisties => {
                self.cursor.set_structure("view column hide-when/twistie");
                for index in 0..self.format.columns.len() {
                    let sizes = self.blob_sizes.get(index).copied().unwrap_or_default();
                    if self.column_has(index, flags3::HIDE_WHEN_FORMULA, sizes.hide_when_formula) {
                        let blob = self.cursor.take(sizes.hide_when_formula)?.to_vec();
                        self.format.columns[index].hide_when_formula = Some(blob);
                    }
                    if self.column_has(index, flags3::TWISTIE_RESOURCE, sizes.twistie_resource) {
                        let blob = self.cursor.take(sizes.twistie_resource)?.to_vec();
                        self.format.columns[index].twistie_resource = Some(blob);
                    }
                }
            }
            Stage::TableFormat3 => {
                self.cursor.set_structure("view table format 3");
                self.format.table3 = Some(TableFormat3::read(&mut self.cursor)?);
            }
            Stage::TableFormat4 => {
                self.cursor.set_structure("view table format 4");
                self.format.table4 = Some(TableFormat4::read(&mut self.cursor)?);
            }
            Stage::Background => {
                if self.cursor.peek_u16() == Some(BACKGROUND_SIGNATURE) {
                    self.cursor.set_structure("view background resource");
                    self.format.background = Some(BackgroundResource::read(&mut self.cursor)?);
                }
            }
            Stage::DateFormats => {
                self.cursor.set_structure("view column date format");
                for index in 0..self.format.columns.len() {
                    if self.column_has(index, flags3::DATE_FORMAT, 1) {
                        self.format.columns[index].date_format =
                            Some(ColumnDateFormat::read(&mut self.cursor)?);
                    }
                }
            }
            Stage::NumberFormats => {
                self.cursor.set_structure("view column number format");
                for index in 0..self.format.columns.len() {
                    if self.column_has(index, flags3::NUMBER_FORMAT, 1) {
                        self.format.columns[index].number_format =
                            Some(ColumnNumberFormat::read(&mut self.cursor)?);
                    }
                }
            }
            Stage::NamesFormats => {
                self.cursor.set_structure("view column names format");
                for index in 0..self.format.columns.len() {
                    if self.column_has(index, flags3::NAMES_FORMAT, 1) {
                        self.format.columns[index].names_format =
                            Some(ColumnNamesFormat::read(&mut self.cursor)?);
                    }
                }
            }
            Stage::SharedColumnAliases => {
                self.cursor.set_structure("view shared column alias");
                for index in 0..self.format.columns.len() {
                    if self.column_has(index, flags3::SHARED_COLUMN, 1) {
                        self.format.columns[index].shared_column_alias =
                            Some(read_prefixed_text(&mut self.cursor)?);
                    }
                }
            }
            Stage::GhostAliases => {
                // Remnants only precede format 6 records; nothing to skip without one
                let expects_format6 = self
                    .format
                    .columns
                    .iter()
                    .any(|c| c.format2.is_some_and(|f| f.has(flags3::FORMAT6)));
                if expects_format6 {
                    self.skip_ghost_aliases()?;
                }
            }
            Stage::ExtendedFormats => {
                self.cursor.set_structure("view column format 6");
                for index in 0..self.format.columns.len() {
                    if self.column_has(index, flags3::FORMAT6, 1) {
                        self.format.columns[index].format6 =
                            Some(ColumnFormat6::read(&mut self.cursor)?);
                    }
                }
            }
        }
        Ok(())
    }

    /// A flagged part is read only while bytes remain; a part of `len` 0 needs none.
    fn column_has(&self, index: usize, bit: u16, len: usize) -> bool {
        let flagged = self.format.columns[index]
            .format2
            .is_some_and(|f| f.has(bit));
        if !flagged {
            return false;
        }
        if len > 0 && self.cursor.is_empty() {
            warn!(
                "Column #{} flags part {:#06x}, but the view format ends at offset {}",
                index,
                bit,
                self.cursor.position()
            );
            return false;
        }
        true
    }

    /// Skips length-prefixed remnants of older shared-column aliases until
    /// the first format 6 record.
    fn skip_ghost_aliases(&mut self) -> Result<()> {
        self.cursor.set_structure("view ghost alias");
        loop {
            match self.cursor.peek_u16() {
                Some(COLUMN_FORMAT6_SIGNATURE) | None => return Ok(()),
                Some(_) => {
                    let offset = self.cursor.position();
                    let len = self.cursor.read_u16()? as usize;
                    self.cursor.skip(len)?;
                    warn!("Skipped {}-byte legacy alias remnant at offset {}", len, offset);
                }
            }
        }
    }
}

/// Decodes a view format.
///
/// `buf` must be exactly as long as the declared format length; later stages
/// are read only while bytes remain.
///
/// # Errors
/// Returns a corruption error if a signature does not match or a record runs
/// past the end of the buffer.
pub fn decode_view_format(buf: &[u8]) -> Result<ViewFormat> {
    info!("Decoding view format ({} bytes)", buf.len());
    let mut decoder = Decoder {
        cursor: ByteCursor::new(buf, "view format"),
        format: ViewFormat::default(),
        column_count: 0,
        blob_sizes: Vec::new(),
    };

    for stage in STAGES {
        if !stage.is_mandatory() && decoder.cursor.is_empty() {
            debug!("View format ends before stage {:?}", stage);
            break;
        }
        debug!("Stage {:?} at offset {}", stage, decoder.cursor.position());
        decoder.run(stage)?;
    }

    if !decoder.cursor.is_empty() {
        warn!(
            "Ignoring {} bytes after the last known view format stage",
            decoder.cursor.remaining()
        );
    }
    info!("Decoded view format: {} columns", decoder.format.columns.len());
    Ok(decoder.format)
}

/// Encodes a view format.
///
/// Stages are written up to the last one that has content. Table formats 2
/// to 4 and column format 2 are synthesised with defaults where a later stage
/// needs them, and each column's presence bits are derived from the parts it
/// carries.
///
/// # Errors
/// - [`NifError::InvalidArgument`] if the format has no columns
/// - [`NifError::Overflow`] if a string or blob is too long for its length field
pub fn encode_view_format(format: &ViewFormat) -> Result<Vec<u8>> {
    if format.columns.is_empty() {
        return Err(NifError::InvalidArgument(
            "A view format needs at least one column".to_string(),
        ));
    }
    info!("Encoding view format: {} columns", format.columns.len());

    let last = STAGES
        .iter()
        .rposition(|stage| stage.has_content(format))
        .unwrap_or(1);
    let mut out = BufferBuilder::new();

    for stage in &STAGES[..=last] {
        debug!("Stage {:?} at offset {}", stage, out.position());
        encode_stage(*stage, format, &mut out)?;
    }

    info!("Encoded view format: {} bytes", out.position());
    Ok(out.finish())
}

fn encode_stage(stage: Stage, format: &ViewFormat, out: &mut BufferBuilder) -> Result<()> {
    let columns = &format.columns;
    match stage {
        Stage::TableFormat => format.table.write(out, columns.len())?,
        Stage::ColumnFormats => {
            for column in columns {
                column.format.write(out)?;
            }
        }
        Stage::TableFormat2 => {
            format.table2.unwrap_or_default().write(out);
            for column in columns {
                column.encoded_format2().write(out, column.blob_sizes())?;
            }
        }
        Stage::HideWhenAndTwisties => {
            for column in columns {
                if let Some(formula) = &column.hide_when_formula {
                    out.put_bytes(formula);
                }
                if let Some(resource) = &column.twistie_resource {
                    out.put_bytes(resource);
                }
            }
        }
        Stage::TableFormat3 => format.table3.unwrap_or_default().write(out),
        Stage::TableFormat4 => format.table4.unwrap_or_default().write(out),
        Stage::Background => {
            if let Some(background) = &format.background {
                background.write(out)?;
            }
        }
        Stage::DateFormats => {
            for date_format in columns.iter().filter_map(|c| c.date_format.as_ref()) {
                date_format.write(out)?;
            }
        }
        Stage::NumberFormats => {
            for number_format in columns.iter().filter_map(|c| c.number_format.as_ref()) {
                number_format.write(out)?;
            }
        }
        Stage::NamesFormats => {
            for names_format in columns.iter().filter_map(|c| c.names_format.as_ref()) {
                names_format.write(out)?;
            }
        }
        Stage::SharedColumnAliases => {
            for alias in columns.iter().filter_map(|c| c.shared_column_alias.as_ref()) {
                write_prefixed_text(out, "shared column alias", alias)?;
            }
        }
        Stage::GhostAliases => {}
        Stage::ExtendedFormats => {
            for format6 in columns.iter().filter_map(|c| c.format6.as_ref()) {
                format6.write(out)?;
            }
        }
    }
    Ok(())
}

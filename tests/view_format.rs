use nif_codec::nif::format::view_format::structs::{
    BackgroundResource, Color, ColumnDateFormat, ColumnFormat, ColumnFormat2, ColumnFormat6,
    ColumnNamesFormat, ColumnNumberFormat, TableFormat, TableFormat2, TableFormat3, TableFormat4,
    flags3,
};
use nif_codec::{ErrorKind, LmbcsText, NifError, ViewColumn, ViewFormat, decode_view_format, encode_view_format};
use proptest::prelude::*;

fn column(item: &str, title: &str) -> ViewColumn {
    ViewColumn::new(ColumnFormat {
        display_width: 120,
        item_name: LmbcsText::from(item),
        title: LmbcsText::from(title),
        formula: vec![0x01, 0x02, 0x03],
        ..Default::default()
    })
}

fn date_format() -> ColumnDateFormat {
    ColumnDateFormat {
        preference: 1,
        flags: 0x0000_0011,
        date_show: 2,
        date_separator1: LmbcsText::from("/"),
        date_separator2: LmbcsText::from("/"),
        time_separator: LmbcsText::from(":"),
        ..Default::default()
    }
}

fn number_format() -> ColumnNumberFormat {
    ColumnNumberFormat {
        multiplier: 1.0,
        digits: 2,
        decimal_symbol: LmbcsText::from("."),
        thousands_separator: LmbcsText::from(","),
        currency_symbol: LmbcsText::from("€"),
        iso_country: 276,
        ..Default::default()
    }
}

/// A format that reaches every stage.
fn full_format() -> ViewFormat {
    let mut first = column("Subject", "Subject");
    first.format2 = Some(ColumnFormat2 {
        header_font_id: 0x0A00_0001,
        second_resort_column: 2,
        column_color: Color {
            flags: 1,
            components: [0, 255, 0, 0],
        },
        ..Default::default()
    });
    first.hide_when_formula = Some(vec![0xAA; 5]);
    first.twistie_resource = Some(vec![0xBB; 3]);
    first.date_format = Some(date_format());
    first.number_format = Some(number_format());
    first.names_format = Some(ColumnNamesFormat {
        flags: 0x4,
        dn_column_name: LmbcsText::from("$Author"),
    });
    first.shared_column_alias = Some(LmbcsText::from("SharedSubject"));
    first.format6 = Some(ColumnFormat6 {
        flags: 0x10,
        if_view_is_narrow_do: 1,
        attach_point_column: 0,
        extension: vec![9, 8, 7, 6],
    });

    ViewFormat {
        table: TableFormat {
            item_sequence_number: 3,
            flags: 0x0001,
            flags2: 0x0020,
        },
        table2: Some(TableFormat2 {
            lines_per_row: 1,
            lines_per_header: 2,
            ..Default::default()
        }),
        table3: Some(TableFormat3 {
            margin_top: 4,
            max_rows: 100,
            ..Default::default()
        }),
        table4: Some(TableFormat4 {
            flags: 1,
            repeat_type: 2,
        }),
        background: Some(BackgroundResource {
            payload: vec![0xCD; 6],
        }),
        columns: vec![first, column("Date", "Created")],
    }
}

#[test]
fn legacy_format_ends_after_column_formats() {
    let format = ViewFormat {
        columns: vec![column("Subject", "Title")],
        ..Default::default()
    };
    let encoded = encode_view_format(&format).expect("single column format should encode");
    assert_eq!(encoded.len(), 10 + 32 + 7 + 5 + 3);
    assert_eq!(encoded[0], 1, "version byte");

    let decoded = decode_view_format(&encoded).expect("legacy format should decode");
    assert_eq!(decoded, format, "nothing beyond stage 2 was written");
    assert_eq!(decoded.table2, None);
    assert_eq!(decoded.columns[0].format.item_name.as_str(), "Subject");
}

#[test]
fn every_stage_round_trips() {
    let format = full_format();
    let encoded = encode_view_format(&format).expect("full format should encode");
    let decoded = decode_view_format(&encoded).expect("full format should decode");

    assert_eq!(decoded.columns.len(), 2);
    assert_eq!(decoded.table, format.table);
    assert_eq!(decoded.table2, format.table2);
    assert_eq!(decoded.table3, format.table3);
    assert_eq!(decoded.table4, format.table4);
    assert_eq!(decoded.background, format.background);

    let original = &format.columns[0];
    let first = &decoded.columns[0];
    assert_eq!(first.format, original.format);
    assert_eq!(first.hide_when_formula, original.hide_when_formula);
    assert_eq!(first.twistie_resource, original.twistie_resource);
    assert_eq!(first.date_format, original.date_format);
    assert_eq!(first.number_format, original.number_format);
    assert_eq!(first.names_format, original.names_format);
    assert_eq!(first.shared_column_alias, original.shared_column_alias);
    assert_eq!(first.format6, original.format6);
    assert_eq!(first.flags3(), original.flags3());

    let second = &decoded.columns[1];
    assert_eq!(second.format.title.as_str(), "Created");
    assert_eq!(second.format2.map(|f| f.flags3), Some(0), "synthesised format 2");
    assert_eq!(second.date_format, None);

    assert_eq!(encode_view_format(&decoded).unwrap(), encoded, "re-encoding is byte-identical");
}

#[test]
fn presence_bits_follow_the_parts() {
    let mut col = column("A", "A");
    col.format2 = Some(ColumnFormat2 {
        flags3: 0x0001 | flags3::FORMAT6 | flags3::DATE_FORMAT,
        ..Default::default()
    });
    col.number_format = Some(number_format());
    assert_eq!(
        col.flags3(),
        0x0001 | flags3::NUMBER_FORMAT,
        "stale presence bits are dropped and other bits pass through"
    );
}

#[test]
fn later_stages_synthesise_earlier_tables() {
    let mut col = column("Total", "Total");
    col.number_format = Some(number_format());
    let format = ViewFormat {
        columns: vec![col],
        ..Default::default()
    };

    let decoded = decode_view_format(&encode_view_format(&format).unwrap()).unwrap();
    assert_eq!(decoded.table2, Some(TableFormat2::default()));
    assert_eq!(decoded.table3, Some(TableFormat3::default()));
    assert_eq!(decoded.table4, Some(TableFormat4::default()));
    assert_eq!(decoded.background, None);
    assert_eq!(decoded.columns[0].number_format, Some(number_format()));
}

#[test]
fn zero_columns_are_rejected() {
    let err = encode_view_format(&ViewFormat::default()).expect_err("no columns");
    assert!(matches!(err, NifError::InvalidArgument(_)), "unexpected error: {:?}", err);
    assert_eq!(err.kind(), ErrorKind::Misuse);
}

#[test]
fn oversized_title_overflows() {
    let format = ViewFormat {
        columns: vec![column("A", &"t".repeat(70_000))],
        ..Default::default()
    };
    let err = encode_view_format(&format).expect_err("title exceeds a u16 size");
    assert!(matches!(err, NifError::Overflow { .. }), "unexpected error: {:?}", err);
}

#[test]
fn truncation_inside_flagged_extension_is_corruption() {
    let mut col = column("When", "When");
    col.date_format = Some(date_format());
    let format = ViewFormat {
        columns: vec![col],
        ..Default::default()
    };
    let encoded = encode_view_format(&format).unwrap();

    let err = decode_view_format(&encoded[..encoded.len() - 1]).expect_err("date format lost a byte");
    assert!(err.is_corruption(), "unexpected error: {:?}", err);

    let err = decode_view_format(&encoded[..encoded.len() - 20]).expect_err("date format lost its fixed part");
    assert!(err.is_corruption(), "unexpected error: {:?}", err);
}

#[test]
fn truncated_column_format_is_corruption() {
    let format = ViewFormat {
        columns: vec![column("Subject", "Subject")],
        ..Default::default()
    };
    let encoded = encode_view_format(&format).unwrap();
    let err = decode_view_format(&encoded[..40]).expect_err("column format is mandatory");
    assert!(err.is_corruption());
}

#[test]
fn wrong_version_is_corruption() {
    let mut encoded = encode_view_format(&full_format()).unwrap();
    encoded[0] = 2;
    let err = decode_view_format(&encoded).expect_err("version 2 is unsupported");
    assert!(matches!(err, NifError::Corrupt { offset: 0, .. }), "unexpected error: {:?}", err);
}

#[test]
fn ghost_aliases_before_format6_are_skipped() {
    let format = full_format();
    let encoded = encode_view_format(&format).unwrap();
    let format6_len = 30 + 4;
    let split = encoded.len() - format6_len;

    let mut patched = encoded[..split].to_vec();
    patched.extend_from_slice(&[3, 0, b'o', b'l', b'd']);
    patched.extend_from_slice(&[0, 0]);
    patched.extend_from_slice(&encoded[split..]);

    let decoded = decode_view_format(&patched).expect("ghost aliases are skipped");
    assert_eq!(decoded.columns[0].format6, format.columns[0].format6);
    assert_eq!(encode_view_format(&decoded).unwrap(), encoded, "ghost aliases are not re-emitted");
}

#[test]
fn bytes_after_the_last_stage_are_ignored() {
    let encoded = encode_view_format(&full_format()).unwrap();
    let mut extended = encoded.clone();
    extended.extend_from_slice(&[0xEE; 7]);

    let decoded = decode_view_format(&extended).expect("future stages are ignored");
    assert_eq!(encode_view_format(&decoded).unwrap(), encoded);
}

fn short_text() -> impl Strategy<Value = LmbcsText<'static>> {
    "[a-z/.:,]{0,3}".prop_map(LmbcsText::from)
}

fn any_date_format() -> impl Strategy<Value = ColumnDateFormat> {
    (any::<u16>(), any::<u32>(), any::<u8>(), short_text(), short_text(), short_text(), short_text()).prop_map(
        |(preference, flags, date_show, s1, s2, s3, t)| ColumnDateFormat {
            preference,
            flags,
            date_show,
            date_separator1: s1,
            date_separator2: s2,
            date_separator3: s3,
            time_separator: t,
            ..Default::default()
        },
    )
}

fn any_number_format() -> impl Strategy<Value = ColumnNumberFormat> {
    (-1.0e6f64..1.0e6, any::<u8>(), short_text(), short_text(), short_text(), short_text()).prop_map(
        |(multiplier, digits, decimal, thousands, negative, currency)| ColumnNumberFormat {
            multiplier,
            digits,
            decimal_symbol: decimal,
            thousands_separator: thousands,
            negative_symbol: negative,
            currency_symbol: currency,
            ..Default::default()
        },
    )
}

fn any_column() -> impl Strategy<Value = ViewColumn> {
    let basics = ("[A-Za-z$]{0,10}", "[ -~]{0,16}", prop::collection::vec(any::<u8>(), 0..24));
    let format2 = prop::option::of((any::<u32>(), any::<u16>()).prop_map(|(font, flags)| ColumnFormat2 {
        header_font_id: font,
        flags3: flags,
        ..Default::default()
    }));
    let blobs = (
        prop::option::of(prop::collection::vec(any::<u8>(), 1..16)),
        prop::option::of(prop::collection::vec(any::<u8>(), 1..16)),
    );
    let displays = (
        prop::option::of(any_date_format()),
        prop::option::of(any_number_format()),
        prop::option::of(("[A-Za-z$]{0,8}", any::<u32>()).prop_map(|(name, flags)| ColumnNamesFormat {
            flags,
            dn_column_name: LmbcsText::from(name),
        })),
    );
    let tail = (
        prop::option::of("[A-Za-z]{1,12}".prop_map(LmbcsText::from)),
        prop::option::of((any::<u32>(), prop::collection::vec(any::<u8>(), 0..8)).prop_map(|(flags, extension)| {
            ColumnFormat6 {
                flags,
                extension,
                ..Default::default()
            }
        })),
    );
    (basics, format2, blobs, displays, tail).prop_map(
        |((item, title, formula), format2, (hide_when, twistie), (date, number, names), (alias, format6))| {
            ViewColumn {
                format: ColumnFormat {
                    item_name: LmbcsText::from(item),
                    title: LmbcsText::from(title),
                    formula,
                    ..Default::default()
                },
                format2,
                hide_when_formula: hide_when,
                twistie_resource: twistie,
                date_format: date,
                number_format: number,
                names_format: names,
                shared_column_alias: alias,
                format6,
            }
        },
    )
}

fn any_format() -> impl Strategy<Value = ViewFormat> {
    (
        prop::collection::vec(any_column(), 1..4),
        prop::option::of(Just(TableFormat2::default())),
        prop::option::of(any::<u16>().prop_map(|max_rows| TableFormat3 {
            max_rows,
            ..Default::default()
        })),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..12).prop_map(|payload| BackgroundResource { payload })),
    )
        .prop_map(|(columns, table2, table3, background)| ViewFormat {
            table2,
            table3,
            background,
            columns,
            ..Default::default()
        })
}

proptest! {
    #[test]
    fn encoded_formats_decode_to_the_same_columns(format in any_format()) {
        let encoded = encode_view_format(&format).unwrap();
        let decoded = decode_view_format(&encoded).unwrap();

        prop_assert_eq!(decoded.columns.len(), format.columns.len());
        for (got, want) in decoded.columns.iter().zip(&format.columns) {
            prop_assert_eq!(&got.format, &want.format);
            prop_assert_eq!(got.flags3(), want.flags3());
            prop_assert_eq!(&got.hide_when_formula, &want.hide_when_formula);
            prop_assert_eq!(&got.twistie_resource, &want.twistie_resource);
            prop_assert_eq!(&got.date_format, &want.date_format);
            prop_assert_eq!(&got.number_format, &want.number_format);
            prop_assert_eq!(&got.names_format, &want.names_format);
            prop_assert_eq!(&got.shared_column_alias, &want.shared_column_alias);
            prop_assert_eq!(&got.format6, &want.format6);
        }
        prop_assert_eq!(&decoded.background, &format.background);
        prop_assert_eq!(encode_view_format(&decoded).unwrap(), encoded);
    }
}

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use nif_codec::nif::codec::lmbcs;
use nif_codec::nif::codec::time::{ALLDAY, ANYDAY};
use nif_codec::{ErrorKind, ItemValue, NifError, NotesTime, ValueType, decode_value, encode_value};
use nif_codec::nif::codec::value::RangeEntry;
use proptest::prelude::*;
use std::borrow::Cow;

fn range_payload(singles: &[f64], pairs: &[(f64, f64)]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&(singles.len() as u16).to_le_bytes());
    payload.extend_from_slice(&(pairs.len() as u16).to_le_bytes());
    for value in singles {
        payload.extend_from_slice(&value.to_le_bytes());
    }
    for (lower, upper) in pairs {
        payload.extend_from_slice(&lower.to_le_bytes());
        payload.extend_from_slice(&upper.to_le_bytes());
    }
    payload
}

#[test]
fn decodes_number_payload() {
    let payload = 42.5f64.to_le_bytes();
    let value = decode_value(0x0300, &payload).expect("number should decode");
    assert_eq!(value.as_number(), Some(42.5));
    assert_eq!(value.value_type(), Some(ValueType::Number));
}

#[test]
fn text_borrows_from_payload_until_detached() {
    let payload = b"Hello".to_vec();
    let value = decode_value(0x0500, &payload).expect("text should decode");
    assert_eq!(value.as_text(), Some("Hello"));

    let owned: ItemValue<'static> = value.into_owned();
    drop(payload);
    assert_eq!(owned.as_text(), Some("Hello"), "owned text must survive the source buffer");
}

#[test]
fn decodes_text_list_with_length_array() {
    let payload = [2, 0, 3, 0, 2, 0, b'f', b'o', b'o', b'b', b'a'];
    let value = decode_value(0x0501, &payload).expect("text list should decode");
    assert_eq!(value.as_text_list(), Some(vec!["foo", "ba"]));
}

#[test]
fn number_range_lists_singles_before_pairs() {
    let payload = range_payload(&[1.0, 4.0], &[(2.0, 3.0)]);
    let value = decode_value(0x0301, &payload).expect("number range should decode");
    assert_eq!(
        value,
        ItemValue::NumberRange(vec![
            RangeEntry::Single(1.0),
            RangeEntry::Single(4.0),
            RangeEntry::Pair(2.0, 3.0),
        ])
    );

    let (tag, encoded) = encode_value(&value).expect("number range should encode");
    assert_eq!(tag, 0x0301);
    assert_eq!(encoded, payload, "range must re-encode byte-identically");
}

#[test]
fn encoder_partitions_mixed_range_entries() {
    let value = ItemValue::NumberRange(vec![
        RangeEntry::Pair(2.0, 3.0),
        RangeEntry::Single(1.0),
    ]);
    let (_, encoded) = encode_value(&value).expect("range should encode");
    assert_eq!(encoded, range_payload(&[1.0], &[(2.0, 3.0)]));
}

#[test]
fn decodes_time_range() {
    let first = NotesTime::from_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();
    let last = NotesTime::from_date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()).unwrap();
    let mut payload = vec![0, 0, 1, 0];
    for time in [first, last] {
        payload.extend_from_slice(&time.innards[0].to_le_bytes());
        payload.extend_from_slice(&time.innards[1].to_le_bytes());
    }
    let value = decode_value(0x0401, &payload).expect("time range should decode");
    assert_eq!(value, ItemValue::TimeRange(vec![RangeEntry::Pair(first, last)]));
}

#[test]
fn error_and_unavailable_placeholders() {
    let error = decode_value(0x0100, &[0x15, 0x02]).expect("error value should decode");
    assert_eq!(error, ItemValue::Error { code: Some(0x0215) });
    assert!(error.is_error_or_unavailable());

    let bare = decode_value(0x0100, &[]).expect("bare error value should decode");
    assert_eq!(bare, ItemValue::Error { code: None });

    let unavailable = decode_value(0x0200, &[1, 2, 3]).expect("unavailable ignores its payload");
    assert_eq!(unavailable, ItemValue::Unavailable);
}

#[test]
fn unknown_tag_is_kept_verbatim() {
    let payload = [0xDE, 0xAD, 0xBE, 0xEF];
    let value = decode_value(0x0999, &payload).expect("unknown tags never fail");
    assert_eq!(
        value,
        ItemValue::Unknown {
            type_tag: 0x0999,
            raw: Cow::Borrowed(&payload[..]),
        }
    );
    assert_eq!(value.value_type(), None);
    assert_eq!(encode_value(&value).unwrap(), (0x0999, payload.to_vec()));
}

#[test]
fn short_or_long_fixed_payloads_are_corruption() {
    let short = decode_value(0x0300, &[0u8; 7]).expect_err("7-byte number must fail");
    assert_eq!(short.kind(), ErrorKind::Corruption);

    let long = decode_value(0x0300, &[0u8; 9]).expect_err("9-byte number must fail");
    assert!(long.is_corruption(), "trailing bytes should be corruption, got {:?}", long);

    let list = decode_value(0x0501, &[2, 0, 5, 0]).expect_err("truncated text list must fail");
    assert!(list.is_corruption());
}

#[test]
fn date_only_time_keeps_allday_sentinel() {
    let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let time = NotesTime::from_date(date).unwrap();
    assert_eq!(time.innards, [ALLDAY, 2_451_545], "2000-01-01 is Julian day 2451545");
    assert!(time.has_date());
    assert!(!time.has_time());
    assert_eq!(time.date(), Some(date));
    assert_eq!(time.to_datetime(), None);
}

#[test]
fn time_only_keeps_anyday_sentinel() {
    let clock = NaiveTime::from_hms_milli_opt(13, 45, 30, 250).unwrap();
    let time = NotesTime::from_time(clock);
    assert_eq!(time.innards, [(13 * 3600 + 45 * 60 + 30) * 100 + 25, ANYDAY]);
    assert_eq!(time.time(), Some(clock));
    assert_eq!(time.date(), None);
}

#[test]
fn datetime_round_trips_with_zone() {
    for text in ["2024-03-15T10:20:30.45+02:00", "1999-12-31T23:59:59-05:30", "2010-06-01T00:00:00Z"] {
        let original = DateTime::parse_from_rfc3339(text).unwrap();
        let time = NotesTime::from_datetime(&original).unwrap();
        let restored = time.to_datetime().expect("both words are set");
        assert_eq!(restored, original, "round trip of {}", text);
        assert_eq!(
            restored.offset().local_minus_utc(),
            original.offset().local_minus_utc(),
            "zone of {}",
            text
        );
    }
}

#[test]
fn zone_bits_encode_quarter_hours_west() {
    let original = DateTime::parse_from_rfc3339("2024-01-01T12:00:00-03:45").unwrap();
    let time = NotesTime::from_datetime(&original).unwrap();
    let zone = time.innards[1] >> 24;
    assert_eq!(zone & 0x0F, 3, "zone hours");
    assert_eq!((zone >> 4) & 0x03, 3, "zone quarter hours");
    assert_eq!(zone & 0x40, 0, "west of GMT");
    assert_eq!(time.zone_offset_seconds(), -(3 * 3600 + 45 * 60));
}

#[test]
fn daylight_saving_adds_an_hour() {
    // Julian day of 2024-07-01, east +1h, DST set
    let word = 2_460_493 | (1 << 24) | (1 << 30) | (1 << 31);
    let time = NotesTime::from_innards([0, word]);
    assert_eq!(time.zone_offset_seconds(), 7200);
}

#[test]
fn dates_outside_the_julian_field_are_rejected() {
    let far_future = NaiveDate::from_ymd_opt(100_000, 1, 1).unwrap();
    let err = NotesTime::from_date(far_future).expect_err("Julian day needs more than 24 bits");
    assert!(matches!(err, NifError::Overflow { field: "julian day", .. }), "unexpected error: {:?}", err);

    let before_epoch = NaiveDate::from_ymd_opt(-5000, 1, 1).unwrap();
    assert!(NotesTime::try_from(before_epoch).is_err(), "negative Julian day");

    let latest = NaiveDate::from_ymd_opt(40_000, 12, 31).unwrap();
    let time = NotesTime::from_date(latest).expect("still within 24 bits");
    assert_eq!(time.date(), Some(latest));
}

#[test]
fn unrepresentable_zone_offsets_are_rejected() {
    let at = |seconds: i32| {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_local_timezone(FixedOffset::east_opt(seconds).unwrap())
            .single()
            .unwrap()
    };

    for seconds in [16 * 3600, -16 * 3600, 5 * 3600 + 20 * 60, 3600 + 30] {
        let err = NotesTime::from_datetime(&at(seconds)).expect_err("offset has no zone bits");
        assert_eq!(err.kind(), ErrorKind::Misuse, "offset {}", seconds);
    }

    let widest = at(-(15 * 3600 + 45 * 60));
    let time = NotesTime::try_from(widest).expect("15:45 fits the zone bits");
    assert_eq!(time.to_datetime(), Some(widest));
}

#[test]
fn lmbcs_single_byte_sets() {
    assert_eq!(lmbcs::decode(b"caf\x82"), "café");
    assert_eq!(lmbcs::encode("café"), b"caf\x82".to_vec());
    assert_eq!(lmbcs::decode(&[0x01, 0x82]), "é", "explicit cp850 group");
    assert_eq!(lmbcs::decode(&[0x05, 0xC0]), "\u{0410}", "windows-1251 group");
    assert_eq!(lmbcs::decode(&[0x10, 0x82, 0xA0]), "\u{3042}", "Shift_JIS group");
}

#[test]
fn lmbcs_unicode_groups_and_controls() {
    assert_eq!(lmbcs::encode("€"), vec![0x14, 0x20, 0xAC]);
    assert_eq!(lmbcs::encode("😀"), vec![0x14, 0xD8, 0x3D, 0x14, 0xDE, 0x00]);
    assert_eq!(lmbcs::decode(&[0x14, 0xD8, 0x3D, 0x14, 0xDE, 0x00]), "😀");
    assert_eq!(lmbcs::encode("\u{1}"), vec![0x0F, 0x21], "group-colliding control is escaped");
    assert_eq!(lmbcs::encode("a\tb"), b"a\tb".to_vec(), "tab passes through");
}

#[test]
fn lmbcs_unmapped_and_truncated_groups_become_replacement() {
    assert_eq!(lmbcs::decode(&[0x02, 0x41]), "\u{FFFD}", "Greek group is not mapped");
    assert_eq!(lmbcs::decode(&[b'a', 0x10, 0x82]), "a\u{FFFD}", "truncated double-byte group");
    assert_eq!(lmbcs::decode(&[0x14, 0x00]), "\u{FFFD}", "truncated unicode group");
}

proptest! {
    #[test]
    fn lmbcs_round_trips_any_string(text in any::<String>()) {
        prop_assert_eq!(lmbcs::decode(&lmbcs::encode(&text)), text);
    }

    #[test]
    fn text_values_round_trip(text in any::<String>()) {
        let value = ItemValue::text(&text);
        let (tag, payload) = encode_value(&value).unwrap();
        let decoded = decode_value(tag, &payload).unwrap();
        prop_assert_eq!(decoded.as_text(), Some(text.as_str()));
    }
}

use nif_codec::nif::codec::value::RangeEntry;
use nif_codec::{
    ErrorKind, ItemTable, ItemValue, ItemValueTable, NifError, NotesTime, TableVariant, ValueType,
    decode_item_table, decode_item_table_large, decode_table, decode_table_large,
};
use proptest::prelude::*;
use std::borrow::Cow;

const TEXT: [u8; 2] = [0x00, 0x05];
const NUMBER: [u8; 2] = [0x00, 0x03];

/// `["A", absent, "B"]` with lengths `[3, 0, 3]`.
fn sparse_row() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&16u16.to_le_bytes());
    buf.extend_from_slice(&3u16.to_le_bytes());
    for len in [3u16, 0, 3] {
        buf.extend_from_slice(&len.to_le_bytes());
    }
    buf.extend_from_slice(&TEXT);
    buf.push(b'A');
    buf.extend_from_slice(&TEXT);
    buf.push(b'B');
    assert_eq!(buf.len(), 16);
    buf
}

/// `Subject = "Hi"`, `Empty` absent.
fn summary_row() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&28u16.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&7u16.to_le_bytes());
    buf.extend_from_slice(&4u16.to_le_bytes());
    buf.extend_from_slice(&5u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(b"Subject");
    buf.extend_from_slice(&TEXT);
    buf.extend_from_slice(b"Hi");
    buf.extend_from_slice(b"Empty");
    assert_eq!(buf.len(), 28);
    buf
}

#[test]
fn zero_length_item_is_absent() {
    let buf = sparse_row();
    let table = decode_table(&buf, TableVariant::Standard).expect("sparse row should decode");

    assert_eq!(table.len(), 3);
    assert_eq!(table.get(0).and_then(ItemValue::as_text), Some("A"));
    assert_eq!(table.get(1), None, "zero-length item must decode as absent");
    assert_eq!(table.get(2).and_then(ItemValue::as_text), Some("B"));
    assert_eq!(table.total_length, 16);
}

#[test]
fn sparse_row_encodes_back_to_the_same_bytes() {
    let table = ItemValueTable::from_values(
        TableVariant::Standard,
        vec![Some(ItemValue::text("A")), None, Some(ItemValue::text("B"))],
    )
    .unwrap();
    assert_eq!(table.total_length, 16);
    assert_eq!(table.encode().unwrap(), sparse_row());
}

#[test]
fn large_variant_uses_32_bit_lengths() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&20u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&10u32.to_le_bytes());
    buf.extend_from_slice(&NUMBER);
    buf.extend_from_slice(&7.25f64.to_le_bytes());

    let table = decode_table_large(&buf).expect("large table should decode");
    assert_eq!(table.variant, TableVariant::Large);
    assert_eq!(table.get(0).and_then(ItemValue::as_number), Some(7.25));
    assert_eq!(table.encode().unwrap(), buf);
}

#[test]
fn declared_total_must_match_consumed_bytes() {
    let mut buf = sparse_row();
    buf[0] = 20;
    buf.extend_from_slice(&[0; 4]);
    let err = decode_table(&buf, TableVariant::Standard).expect_err("total 20 but 16 consumed");
    assert!(
        matches!(err, NifError::SizeMismatch { declared: 20, consumed: 16, .. }),
        "unexpected error: {:?}",
        err
    );
    assert_eq!(err.kind(), ErrorKind::Corruption);
}

#[test]
fn declared_total_beyond_buffer_is_corruption() {
    let mut buf = sparse_row();
    buf[0] = 40;
    let err = decode_table(&buf, TableVariant::Standard).expect_err("total exceeds buffer");
    assert!(matches!(err, NifError::Corrupt { offset: 0, .. }), "unexpected error: {:?}", err);
}

#[test]
fn item_length_of_one_is_corruption() {
    let buf = [7, 0, 1, 0, 1, 0, 0];
    let err = decode_table(&buf, TableVariant::Standard).expect_err("length 1 cannot hold a tag");
    assert!(err.is_corruption());
}

#[test]
fn trailing_bytes_after_table_are_ignored() {
    let mut buf = sparse_row();
    buf.extend_from_slice(&[0xAA, 0xBB]);
    let table = decode_table(&buf, TableVariant::Standard).expect("trailing bytes are not part of the table");
    assert_eq!(table.len(), 3);
}

#[test]
fn named_table_resolves_names_and_values() {
    let buf = summary_row();
    let table = decode_item_table(&buf, TableVariant::Standard).expect("summary should decode");

    assert_eq!(table.len(), 2);
    assert_eq!(table.name(0), Some("Subject"));
    assert_eq!(table.get("subject").and_then(ItemValue::as_text), Some("Hi"), "lookup ignores case");
    assert!(table.contains("EMPTY"));
    assert_eq!(table.get("Empty"), None, "absent value");
    assert!(!table.contains("Missing"));

    let pairs: Vec<_> = table.iter().map(|(name, value)| (name.to_string(), value.is_some())).collect();
    assert_eq!(pairs, vec![("Subject".to_string(), true), ("Empty".to_string(), false)]);
}

#[test]
fn named_table_encodes_back_to_the_same_bytes() {
    let table = ItemTable::from_items(
        TableVariant::Standard,
        [("Subject", Some(ItemValue::text("Hi"))), ("Empty", None)],
    )
    .unwrap();
    assert_eq!(table.total_length, 28);
    assert_eq!(table.encode().unwrap(), summary_row());
}

#[test]
fn duplicate_names_resolve_to_first_item() {
    let table = ItemTable::from_items(
        TableVariant::Standard,
        [
            ("Form", Some(ItemValue::text("Memo"))),
            ("FORM", Some(ItemValue::text("Reply"))),
        ],
    )
    .unwrap();
    let encoded = table.encode().unwrap();
    let decoded = decode_item_table(&encoded, TableVariant::Standard).unwrap();
    assert_eq!(decoded.position("form"), Some(0));
    assert_eq!(decoded.get("Form").and_then(ItemValue::as_text), Some("Memo"));
}

#[test]
fn large_named_table_round_trips() {
    let table = ItemTable::from_items(
        TableVariant::Large,
        [
            ("Body", Some(ItemValue::text(&"x".repeat(70_000)))),
            ("Tags", Some(ItemValue::text_list(&["a", "b"]))),
        ],
    )
    .expect("large tables hold values beyond 64 KiB");
    let encoded = table.encode().unwrap();
    let decoded = decode_item_table_large(&encoded).unwrap();
    assert_eq!(decoded, table);
    assert_eq!(decoded.get("tags").and_then(ItemValue::as_text_list), Some(vec!["a", "b"]));
}

#[test]
fn standard_table_rejects_oversized_row() {
    let err = ItemValueTable::from_values(
        TableVariant::Standard,
        vec![Some(ItemValue::text(&"x".repeat(70_000)))],
    )
    .expect_err("70000 bytes do not fit a 16-bit total");
    assert!(matches!(err, NifError::Overflow { .. }), "unexpected error: {:?}", err);
    assert_eq!(err.kind(), ErrorKind::Misuse);
}

#[test]
fn mismatched_names_and_values_are_rejected() {
    let mut table = ItemTable::from_items(
        TableVariant::Standard,
        [("A", Some(ItemValue::Number(1.0))), ("B", None)],
    )
    .unwrap();
    table.names.pop();
    let err = table.encode().expect_err("one name for two values");
    assert!(
        matches!(err, NifError::CountMismatch { expected: 2, found: 1, .. }),
        "unexpected error: {:?}",
        err
    );
}

#[test]
fn decoded_table_outlives_its_buffer_once_owned() {
    let owned = {
        let buf = summary_row();
        decode_item_table(&buf, TableVariant::Standard).unwrap().into_owned()
    };
    assert_eq!(owned.get("Subject").and_then(ItemValue::as_text), Some("Hi"));
}

fn any_time() -> impl Strategy<Value = NotesTime> + Clone {
    (any::<u32>(), any::<u32>()).prop_map(|(a, b)| NotesTime::from_innards([a, b]))
}

/// Singles before pairs, the order a decoded range comes back in.
fn any_range<T: Clone + std::fmt::Debug>(
    element: impl Strategy<Value = T> + Clone,
) -> impl Strategy<Value = Vec<RangeEntry<T>>> {
    (
        prop::collection::vec(element.clone(), 0..4),
        prop::collection::vec((element.clone(), element), 0..3),
    )
        .prop_map(|(singles, pairs)| {
            singles
                .into_iter()
                .map(RangeEntry::Single)
                .chain(pairs.into_iter().map(|(lower, upper)| RangeEntry::Pair(lower, upper)))
                .collect()
        })
}

fn any_value() -> impl Strategy<Value = ItemValue<'static>> {
    prop_oneof![
        any::<String>().prop_map(|s| ItemValue::text(&s)),
        prop::collection::vec(any::<String>(), 0..4).prop_map(|v| ItemValue::text_list(&v)),
        (-1.0e12f64..1.0e12).prop_map(ItemValue::Number),
        any_range(-1.0e12f64..1.0e12).prop_map(ItemValue::NumberRange),
        any_time().prop_map(ItemValue::Time),
        any_range(any_time()).prop_map(ItemValue::TimeRange),
        prop::option::of(any::<u16>()).prop_map(|code| ItemValue::Error { code }),
        Just(ItemValue::Unavailable),
        (
            any::<u16>().prop_filter("tag must be unassigned", |tag| ValueType::from_tag(*tag).is_none()),
            prop::collection::vec(any::<u8>(), 0..16),
        )
            .prop_map(|(type_tag, raw)| ItemValue::Unknown {
                type_tag,
                raw: Cow::Owned(raw),
            }),
    ]
}

fn any_variant() -> impl Strategy<Value = TableVariant> {
    prop_oneof![Just(TableVariant::Standard), Just(TableVariant::Large)]
}

proptest! {
    #[test]
    fn value_table_round_trips(
        variant in any_variant(),
        values in prop::collection::vec(prop::option::of(any_value()), 0..8),
    ) {
        let table = ItemValueTable::from_values(variant, values).unwrap();
        let encoded = table.encode().unwrap();
        prop_assert_eq!(encoded.len(), table.total_length as usize);
        let decoded = decode_table(&encoded, variant).unwrap();
        prop_assert_eq!(decoded, table);
    }

    #[test]
    fn named_table_round_trips(
        variant in any_variant(),
        items in prop::collection::vec(("[A-Za-z$]{0,12}", prop::option::of(any_value())), 0..8),
    ) {
        let table = ItemTable::from_items(variant, items).unwrap();
        let encoded = table.encode().unwrap();
        prop_assert_eq!(encoded.len(), table.total_length as usize);
        let decoded = decode_item_table(&encoded, variant).unwrap();
        prop_assert_eq!(decoded, table);
    }
}

//! # nif-codec
//!
//! Decoders and encoders for the binary structures a Notes view index
//! exchanges with its clients: item values, item tables, collection pages,
//! collation and view-format records, and search-key buffers.
//!
//! Decoding borrows from the source buffer where it can. Call `into_owned`
//! on a decoded value to detach it before the buffer is released.
pub mod nif;

// Re-export the main types for convenience
pub use nif::{
    CollateType, CollationInfo, CollectionEntry, CollectionLookupPage, CollectionReader,
    EntrySource, ErrorKind, FormatSink, ItemRecovery, ItemTable, ItemValue, ItemValueTable,
    KeyLookup, KeyMatch, LmbcsText, NifError, NotesTime, RawBuffer, ReadEntriesInfo, ReadMask,
    ReadRequest, ReadResponse, Result, ScanOptions, SearchKey, SignalFlags, TableVariant, Unid,
    ValueType, ViewColumn, ViewFormat, decode_collation, decode_item_table,
    decode_item_table_large, decode_page, decode_table, decode_table_large, decode_value,
    decode_view_format, encode_search_keys, encode_value, encode_view_format,
};

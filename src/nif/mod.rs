//! Core NIF codec module

pub mod codec;
pub mod format;
pub mod iter;
pub mod reader;
pub mod transport;
pub mod types;
pub(crate) mod utils;

pub use codec::time::NotesTime;
pub use codec::value::{ItemValue, LmbcsText, RangeEntry, decode_value, encode_value};
pub use format::collation::{CollateDescriptor, CollationInfo, decode_collation};
pub use format::collection::{
    CollectionEntry, CollectionLookupPage, CollectionPosition, CollectionStats, ItemRecovery,
    ReadEntriesInfo, decode_page,
};
pub use format::item_table::{
    ItemTable, ItemValueTable, decode_item_table, decode_item_table_large, decode_table,
    decode_table_large,
};
pub use format::search_key::{KeyDate, SearchKey, encode_search_keys};
pub use format::view_format::{ViewColumn, ViewFormat, decode_view_format, encode_view_format};
pub use reader::{CollectionReader, ScanOptions};
pub use transport::{EntrySource, FormatSink, KeyLookup, KeyMatch, RawBuffer, ReadRequest, ReadResponse};
pub use types::error::{ErrorKind, NifError, Result};
pub use types::models::{CollateType, ReadMask, SignalFlags, TableVariant, Unid, ValueType};

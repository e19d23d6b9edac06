//! Structure codecs for the buffers the engine exchanges.
//!
//! This module sits between the transport-facing
//! [`CollectionReader`](crate::nif::reader::CollectionReader) and the pure
//! primitive transforms in [`codec`](crate::nif::codec).
//!
//! # Module Organization
//!
//! - [`item_table`]: positional and named rows of tagged values
//! - [`collection`]: pages of collection (view index) entries
//! - [`collation`]: sort definitions
//! - [`view_format`]: view rendering definitions, decode and encode
//! - [`search_key`]: key buffers for keyed lookups
//!
//! ```text
//! Collection page:
//! ┌─────────────────┐
//! │  Stats (opt.)   │
//! ├─────────────────┤
//! │  Entry          │ ← fields per read mask
//! │   └ summary     │ ← item_table
//! ├─────────────────┤
//! │  Entry ...      │
//! └─────────────────┘
//! ```

pub mod collation;
pub mod collection;
pub mod item_table;
pub mod search_key;
pub mod view_format;

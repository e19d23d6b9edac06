//! Codec layer for primitive values.
//!
//! These are the pure transforms the structure parsers build on.
//!
//! # Submodules
//!
//! - [`lmbcs`][]: LMBCS text to and from `String`
//! - [`time`][]: two-word timestamps to and from `chrono` types
//! - [`value`][]: tagged primitive values (text, numbers, times, ranges, lists)

pub mod lmbcs;
pub mod time;
pub mod value;

//! Custom error types for the nif-codec crate.

use thiserror::Error;

/// Coarse classification of a [`NifError`].
///
/// Callers use this to tell a corrupt index (never retry) apart from a
/// programming mistake on their side and from a value the engine declined
/// to inline (recoverable through a fallback read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Corruption,
    Misuse,
    RecoverableAbsence,
    Io,
}

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum NifError {
    /// An error originating from I/O operations (CLI and transports).
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The buffer does not match the structure it is supposed to hold.
    #[error("Corrupt {structure} at offset {offset}: {details}\n{dump}")]
    Corrupt {
        structure: &'static str,
        offset: usize,
        details: String,
        dump: String,
    },

    /// A structure's declared byte length disagrees with what decoding consumed.
    #[error("Size mismatch for {context}: declared {declared} bytes, but consumed {consumed} bytes")]
    SizeMismatch {
        context: &'static str,
        declared: u64,
        consumed: u64,
    },

    /// A declared count of items does not match the actual number of items found.
    #[error("Count mismatch for {item_type}: expected {expected}, but found {found}")]
    CountMismatch {
        item_type: &'static str,
        expected: u64,
        found: u64,
    },

    /// A collation descriptor names a comparison type this codec does not know.
    #[error("Unknown collate type {value:#04x} at column #{column}\n{dump}")]
    UnknownCollateType { column: usize, value: u8, dump: String },

    /// The caller handed the codec something it can never encode.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A value does not fit into the width of its length field.
    #[error("Value too large for {field}: {value} exceeds {max}")]
    Overflow {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// A summary value was replaced by an error placeholder and no recovery produced it.
    #[error("Item '{item}' of note {note_id:#x} is not available in the summary buffer")]
    ItemUnavailable { note_id: u32, item: String },

    /// A transport collaborator failed.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl NifError {
    /// Classifies this error according to the codec's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NifError::Corrupt { .. }
            | NifError::SizeMismatch { .. }
            | NifError::CountMismatch { .. }
            | NifError::UnknownCollateType { .. } => ErrorKind::Corruption,
            NifError::InvalidArgument(_) | NifError::Overflow { .. } => ErrorKind::Misuse,
            NifError::ItemUnavailable { .. } => ErrorKind::RecoverableAbsence,
            NifError::Io(_) | NifError::Transport(_) => ErrorKind::Io,
        }
    }

    pub fn is_corruption(&self) -> bool {
        self.kind() == ErrorKind::Corruption
    }
}

/// A convenience `Result` type alias using the crate's `NifError` type.
pub type Result<T> = std::result::Result<T, NifError>;

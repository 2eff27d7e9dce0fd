//! Error types for Strata.

use std::fmt;

/// The main error type for Strata operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying byte store, passed through unchanged
    Io(std::io::Error),

    /// Serialization/deserialization error
    Serialization(String),

    /// A page or overflow chain did not decode to a well-formed structure
    Corruption(String),

    /// Invalid operation or configuration
    InvalidOperation(String),

    /// `key()`, `value()` or `value_length()` was called on a cursor that
    /// is not positioned on an entry
    InvalidCursor,

    /// The segment writer was fed keys that were not strictly ascending
    UnsortedInput {
        /// The key that was written before the offending one
        previous: Vec<u8>,
        /// The offending key
        key: Vec<u8>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Corruption(msg) => write!(f, "Corruption: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::InvalidCursor => write!(f, "Cursor is not positioned on an entry"),
            Error::UnsortedInput { previous, key } => write!(
                f,
                "Unsorted input: key {:02x?} does not sort after {:02x?}",
                key, previous
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// A specialized `Result` type for Strata operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the Zed data core
//!
//! This module defines the error taxonomy shared by every layer: the type
//! context, the value codec, the columnar object format and the journal.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Errors are grouped by where they are recoverable:
//!
//! - `BadFormat` / `BadValue` / `BadTypeValue`: malformed input, fatal to the
//!   current operation
//! - `TypeMismatch` / `OutOfRange` / `DuplicateField`: fatal
//! - `Io`: surfaced verbatim
//! - `Canceled`: surfaced; operations are idempotent from the caller's view
//! - `KeyExists` / `NoSuchKey` / `Constraint` / `RetriesExceeded`: journal
//!   store pre-conditions, recoverable by the caller
//! - `ConcurrentChange`: a lost journal commit race, retried by the store

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Zed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Zed data core
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, object reads, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Corrupt or unrecognized framing (trailer, varint, frame code)
    #[error("bad format: {0}")]
    BadFormat(String),

    /// A zcode body does not match the shape its type requires
    #[error("bad value: {0}")]
    BadValue(String),

    /// A type-value could not be decoded
    #[error("bad type value: {0}")]
    BadTypeValue(#[from] TypeValueError),

    /// Two fields of one record share a name
    #[error("duplicate field: {0:?}")]
    DuplicateField(String),

    /// A value or column was used with an incompatible type
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An index (type ID, enum selector, union selector) is out of range
    #[error("{what} out of range: {index}")]
    OutOfRange {
        /// What kind of index overflowed
        what: &'static str,
        /// The offending index
        index: u64,
    },

    /// Cancellation was requested by the caller
    #[error("operation canceled")]
    Canceled,

    /// Journal store insert found the key already present
    #[error("key already exists: {0:?}")]
    KeyExists(String),

    /// Journal store lookup, update or delete found no such key
    #[error("no such key: {0:?}")]
    NoSuchKey(String),

    /// A caller-supplied constraint rejected the current entry
    #[error("constraint failed: {0}")]
    Constraint(String),

    /// The journal commit race was lost too many times in a row
    #[error("journal commit retries exceeded ({0} attempts)")]
    RetriesExceeded(usize),

    /// A journal commit lost the exclusive-create race
    #[error("journal changed concurrently")]
    ConcurrentChange,

    /// No journal exists at the given path
    #[error("no such journal: {}", .0.display())]
    NoSuchJournal(PathBuf),

    /// Serde marshaling to or from a value failed
    #[error("marshal error: {0}")]
    Marshal(String),

    /// A configuration value was rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Shorthand for an out-of-range error
    pub fn out_of_range(what: &'static str, index: impl TryInto<u64>) -> Self {
        Error::OutOfRange {
            what,
            index: index.try_into().unwrap_or(u64::MAX),
        }
    }

    /// Whether the error is an I/O not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

/// Reasons a type-value fails to decode or a type fails to intern
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeValueError {
    /// The type-value ended before its body was complete
    #[error("truncated type value")]
    Truncated,

    /// The leading tag byte is not a known type-value tag
    #[error("unknown type value tag {0}")]
    UnknownTag(u8),

    /// The reserved primitive ID was used
    #[error("reserved primitive ID {0}")]
    ReservedPrimitive(u8),

    /// A name reference did not resolve to a binding
    #[error("unresolved type name {0:?}")]
    Unresolved(String),

    /// A name or symbol is not valid UTF-8
    #[error("invalid UTF-8 in type value")]
    InvalidUtf8,

    /// A count exceeds the configured cap
    #[error("{what} count {count} exceeds limit {limit}")]
    CapExceeded {
        /// Fields, union members or enum symbols
        what: &'static str,
        /// Count found
        count: u64,
        /// Configured cap
        limit: usize,
    },

    /// Nesting exceeds the configured decode depth
    #[error("type value nesting exceeds depth limit {0}")]
    DepthLimit(usize),

    /// A named type has an empty or primitive name
    #[error("invalid type name {0:?}")]
    BadName(String),

    /// A union was given no member types
    #[error("union type has no members")]
    EmptyUnion,

    /// Bytes remained after a complete type-value
    #[error("{0} trailing bytes after type value")]
    TrailingBytes(usize),
}

impl serde::ser::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::Marshal(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::Marshal(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_error_display_duplicate_field() {
        let err = Error::DuplicateField("f".to_string());
        assert_eq!(err.to_string(), "duplicate field: \"f\"");
    }

    #[test]
    fn test_error_display_out_of_range() {
        let err = Error::out_of_range("type ID", 99u32);
        let msg = err.to_string();
        assert!(msg.contains("type ID"));
        assert!(msg.contains("99"));
    }

    #[test]
    fn test_error_from_type_value_error() {
        let err: Error = TypeValueError::DepthLimit(512).into();
        assert!(matches!(
            err,
            Error::BadTypeValue(TypeValueError::DepthLimit(512))
        ));
        assert!(err.to_string().contains("depth limit"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_serde_custom_error() {
        let err = <Error as serde::de::Error>::custom("missing field");
        assert!(matches!(err, Error::Marshal(ref m) if m == "missing field"));
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = Error::RetriesExceeded(10);
        match err {
            Error::RetriesExceeded(n) => assert_eq!(n, 10),
            _ => panic!("Wrong error variant"),
        }
    }
}

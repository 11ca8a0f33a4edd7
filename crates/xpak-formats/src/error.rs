//! Error types for XPAK segment and container operations
//!
//! Two layers are distinguished. [`FormatError`] covers bytes that are not a
//! valid or complete segment; it never leaves the program in a bad state and
//! callers can treat it as "no usable metadata here". [`XpakError`] wraps it
//! together with lookup misses, field overflows and I/O failures.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or truncated segment data
#[derive(Debug, Error)]
pub enum FormatError {
    /// A framing magic did not match, or the input was too short to carry one
    #[error("bad magic: expected {expected:?}")]
    BadMagic {
        /// The magic that was expected at this position
        expected: &'static str,
    },

    /// Header declares more bytes than the input holds
    #[error("truncated {region}: declared {declared} bytes, {available} available")]
    TruncatedHeader {
        /// Region that could not be read in full
        region: &'static str,
        /// Length declared by the header
        declared: u64,
        /// Bytes actually available
        available: u64,
    },

    /// Index entry references bytes outside the data region
    #[error(
        "entry {name:?} references {offset}+{length}, outside data region of {data_length} bytes"
    )]
    EntryOutOfBounds {
        /// Entry name (lossy UTF-8)
        name: String,
        /// Offset into the data region
        offset: u32,
        /// Length of the entry
        length: u32,
        /// Size of the data region
        data_length: u64,
    },

    /// Entry names must not be empty
    #[error("entry name is empty")]
    EmptyName,

    /// Entry name would escape the extraction root
    #[error("unsafe entry name: {0:?}")]
    UnsafeName(String),

    /// Entry name is not valid UTF-8 and cannot become a path
    #[error("entry name is not valid UTF-8: {0}")]
    NonUtf8Name(#[from] std::str::Utf8Error),

    /// `BinRw` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Comprehensive error type for XPAK operations
#[derive(Debug, Error)]
pub enum XpakError {
    /// Invalid segment data
    #[error("Invalid segment: {0}")]
    Format(#[from] FormatError),

    /// Name is absent from the index
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Value does not fit a 32-bit field
    #[error("{field} of {value} does not fit in 32 bits")]
    Range {
        /// Field being encoded
        field: &'static str,
        /// Offending value
        value: u64,
    },

    /// Host file carries no metadata segment
    #[error("No metadata segment present in {}", .0.display())]
    NotLocated(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal failed
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Temporary file could not be renamed over the host
    #[error("Failed to persist rewritten file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl XpakError {
    /// Check if this error only reports a missing entry
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error reports malformed segment data
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// Result type for XPAK operations
pub type XpakResult<T> = Result<T, XpakError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = XpakError::NotFound("CATEGORY".to_string());
        assert_eq!(err.to_string(), "Entry not found: CATEGORY");
        assert!(err.is_not_found());

        let err = XpakError::Range {
            field: "data_length",
            value: 1 << 32,
        };
        assert_eq!(err.to_string(), "data_length of 4294967296 does not fit in 32 bits");
    }

    #[test]
    fn test_format_error_conversion() {
        let err: XpakError = FormatError::BadMagic {
            expected: "XPAKPACK",
        }
        .into();
        assert!(err.is_format());
        assert!(err.to_string().contains("XPAKPACK"));
    }
}

//! XPAK metadata segment parser, builder and container
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! XPAK embeds a small directory tree of key/value metadata files into the
//! tail of an otherwise opaque binary package (a compressed tarball), and
//! lets that metadata be located, read, listed, replaced or stripped later
//! without touching the payload bytes.
//!
//! # On-disk layout
//!
//! ```text
//! [host payload]XPAKPACK|index_len|data_len|[index][data]XPAKSTOP|segment_len|STOP
//! ```
//!
//! All integers are unsigned 32-bit big-endian.
//!
//! # Modules
//!
//! - **codec**: the 4-byte big-endian integer codec every field uses
//! - **segment**: segment builder and parser, index entries
//! - **directory**: directory tree to segment mapping and back
//! - **container**: trailer-located segment inside a host file, with a
//!   stat-keyed cache and atomic replace
//! - **scan**: helpers for standalone segment files and damaged hosts
//!
//! # Concurrency
//!
//! Everything here is synchronous. Any number of readers may inspect an
//! unmodified host file concurrently through independent
//! [`container::Container`] values. Mutations assume a single writer owns
//! the host file for their duration; serialize writers externally.

#![warn(missing_docs)]

pub mod codec;
pub mod container;
pub mod directory;
pub mod error;
pub mod scan;
pub mod segment;

pub use container::{Container, ContainerState, ReplaceMode, SegmentLocation};
pub use error::{FormatError, XpakError, XpakResult};
pub use segment::{IndexEntry, Segment, SegmentBuilder};

/// Common format trait for symmetric parse/build types
pub trait XpakFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> XpakResult<Self>;

    /// Build to bytes
    fn build(&self) -> XpakResult<Vec<u8>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}

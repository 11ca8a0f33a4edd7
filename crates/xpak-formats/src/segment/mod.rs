//! XPAK segment format implementation
//!
//! A segment is a self-delimited unit holding a small directory tree of
//! metadata files: an index of `(name, offset, length)` records followed by
//! the concatenated file contents.
//!
//! # Format Structure
//!
//! ```text
//! Segment:
//! ├── Header (16 bytes, big-endian)
//! │   ├── magic "XPAKPACK" (8)
//! │   ├── index_length (u32)
//! │   └── data_length (u32)
//! ├── Index (index_length bytes)
//! │   └── Entries, end to end
//! │       ├── name_length (u32)
//! │       ├── name (name_length bytes)
//! │       ├── data_offset (u32, relative to the data region)
//! │       └── data_length (u32)
//! ├── Data (data_length bytes)
//! └── magic "XPAKSTOP" (8)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use xpak_formats::segment::{Segment, SegmentBuilder};
//! use xpak_formats::XpakFormat;
//!
//! let mut builder = SegmentBuilder::new();
//! builder.insert("CATEGORY", "app-misc\n").insert("PF", "hello-1.0\n");
//! let bytes = builder.build()?;
//!
//! let segment = Segment::parse(&bytes)?;
//! assert_eq!(segment.extract(b"PF")?, b"hello-1.0\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod entry;
mod header;
/// Index and region parsing functions
pub mod parser;

pub use builder::SegmentBuilder;
pub use entry::{IndexEntry, encoded_len};
pub use header::{FRAMING_SIZE, HEADER_SIZE, MAGIC_PACK, MAGIC_STOP, SegmentHeader};
pub use parser::{decode_index, find, iter_index, split};

use crate::error::{FormatError, XpakError, XpakResult};
use std::collections::BTreeMap;
use std::io::Read;

/// A parsed segment, split into its index and data regions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Raw index region
    pub index: Vec<u8>,

    /// Raw data region
    pub data: Vec<u8>,
}

impl Segment {
    /// Create a segment from already separated regions
    pub fn from_parts(index: Vec<u8>, data: Vec<u8>) -> Self {
        Self { index, data }
    }

    /// Read a standalone segment from the start of `reader`
    ///
    /// Reads the header, then exactly `index_length` and `data_length`
    /// bytes. The closing magic is not read.
    pub fn read_from<R: Read>(reader: &mut R) -> XpakResult<Self> {
        let mut raw = [0u8; HEADER_SIZE];
        reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => XpakError::Format(FormatError::BadMagic {
                expected: "XPAKPACK",
            }),
            _ => XpakError::Io(e),
        })?;
        let header = SegmentHeader::parse(&raw)?;

        let index = read_region(reader, "index", header.index_length)?;
        let data = read_region(reader, "data", header.data_length)?;
        Ok(Self { index, data })
    }

    /// Decoded index entries in stored order
    pub fn entries(&self) -> Vec<IndexEntry> {
        decode_index(&self.index)
    }

    /// Entry names in stored order
    pub fn names(&self) -> Vec<Vec<u8>> {
        iter_index(&self.index).map(|entry| entry.name).collect()
    }

    /// Content of the entry called `name`
    pub fn extract(&self, name: &[u8]) -> XpakResult<&[u8]> {
        let entry = iter_index(&self.index)
            .find(|entry| entry.name == name)
            .ok_or_else(|| XpakError::NotFound(String::from_utf8_lossy(name).into_owned()))?;
        let range = entry.data_range(self.data.len() as u64)?;
        Ok(&self.data[range])
    }

    /// Every entry as a name-keyed map
    pub fn to_map(&self) -> XpakResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut map = BTreeMap::new();
        for entry in iter_index(&self.index) {
            let range = entry.data_range(self.data.len() as u64)?;
            map.insert(entry.name, self.data[range].to_vec());
        }
        Ok(map)
    }
}

/// Upper bound on what a header length may preallocate before bytes arrive
const PREALLOC_LIMIT: usize = 1 << 20;

fn read_region<R: Read>(reader: &mut R, region: &'static str, len: u32) -> XpakResult<Vec<u8>> {
    let mut buf = Vec::with_capacity((len as usize).min(PREALLOC_LIMIT));
    reader.take(u64::from(len)).read_to_end(&mut buf)?;
    if buf.len() != len as usize {
        return Err(FormatError::TruncatedHeader {
            region,
            declared: u64::from(len),
            available: buf.len() as u64,
        }
        .into());
    }
    Ok(buf)
}

impl crate::XpakFormat for Segment {
    fn parse(data: &[u8]) -> XpakResult<Self> {
        let (index, data) = split(data)?;
        Ok(Self::from_parts(index.to_vec(), data.to_vec()))
    }

    fn build(&self) -> XpakResult<Vec<u8>> {
        let mut builder = SegmentBuilder::new();
        for entry in iter_index(&self.index) {
            let range = entry.data_range(self.data.len() as u64)?;
            builder.insert(entry.name, &self.data[range]);
        }
        builder.build()
    }
}

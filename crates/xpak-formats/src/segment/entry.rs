//! Index entry types
//!
//! Each entry is the directory record of one metadata file: its name and
//! the span of its content inside the data region.

use crate::codec::{INT_WIDTH, encode_len, encode32, read32};
use crate::error::{FormatError, XpakResult};

/// One record of the segment index
///
/// Binary layout:
/// ```text
/// name_length:  u32 BE
/// name:         [u8; name_length]   relative path, unique within a segment
/// data_offset:  u32 BE              offset into the data region
/// data_length:  u32 BE
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Entry name as stored, normally a `/`-separated relative path
    pub name: Vec<u8>,

    /// Offset of the content from the start of the data region
    pub data_offset: u32,

    /// Length of the content
    pub data_length: u32,
}

/// Encoded size of an entry whose name is `name_len` bytes long
pub const fn encoded_len(name_len: usize) -> usize {
    INT_WIDTH + name_len + INT_WIDTH + INT_WIDTH
}

impl IndexEntry {
    /// Create an entry
    pub fn new(name: impl Into<Vec<u8>>, data_offset: u32, data_length: u32) -> Self {
        Self {
            name: name.into(),
            data_offset,
            data_length,
        }
    }

    /// Parse the entry starting at `pos`
    ///
    /// Returns the entry and the number of bytes it occupies, or `None` if
    /// the record does not fit in `index`.
    pub fn parse(index: &[u8], pos: usize) -> Option<(Self, usize)> {
        let name_len = read32(index, pos)? as usize;
        let name_start = pos + INT_WIDTH;
        let name_end = name_start.checked_add(name_len)?;
        let name = index.get(name_start..name_end)?.to_vec();
        let data_offset = read32(index, name_end)?;
        let data_length = read32(index, name_end + INT_WIDTH)?;

        Some((
            Self {
                name,
                data_offset,
                data_length,
            },
            encoded_len(name_len),
        ))
    }

    /// Append the encoded entry to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) -> XpakResult<()> {
        out.extend_from_slice(&encode_len("name_length", self.name.len())?);
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&encode32("data_offset", u64::from(self.data_offset))?);
        out.extend_from_slice(&encode32("data_length", u64::from(self.data_length))?);
        Ok(())
    }

    /// Byte range of the content inside a data region of `data_len` bytes
    pub fn data_range(&self, data_len: u64) -> Result<std::ops::Range<usize>, FormatError> {
        let start = u64::from(self.data_offset);
        let end = start + u64::from(self.data_length);
        if end > data_len {
            return Err(FormatError::EntryOutOfBounds {
                name: self.name_lossy(),
                offset: self.data_offset,
                length: self.data_length,
                data_length: data_len,
            });
        }
        Ok(start as usize..end as usize)
    }

    /// Entry name as UTF-8, replacing invalid sequences
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

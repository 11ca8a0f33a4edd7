//! Segment parser
//!
//! Slices a segment blob into its index and data regions and decodes the
//! index. Decoding is deliberately lenient: the scan continues while more
//! than eight bytes remain after the cursor and ends silently at the last
//! record that decodes in full. Files written by older tools depend on
//! this, so a dangling partial record is dropped rather than reported.

use super::entry::IndexEntry;
use super::header::{HEADER_SIZE, MAGIC_STOP, SegmentHeader};
use crate::codec::INT_WIDTH;
use crate::error::FormatError;

/// Split a segment into `(index, data)`
///
/// Checks the opening and closing magic only; `data_length` from the header
/// is not consulted, the data region is whatever lies between the index and
/// the closing magic.
pub fn split(segment: &[u8]) -> Result<(&[u8], &[u8]), FormatError> {
    let header = SegmentHeader::parse(segment)?;
    if !segment.ends_with(&MAGIC_STOP) {
        return Err(FormatError::BadMagic {
            expected: "XPAKSTOP",
        });
    }

    let data_end = segment.len() - MAGIC_STOP.len();
    let index_end = HEADER_SIZE + header.index_length as usize;
    if index_end > data_end {
        return Err(FormatError::TruncatedHeader {
            region: "index",
            declared: u64::from(header.index_length),
            available: data_end.saturating_sub(HEADER_SIZE) as u64,
        });
    }

    Ok((
        &segment[HEADER_SIZE..index_end],
        &segment[index_end..data_end],
    ))
}

/// Iterator over the records of an index region
#[derive(Debug, Clone)]
pub struct IndexIter<'a> {
    index: &'a [u8],
    pos: usize,
}

impl Iterator for IndexIter<'_> {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + 2 * INT_WIDTH >= self.index.len() {
            return None;
        }
        match IndexEntry::parse(self.index, self.pos) {
            Some((entry, consumed)) => {
                self.pos += consumed;
                Some(entry)
            }
            None => {
                self.pos = self.index.len();
                None
            }
        }
    }
}

/// Iterate over the entries of an index region in stored order
pub fn iter_index(index: &[u8]) -> IndexIter<'_> {
    IndexIter { index, pos: 0 }
}

/// Decode every entry of an index region in stored order
pub fn decode_index(index: &[u8]) -> Vec<IndexEntry> {
    iter_index(index).collect()
}

/// Locate `name` in an index region
///
/// Returns `(data_offset, data_length)` of the first entry whose name
/// matches exactly, or `None` if there is none.
pub fn find(index: &[u8], name: &[u8]) -> Option<(u32, u32)> {
    iter_index(index)
        .find(|entry| entry.name == name)
        .map(|entry| (entry.data_offset, entry.data_length))
}

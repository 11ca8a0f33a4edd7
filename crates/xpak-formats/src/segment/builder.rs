//! Segment builder
//!
//! Turns a name-keyed mapping of contents into one self-describing segment.
//! Entries are written in insertion order; callers that need byte-identical
//! output across runs insert them sorted (as
//! [`pack_directory`](crate::directory::pack_directory) does).

use super::entry::IndexEntry;
use super::header::{FRAMING_SIZE, MAGIC_STOP, SegmentHeader};
use crate::codec::checked_len;
use crate::error::{FormatError, XpakResult};
use std::collections::BTreeMap;

/// Builder for XPAK segments
#[derive(Debug, Clone, Default)]
pub struct SegmentBuilder {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl SegmentBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from a sorted mapping
    pub fn from_map<K, V>(map: BTreeMap<K, V>) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let mut builder = Self::new();
        for (name, content) in map {
            builder.insert(name, content);
        }
        builder
    }

    /// Insert an entry
    ///
    /// Re-inserting an existing name replaces its content and keeps its
    /// original position, so a segment can never carry duplicate names.
    pub fn insert(&mut self, name: impl Into<Vec<u8>>, content: impl Into<Vec<u8>>) -> &mut Self {
        let name = name.into();
        let content = content.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = content,
            None => self.entries.push((name, content)),
        }
        self
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were inserted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the segment bytes
    ///
    /// ```text
    /// "XPAKPACK" | index_length | data_length | index | data | "XPAKSTOP"
    /// ```
    pub fn build(&self) -> XpakResult<Vec<u8>> {
        let mut index = Vec::new();
        let mut data = Vec::new();

        for (name, content) in &self.entries {
            if name.is_empty() {
                return Err(FormatError::EmptyName.into());
            }
            let entry = IndexEntry {
                name: name.clone(),
                data_offset: checked_len("data_offset", data.len())?,
                data_length: checked_len("data_length", content.len())?,
            };
            entry.write_to(&mut index)?;
            data.extend_from_slice(content);
        }

        let header = SegmentHeader::new(index.len(), data.len())?;

        let mut out = Vec::with_capacity(FRAMING_SIZE + index.len() + data.len());
        out.extend_from_slice(&header.build()?);
        out.extend_from_slice(&index);
        out.extend_from_slice(&data);
        out.extend_from_slice(&MAGIC_STOP);

        debug_assert_eq!(out.len() as u64, header.segment_size());

        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::XpakError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_empty() {
        let data = SegmentBuilder::new().build().unwrap();
        let mut expected = b"XPAKPACK".to_vec();
        expected.extend_from_slice(&[0; 8]);
        expected.extend_from_slice(b"XPAKSTOP");
        assert_eq!(data, expected);
    }

    #[test]
    fn test_build_layout() {
        let mut builder = SegmentBuilder::new();
        builder.insert("a/b.txt", "hello").insert("c.txt", "world!");
        let data = builder.build().unwrap();

        assert_eq!(&data[8..12], &[0, 0, 0, 36]);
        assert_eq!(&data[12..16], &[0, 0, 0, 11]);
        assert_eq!(data.len(), 16 + 36 + 11 + 8);
        assert_eq!(&data[16 + 36..16 + 36 + 11], b"helloworld!");
        assert_eq!(&data[data.len() - 8..], b"XPAKSTOP");
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut builder = SegmentBuilder::new();
        builder
            .insert("USE", "a")
            .insert("SLOT", "0")
            .insert("USE", "b c");
        assert_eq!(builder.len(), 2);

        let mut expected = SegmentBuilder::new();
        expected.insert("USE", "b c").insert("SLOT", "0");
        assert_eq!(builder.build().unwrap(), expected.build().unwrap());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut builder = SegmentBuilder::new();
        builder.insert("", "x");
        assert!(matches!(
            builder.build(),
            Err(XpakError::Format(FormatError::EmptyName))
        ));
    }

    #[test]
    fn test_from_map_is_sorted() {
        let mut map = BTreeMap::new();
        map.insert("z".to_string(), b"1".to_vec());
        map.insert("a".to_string(), b"2".to_vec());
        let data = SegmentBuilder::from_map(map).build().unwrap();
        // first entry name starts right after name_length
        assert_eq!(data[20], b'a');
    }
}

//! Stat-keyed locate cache
//!
//! Each [`Container`](super::Container) owns one cache entry. It pairs the
//! file's freshness key with the outcome of the last parse, so repeated
//! inspection of an unchanged file costs a single `stat` call.

use std::fs::Metadata;
use std::time::SystemTime;

/// Filesystem metadata compared on every locate
///
/// Size, modification time and status-change time. Status-change time is
/// only available on Unix and is `None` elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessKey {
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: Option<SystemTime>,
    /// Last status change as `(seconds, nanoseconds)`
    pub changed: Option<(i64, i64)>,
}

impl FreshnessKey {
    /// Build the key from freshly read metadata
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
            changed: status_changed(metadata),
        }
    }
}

#[cfg(unix)]
fn status_changed(metadata: &Metadata) -> Option<(i64, i64)> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.ctime(), metadata.ctime_nsec()))
}

#[cfg(not(unix))]
fn status_changed(_metadata: &Metadata) -> Option<(i64, i64)> {
    None
}

/// Where a located segment lives inside its host file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLocation {
    /// Offset of the segment's opening magic; also the payload length
    pub segment_offset: u64,
    /// Byte length of the segment as recorded in the trailer
    pub segment_length: u32,
    /// Offset of the index region
    pub index_offset: u64,
    /// Byte length of the index region
    pub index_length: u32,
    /// Offset of the data region
    pub data_offset: u64,
    /// Byte length of the data region
    pub data_length: u32,
}

impl SegmentLocation {
    /// Bytes occupied by the segment and its trailer
    pub fn container_span(&self) -> u64 {
        u64::from(self.segment_length) + super::trailer::TRAILER_SIZE
    }

    /// Length of the host payload preceding the segment
    pub fn payload_length(&self) -> u64 {
        self.segment_offset
    }
}

/// Outcome of a locate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// No valid segment was found
    Unlocated,
    /// A segment was found at the given location
    Located(SegmentLocation),
}

impl ContainerState {
    /// Whether a segment was found
    pub fn is_located(&self) -> bool {
        matches!(self, Self::Located(_))
    }

    /// The segment location, if any
    pub fn location(&self) -> Option<SegmentLocation> {
        match self {
            Self::Located(location) => Some(*location),
            Self::Unlocated => None,
        }
    }
}

/// Counters describing how a container reached its answers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// Locate calls that read file metadata
    pub stat_calls: u64,
    /// Locate calls answered from the cache
    pub cache_hits: u64,
    /// Locate calls that read the trailer and header from disk
    pub parses: u64,
}

/// Cached result of the last parse
#[derive(Debug, Clone)]
pub(super) struct LocateCache {
    pub(super) key: FreshnessKey,
    pub(super) state: ContainerState,
    pub(super) index: Vec<u8>,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_key_tracks_size() {
        let file = NamedTempFile::new().unwrap();
        let before = FreshnessKey::from_metadata(&fs::metadata(file.path()).unwrap());
        let again = FreshnessKey::from_metadata(&fs::metadata(file.path()).unwrap());
        assert_eq!(before, again);

        fs::write(file.path(), b"grown").unwrap();
        let after = FreshnessKey::from_metadata(&fs::metadata(file.path()).unwrap());
        assert_eq!(after.size, 5);
        assert_ne!(before, after);
    }

    #[test]
    fn test_location_spans() {
        let location = SegmentLocation {
            segment_offset: 100,
            segment_length: 71,
            index_offset: 116,
            index_length: 36,
            data_offset: 152,
            data_length: 11,
        };
        assert_eq!(location.container_span(), 79);
        assert_eq!(location.payload_length(), 100);

        let state = ContainerState::Located(location);
        assert!(state.is_located());
        assert_eq!(state.location(), Some(location));
        assert_eq!(ContainerState::Unlocated.location(), None);
    }
}

//! Trailer-located segment inside a host file
//!
//! A [`Container`] is the runtime view of one host file (a binary package)
//! that may carry a segment at its tail:
//!
//! ```text
//! [host payload][segment: XPAKPACK ... XPAKSTOP][segment_length][STOP]
//! ```
//!
//! # State
//!
//! A container is either `Unlocated` or `Located`. [`Container::locate`]
//! compares the file's size, mtime and ctime with the cached key and only
//! re-reads the trailer, header and index when one of them changed. The
//! data region is never cached; entries are read from disk by offset.
//! Every read operation re-runs `locate` first, so a container notices when
//! another process rewrote the file.
//!
//! A file without a segment is a valid outcome, not an error: `locate`
//! reports `Unlocated` for short files, wrong magics and unreadable files
//! alike.
//!
//! # Mutation
//!
//! [`Container::replace`] swaps the trailing segment for one built from a
//! directory, preserving every payload byte. With [`ReplaceMode::Atomic`]
//! (the default) the new file is assembled next to the original and renamed
//! over it, so a crash leaves either the old or the new file. The renamed
//! file is a new inode: hard links to the old file keep the old content.
//! A host reached through a symlink is resolved first, so the link stays
//! and the file it points at is rewritten.
//! [`ReplaceMode::InPlace`] truncates and appends instead; it needs no
//! extra disk space but an interruption between the two steps leaves the
//! file without a trailer.
//!
//! Mutations assume the caller is the only writer of the host file.
//!
//! # Example
//!
//! ```rust,no_run
//! use xpak_formats::Container;
//! use std::path::Path;
//!
//! let mut package = Container::new("hello-1.0.tbz2");
//! if package.locate().is_located() {
//!     for name in package.list_names()? {
//!         println!("{}", String::from_utf8_lossy(&name));
//!     }
//!     let slot = package.extract(b"SLOT")?;
//!     println!("SLOT={}", String::from_utf8_lossy(&slot).trim());
//! }
//!
//! package.replace(Path::new("build/hello-1.0/xpak"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod cache;
mod trailer;

pub use cache::{ContainerState, ContainerStats, FreshnessKey, SegmentLocation};
pub use trailer::{STOP, TRAILER_PROBE_SIZE, TRAILER_SIZE, Trailer, encode_trailer};

use crate::directory::{build_from_directory, unpack_entries};
use crate::error::{FormatError, XpakError, XpakResult};
use crate::segment::{HEADER_SIZE, Segment, SegmentHeader, decode_index, find, split};
use cache::LocateCache;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How the host file is rewritten when its segment changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplaceMode {
    /// Write a sibling temporary file and rename it over the host
    #[default]
    Atomic,
    /// Truncate the host to its payload and append in place
    InPlace,
}

/// Runtime view of a host file that may carry a trailing segment
#[derive(Debug)]
pub struct Container {
    path: PathBuf,
    mode: ReplaceMode,
    cache: Option<LocateCache>,
    stats: ContainerStats,
}

impl Container {
    /// Create an unlocated container for `path`
    ///
    /// Nothing is read until the first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: ReplaceMode::default(),
            cache: None,
            stats: ContainerStats::default(),
        }
    }

    /// Create a container and run an initial [`locate`](Self::locate)
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut container = Self::new(path);
        container.locate();
        container
    }

    /// Select how mutations rewrite the host file
    pub fn with_replace_mode(mut self, mode: ReplaceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Path of the host file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace mode used by mutations
    pub fn replace_mode(&self) -> ReplaceMode {
        self.mode
    }

    /// Counters of stat calls, cache hits and parses so far
    pub fn stats(&self) -> ContainerStats {
        self.stats
    }

    /// State from the last locate, without touching the file
    pub fn state(&self) -> ContainerState {
        self.cache
            .as_ref()
            .map_or(ContainerState::Unlocated, |cache| cache.state)
    }

    /// Find the segment at the end of the host file
    ///
    /// Costs one `stat` call when the file is unchanged since the last
    /// locate. Otherwise reads the trailer probe, the segment header and the
    /// index region. Never fails: every problem yields `Unlocated`.
    pub fn locate(&mut self) -> ContainerState {
        self.stats.stat_calls += 1;
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("cannot stat {}: {}", self.path.display(), e);
                self.cache = None;
                return ContainerState::Unlocated;
            }
        };

        let key = FreshnessKey::from_metadata(&metadata);
        if let Some(cache) = &self.cache {
            if cache.key == key {
                self.stats.cache_hits += 1;
                return cache.state;
            }
        }

        self.stats.parses += 1;
        let (state, index) = match self.read_location(key.size) {
            Ok((location, index)) => {
                debug!(
                    "located segment in {} at {} ({} bytes)",
                    self.path.display(),
                    location.segment_offset,
                    location.segment_length
                );
                (ContainerState::Located(location), index)
            }
            Err(e) => {
                debug!("no segment in {}: {}", self.path.display(), e);
                (ContainerState::Unlocated, Vec::new())
            }
        };

        self.cache = Some(LocateCache { key, state, index });
        state
    }

    /// Location of the segment, if the file carries one
    pub fn location(&mut self) -> Option<SegmentLocation> {
        self.locate().location()
    }

    /// Whether the file currently carries a segment
    pub fn is_located(&mut self) -> bool {
        self.locate().is_located()
    }

    /// The raw index region
    pub fn index_bytes(&mut self) -> XpakResult<&[u8]> {
        self.require_located()?;
        Ok(self.cached_index())
    }

    /// Entry names in stored order
    pub fn list_names(&mut self) -> XpakResult<Vec<Vec<u8>>> {
        self.require_located()?;
        Ok(decode_index(self.cached_index())
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    /// Read the content of `name` from disk
    pub fn extract(&mut self, name: &[u8]) -> XpakResult<Vec<u8>> {
        let location = self.require_located()?;
        let (offset, length) = find(self.cached_index(), name)
            .ok_or_else(|| XpakError::NotFound(String::from_utf8_lossy(name).into_owned()))?;

        if u64::from(offset) + u64::from(length) > u64::from(location.data_length) {
            return Err(FormatError::EntryOutOfBounds {
                name: String::from_utf8_lossy(name).into_owned(),
                offset,
                length,
                data_length: u64::from(location.data_length),
            }
            .into());
        }

        self.read_at(location.data_offset + u64::from(offset), length, "entry")
    }

    /// Content of `name` split on whitespace, empty when `name` is absent
    pub fn elements(&mut self, name: &[u8]) -> XpakResult<Vec<String>> {
        match self.extract(name) {
            Ok(content) => Ok(String::from_utf8_lossy(&content)
                .split_whitespace()
                .map(str::to_string)
                .collect()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// The index and the whole data region
    pub fn get_both(&mut self) -> XpakResult<Segment> {
        let location = self.require_located()?;
        let data = self.read_at(location.data_offset, location.data_length, "data")?;
        Ok(Segment::from_parts(self.cached_index().to_vec(), data))
    }

    /// Every entry as a name-keyed map
    pub fn get_data(&mut self) -> XpakResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        self.get_both()?.to_map()
    }

    /// Raw bytes of the segment, both magics included
    pub fn segment_bytes(&mut self) -> XpakResult<Vec<u8>> {
        let location = self.require_located()?;
        self.read_at(location.segment_offset, location.segment_length, "segment")
    }

    /// Write every entry below `dest`
    ///
    /// The data region is read once.
    pub fn extract_all(&mut self, dest: &Path) -> XpakResult<()> {
        let segment = self.get_both()?;
        unpack_entries(&segment.data, &segment.entries(), dest)
    }

    /// Extract every entry into a fresh `dest`
    ///
    /// With `cleanup`, an existing `dest` is removed first. Fails with
    /// [`XpakError::NotLocated`] when the file carries no segment.
    pub fn decompose(&mut self, dest: &Path, cleanup: bool) -> XpakResult<()> {
        self.require_located()?;
        if cleanup {
            remove_dir_if_present(dest)?;
        }
        fs::create_dir_all(dest)?;
        self.extract_all(dest)
    }

    /// Replace the segment with one built from the files below `root`
    ///
    /// Appends a segment when the file had none. The payload is preserved
    /// byte for byte.
    pub fn replace(&mut self, root: &Path) -> XpakResult<()> {
        let segment = build_from_directory(root)?;
        self.write_tail(Some(&segment))
    }

    /// Replace the segment with prebuilt segment bytes
    ///
    /// The bytes are checked with the segment parser first.
    pub fn replace_with_segment(&mut self, segment: &[u8]) -> XpakResult<()> {
        split(segment)?;
        self.write_tail(Some(segment))
    }

    /// Remove the segment and trailer, leaving only the payload
    pub fn strip(&mut self) -> XpakResult<()> {
        if !self.is_located() {
            return Ok(());
        }
        self.write_tail(None)
    }

    fn require_located(&mut self) -> XpakResult<SegmentLocation> {
        self.locate()
            .location()
            .ok_or_else(|| XpakError::NotLocated(self.path.clone()))
    }

    fn cached_index(&self) -> &[u8] {
        self.cache
            .as_ref()
            .map(|cache| cache.index.as_slice())
            .unwrap_or_default()
    }

    fn read_location(&self, file_size: u64) -> XpakResult<(SegmentLocation, Vec<u8>)> {
        if file_size < TRAILER_PROBE_SIZE as u64 {
            return Err(FormatError::BadMagic { expected: "STOP" }.into());
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::End(-(TRAILER_PROBE_SIZE as i64)))?;
        let mut probe = [0u8; TRAILER_PROBE_SIZE];
        file.read_exact(&mut probe)?;
        let trailer = Trailer::parse(&probe)?;

        let span = trailer.container_span();
        if span > file_size {
            warn!(
                "trailer of {} claims {} bytes but the file has {}",
                self.path.display(),
                span,
                file_size
            );
            return Err(FormatError::TruncatedHeader {
                region: "segment",
                declared: span,
                available: file_size,
            }
            .into());
        }

        let segment_offset = file_size - span;
        file.seek(SeekFrom::Start(segment_offset))?;
        let mut raw = [0u8; HEADER_SIZE];
        file.read_exact(&mut raw)?;
        let header = SegmentHeader::parse(&raw)?;

        let index_offset = segment_offset + HEADER_SIZE as u64;
        let data_offset = index_offset + u64::from(header.index_length);
        if data_offset > file_size {
            return Err(FormatError::TruncatedHeader {
                region: "index",
                declared: u64::from(header.index_length),
                available: file_size - index_offset,
            }
            .into());
        }
        if data_offset + u64::from(header.data_length) > file_size {
            return Err(FormatError::TruncatedHeader {
                region: "data",
                declared: u64::from(header.data_length),
                available: file_size - data_offset,
            }
            .into());
        }

        let mut index = vec![0u8; header.index_length as usize];
        file.read_exact(&mut index)?;

        Ok((
            SegmentLocation {
                segment_offset,
                segment_length: trailer.segment_length,
                index_offset,
                index_length: header.index_length,
                data_offset,
                data_length: header.data_length,
            },
            index,
        ))
    }

    fn read_at(&self, offset: u64, length: u32, region: &'static str) -> XpakResult<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let available = file.metadata()?.len().saturating_sub(offset);
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(available.min(u64::from(length)) as usize);
        file.take(u64::from(length)).read_to_end(&mut buf)?;
        if buf.len() != length as usize {
            return Err(FormatError::TruncatedHeader {
                region,
                declared: u64::from(length),
                available: buf.len() as u64,
            }
            .into());
        }
        Ok(buf)
    }

    /// Rewrite the host as payload + `segment` + trailer, or payload only
    fn write_tail(&mut self, segment: Option<&[u8]>) -> XpakResult<()> {
        let payload_length = match self.locate() {
            ContainerState::Located(location) => location.payload_length(),
            ContainerState::Unlocated => match fs::metadata(&self.path) {
                Ok(metadata) => metadata.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
                Err(e) => return Err(e.into()),
            },
        };

        let mut tail = Vec::new();
        if let Some(segment) = segment {
            let trailer = encode_trailer(segment.len())?;
            tail.reserve(segment.len() + trailer.len());
            tail.extend_from_slice(segment);
            tail.extend_from_slice(&trailer);
        }

        let result = match self.mode {
            ReplaceMode::Atomic => self.write_atomic(payload_length, &tail),
            ReplaceMode::InPlace => self.write_in_place(payload_length, &tail),
        };
        self.cache = None;
        result?;

        if segment.is_some() {
            info!(
                "wrote {} byte segment to {} after {} payload bytes",
                tail.len() as u64 - TRAILER_SIZE,
                self.path.display(),
                payload_length
            );
        } else {
            info!(
                "stripped segment from {}, {} payload bytes remain",
                self.path.display(),
                payload_length
            );
        }
        Ok(())
    }

    fn write_atomic(&self, payload_length: u64, tail: &[u8]) -> XpakResult<()> {
        // Rename onto the file a symlink points at, not over the link
        let target = match fs::canonicalize(&self.path) {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.path.clone(),
            Err(e) => return Err(e.into()),
        };
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".xpak-").suffix(".tmp");
        // New hosts get the same umask-filtered mode a plain create would
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
        let mut temp = builder.tempfile_in(dir)?;

        if payload_length > 0 {
            let source = File::open(&target)?;
            let copied = io::copy(&mut source.take(payload_length), temp.as_file_mut())?;
            if copied != payload_length {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("payload shrank while copying: {copied} of {payload_length} bytes"),
                )
                .into());
            }
        }

        temp.as_file_mut().write_all(tail)?;
        temp.as_file().sync_all()?;

        if let Ok(metadata) = fs::metadata(&target) {
            fs::set_permissions(temp.path(), metadata.permissions())?;
        }
        temp.persist(&target)?;
        Ok(())
    }

    fn write_in_place(&self, payload_length: u64, tail: &[u8]) -> XpakResult<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.set_len(payload_length)?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(tail)?;
        file.sync_all()?;
        Ok(())
    }
}

fn remove_dir_if_present(dir: &Path) -> XpakResult<()> {
    if dir.file_name().is_none() {
        return Err(FormatError::UnsafeName(dir.display().to_string()).into());
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::SegmentBuilder;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn host_with_segment(dir: &TempDir, payload: &[u8]) -> PathBuf {
        let mut builder = SegmentBuilder::new();
        builder.insert("a/b.txt", "hello").insert("c.txt", "world!");
        let segment = builder.build().unwrap();

        let path = dir.path().join("pkg.tbz2");
        let mut bytes = payload.to_vec();
        bytes.extend_from_slice(&segment);
        bytes.extend_from_slice(&encode_trailer(segment.len()).unwrap());
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_locate_boundaries() {
        let dir = TempDir::new().unwrap();
        let path = host_with_segment(&dir, b"payload!");

        let mut container = Container::new(&path);
        let location = container.location().unwrap();
        assert_eq!(location.segment_offset, 8);
        assert_eq!(location.segment_length, 71);
        assert_eq!(location.index_offset, 24);
        assert_eq!(location.index_length, 36);
        assert_eq!(location.data_offset, 60);
        assert_eq!(location.data_length, 11);
        assert_eq!(location.container_span(), 79);
    }

    #[test]
    fn test_extract_and_list() {
        let dir = TempDir::new().unwrap();
        let path = host_with_segment(&dir, b"");

        let mut container = Container::open(&path);
        assert_eq!(
            container.list_names().unwrap(),
            vec![b"a/b.txt".to_vec(), b"c.txt".to_vec()]
        );
        assert_eq!(container.extract(b"c.txt").unwrap(), b"world!");
        assert!(container.extract(b"d.txt").unwrap_err().is_not_found());
        assert_eq!(container.elements(b"a/b.txt").unwrap(), vec!["hello"]);
        assert!(container.elements(b"missing").unwrap().is_empty());
    }

    #[test]
    fn test_cache_hit_skips_parse() {
        let dir = TempDir::new().unwrap();
        let path = host_with_segment(&dir, b"xyz");

        let mut container = Container::new(&path);
        let first = container.locate();
        let second = container.locate();
        assert_eq!(first, second);

        let stats = container.stats();
        assert_eq!(stats.stat_calls, 2);
        assert_eq!(stats.parses, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[test]
    fn test_missing_file_is_unlocated() {
        let dir = TempDir::new().unwrap();
        let mut container = Container::new(dir.path().join("absent.tbz2"));
        assert_eq!(container.locate(), ContainerState::Unlocated);
        assert!(matches!(
            container.list_names(),
            Err(XpakError::NotLocated(_))
        ));
    }

    #[test]
    fn test_strip_restores_payload() {
        let dir = TempDir::new().unwrap();
        let path = host_with_segment(&dir, b"payload bytes");

        let mut container = Container::new(&path);
        container.strip().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload bytes");
        assert!(!container.is_located());

        // stripping a bare payload changes nothing
        container.strip().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload bytes");
    }

    #[test]
    fn test_replace_with_segment_validates() {
        let dir = TempDir::new().unwrap();
        let path = host_with_segment(&dir, b"data");
        let before = fs::read(&path).unwrap();

        let mut container = Container::new(&path);
        assert!(container.replace_with_segment(b"not a segment").is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_decompose_cleans_destination() {
        let dir = TempDir::new().unwrap();
        let path = host_with_segment(&dir, b"data");
        let dest = dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("leftover"), "x").unwrap();

        let mut container = Container::new(&path);
        container.decompose(&dest, true).unwrap();
        assert!(!dest.join("leftover").exists());
        assert_eq!(fs::read(dest.join("a/b.txt")).unwrap(), b"hello");
    }

    #[test]
    fn test_segment_bytes() {
        let dir = TempDir::new().unwrap();
        let path = host_with_segment(&dir, b"payload");
        let mut container = Container::new(&path);
        let bytes = container.segment_bytes().unwrap();
        assert_eq!(bytes.len(), 71);
        assert!(bytes.starts_with(b"XPAKPACK"));
        assert!(bytes.ends_with(b"XPAKSTOP"));
    }
}

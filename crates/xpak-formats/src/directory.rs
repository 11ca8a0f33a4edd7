//! Directory tree adapter
//!
//! Maps a directory of metadata files to the name-keyed form the segment
//! builder consumes, and writes a decoded segment back out as files.
//!
//! Names are paths relative to the packed root with components joined by
//! `/` regardless of platform. Packing sorts them bytewise so the same tree
//! always yields the same segment.
//!
//! On Unix names are the raw bytes of the path and need not be UTF-8.
//! Elsewhere a name must be UTF-8 to map to a path.

use crate::error::{FormatError, XpakResult};
use crate::segment::{IndexEntry, Segment, SegmentBuilder};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Separator used inside entry names
pub const NAME_SEPARATOR: &[u8] = b"/";

/// Read every regular file below `root` into a sorted name-keyed map
///
/// Symbolic links are followed, matching how the files would be read by
/// name. Directories themselves produce no entries.
pub fn pack_directory(root: &Path) -> XpakResult<BTreeMap<Vec<u8>, Vec<u8>>> {
    let mut files = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = relative_name(root, entry.path())?;
        let content = fs::read(entry.path())?;
        files.insert(name, content);
    }

    debug!("packed {} files from {}", files.len(), root.display());
    Ok(files)
}

/// Build a segment from the files below `root`
pub fn build_from_directory(root: &Path) -> XpakResult<Vec<u8>> {
    SegmentBuilder::from_map(pack_directory(root)?).build()
}

/// Build a segment from the files below `root` and write it to `output`
pub fn write_segment_file(root: &Path, output: &Path) -> XpakResult<()> {
    let segment = build_from_directory(root)?;
    fs::write(output, segment)?;
    Ok(())
}

/// Write every entry of `entries` below `dest`
///
/// `data` is the data region the entries point into. Parent directories
/// are created as needed and existing files are overwritten.
pub fn unpack_entries(data: &[u8], entries: &[IndexEntry], dest: &Path) -> XpakResult<()> {
    for entry in entries {
        let range = entry.data_range(data.len() as u64)?;
        let target = dest.join(safe_relative_path(&entry.name)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &data[range])?;
    }
    debug!("unpacked {} entries into {}", entries.len(), dest.display());
    Ok(())
}

/// Write every entry of `segment` below `dest`
pub fn unpack_segment(segment: &Segment, dest: &Path) -> XpakResult<()> {
    unpack_entries(&segment.data, &segment.entries(), dest)
}

/// Convert a stored entry name into a relative path that stays below the
/// extraction root
///
/// Absolute names and names with `..` components are rejected.
pub fn safe_relative_path(name: &[u8]) -> Result<PathBuf, FormatError> {
    if name.is_empty() {
        return Err(FormatError::EmptyName);
    }
    let unsafe_name = || FormatError::UnsafeName(String::from_utf8_lossy(name).into_owned());

    let mut path = PathBuf::new();
    for component in Path::new(name_to_os(name)?).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_name());
            }
        }
    }

    if path.as_os_str().is_empty() {
        return Err(unsafe_name());
    }
    Ok(path)
}

#[cfg(unix)]
#[allow(clippy::unnecessary_wraps)] // Same signature as the non-Unix variant
fn name_to_os(name: &[u8]) -> Result<&OsStr, FormatError> {
    use std::os::unix::ffi::OsStrExt;
    Ok(OsStr::from_bytes(name))
}

#[cfg(not(unix))]
fn name_to_os(name: &[u8]) -> Result<&OsStr, FormatError> {
    Ok(OsStr::new(std::str::from_utf8(name)?))
}

#[cfg(unix)]
#[allow(clippy::unnecessary_wraps)] // Same signature as the non-Unix variant
fn os_to_name(part: &OsStr) -> Result<&[u8], FormatError> {
    use std::os::unix::ffi::OsStrExt;
    Ok(part.as_bytes())
}

#[cfg(not(unix))]
fn os_to_name(part: &OsStr) -> Result<&[u8], FormatError> {
    Ok(std::str::from_utf8(part.as_encoded_bytes())?.as_bytes())
}

fn relative_name(root: &Path, path: &Path) -> Result<Vec<u8>, FormatError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| FormatError::UnsafeName(path.display().to_string()))?;

    let mut parts = Vec::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            parts.push(os_to_name(part)?);
        }
    }

    if parts.is_empty() {
        return Err(FormatError::EmptyName);
    }
    Ok(parts.join(NAME_SEPARATOR))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::XpakFormat;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b.txt"), "hello").unwrap();
        fs::write(dir.path().join("c.txt"), "world!").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        dir
    }

    #[test]
    fn test_pack_directory_sorted_relative() {
        let dir = sample_tree();
        let files = pack_directory(dir.path()).unwrap();

        let names: Vec<_> = files.keys().cloned().collect();
        assert_eq!(names, vec![b"a/b.txt".to_vec(), b"c.txt".to_vec()]);
        assert_eq!(files[b"a/b.txt".as_slice()], b"hello");
    }

    #[test]
    fn test_build_is_deterministic() {
        let dir = sample_tree();
        let first = build_from_directory(dir.path()).unwrap();
        let second = build_from_directory(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(&first[8..16], &[0, 0, 0, 36, 0, 0, 0, 11]);
    }

    #[test]
    fn test_unpack_round_trip() {
        let src = sample_tree();
        let segment = Segment::parse(&build_from_directory(src.path()).unwrap()).unwrap();

        let dest = TempDir::new().unwrap();
        fs::create_dir_all(dest.path().join("a")).unwrap();
        fs::write(dest.path().join("a/b.txt"), "stale content").unwrap();

        unpack_segment(&segment, dest.path()).unwrap();
        assert_eq!(fs::read(dest.path().join("a/b.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(dest.path().join("c.txt")).unwrap(), b"world!");
    }

    #[test]
    fn test_write_segment_file() {
        let src = sample_tree();
        let out = TempDir::new().unwrap();
        let path = out.path().join("meta.xpak");
        write_segment_file(src.path(), &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), build_from_directory(src.path()).unwrap());
    }

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(
            safe_relative_path(b"a/./b.txt").unwrap(),
            PathBuf::from("a").join("b.txt")
        );
        assert!(matches!(
            safe_relative_path(b"../escape"),
            Err(FormatError::UnsafeName(_))
        ));
        assert!(matches!(
            safe_relative_path(b"/etc/passwd"),
            Err(FormatError::UnsafeName(_))
        ));
        assert!(matches!(
            safe_relative_path(b"."),
            Err(FormatError::UnsafeName(_))
        ));
        assert!(matches!(
            safe_relative_path(b""),
            Err(FormatError::EmptyName)
        ));
    }

    #[cfg(not(unix))]
    #[test]
    fn test_non_utf8_name_rejected() {
        assert!(matches!(
            safe_relative_path(&[0xFF, 0xFE]),
            Err(FormatError::NonUtf8Name(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_round_trip() {
        use std::os::unix::ffi::OsStrExt;

        let latin1 = b"caf\xe9";
        let src = TempDir::new().unwrap();
        fs::write(src.path().join(OsStr::from_bytes(latin1)), "espresso").unwrap();
        fs::write(src.path().join("plain"), "tea").unwrap();

        let files = pack_directory(src.path()).unwrap();
        assert_eq!(files[latin1.as_slice()], b"espresso");

        let segment = Segment::parse(&build_from_directory(src.path()).unwrap()).unwrap();
        assert_eq!(segment.extract(latin1).unwrap(), b"espresso");

        let dest = TempDir::new().unwrap();
        unpack_segment(&segment, dest.path()).unwrap();
        let restored = dest.path().join(OsStr::from_bytes(latin1));
        assert_eq!(fs::read(restored).unwrap(), b"espresso");
        assert_eq!(fs::read(dest.path().join("plain")).unwrap(), b"tea");
    }

    #[test]
    fn test_unpack_rejects_escaping_names() {
        let mut builder = SegmentBuilder::new();
        builder.insert("../outside", "x");
        let segment = Segment::parse(&builder.build().unwrap()).unwrap();

        let dest = TempDir::new().unwrap();
        let nested = dest.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        assert!(unpack_segment(&segment, &nested).unwrap_err().is_format());
        assert!(!dest.path().join("outside").exists());
    }
}

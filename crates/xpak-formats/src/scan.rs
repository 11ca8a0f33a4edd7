//! Standalone segment files and damaged hosts
//!
//! Helpers that work on segments outside the trailer-located layout:
//! recovering a segment from a host whose trailer is gone, splitting a
//! segment file into its regions, and attaching or unpacking a segment
//! stored in its own file.

use crate::container::{Container, ReplaceMode};
use crate::directory::unpack_segment;
use crate::error::{XpakError, XpakResult};
use crate::segment::{MAGIC_PACK, MAGIC_STOP, Segment, split};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bytes read per step of the backward scan
const SCAN_CHUNK: u64 = 64 * 1024;

/// Recover the last segment of `host` by scanning for its magics
///
/// Searches backwards for the last `XPAKSTOP`, then for the nearest
/// `XPAKPACK` before it, and returns the bytes between them inclusive.
/// Does not need the trailer, so it also works on files whose tail was
/// cut. Returns `None` when either magic is missing.
pub fn recover_segment(host: &Path) -> XpakResult<Option<Vec<u8>>> {
    let mut file = File::open(host)?;
    let size = file.seek(SeekFrom::End(0))?;

    let Some(stop_start) = rfind_magic(&mut file, &MAGIC_STOP, size)? else {
        debug!("no closing magic in {}", host.display());
        return Ok(None);
    };
    let Some(pack_start) = rfind_magic(&mut file, &MAGIC_PACK, stop_start)? else {
        debug!("no opening magic before offset {} in {}", stop_start, host.display());
        return Ok(None);
    };

    let stop_end = stop_start + MAGIC_STOP.len() as u64;
    let mut segment = Vec::with_capacity((stop_end - pack_start) as usize);
    file.seek(SeekFrom::Start(pack_start))?;
    (&mut file)
        .take(stop_end - pack_start)
        .read_to_end(&mut segment)?;

    debug!(
        "recovered {} byte segment at offset {} of {}",
        segment.len(),
        pack_start,
        host.display()
    );
    Ok(Some(segment))
}

/// Offset of the last occurrence of `magic` that ends at or before `end`
fn rfind_magic<R: Read + Seek>(reader: &mut R, magic: &[u8], end: u64) -> io::Result<Option<u64>> {
    let overlap = magic.len() - 1;
    let mut carry: Vec<u8> = Vec::new();
    let mut pos = end;

    while pos > 0 {
        let start = pos.saturating_sub(SCAN_CHUNK);
        let mut buf = vec![0u8; (pos - start) as usize];
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut buf)?;
        buf.extend_from_slice(&carry);

        if let Some(i) = buf.windows(magic.len()).rposition(|window| window == magic) {
            return Ok(Some(start + i as u64));
        }

        carry = buf[..overlap.min(buf.len())].to_vec();
        pos = start;
    }
    Ok(None)
}

/// Split a standalone segment file into `<path>.index` and `<path>.dat`
///
/// Returns `false`, writing nothing, when the file is not a segment.
pub fn split_segment_file(path: &Path) -> XpakResult<bool> {
    let bytes = fs::read(path)?;
    let (index, data) = match split(&bytes) {
        Ok(regions) => regions,
        Err(e) => {
            debug!("{} is not a segment: {}", path.display(), e);
            return Ok(false);
        }
    };

    fs::write(with_suffix(path, ".index"), index)?;
    fs::write(with_suffix(path, ".dat"), data)?;
    Ok(true)
}

/// Attach the segment stored in `segment_file` to `host`
///
/// Any segment `host` already carries is replaced.
pub fn attach_segment_file(host: &Path, segment_file: &Path, mode: ReplaceMode) -> XpakResult<()> {
    let segment = fs::read(segment_file)?;
    Container::new(host)
        .with_replace_mode(mode)
        .replace_with_segment(&segment)
}

/// Unpack the segment stored in `segment_file` below `dest`
pub fn unpack_segment_file(segment_file: &Path, dest: &Path) -> XpakResult<()> {
    if !dest.is_dir() {
        return Err(XpakError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("destination {} is not a directory", dest.display()),
        )));
    }
    let mut reader = BufReader::new(File::open(segment_file)?);
    let segment = Segment::read_from(&mut reader)?;
    unpack_segment(&segment, dest)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

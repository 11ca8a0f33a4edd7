//! Trailer parsing and building
//!
//! A segment embedded in a host file is followed by eight more bytes: the
//! segment length and the `STOP` magic. Reading the last sixteen bytes of
//! the file therefore yields the segment's closing magic, its length and
//! `STOP`, which is enough to find the segment from the end.

use crate::codec::encode_len;
use crate::error::{FormatError, XpakResult};
use crate::segment::MAGIC_STOP;
use binrw::{BinRead, io::Cursor};

/// Magic that ends every host file carrying a segment
pub const STOP: [u8; 4] = *b"STOP";

/// Bytes appended after the segment: `segment_length` + `STOP`
pub const TRAILER_SIZE: u64 = 4 + 4;

/// Bytes read from the end of a host file to locate a segment
pub const TRAILER_PROBE_SIZE: usize = 8 + 4 + 4;

/// The last sixteen bytes of a host file carrying a segment
///
/// ```text
/// magic           [u8; 8]  "XPAKSTOP", closing magic of the segment
/// segment_length  u32 BE   byte length of the segment
/// stop            [u8; 4]  "STOP"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(big)]
pub struct Trailer {
    /// Closing magic of the preceding segment
    pub magic: [u8; 8],

    /// Byte length of the segment, both magics included
    pub segment_length: u32,

    /// End marker, always "STOP"
    pub stop: [u8; 4],
}

impl Trailer {
    /// Parse and validate the trailer probe
    pub fn parse(probe: &[u8; TRAILER_PROBE_SIZE]) -> Result<Self, FormatError> {
        let trailer = Self::read(&mut Cursor::new(&probe[..]))?;
        trailer.validate()?;
        Ok(trailer)
    }

    /// Validate both magics
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.stop != STOP {
            return Err(FormatError::BadMagic { expected: "STOP" });
        }
        if self.magic != MAGIC_STOP {
            return Err(FormatError::BadMagic {
                expected: "XPAKSTOP",
            });
        }
        Ok(())
    }

    /// Bytes the segment and its trailer occupy at the end of the host
    pub fn container_span(&self) -> u64 {
        u64::from(self.segment_length) + TRAILER_SIZE
    }
}

/// Encode the eight bytes that follow a segment of `segment_len` bytes
pub fn encode_trailer(segment_len: usize) -> XpakResult<[u8; 8]> {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&encode_len("segment_length", segment_len)?);
    out[4..].copy_from_slice(&STOP);
    Ok(out)
}

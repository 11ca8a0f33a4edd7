//! Segment header parsing and building

use crate::codec::checked_len;
use crate::error::{FormatError, XpakResult};
use binrw::{BinRead, BinWrite, io::Cursor};

/// Opening magic of every segment
pub const MAGIC_PACK: [u8; 8] = *b"XPAKPACK";

/// Closing magic of every segment
///
/// The same eight bytes also open the trailer that follows a segment
/// embedded in a host file.
pub const MAGIC_STOP: [u8; 8] = *b"XPAKSTOP";

/// Size of the segment header: magic + `index_length` + `data_length`
pub const HEADER_SIZE: usize = 8 + 4 + 4;

/// Bytes a segment occupies besides its index and data regions
pub const FRAMING_SIZE: usize = HEADER_SIZE + MAGIC_STOP.len();

/// Segment header
///
/// ```text
/// magic         [u8; 8]  "XPAKPACK"
/// index_length  u32 BE   exact byte length of the index region
/// data_length   u32 BE   exact byte length of the data region
/// ```
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct SegmentHeader {
    /// Magic signature, always "XPAKPACK"
    pub magic: [u8; 8],

    /// Byte length of the index region
    pub index_length: u32,

    /// Byte length of the data region
    pub data_length: u32,
}

impl SegmentHeader {
    /// Create a header for regions of the given sizes
    pub fn new(index_length: usize, data_length: usize) -> XpakResult<Self> {
        Ok(Self {
            magic: MAGIC_PACK,
            index_length: checked_len("index_length", index_length)?,
            data_length: checked_len("data_length", data_length)?,
        })
    }

    /// Parse and validate a header from the start of `data`
    ///
    /// Inputs shorter than the header are reported as a magic mismatch.
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < HEADER_SIZE {
            return Err(FormatError::BadMagic {
                expected: "XPAKPACK",
            });
        }
        let header = Self::read(&mut Cursor::new(&data[..HEADER_SIZE]))?;
        header.validate()?;
        Ok(header)
    }

    /// Validate the magic signature
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.magic != MAGIC_PACK {
            return Err(FormatError::BadMagic {
                expected: "XPAKPACK",
            });
        }
        Ok(())
    }

    /// Serialize the header to its 16 bytes
    pub fn build(&self) -> Result<Vec<u8>, FormatError> {
        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Total segment size this header implies, framing included
    pub fn segment_size(&self) -> u64 {
        FRAMING_SIZE as u64 + u64::from(self.index_length) + u64::from(self.data_length)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = SegmentHeader::new(36, 11).unwrap();
        let bytes = header.build().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[..8], b"XPAKPACK");
        assert_eq!(&bytes[8..12], &[0, 0, 0, 36]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 11]);
        assert_eq!(header.segment_size(), 16 + 36 + 11 + 8);
    }

    #[test]
    fn test_parse_header() {
        let mut data = b"XPAKPACK".to_vec();
        data.extend_from_slice(&[0, 0, 1, 0, 0, 0, 0, 2]);
        data.extend_from_slice(b"trailing");

        let header = SegmentHeader::parse(&data).unwrap();
        assert_eq!(header.index_length, 256);
        assert_eq!(header.data_length, 2);
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let data = b"XPAKPACX\0\0\0\0\0\0\0\0";
        assert!(matches!(
            SegmentHeader::parse(data),
            Err(FormatError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_parse_short_input_is_bad_magic() {
        assert!(matches!(
            SegmentHeader::parse(b"XPAKPACK\0\0"),
            Err(FormatError::BadMagic { .. })
        ));
    }
}

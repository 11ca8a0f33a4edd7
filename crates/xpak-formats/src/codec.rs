//! Fixed-width integer codec
//!
//! Every length and offset field in an XPAK segment and its trailer is an
//! unsigned 32-bit big-endian integer. No other integer width appears in
//! the format.

use crate::error::{XpakError, XpakResult};

/// Width of every integer field in bytes
pub const INT_WIDTH: usize = 4;

/// Encode `value` as four big-endian bytes
///
/// Values that need more than 32 bits are rejected with
/// [`XpakError::Range`] instead of being truncated. `field` names the
/// value in the error message.
pub fn encode32(field: &'static str, value: u64) -> XpakResult<[u8; 4]> {
    u32::try_from(value)
        .map(u32::to_be_bytes)
        .map_err(|_| XpakError::Range { field, value })
}

/// Encode a byte length, see [`encode32`]
pub fn encode_len(field: &'static str, len: usize) -> XpakResult<[u8; 4]> {
    encode32(field, len as u64)
}

/// Narrow a byte length to a 32-bit field value
pub fn checked_len(field: &'static str, len: usize) -> XpakResult<u32> {
    u32::try_from(len).map_err(|_| XpakError::Range {
        field,
        value: len as u64,
    })
}

/// Decode four big-endian bytes
pub const fn decode32(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// Decode the integer starting at `pos`, or `None` if fewer than four
/// bytes remain
pub fn read32(data: &[u8], pos: usize) -> Option<u32> {
    let end = pos.checked_add(INT_WIDTH)?;
    let bytes: [u8; 4] = data.get(pos..end)?.try_into().ok()?;
    Some(decode32(bytes))
}

// src/efi/wide.rs
//! Narrow/wide string conversion
//!
//! Paths handed to the firmware are widened byte by byte: every input byte
//! becomes one UCS-2 code unit. This is exact for ASCII and Latin-1 and matches
//! how the kernel's callers encode paths. Conversions in the other direction
//! go through UTF-16 decoding and stop at the first NUL.

use alloc::string::String;
use alloc::vec::Vec;

use crate::errors::{Errno, FsError, FsResult};

/// Native path separator of the firmware
pub const NATIVE_SEPARATOR: u16 = b'\\' as u16;

/// Widen a POSIX path for the firmware
///
/// Forward slashes become backslashes and a NUL terminator is appended. The
/// buffer is sized to exactly `len + 1` code units.
///
/// # Errors
///
/// Returns `ENOMEM` when the buffer cannot be allocated.
pub fn to_native_path(path: &str) -> FsResult<Vec<u16>> {
    let mut wide = reserve(path.len() + 1)?;
    wide.extend(path.bytes().map(|b| {
        if b == b'/' {
            NATIVE_SEPARATOR
        } else {
            u16::from(b)
        }
    }));
    wide.push(0);
    Ok(wide)
}

/// Encode a string as NUL-terminated UTF-16
///
/// # Errors
///
/// Returns `ENOMEM` when the buffer cannot be allocated.
pub fn to_wide(s: &str) -> FsResult<Vec<u16>> {
    let mut wide = reserve(s.encode_utf16().count() + 1)?;
    wide.extend(s.encode_utf16());
    wide.push(0);
    Ok(wide)
}

/// Decode a UCS-2 string up to (not including) the first NUL
#[must_use]
pub fn from_wide(units: &[u16]) -> String {
    String::from_utf16_lossy(&units[..wide_len(units)])
}

/// Number of code units before the first NUL
#[must_use]
pub fn wide_len(units: &[u16]) -> usize {
    units.iter().position(|&u| u == 0).unwrap_or(units.len())
}

/// Bytes occupied by `s` as NUL-terminated UTF-16
#[must_use]
pub fn wide_size(s: &str) -> usize {
    (s.encode_utf16().count() + 1) * 2
}

fn reserve(units: usize) -> FsResult<Vec<u16>> {
    let mut wide = Vec::new();
    wide.try_reserve_exact(units)
        .map_err(|_| FsError::with_context(Errno::OutOfMemory, "path conversion"))?;
    Ok(wide)
}

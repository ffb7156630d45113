// src/kernel/fs/metadata.rs
//! Two-phase metadata queries
//!
//! `GetInfo` is always called twice: once with an empty buffer to learn the
//! record size (the firmware must answer `BUFFER_TOO_SMALL`), then with a
//! buffer of exactly that size. Any other answer to the first call fails the
//! whole query.

use alloc::vec::Vec;

use crate::efi::{FileInfo, FileProtocol, Guid, Status, FILE_INFO_ID};
use crate::errors::{Errno, FsError, FsResult};

/// Fetch the raw record identified by `information_type`
///
/// # Errors
///
/// - `EFAULT` when the size probe does not answer `BUFFER_TOO_SMALL`, or the
///   second call fails
/// - `ENOMEM` when the record buffer cannot be allocated
pub fn query_raw(handle: &mut dyn FileProtocol, information_type: &Guid) -> FsResult<Vec<u8>> {
    let mut required = 0usize;
    let status = handle.get_info(information_type, &mut required, &mut []);
    if status != Status::BUFFER_TOO_SMALL {
        return Err(FsError::with_context(Errno::Fault, "info size probe"));
    }

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(required)
        .map_err(|_| FsError::with_context(Errno::OutOfMemory, "info buffer"))?;
    buffer.resize(required, 0);

    let mut size = required;
    let status = handle.get_info(information_type, &mut size, &mut buffer);
    if status.is_error() {
        return Err(FsError::with_context(Errno::Fault, "info fetch"));
    }
    buffer.truncate(size);
    Ok(buffer)
}

/// Fetch and decode the `EFI_FILE_INFO` record of an open handle
///
/// # Errors
///
/// Fails as [`query_raw`] does, and with `EFAULT` when the record is malformed.
pub fn file_info(handle: &mut dyn FileProtocol) -> FsResult<FileInfo> {
    let raw = query_raw(handle, &FILE_INFO_ID)?;
    FileInfo::decode(&raw).ok_or(FsError::with_context(Errno::Fault, "malformed file info"))
}

// src/constants.rs

//! Bridge constants and configuration values
//!
//! This module centralizes the fixed values shared by the POSIX layer, the
//! synthetic provider and the protocol installer.

use r_efi::efi::Guid;

/// Capacity of the descriptor table
///
/// Descriptors are never reused, so this is also the total number of streams
/// that can ever be opened by one table.
pub const MAX_FILENO: usize = 1024;

/// First descriptor handed out for a real stream
///
/// 0, 1 and 2 are permanently reserved for input, output and error.
pub const FIRST_FILENO: usize = 3;

/// `whence` value for an absolute seek
pub const SEEK_SET: i32 = 1;
/// `whence` value for a seek relative to the current position
pub const SEEK_CUR: i32 = 2;
/// `whence` value for a seek relative to the end of file
pub const SEEK_END: i32 = 3;

/// Value returned by character helpers at end of file
pub const EOF: i32 = 0xff;

/// Shell alias bound to the synthetic volume
pub const VFS_MAP_NAME: &str = "vfs:";

/// Path retained by the root node of the synthetic volume
pub const VFS_ROOT_PATH: &str = ".";

/// Vendor GUID identifying the synthetic volume's device path
/// (`6533a70d-7e54-4302-b6d7-bbe2c5672ca1`)
pub const VFS_VENDOR_GUID: Guid = Guid::from_fields(
    0x6533a70d,
    0x7e54,
    0x4302,
    0xb6,
    0xd7,
    &[0xbb, 0xe2, 0xc5, 0x67, 0x2c, 0xa1],
);

/// Placeholder volume size reported by the synthetic volume
pub const VFS_VOLUME_SIZE: u64 = 1024;

/// Placeholder free space (1 TiB), large enough that writers never hit quota
pub const VFS_FREE_SPACE: u64 = 1 << 40;

/// Block size reported by the synthetic volume
pub const VFS_BLOCK_SIZE: u32 = 512;

/// Placeholder file size reported for every synthetic node
pub const VFS_NODE_SIZE: u64 = 1024;

/// Capacity of the stack buffer a single log line is rendered into
pub const KLOG_LINE_CAPACITY: usize = 256;

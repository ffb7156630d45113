// src/lib.rs
//! efivfs - filesystem bridge for a UEFI-hosted kernel
//!
//! The crate has two faces:
//!
//! - [`kernel::fs`]: a POSIX-style stream API (open/read/write/seek/...)
//!   translated onto native `EFI_FILE_PROTOCOL` handles through a
//!   fixed-capacity descriptor table
//! - [`kernel::vfs`]: a synthetic read-only volume that *implements* the file
//!   protocol and is registered in the firmware handle database under the
//!   shell alias `vfs:`
//!
//! # Layout
//!
//! ```text
//!   application / runtime
//!            │
//!   kernel::fs::PosixFs ──── ChannelBindings (stdin/stdout/stderr)
//!            │
//!   efi::FileProtocol  ◄──── kernel::vfs::ProviderNode
//!            │                      │
//!   efi::ffi (raw tables)    kernel::vfs::install
//!            │
//!        firmware
//! ```
//!
//! `efi::sim` provides an in-memory substrate implementing the same traits.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod constants;
pub mod efi;
pub mod errors;
pub mod kernel;

pub use errors::{Errno, FsError, FsResult};
pub use kernel::fs::{Descriptor, PosixFs, StreamId, Whence};
pub use kernel::time::{epoch, try_epoch};
pub use kernel::vfs::{install_vfs_protocol, InstallReport, SyntheticVolume};

// src/efi/mod.rs
//! Substrate contract
//!
//! Rust-native rendition of the firmware interfaces the bridge consumes and
//! serves. Both faces of the bridge speak these traits:
//!
//! - the POSIX layer drives a [`FileProtocol`] it obtained from the working root
//! - the synthetic provider *implements* [`FileProtocol`] and [`SimpleFileSystem`]
//! - the installer drives [`BootServices`] and a [`ShellProtocol`]
//!
//! # Design
//!
//! ```text
//!   trait FileProtocol ◄──┬── ffi::FirmwareFile   (firmware handle)
//!                         ├── sim::MemFile        (in-memory volume)
//!                         └── vfs::ProviderNode   (synthetic volume)
//!
//!   ffi::RawFile: repr(C) table + Box<dyn FileProtocol>  ──► firmware
//! ```
//!
//! Status codes, GUIDs and the calendar record are taken from `r-efi` as-is so
//! values crossing the boundary need no translation.

pub mod device_path;
pub mod ffi;
pub mod info;
pub mod sim;
pub mod wide;

use alloc::boxed::Box;
use alloc::vec::Vec;

use bitflags::bitflags;
use r_efi::protocols::file;

pub use r_efi::efi::{Guid, Status, Time, UNSPECIFIED_TIMEZONE};
pub use r_efi::protocols::file::{INFO_ID as FILE_INFO_ID, SYSTEM_INFO_ID as FILE_SYSTEM_INFO_ID};

pub use device_path::VendorDevicePath;
pub use info::{FileInfo, FileSystemInfo};

bitflags! {
    /// Open mode bits of `EFI_FILE_PROTOCOL.Open`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileMode: u64 {
        /// Open for reading
        const READ = file::MODE_READ;
        /// Open for writing
        const WRITE = file::MODE_WRITE;
        /// Create the file if it does not exist
        const CREATE = file::MODE_CREATE;
    }
}

bitflags! {
    /// Attribute bits of `EFI_FILE_INFO.Attribute`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileAttribute: u64 {
        /// Read-only file
        const READ_ONLY = file::READ_ONLY;
        /// Hidden file
        const HIDDEN = file::HIDDEN;
        /// System file
        const SYSTEM = file::SYSTEM;
        /// Reserved bit
        const RESERVED = file::RESERVED;
        /// Directory
        const DIRECTORY = file::DIRECTORY;
        /// Archive bit
        const ARCHIVE = file::ARCHIVE;
    }
}

/// Opaque handle in the firmware handle database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EfiHandle(usize);

impl EfiHandle {
    /// Wrap a raw handle value
    #[inline]
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw handle value
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Convert from the firmware pointer representation
    #[inline]
    #[must_use]
    pub fn from_raw(handle: r_efi::efi::Handle) -> Self {
        Self(handle as usize)
    }

    /// Convert to the firmware pointer representation
    #[inline]
    #[must_use]
    pub fn as_raw(self) -> r_efi::efi::Handle {
        self.0 as r_efi::efi::Handle
    }
}

/// One open node of a hierarchical volume (`EFI_FILE_PROTOCOL`)
///
/// Buffer-carrying operations follow the firmware convention: on entry
/// `buffer_size` is the capacity of `buffer` (never larger than
/// `buffer.len()`), on return it holds the number of bytes transferred, or the
/// required size when the status is `BUFFER_TOO_SMALL`.
///
/// Closing consumes the handle, so a closed node can never be reached again.
pub trait FileProtocol {
    /// Open `name` (NUL-terminated UCS-2) relative to this node.
    fn open(
        &mut self,
        name: &[u16],
        mode: FileMode,
        attributes: FileAttribute,
    ) -> Result<Box<dyn FileProtocol>, Status>;

    /// Release the node.
    fn close(self: Box<Self>) -> Status;

    /// Delete the node and release it.
    ///
    /// Nodes that cannot be deleted are closed and report
    /// `WARN_DELETE_FAILURE`.
    fn delete(self: Box<Self>) -> Status {
        let _ = self.close();
        Status::WARN_DELETE_FAILURE
    }

    /// Read from the current position (files) or the next entry (directories).
    fn read(&mut self, buffer_size: &mut usize, buffer: &mut [u8]) -> Status;

    /// Write at the current position.
    fn write(&mut self, buffer_size: &mut usize, buffer: &[u8]) -> Status {
        let _ = buffer;
        *buffer_size = 0;
        Status::UNSUPPORTED
    }

    /// Current byte position.
    fn get_position(&mut self) -> Result<u64, Status> {
        Err(Status::UNSUPPORTED)
    }

    /// Move to an absolute byte position.
    fn set_position(&mut self, position: u64) -> Status {
        let _ = position;
        Status::UNSUPPORTED
    }

    /// Fetch an information record identified by `information_type`.
    fn get_info(
        &mut self,
        information_type: &Guid,
        buffer_size: &mut usize,
        buffer: &mut [u8],
    ) -> Status;

    /// Flush buffered data to the device.
    fn flush(&mut self) -> Status {
        Status::UNSUPPORTED
    }
}

/// Volume entry point (`EFI_SIMPLE_FILE_SYSTEM_PROTOCOL`)
pub trait SimpleFileSystem {
    /// Open the root directory of the volume.
    fn open_volume(&mut self) -> Result<Box<dyn FileProtocol>, Status>;
}

/// Wall clock (`RuntimeServices.GetTime`)
pub trait Clock {
    /// Current calendar time.
    fn now(&self) -> Result<Time, Status>;
}

/// Shell mapping service (`EFI_SHELL_PROTOCOL.SetMap`)
pub trait ShellProtocol {
    /// Bind `mapping` (for example `"vfs:"`) to a device path.
    fn set_map(&mut self, device_path: &VendorDevicePath, mapping: &str) -> Status;
}

/// Interface installed into the handle database
pub enum ProtocolInterface {
    /// `EFI_DEVICE_PATH_PROTOCOL` instance
    DevicePath(VendorDevicePath),
    /// `EFI_SIMPLE_FILE_SYSTEM_PROTOCOL` instance
    SimpleFileSystem(Box<dyn SimpleFileSystem>),
}

impl ProtocolInterface {
    /// GUID the interface is registered under
    #[must_use]
    pub fn guid(&self) -> Guid {
        match self {
            Self::DevicePath(_) => r_efi::protocols::device_path::PROTOCOL_GUID,
            Self::SimpleFileSystem(_) => r_efi::protocols::simple_file_system::PROTOCOL_GUID,
        }
    }
}

impl core::fmt::Debug for ProtocolInterface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DevicePath(dp) => f.debug_tuple("DevicePath").field(dp).finish(),
            Self::SimpleFileSystem(_) => f.write_str("SimpleFileSystem(..)"),
        }
    }
}

/// Boot-services subset used by the protocol installer
pub trait BootServices {
    /// Shell service handle returned by the lookups
    type Shell: ShellProtocol;

    /// Install `interface` on `handle`, or on a fresh handle when `None`.
    ///
    /// # Errors
    ///
    /// Returns the firmware status when the registry rejects the interface.
    fn install_protocol_interface(
        &mut self,
        handle: Option<EfiHandle>,
        interface: ProtocolInterface,
    ) -> Result<EfiHandle, Status>;

    /// Enumerate every handle in the database.
    ///
    /// # Errors
    ///
    /// Returns the firmware status when the enumeration fails.
    fn locate_handle_buffer(&mut self) -> Result<Vec<EfiHandle>, Status>;

    /// Connect drivers to `controller`.
    fn connect_controller(&mut self, controller: EfiHandle, recursive: bool) -> Status;

    /// Open the shell protocol on the image handle.
    ///
    /// # Errors
    ///
    /// Returns the firmware status when the image carries no shell protocol.
    fn open_shell_protocol(&mut self, image: EfiHandle) -> Result<Self::Shell, Status>;

    /// Locate any shell protocol instance in the database.
    ///
    /// # Errors
    ///
    /// Returns the firmware status when no instance exists.
    fn locate_shell_protocol(&mut self) -> Result<Self::Shell, Status>;
}

/// Build a calendar record from its date and time fields
///
/// The time zone is left unspecified and daylight flags cleared.
#[must_use]
pub const fn calendar(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Time {
    Time {
        year,
        month,
        day,
        hour,
        minute,
        second,
        pad1: 0,
        nanosecond: 0,
        timezone: UNSPECIFIED_TIMEZONE,
        daylight: 0,
        pad2: 0,
    }
}

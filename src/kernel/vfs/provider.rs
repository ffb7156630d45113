// src/kernel/vfs/provider.rs
//! Synthetic volume provider
//!
//! A placeholder namespace served through the firmware file protocol. It has
//! exactly one expandable level: the root, and leaves fabricated on demand
//! for whatever name is opened beneath it.
//!
//! # Design
//!
//! ```text
//!   OpenVolume ──► Root "." ──Open(name)──► Leaf name ──Open(..)──► NOT_FOUND
//!                    │   └──Open("..")───────────────────────────► NOT_FOUND
//!                    └── Read: one "." entry, then end of directory
//! ```
//!
//! - Every node reports the directory attribute, so writable opens are denied
//! - Leaves are never checked against a real entity and have no content
//! - Write, Flush, positions and SetInfo are not served; Delete only closes
//!   the node and reports `WARN_DELETE_FAILURE`

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;

use log::debug;

use crate::constants::{
    VFS_BLOCK_SIZE, VFS_FREE_SPACE, VFS_NODE_SIZE, VFS_ROOT_PATH, VFS_VOLUME_SIZE,
};
use crate::efi::{
    Clock, FileAttribute, FileInfo, FileMode, FileProtocol, FileSystemInfo, Guid,
    SimpleFileSystem, Status, Time, FILE_INFO_ID, FILE_SYSTEM_INFO_ID,
};

const TARGET: &str = "vfs";

/// Volume entry point registered in the handle database
#[derive(Clone)]
pub struct SyntheticVolume {
    clock: Rc<dyn Clock>,
}

impl SyntheticVolume {
    /// Volume stamping directory entries with `clock`
    #[must_use]
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Rc::new(clock),
        }
    }

    /// Volume sharing an existing clock
    #[must_use]
    pub fn with_shared_clock(clock: Rc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl SimpleFileSystem for SyntheticVolume {
    fn open_volume(&mut self) -> Result<Box<dyn FileProtocol>, Status> {
        let path = narrow_path(VFS_ROOT_PATH.encode_utf16())?;
        debug!(target: TARGET, "opened volume root");
        Ok(Box::new(ProviderNode {
            role: NodeRole::Root,
            cursor: 0,
            path,
            clock: Rc::clone(&self.clock),
        }))
    }
}

impl core::fmt::Debug for SyntheticVolume {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyntheticVolume").finish_non_exhaustive()
    }
}

/// Position of a node in the one-level tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Volume root, created by `OpenVolume`
    Root,
    /// Placeholder created by `Open` on the root
    Leaf,
}

/// One open node of the synthetic volume
pub struct ProviderNode {
    role: NodeRole,
    cursor: usize,
    path: String,
    clock: Rc<dyn Clock>,
}

impl ProviderNode {
    /// Role of this node
    #[must_use]
    pub const fn role(&self) -> NodeRole {
        self.role
    }

    /// Path retained by this node
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn now(&self) -> Time {
        self.clock.now().unwrap_or_default()
    }

    fn directory_entry(&self) -> FileInfo {
        let now = self.now();
        FileInfo {
            file_size: 0,
            physical_size: 0,
            create_time: now,
            last_access_time: now,
            modification_time: now,
            attribute: FileAttribute::DIRECTORY,
            file_name: String::from(VFS_ROOT_PATH),
        }
    }

    fn node_info(&self) -> FileInfo {
        let now = self.now();
        FileInfo {
            file_size: VFS_NODE_SIZE,
            physical_size: VFS_NODE_SIZE,
            create_time: now,
            last_access_time: now,
            modification_time: now,
            attribute: FileAttribute::DIRECTORY,
            file_name: self.path.clone(),
        }
    }
}

impl FileProtocol for ProviderNode {
    fn open(
        &mut self,
        name: &[u16],
        mode: FileMode,
        _attributes: FileAttribute,
    ) -> Result<Box<dyn FileProtocol>, Status> {
        if mode.intersects(FileMode::WRITE | FileMode::CREATE) {
            return Err(Status::ACCESS_DENIED);
        }
        let units = name.iter().copied().take_while(|&unit| unit != 0);
        let path = narrow_path(units)?;

        match self.role {
            NodeRole::Root if path == ".." => {
                debug!(target: TARGET, "not found: ..");
                Err(Status::NOT_FOUND)
            }
            NodeRole::Root => {
                debug!(target: TARGET, "opened \"{}\"", path);
                Ok(Box::new(ProviderNode {
                    role: NodeRole::Leaf,
                    cursor: 0,
                    path,
                    clock: Rc::clone(&self.clock),
                }))
            }
            NodeRole::Leaf => {
                debug!(target: TARGET, "not found: {}\\{}", self.path, path);
                Err(Status::NOT_FOUND)
            }
        }
    }

    fn close(self: Box<Self>) -> Status {
        debug!(target: TARGET, "closed \"{}\"", self.path);
        Status::SUCCESS
    }

    fn read(&mut self, buffer_size: &mut usize, buffer: &mut [u8]) -> Status {
        if self.role == NodeRole::Leaf || self.cursor >= 1 {
            *buffer_size = 0;
            return Status::SUCCESS;
        }

        let entry = self.directory_entry();
        let required = entry.encoded_len();
        if *buffer_size < required || buffer.len() < required {
            *buffer_size = required;
            return Status::BUFFER_TOO_SMALL;
        }
        *buffer_size = entry.encode(buffer);
        self.cursor += 1;
        Status::SUCCESS
    }

    fn get_info(
        &mut self,
        information_type: &Guid,
        buffer_size: &mut usize,
        buffer: &mut [u8],
    ) -> Status {
        let (required, encoded) = if *information_type == FILE_SYSTEM_INFO_ID {
            let info = FileSystemInfo {
                read_only: false,
                volume_size: VFS_VOLUME_SIZE,
                free_space: VFS_FREE_SPACE,
                block_size: VFS_BLOCK_SIZE,
                volume_label: String::new(),
            };
            let required = info.encoded_len();
            let fits = *buffer_size >= required && buffer.len() >= required;
            (required, fits.then(|| info.encode(buffer)))
        } else if *information_type == FILE_INFO_ID {
            let info = self.node_info();
            let required = info.encoded_len();
            let fits = *buffer_size >= required && buffer.len() >= required;
            (required, fits.then(|| info.encode(buffer)))
        } else {
            return Status::UNSUPPORTED;
        };

        match encoded {
            Some(written) => {
                *buffer_size = written;
                Status::SUCCESS
            }
            None => {
                *buffer_size = required;
                Status::BUFFER_TOO_SMALL
            }
        }
    }
}

impl core::fmt::Debug for ProviderNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderNode")
            .field("role", &self.role)
            .field("cursor", &self.cursor)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Narrow a UCS-2 name, reporting allocation failure as `OUT_OF_RESOURCES`
fn narrow_path(units: impl Iterator<Item = u16> + Clone) -> Result<String, Status> {
    let mut path = String::new();
    path.try_reserve(units.clone().count())
        .map_err(|_| Status::OUT_OF_RESOURCES)?;
    path.extend(
        char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
    Ok(path)
}

// src/efi/sim.rs
//! In-memory substrate
//!
//! Implementations of the substrate traits that need no firmware: a volume
//! held in a `BTreeMap`, a handle database, a shell mapping table and fixed
//! clocks. Unit tests, integration tests and host tooling drive the bridge
//! against these.
//!
//! # Design
//!
//! ```text
//!   MemVolume ─── Rc<RefCell<MemTree>> ◄─── MemFile (one per open node)
//!                       │
//!                       └── BTreeMap<path, MemNode>   ("" is the root)
//! ```
//!
//! Paths are stored with the native `\` separator and no leading separator.
//! Faults can be injected per operation kind to exercise error paths.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use super::info::{FileInfo, FileSystemInfo};
use super::{
    calendar, wide, BootServices, Clock, EfiHandle, FileAttribute, FileMode, FileProtocol,
    Guid, ProtocolInterface, ShellProtocol, SimpleFileSystem, Status, Time, VendorDevicePath,
    FILE_INFO_ID, FILE_SYSTEM_INFO_ID,
};

const BLOCK: u64 = 512;

struct MemNode {
    data: Vec<u8>,
    directory: bool,
    read_only: bool,
    modified: Time,
}

impl MemNode {
    fn new(directory: bool, modified: Time) -> Self {
        Self {
            data: Vec::new(),
            directory,
            read_only: false,
            modified,
        }
    }
}

#[derive(Default)]
struct Faults {
    open: Option<Status>,
    get_info: Option<Status>,
    flush: Option<Status>,
}

struct MemTree {
    nodes: BTreeMap<String, MemNode>,
    clock: Time,
    faults: Faults,
    open_handles: usize,
}

impl MemTree {
    fn children(&self, dir: &str) -> impl Iterator<Item = (&String, &MemNode)> {
        self.nodes
            .iter()
            .filter(move |(path, _)| !path.is_empty() && parent_of(path) == dir)
    }

    fn file_info(&self, path: &str, node: &MemNode) -> FileInfo {
        let mut attribute = FileAttribute::empty();
        if node.directory {
            attribute |= FileAttribute::DIRECTORY;
        } else {
            attribute |= FileAttribute::ARCHIVE;
        }
        if node.read_only {
            attribute |= FileAttribute::READ_ONLY;
        }
        let size = node.data.len() as u64;
        FileInfo {
            file_size: size,
            physical_size: size.div_ceil(BLOCK) * BLOCK,
            create_time: node.modified,
            last_access_time: node.modified,
            modification_time: node.modified,
            attribute,
            file_name: file_name(path).to_string(),
        }
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('\\').map_or("", |(parent, _)| parent)
}

fn file_name(path: &str) -> &str {
    path.rsplit_once('\\').map_or(path, |(_, name)| name)
}

/// Resolve `name` against the directory `base`
///
/// Returns `None` when `..` climbs above the root.
fn resolve(base: &str, name: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    if !name.starts_with('\\') {
        parts.extend(base.split('\\').filter(|p| !p.is_empty()));
    }
    for part in name.split('\\') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("\\"))
}

fn normalize(path: &str) -> String {
    resolve("", &path.replace('/', "\\")).unwrap_or_default()
}

enum InfoRecord {
    File(FileInfo),
    Volume(FileSystemInfo),
}

impl InfoRecord {
    fn encoded_len(&self) -> usize {
        match self {
            Self::File(info) => info.encoded_len(),
            Self::Volume(info) => info.encoded_len(),
        }
    }

    fn encode(&self, out: &mut [u8]) -> usize {
        match self {
            Self::File(info) => info.encode(out),
            Self::Volume(info) => info.encode(out),
        }
    }
}

/// In-memory volume
#[derive(Clone)]
pub struct MemVolume {
    tree: Rc<RefCell<MemTree>>,
}

impl MemVolume {
    /// Empty volume whose clock reads 2024-01-01 00:00:00
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(calendar(2024, 1, 1, 0, 0, 0))
    }

    /// Empty volume stamping nodes with `clock`
    #[must_use]
    pub fn with_clock(clock: Time) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::new(), MemNode::new(true, clock));
        Self {
            tree: Rc::new(RefCell::new(MemTree {
                nodes,
                clock,
                faults: Faults::default(),
                open_handles: 0,
            })),
        }
    }

    /// Add (or replace) a regular file. Missing parents are created.
    pub fn add_file(&self, path: &str, contents: &[u8]) {
        let path = normalize(path);
        self.add_parents(&path);
        let mut tree = self.tree.borrow_mut();
        let mut node = MemNode::new(false, tree.clock);
        node.data.extend_from_slice(contents);
        tree.nodes.insert(path, node);
    }

    /// Add a directory. Missing parents are created.
    pub fn add_dir(&self, path: &str) {
        let path = normalize(path);
        self.add_parents(&path);
        let mut tree = self.tree.borrow_mut();
        let clock = tree.clock;
        tree.nodes.entry(path).or_insert_with(|| MemNode::new(true, clock));
    }

    fn add_parents(&self, path: &str) {
        let mut tree = self.tree.borrow_mut();
        let clock = tree.clock;
        let mut parent = parent_of(path);
        while !parent.is_empty() {
            tree.nodes
                .entry(parent.to_string())
                .or_insert_with(|| MemNode::new(true, clock));
            parent = parent_of(parent);
        }
    }

    /// Mark a node read-only; writes are rejected and deletes warn
    pub fn set_read_only(&self, path: &str) {
        if let Some(node) = self.tree.borrow_mut().nodes.get_mut(&normalize(path)) {
            node.read_only = true;
        }
    }

    /// Set the modification time of a node
    pub fn set_modified(&self, path: &str, time: Time) {
        if let Some(node) = self.tree.borrow_mut().nodes.get_mut(&normalize(path)) {
            node.modified = time;
        }
    }

    /// Contents of a regular file
    #[must_use]
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.tree
            .borrow()
            .nodes
            .get(&normalize(path))
            .filter(|node| !node.directory)
            .map(|node| node.data.clone())
    }

    /// Whether a node exists
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.tree.borrow().nodes.contains_key(&normalize(path))
    }

    /// Whether a node exists and is a directory
    #[must_use]
    pub fn is_directory(&self, path: &str) -> bool {
        self.tree
            .borrow()
            .nodes
            .get(&normalize(path))
            .is_some_and(|node| node.directory)
    }

    /// Number of nodes currently open
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.tree.borrow().open_handles
    }

    /// Make every `Open` fail with `status` (or stop failing with `None`)
    pub fn fail_open(&self, status: Option<Status>) {
        self.tree.borrow_mut().faults.open = status;
    }

    /// Make every `GetInfo` fail with `status`
    pub fn fail_get_info(&self, status: Option<Status>) {
        self.tree.borrow_mut().faults.get_info = status;
    }

    /// Make every `Flush` fail with `status`
    pub fn fail_flush(&self, status: Option<Status>) {
        self.tree.borrow_mut().faults.flush = status;
    }

    /// Open the root directory
    #[must_use]
    pub fn open_root(&self) -> Box<dyn FileProtocol> {
        self.tree.borrow_mut().open_handles += 1;
        Box::new(MemFile {
            tree: Rc::clone(&self.tree),
            path: String::new(),
            mode: FileMode::READ,
            position: 0,
            cursor: 0,
        })
    }
}

impl Default for MemVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for MemVolume {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let tree = self.tree.borrow();
        f.debug_struct("MemVolume")
            .field("nodes", &tree.nodes.len())
            .field("open_handles", &tree.open_handles)
            .finish()
    }
}

impl SimpleFileSystem for MemVolume {
    fn open_volume(&mut self) -> Result<Box<dyn FileProtocol>, Status> {
        Ok(self.open_root())
    }
}

/// Open node of a [`MemVolume`]
pub struct MemFile {
    tree: Rc<RefCell<MemTree>>,
    path: String,
    mode: FileMode,
    position: u64,
    cursor: usize,
}

impl MemFile {
    fn release(&self) {
        let mut tree = self.tree.borrow_mut();
        tree.open_handles = tree.open_handles.saturating_sub(1);
    }
}

impl FileProtocol for MemFile {
    fn open(
        &mut self,
        name: &[u16],
        mode: FileMode,
        attributes: FileAttribute,
    ) -> Result<Box<dyn FileProtocol>, Status> {
        let mut tree = self.tree.borrow_mut();
        if let Some(status) = tree.faults.open {
            return Err(status);
        }
        let path = resolve(&self.path, &wide::from_wide(name)).ok_or(Status::NOT_FOUND)?;

        if !tree.nodes.contains_key(&path) {
            if !mode.contains(FileMode::CREATE) {
                return Err(Status::NOT_FOUND);
            }
            match tree.nodes.get(parent_of(&path)) {
                Some(parent) if parent.directory => {}
                _ => return Err(Status::NOT_FOUND),
            }
            let node = MemNode::new(attributes.contains(FileAttribute::DIRECTORY), tree.clock);
            tree.nodes.insert(path.clone(), node);
        } else if mode.contains(FileMode::WRITE)
            && tree.nodes.get(&path).is_some_and(|node| node.read_only)
        {
            return Err(Status::WRITE_PROTECTED);
        }

        tree.open_handles += 1;
        Ok(Box::new(MemFile {
            tree: Rc::clone(&self.tree),
            path,
            mode,
            position: 0,
            cursor: 0,
        }))
    }

    fn close(self: Box<Self>) -> Status {
        self.release();
        Status::SUCCESS
    }

    fn delete(self: Box<Self>) -> Status {
        self.release();
        let mut tree = self.tree.borrow_mut();
        let removable = match tree.nodes.get(&self.path) {
            Some(node) => !node.read_only && !self.path.is_empty(),
            None => false,
        };
        if !removable || tree.children(&self.path).next().is_some() {
            return Status::WARN_DELETE_FAILURE;
        }
        tree.nodes.remove(&self.path);
        Status::SUCCESS
    }

    fn read(&mut self, buffer_size: &mut usize, buffer: &mut [u8]) -> Status {
        let tree = self.tree.borrow();
        let Some(node) = tree.nodes.get(&self.path) else {
            *buffer_size = 0;
            return Status::DEVICE_ERROR;
        };

        if node.directory {
            let Some((path, child)) = tree.children(&self.path).nth(self.cursor) else {
                *buffer_size = 0;
                return Status::SUCCESS;
            };
            let info = tree.file_info(path, child);
            let required = info.encoded_len();
            if *buffer_size < required || buffer.len() < required {
                *buffer_size = required;
                return Status::BUFFER_TOO_SMALL;
            }
            *buffer_size = info.encode(buffer);
            self.cursor += 1;
            return Status::SUCCESS;
        }

        let capacity = (*buffer_size).min(buffer.len());
        let start = usize::try_from(self.position)
            .unwrap_or(usize::MAX)
            .min(node.data.len());
        let count = capacity.min(node.data.len() - start);
        buffer[..count].copy_from_slice(&node.data[start..start + count]);
        self.position += count as u64;
        *buffer_size = count;
        Status::SUCCESS
    }

    fn write(&mut self, buffer_size: &mut usize, buffer: &[u8]) -> Status {
        let mut tree = self.tree.borrow_mut();
        let clock = tree.clock;
        let Some(node) = tree.nodes.get_mut(&self.path) else {
            *buffer_size = 0;
            return Status::DEVICE_ERROR;
        };
        if node.directory {
            *buffer_size = 0;
            return Status::UNSUPPORTED;
        }
        if !self.mode.contains(FileMode::WRITE) {
            *buffer_size = 0;
            return Status::ACCESS_DENIED;
        }

        let count = (*buffer_size).min(buffer.len());
        let Ok(start) = usize::try_from(self.position) else {
            *buffer_size = 0;
            return Status::VOLUME_FULL;
        };
        let end = start + count;
        if node.data.len() < end {
            node.data.resize(end, 0);
        }
        node.data[start..end].copy_from_slice(&buffer[..count]);
        node.modified = clock;
        self.position = end as u64;
        *buffer_size = count;
        Status::SUCCESS
    }

    fn get_position(&mut self) -> Result<u64, Status> {
        match self.tree.borrow().nodes.get(&self.path) {
            Some(node) if node.directory => Err(Status::UNSUPPORTED),
            Some(_) => Ok(self.position),
            None => Err(Status::DEVICE_ERROR),
        }
    }

    fn set_position(&mut self, position: u64) -> Status {
        match self.tree.borrow().nodes.get(&self.path) {
            Some(node) if node.directory => {
                if position != 0 {
                    return Status::UNSUPPORTED;
                }
                self.cursor = 0;
            }
            Some(node) => {
                self.position = if position == u64::MAX {
                    node.data.len() as u64
                } else {
                    position
                };
            }
            None => return Status::DEVICE_ERROR,
        }
        Status::SUCCESS
    }

    fn get_info(
        &mut self,
        information_type: &Guid,
        buffer_size: &mut usize,
        buffer: &mut [u8],
    ) -> Status {
        let tree = self.tree.borrow();
        if let Some(status) = tree.faults.get_info {
            return status;
        }

        let record = if *information_type == FILE_INFO_ID {
            let Some(node) = tree.nodes.get(&self.path) else {
                return Status::DEVICE_ERROR;
            };
            InfoRecord::File(tree.file_info(&self.path, node))
        } else if *information_type == FILE_SYSTEM_INFO_ID {
            let used: u64 = tree.nodes.values().map(|n| n.data.len() as u64).sum();
            InfoRecord::Volume(FileSystemInfo {
                read_only: false,
                volume_size: used + (1 << 30),
                free_space: 1 << 30,
                block_size: BLOCK as u32,
                volume_label: String::from("MEMFS"),
            })
        } else {
            return Status::UNSUPPORTED;
        };

        let required = record.encoded_len();
        if *buffer_size < required || buffer.len() < required {
            *buffer_size = required;
            return Status::BUFFER_TOO_SMALL;
        }
        *buffer_size = record.encode(buffer);
        Status::SUCCESS
    }

    fn flush(&mut self) -> Status {
        self.tree.borrow().faults.flush.unwrap_or(Status::SUCCESS)
    }
}

/// Clock that always reads the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Time);

impl Clock for FixedClock {
    fn now(&self) -> Result<Time, Status> {
        Ok(self.0)
    }
}

/// Clock whose every read fails with `DEVICE_ERROR`
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokenClock;

impl Clock for BrokenClock {
    fn now(&self) -> Result<Time, Status> {
        Err(Status::DEVICE_ERROR)
    }
}

/// Where the simulated shell protocol can be found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellPlacement {
    /// Installed on the image handle (found by `OpenProtocol`)
    OnImage,
    /// Installed elsewhere (found only by `LocateProtocol`)
    Registered,
    /// No shell running
    Absent,
}

type MapTable = Rc<RefCell<Vec<(String, VendorDevicePath)>>>;

/// Simulated shell protocol instance
#[derive(Debug, Clone)]
pub struct SimShell {
    maps: MapTable,
    refuse: Option<Status>,
}

impl ShellProtocol for SimShell {
    fn set_map(&mut self, device_path: &VendorDevicePath, mapping: &str) -> Status {
        if let Some(status) = self.refuse {
            return status;
        }
        let mut maps = self.maps.borrow_mut();
        maps.retain(|(name, _)| name != mapping);
        maps.push((mapping.to_string(), *device_path));
        Status::SUCCESS
    }
}

struct SimHandle {
    handle: EfiHandle,
    interfaces: Vec<ProtocolInterface>,
}

/// Simulated handle database and boot services
pub struct SimBootServices {
    handles: Vec<SimHandle>,
    next_handle: usize,
    image: EfiHandle,
    shell: ShellPlacement,
    maps: MapTable,
    install_faults: Vec<(Guid, Status)>,
    locate_fault: Option<Status>,
    set_map_fault: Option<Status>,
    connected: Vec<(EfiHandle, bool)>,
}

impl SimBootServices {
    /// Database holding only the image handle
    #[must_use]
    pub fn new(shell: ShellPlacement) -> Self {
        let mut bs = Self {
            handles: Vec::new(),
            next_handle: 0x1000,
            image: EfiHandle::new(0),
            shell,
            maps: Rc::new(RefCell::new(Vec::new())),
            install_faults: Vec::new(),
            locate_fault: None,
            set_map_fault: None,
            connected: Vec::new(),
        };
        bs.image = bs.add_handle();
        bs
    }

    /// Add an empty handle (stands in for a pre-existing controller)
    pub fn add_handle(&mut self) -> EfiHandle {
        let handle = EfiHandle::new(self.next_handle);
        self.next_handle += 0x10;
        self.handles.push(SimHandle {
            handle,
            interfaces: Vec::new(),
        });
        handle
    }

    /// Image handle of the running kernel
    #[must_use]
    pub const fn image_handle(&self) -> EfiHandle {
        self.image
    }

    /// Reject installs of `guid` with `status`
    pub fn fail_install(&mut self, guid: Guid, status: Status) {
        self.install_faults.push((guid, status));
    }

    /// Make `LocateHandleBuffer` fail
    pub fn fail_locate(&mut self, status: Option<Status>) {
        self.locate_fault = status;
    }

    /// Make the shell refuse `SetMap`
    pub fn fail_set_map(&mut self, status: Option<Status>) {
        self.set_map_fault = status;
    }

    /// Number of handles in the database
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Interfaces installed on `handle`
    #[must_use]
    pub fn interfaces(&self, handle: EfiHandle) -> Option<&[ProtocolInterface]> {
        self.handles
            .iter()
            .find(|h| h.handle == handle)
            .map(|h| h.interfaces.as_slice())
    }

    /// Device path installed on `handle`
    #[must_use]
    pub fn device_path(&self, handle: EfiHandle) -> Option<VendorDevicePath> {
        self.interfaces(handle)?.iter().find_map(|iface| match iface {
            ProtocolInterface::DevicePath(dp) => Some(*dp),
            ProtocolInterface::SimpleFileSystem(_) => None,
        })
    }

    /// Simple file system installed on `handle`
    pub fn file_system(
        &mut self,
        handle: EfiHandle,
    ) -> Option<&mut (dyn SimpleFileSystem + 'static)> {
        self.handles
            .iter_mut()
            .find(|h| h.handle == handle)?
            .interfaces
            .iter_mut()
            .find_map(|iface| match iface {
                ProtocolInterface::SimpleFileSystem(fs) => Some(fs.as_mut()),
                ProtocolInterface::DevicePath(_) => None,
            })
    }

    /// Handles passed to `ConnectController`, with their recursive flag
    #[must_use]
    pub fn connected(&self) -> &[(EfiHandle, bool)] {
        &self.connected
    }

    /// Aliases bound through the shell
    #[must_use]
    pub fn mappings(&self) -> Vec<(String, VendorDevicePath)> {
        self.maps.borrow().clone()
    }

    fn shell(&self) -> SimShell {
        SimShell {
            maps: Rc::clone(&self.maps),
            refuse: self.set_map_fault,
        }
    }
}

impl core::fmt::Debug for SimBootServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimBootServices")
            .field("handles", &self.handles.len())
            .field("image", &self.image)
            .field("shell", &self.shell)
            .finish()
    }
}

impl BootServices for SimBootServices {
    type Shell = SimShell;

    fn install_protocol_interface(
        &mut self,
        handle: Option<EfiHandle>,
        interface: ProtocolInterface,
    ) -> Result<EfiHandle, Status> {
        let guid = interface.guid();
        if let Some(&(_, status)) = self.install_faults.iter().find(|(g, _)| *g == guid) {
            return Err(status);
        }

        let handle = match handle {
            Some(handle) => handle,
            None => self.add_handle(),
        };
        let entry = self
            .handles
            .iter_mut()
            .find(|h| h.handle == handle)
            .ok_or(Status::INVALID_PARAMETER)?;
        if entry.interfaces.iter().any(|i| i.guid() == guid) {
            return Err(Status::INVALID_PARAMETER);
        }
        entry.interfaces.push(interface);
        Ok(handle)
    }

    fn locate_handle_buffer(&mut self) -> Result<Vec<EfiHandle>, Status> {
        if let Some(status) = self.locate_fault {
            return Err(status);
        }
        Ok(self.handles.iter().map(|h| h.handle).collect())
    }

    fn connect_controller(&mut self, controller: EfiHandle, recursive: bool) -> Status {
        if !self.handles.iter().any(|h| h.handle == controller) {
            return Status::INVALID_PARAMETER;
        }
        self.connected.push((controller, recursive));
        Status::SUCCESS
    }

    fn open_shell_protocol(&mut self, image: EfiHandle) -> Result<Self::Shell, Status> {
        if self.shell == ShellPlacement::OnImage && image == self.image {
            Ok(self.shell())
        } else {
            Err(Status::UNSUPPORTED)
        }
    }

    fn locate_shell_protocol(&mut self) -> Result<Self::Shell, Status> {
        match self.shell {
            ShellPlacement::OnImage | ShellPlacement::Registered => Ok(self.shell()),
            ShellPlacement::Absent => Err(Status::NOT_FOUND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> Vec<u16> {
        wide::to_native_path(s).expect("conversion failed")
    }

    #[test]
    fn test_resolve_paths() {
        assert_eq!(resolve("", "a\\b").as_deref(), Some("a\\b"));
        assert_eq!(resolve("a", "..\\c").as_deref(), Some("c"));
        assert_eq!(resolve("a", "\\c").as_deref(), Some("c"));
        assert_eq!(resolve("", ".."), None);
    }

    #[test]
    fn test_open_read_and_close() {
        let volume = MemVolume::new();
        volume.add_file("docs/readme.txt", b"hello");

        let mut root = volume.open_root();
        let mut file = root
            .open(&wide("docs/readme.txt"), FileMode::READ, FileAttribute::empty())
            .expect("open failed");
        assert_eq!(volume.open_handles(), 2);

        let mut buf = [0u8; 16];
        let mut size = buf.len();
        assert_eq!(file.read(&mut size, &mut buf), Status::SUCCESS);
        assert_eq!(&buf[..size], b"hello");

        assert_eq!(file.close(), Status::SUCCESS);
        assert_eq!(root.close(), Status::SUCCESS);
        assert_eq!(volume.open_handles(), 0);
    }

    #[test]
    fn test_create_and_write() {
        let volume = MemVolume::new();
        let mut root = volume.open_root();
        let mut file = root
            .open(
                &wide("new.bin"),
                FileMode::READ | FileMode::WRITE | FileMode::CREATE,
                FileAttribute::empty(),
            )
            .expect("create failed");

        let mut size = 3;
        assert_eq!(file.write(&mut size, b"abc"), Status::SUCCESS);
        assert_eq!(file.set_position(1), Status::SUCCESS);
        let mut size = 1;
        assert_eq!(file.write(&mut size, b"X"), Status::SUCCESS);
        assert_eq!(volume.contents("new.bin").as_deref(), Some(&b"aXc"[..]));
        let _ = file.close();
        let _ = root.close();
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let volume = MemVolume::new();
        let mut root = volume.open_root();
        let result = root.open(&wide("nope"), FileMode::READ, FileAttribute::empty());
        assert_eq!(result.err(), Some(Status::NOT_FOUND));
    }

    #[test]
    fn test_directory_enumeration_two_phase() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"1");
        volume.add_dir("sub");
        let mut root = volume.open_root();

        let mut size = 0;
        assert_eq!(root.read(&mut size, &mut []), Status::BUFFER_TOO_SMALL);
        let mut buf = vec![0u8; size];
        assert_eq!(root.read(&mut size, &mut buf), Status::SUCCESS);
        let first = FileInfo::decode(&buf).expect("decode failed");
        assert_eq!(first.file_name, "a.txt");

        let mut buf = [0u8; 256];
        let mut size = buf.len();
        assert_eq!(root.read(&mut size, &mut buf), Status::SUCCESS);
        assert!(FileInfo::decode(&buf[..size]).expect("decode failed").is_directory());

        let mut size = buf.len();
        assert_eq!(root.read(&mut size, &mut buf), Status::SUCCESS);
        assert_eq!(size, 0);
    }

    #[test]
    fn test_delete_read_only_warns() {
        let volume = MemVolume::new();
        volume.add_file("locked", b"");
        volume.set_read_only("locked");
        let mut root = volume.open_root();
        let file = root
            .open(&wide("locked"), FileMode::READ, FileAttribute::empty())
            .expect("open failed");
        assert_eq!(file.delete(), Status::WARN_DELETE_FAILURE);
        assert!(volume.exists("locked"));
        assert_eq!(volume.open_handles(), 1);
    }

    #[test]
    fn test_install_on_same_handle() {
        let mut bs = SimBootServices::new(ShellPlacement::Absent);
        let handle = bs
            .install_protocol_interface(
                None,
                ProtocolInterface::DevicePath(VendorDevicePath::new(
                    crate::constants::VFS_VENDOR_GUID,
                )),
            )
            .expect("install failed");
        bs.install_protocol_interface(
            Some(handle),
            ProtocolInterface::SimpleFileSystem(Box::new(MemVolume::new())),
        )
        .expect("install failed");

        assert_eq!(bs.interfaces(handle).map(<[_]>::len), Some(2));
        assert!(bs.file_system(handle).is_some());
        assert_eq!(bs.locate_shell_protocol().err(), Some(Status::NOT_FOUND));
    }
}

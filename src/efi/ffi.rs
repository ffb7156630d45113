// src/efi/ffi.rs
//! Firmware glue
//!
//! Two directions cross the boundary here:
//!
//! - **Serving**: [`RawFile`] and [`RawVolume`] wrap a Rust
//!   [`FileProtocol`]/[`SimpleFileSystem`] behind a `repr(C)` protocol table
//!   so firmware (and the shell) can call into it.
//! - **Consuming**: [`FirmwareFile`], [`FirmwareBootServices`],
//!   [`FirmwareShell`] and [`FirmwareClock`] drive firmware tables through the
//!   Rust traits.
//!
//! # Design
//!
//! ```text
//!   *mut file::Protocol ──► RawFile { proto: file::Protocol, inner: Box<dyn FileProtocol> }
//!                                     ▲ first field, so the table pointer is
//!                                     │ also the record pointer
//! ```
//!
//! Table slots the bridge never serves (`SetInfo` and the `*Ex` variants) are
//! filled with thunks returning `UNSUPPORTED`.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ffi::c_void;
use core::ptr::{self, NonNull};

use r_efi::efi;
use r_efi::protocols::{file, shell, simple_file_system};

use super::{
    wide, BootServices, Clock, EfiHandle, FileAttribute, FileMode, FileProtocol, Guid,
    ProtocolInterface, ShellProtocol, SimpleFileSystem, Status, Time, VendorDevicePath,
};

// ============================================================================
// Serving: Rust implementations exposed as firmware tables
// ============================================================================

/// Firmware-visible record of one served file node
#[repr(C)]
pub struct RawFile {
    proto: file::Protocol,
    inner: Box<dyn FileProtocol>,
}

impl RawFile {
    const TABLE: file::Protocol = file::Protocol {
        revision: file::REVISION,
        open: file_open,
        close: file_close,
        delete: file_delete,
        read: file_read,
        write: file_write,
        get_position: file_get_position,
        set_position: file_set_position,
        get_info: file_get_info,
        set_info: file_set_info,
        flush: file_flush,
        open_ex: file_open_ex,
        read_ex: file_io_ex,
        write_ex: file_io_ex,
        flush_ex: file_io_ex,
    };

    /// Leak `inner` into a record and return its protocol table pointer
    ///
    /// Ownership passes to firmware; the record is reclaimed by the `Close`
    /// or `Delete` thunk.
    #[must_use]
    pub fn into_raw(inner: Box<dyn FileProtocol>) -> *mut file::Protocol {
        let record = Box::new(RawFile {
            proto: Self::TABLE,
            inner,
        });
        Box::into_raw(record).cast()
    }

    /// # Safety
    ///
    /// `this` must come from [`RawFile::into_raw`] and not have been closed.
    unsafe fn from_this<'a>(this: *mut file::Protocol) -> Option<&'a mut RawFile> {
        // SAFETY: `proto` is the first field of a repr(C) struct.
        unsafe { this.cast::<RawFile>().as_mut() }
    }

    /// # Safety
    ///
    /// As [`RawFile::from_this`]; the pointer is dead afterwards.
    unsafe fn reclaim(this: *mut file::Protocol) -> Option<Box<RawFile>> {
        if this.is_null() {
            return None;
        }
        // SAFETY: caller guarantees provenance from `into_raw`.
        Some(unsafe { Box::from_raw(this.cast::<RawFile>()) })
    }
}

/// Length of a NUL-terminated UCS-2 string, terminator excluded
///
/// # Safety
///
/// `s` must point to a readable, NUL-terminated string.
unsafe fn wide_strlen(s: *const u16) -> usize {
    let mut len = 0;
    // SAFETY: the terminator bounds the walk.
    while unsafe { *s.add(len) } != 0 {
        len += 1;
    }
    len
}

/// # Safety
///
/// `buffer` must be valid for `len` bytes when non-null.
unsafe fn byte_slice<'a>(buffer: *mut c_void, len: usize) -> &'a mut [u8] {
    if buffer.is_null() || len == 0 {
        &mut []
    } else {
        // SAFETY: caller guarantees the extent.
        unsafe { core::slice::from_raw_parts_mut(buffer.cast::<u8>(), len) }
    }
}

extern "efiapi" fn file_open(
    this: *mut file::Protocol,
    new_handle: *mut *mut file::Protocol,
    file_name: *mut efi::Char16,
    open_mode: u64,
    attributes: u64,
) -> Status {
    if new_handle.is_null() || file_name.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // SAFETY: firmware hands back the pointer we produced in `into_raw`.
    let Some(node) = (unsafe { RawFile::from_this(this) }) else {
        return Status::INVALID_PARAMETER;
    };
    // SAFETY: `file_name` is NUL-terminated per the protocol contract.
    let name = unsafe {
        let len = wide_strlen(file_name);
        core::slice::from_raw_parts(file_name, len + 1)
    };
    match node.inner.open(
        name,
        FileMode::from_bits_retain(open_mode),
        FileAttribute::from_bits_retain(attributes),
    ) {
        Ok(child) => {
            // SAFETY: checked non-null above.
            unsafe { *new_handle = RawFile::into_raw(child) };
            Status::SUCCESS
        }
        Err(status) => status,
    }
}

extern "efiapi" fn file_close(this: *mut file::Protocol) -> Status {
    // SAFETY: `Close` ends the handle's life.
    match unsafe { RawFile::reclaim(this) } {
        Some(record) => record.inner.close(),
        None => Status::INVALID_PARAMETER,
    }
}

extern "efiapi" fn file_delete(this: *mut file::Protocol) -> Status {
    // SAFETY: `Delete` ends the handle's life.
    match unsafe { RawFile::reclaim(this) } {
        Some(record) => record.inner.delete(),
        None => Status::INVALID_PARAMETER,
    }
}

extern "efiapi" fn file_read(
    this: *mut file::Protocol,
    buffer_size: *mut usize,
    buffer: *mut c_void,
) -> Status {
    // SAFETY: see `RawFile::from_this`; `buffer_size` is checked below.
    let (Some(node), Some(size)) = (unsafe { RawFile::from_this(this) }, unsafe {
        buffer_size.as_mut()
    }) else {
        return Status::INVALID_PARAMETER;
    };
    // SAFETY: the caller's buffer spans `*buffer_size` bytes.
    let slice = unsafe { byte_slice(buffer, *size) };
    node.inner.read(size, slice)
}

extern "efiapi" fn file_write(
    this: *mut file::Protocol,
    buffer_size: *mut usize,
    buffer: *mut c_void,
) -> Status {
    // SAFETY: as in `file_read`.
    let (Some(node), Some(size)) = (unsafe { RawFile::from_this(this) }, unsafe {
        buffer_size.as_mut()
    }) else {
        return Status::INVALID_PARAMETER;
    };
    // SAFETY: the caller's buffer spans `*buffer_size` bytes.
    let slice = unsafe { byte_slice(buffer, *size) };
    node.inner.write(size, slice)
}

extern "efiapi" fn file_get_position(this: *mut file::Protocol, position: *mut u64) -> Status {
    // SAFETY: see `RawFile::from_this`.
    let (Some(node), Some(out)) = (unsafe { RawFile::from_this(this) }, unsafe {
        position.as_mut()
    }) else {
        return Status::INVALID_PARAMETER;
    };
    match node.inner.get_position() {
        Ok(pos) => {
            *out = pos;
            Status::SUCCESS
        }
        Err(status) => status,
    }
}

extern "efiapi" fn file_set_position(this: *mut file::Protocol, position: u64) -> Status {
    // SAFETY: see `RawFile::from_this`.
    match unsafe { RawFile::from_this(this) } {
        Some(node) => node.inner.set_position(position),
        None => Status::INVALID_PARAMETER,
    }
}

extern "efiapi" fn file_get_info(
    this: *mut file::Protocol,
    information_type: *mut efi::Guid,
    buffer_size: *mut usize,
    buffer: *mut c_void,
) -> Status {
    // SAFETY: all three pointers are checked for null before use.
    let (Some(node), Some(guid), Some(size)) = (
        unsafe { RawFile::from_this(this) },
        unsafe { information_type.as_ref() },
        unsafe { buffer_size.as_mut() },
    ) else {
        return Status::INVALID_PARAMETER;
    };
    // SAFETY: the caller's buffer spans `*buffer_size` bytes.
    let slice = unsafe { byte_slice(buffer, *size) };
    node.inner.get_info(guid, size, slice)
}

extern "efiapi" fn file_set_info(
    _this: *mut file::Protocol,
    _information_type: *mut efi::Guid,
    _buffer_size: usize,
    _buffer: *mut c_void,
) -> Status {
    Status::UNSUPPORTED
}

extern "efiapi" fn file_flush(this: *mut file::Protocol) -> Status {
    // SAFETY: see `RawFile::from_this`.
    match unsafe { RawFile::from_this(this) } {
        Some(node) => node.inner.flush(),
        None => Status::INVALID_PARAMETER,
    }
}

extern "efiapi" fn file_open_ex(
    _this: *mut file::Protocol,
    _new_handle: *mut *mut file::Protocol,
    _file_name: *mut efi::Char16,
    _open_mode: u64,
    _attributes: u64,
    _token: *mut file::IoToken,
) -> Status {
    Status::UNSUPPORTED
}

extern "efiapi" fn file_io_ex(_this: *mut file::Protocol, _token: *mut file::IoToken) -> Status {
    Status::UNSUPPORTED
}

/// Firmware-visible record of one served volume
#[repr(C)]
pub struct RawVolume {
    proto: simple_file_system::Protocol,
    inner: Box<dyn SimpleFileSystem>,
}

impl RawVolume {
    /// Leak `inner` into a record and return its protocol table pointer
    ///
    /// Installed volumes live until firmware exit.
    #[must_use]
    pub fn into_raw(inner: Box<dyn SimpleFileSystem>) -> *mut simple_file_system::Protocol {
        let record = Box::new(RawVolume {
            proto: simple_file_system::Protocol {
                revision: simple_file_system::REVISION,
                open_volume: volume_open,
            },
            inner,
        });
        Box::into_raw(record).cast()
    }
}

extern "efiapi" fn volume_open(
    this: *mut simple_file_system::Protocol,
    root: *mut *mut file::Protocol,
) -> Status {
    // SAFETY: `proto` is the first field of the repr(C) record.
    let (Some(volume), false) = (unsafe { this.cast::<RawVolume>().as_mut() }, root.is_null())
    else {
        return Status::INVALID_PARAMETER;
    };
    match volume.inner.open_volume() {
        Ok(node) => {
            // SAFETY: checked non-null above.
            unsafe { *root = RawFile::into_raw(node) };
            Status::SUCCESS
        }
        Err(status) => status,
    }
}

// ============================================================================
// Consuming: firmware tables driven through the Rust traits
// ============================================================================

/// Firmware-owned file handle
pub struct FirmwareFile {
    proto: NonNull<file::Protocol>,
}

impl FirmwareFile {
    /// Wrap a handle returned by firmware
    ///
    /// # Safety
    ///
    /// `proto` must be a live `EFI_FILE_PROTOCOL` instance not owned elsewhere.
    pub unsafe fn from_raw(proto: *mut file::Protocol) -> Option<Self> {
        NonNull::new(proto).map(|proto| Self { proto })
    }

    fn table(&self) -> &file::Protocol {
        // SAFETY: the handle stays live until `close`/`delete` consume `self`.
        unsafe { self.proto.as_ref() }
    }
}

impl FileProtocol for FirmwareFile {
    fn open(
        &mut self,
        name: &[u16],
        mode: FileMode,
        attributes: FileAttribute,
    ) -> Result<Box<dyn FileProtocol>, Status> {
        if name.last() != Some(&0) {
            return Err(Status::INVALID_PARAMETER);
        }
        let mut out: *mut file::Protocol = ptr::null_mut();
        let status = (self.table().open)(
            self.proto.as_ptr(),
            &mut out,
            name.as_ptr().cast_mut(),
            mode.bits(),
            attributes.bits(),
        );
        if status.is_error() {
            return Err(status);
        }
        // SAFETY: firmware returned a fresh handle owned by the caller.
        match unsafe { FirmwareFile::from_raw(out) } {
            Some(file) => Ok(Box::new(file)),
            None => Err(Status::DEVICE_ERROR),
        }
    }

    fn close(self: Box<Self>) -> Status {
        (self.table().close)(self.proto.as_ptr())
    }

    fn delete(self: Box<Self>) -> Status {
        (self.table().delete)(self.proto.as_ptr())
    }

    fn read(&mut self, buffer_size: &mut usize, buffer: &mut [u8]) -> Status {
        *buffer_size = (*buffer_size).min(buffer.len());
        (self.table().read)(self.proto.as_ptr(), buffer_size, buffer.as_mut_ptr().cast())
    }

    fn write(&mut self, buffer_size: &mut usize, buffer: &[u8]) -> Status {
        *buffer_size = (*buffer_size).min(buffer.len());
        (self.table().write)(
            self.proto.as_ptr(),
            buffer_size,
            buffer.as_ptr().cast_mut().cast(),
        )
    }

    fn get_position(&mut self) -> Result<u64, Status> {
        let mut position = 0;
        let status = (self.table().get_position)(self.proto.as_ptr(), &mut position);
        if status.is_error() {
            Err(status)
        } else {
            Ok(position)
        }
    }

    fn set_position(&mut self, position: u64) -> Status {
        (self.table().set_position)(self.proto.as_ptr(), position)
    }

    fn get_info(
        &mut self,
        information_type: &Guid,
        buffer_size: &mut usize,
        buffer: &mut [u8],
    ) -> Status {
        let mut guid = *information_type;
        *buffer_size = (*buffer_size).min(buffer.len());
        let data = if buffer.is_empty() {
            ptr::null_mut()
        } else {
            buffer.as_mut_ptr().cast()
        };
        (self.table().get_info)(self.proto.as_ptr(), &mut guid, buffer_size, data)
    }

    fn flush(&mut self) -> Status {
        (self.table().flush)(self.proto.as_ptr())
    }
}

/// Firmware boot services table
pub struct FirmwareBootServices {
    bs: NonNull<efi::BootServices>,
}

impl FirmwareBootServices {
    /// Wrap the boot services table
    ///
    /// # Safety
    ///
    /// `bs` must point to the live boot services table and boot services must
    /// not have been exited.
    pub unsafe fn from_raw(bs: *mut efi::BootServices) -> Option<Self> {
        NonNull::new(bs).map(|bs| Self { bs })
    }

    fn table(&self) -> &efi::BootServices {
        // SAFETY: guaranteed live by `from_raw`'s contract.
        unsafe { self.bs.as_ref() }
    }
}

impl BootServices for FirmwareBootServices {
    type Shell = FirmwareShell;

    fn install_protocol_interface(
        &mut self,
        handle: Option<EfiHandle>,
        interface: ProtocolInterface,
    ) -> Result<EfiHandle, Status> {
        let mut guid = interface.guid();
        let mut raw = handle.map_or(ptr::null_mut(), EfiHandle::as_raw);

        let (data, reclaim): (*mut c_void, fn(*mut c_void)) = match interface {
            ProtocolInterface::DevicePath(dp) => {
                (Box::into_raw(Box::new(dp)).cast(), reclaim_device_path as fn(_))
            }
            ProtocolInterface::SimpleFileSystem(fs) => {
                (RawVolume::into_raw(fs).cast(), reclaim_volume as fn(_))
            }
        };

        let status = (self.table().install_protocol_interface)(
            &mut raw,
            &mut guid,
            efi::NATIVE_INTERFACE,
            data,
        );
        if status.is_error() {
            reclaim(data);
            return Err(status);
        }
        Ok(EfiHandle::from_raw(raw))
    }

    fn locate_handle_buffer(&mut self) -> Result<Vec<EfiHandle>, Status> {
        let mut count = 0usize;
        let mut buffer: *mut efi::Handle = ptr::null_mut();
        let status = (self.table().locate_handle_buffer)(
            efi::ALL_HANDLES,
            ptr::null_mut(),
            ptr::null_mut(),
            &mut count,
            &mut buffer,
        );
        if status.is_error() {
            return Err(status);
        }
        if buffer.is_null() {
            return Ok(Vec::new());
        }

        let mut handles = Vec::new();
        if handles.try_reserve_exact(count).is_ok() {
            // SAFETY: firmware returned `count` handles at `buffer`.
            let raw = unsafe { core::slice::from_raw_parts(buffer, count) };
            handles.extend(raw.iter().copied().map(EfiHandle::from_raw));
        }
        let _ = (self.table().free_pool)(buffer.cast());
        if handles.len() != count {
            return Err(Status::OUT_OF_RESOURCES);
        }
        Ok(handles)
    }

    fn connect_controller(&mut self, controller: EfiHandle, recursive: bool) -> Status {
        (self.table().connect_controller)(
            controller.as_raw(),
            ptr::null_mut(),
            ptr::null_mut(),
            efi::Boolean::from(recursive),
        )
    }

    fn open_shell_protocol(&mut self, image: EfiHandle) -> Result<Self::Shell, Status> {
        let mut guid = shell::PROTOCOL_GUID;
        let mut iface: *mut c_void = ptr::null_mut();
        let status = (self.table().open_protocol)(
            image.as_raw(),
            &mut guid,
            &mut iface,
            image.as_raw(),
            ptr::null_mut(),
            efi::OPEN_PROTOCOL_GET_PROTOCOL,
        );
        if status.is_error() {
            return Err(status);
        }
        FirmwareShell::new(iface.cast()).ok_or(Status::NOT_FOUND)
    }

    fn locate_shell_protocol(&mut self) -> Result<Self::Shell, Status> {
        let mut guid = shell::PROTOCOL_GUID;
        let mut iface: *mut c_void = ptr::null_mut();
        let status = (self.table().locate_protocol)(&mut guid, ptr::null_mut(), &mut iface);
        if status.is_error() {
            return Err(status);
        }
        FirmwareShell::new(iface.cast()).ok_or(Status::NOT_FOUND)
    }
}

fn reclaim_device_path(p: *mut c_void) {
    // SAFETY: `p` came from `Box::<VendorDevicePath>::into_raw`.
    drop(unsafe { Box::from_raw(p.cast::<VendorDevicePath>()) });
}

fn reclaim_volume(p: *mut c_void) {
    // SAFETY: `p` came from `RawVolume::into_raw`.
    drop(unsafe { Box::from_raw(p.cast::<RawVolume>()) });
}

/// Firmware shell protocol instance
pub struct FirmwareShell {
    proto: NonNull<shell::Protocol>,
}

impl FirmwareShell {
    fn new(proto: *mut shell::Protocol) -> Option<Self> {
        NonNull::new(proto).map(|proto| Self { proto })
    }
}

impl ShellProtocol for FirmwareShell {
    fn set_map(&mut self, device_path: &VendorDevicePath, mapping: &str) -> Status {
        let Ok(mut name) = wide::to_wide(mapping) else {
            return Status::OUT_OF_RESOURCES;
        };
        // SAFETY: the instance was returned by Open/LocateProtocol.
        let table = unsafe { self.proto.as_ref() };
        (table.set_map)(device_path.as_protocol_ptr(), name.as_mut_ptr())
    }
}

/// Runtime services clock
pub struct FirmwareClock {
    rt: NonNull<efi::RuntimeServices>,
}

impl FirmwareClock {
    /// Wrap the runtime services table
    ///
    /// # Safety
    ///
    /// `rt` must point to the live runtime services table.
    pub unsafe fn from_raw(rt: *mut efi::RuntimeServices) -> Option<Self> {
        NonNull::new(rt).map(|rt| Self { rt })
    }
}

impl Clock for FirmwareClock {
    fn now(&self) -> Result<Time, Status> {
        let mut time = Time::default();
        // SAFETY: guaranteed live by `from_raw`'s contract.
        let table = unsafe { self.rt.as_ref() };
        let status = (table.get_time)(&mut time, ptr::null_mut());
        if status.is_error() {
            Err(status)
        } else {
            Ok(time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efi::sim::MemVolume;
    use crate::efi::{FileInfo, FILE_INFO_ID};

    #[test]
    fn test_served_volume_round_trip_through_table() {
        let volume = MemVolume::new();
        volume.add_file("boot.cfg", b"timeout=3");

        let raw_volume = RawVolume::into_raw(Box::new(volume.clone()));
        // SAFETY: freshly produced by `RawVolume::into_raw`.
        let open_volume = unsafe { (*raw_volume).open_volume };
        let mut root = ptr::null_mut();
        assert_eq!(open_volume(raw_volume, &mut root), Status::SUCCESS);

        // SAFETY: `root` was produced by the volume thunk.
        let mut root_file = unsafe { FirmwareFile::from_raw(root) }.expect("null root");
        let name = wide::to_native_path("boot.cfg").expect("conversion failed");
        let mut file = root_file
            .open(&name, FileMode::READ, FileAttribute::empty())
            .expect("open failed");

        let mut buf = [0u8; 32];
        let mut size = buf.len();
        assert_eq!(file.read(&mut size, &mut buf), Status::SUCCESS);
        assert_eq!(&buf[..size], b"timeout=3");

        let mut size = 0;
        assert_eq!(file.get_info(&FILE_INFO_ID, &mut size, &mut []), Status::BUFFER_TOO_SMALL);
        let mut info = vec![0u8; size];
        assert_eq!(file.get_info(&FILE_INFO_ID, &mut size, &mut info), Status::SUCCESS);
        assert_eq!(FileInfo::decode(&info).expect("decode failed").file_size, 9);

        assert_eq!(file.close(), Status::SUCCESS);
        assert_eq!(Box::new(root_file).close(), Status::SUCCESS);
        assert_eq!(volume.open_handles(), 0);

        // SAFETY: reclaim the leaked record.
        drop(unsafe { Box::from_raw(raw_volume.cast::<RawVolume>()) });
    }

    #[test]
    fn test_unserved_slots_report_unsupported() {
        let volume = MemVolume::new();
        let raw = RawFile::into_raw(volume.open_root());
        // SAFETY: freshly produced by `RawFile::into_raw`.
        let table = unsafe { &*raw };
        assert_eq!(
            (table.set_info)(raw, ptr::null_mut(), 0, ptr::null_mut()),
            Status::UNSUPPORTED
        );
        assert_eq!((table.flush_ex)(raw, ptr::null_mut()), Status::UNSUPPORTED);
        let close = table.close;
        assert_eq!(close(raw), Status::SUCCESS);
        assert_eq!(volume.open_handles(), 0);
    }
}

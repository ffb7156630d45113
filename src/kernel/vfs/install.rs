// src/kernel/vfs/install.rs
//! Protocol installer
//!
//! Registers the synthetic volume in the handle database and binds the shell
//! alias `vfs:` to it.
//!
//! # Design
//!
//! ```text
//!   1. InstallProtocolInterface(new handle, DevicePath)   vendor node + end node
//!   2. InstallProtocolInterface(same handle, SimpleFileSystem)
//!   3. LocateHandleBuffer(AllHandles) + ConnectController(h, recursive)
//!   4. OpenProtocol(image, Shell)  ──fail──►  LocateProtocol(Shell)
//!   5. Shell.SetMap(device path, "vfs:")
//! ```
//!
//! No step aborts the sequence. Failures are logged and collected in the
//! returned [`InstallReport`]; the kernel carries on without the namespace.

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{error, info, warn};

use super::provider::SyntheticVolume;
use crate::constants::{VFS_MAP_NAME, VFS_VENDOR_GUID};
use crate::efi::{BootServices, EfiHandle, ProtocolInterface, ShellProtocol, VendorDevicePath};
use crate::errors::InstallError;

const TARGET: &str = "vfs";

/// Outcome of [`install_vfs_protocol`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Handle carrying the installed interfaces
    pub handle: Option<EfiHandle>,
    /// Whether the simple file system interface was installed
    pub file_system_installed: bool,
    /// Handles whose `ConnectController` call succeeded
    pub connected: usize,
    /// Whether the shell accepted the alias
    pub mapped: bool,
    /// Failed steps, in order
    pub errors: Vec<InstallError>,
}

impl InstallReport {
    /// Whether every step succeeded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.file_system_installed && self.mapped
    }
}

/// Register `volume` with the firmware and bind the `vfs:` alias
///
/// `image` is the handle of the running kernel image; the shell protocol is
/// looked up on it first.
pub fn install_vfs_protocol<B: BootServices>(
    bs: &mut B,
    image: EfiHandle,
    volume: SyntheticVolume,
) -> InstallReport {
    info!(target: TARGET, "installing VFS protocol");
    let device_path = VendorDevicePath::new(VFS_VENDOR_GUID);
    let mut report = InstallReport::default();

    match bs.install_protocol_interface(None, ProtocolInterface::DevicePath(device_path)) {
        Ok(handle) => report.handle = Some(handle),
        Err(status) => {
            warn!(target: TARGET, "could not install device path: {:#x}", status.as_usize());
            report.errors.push(InstallError::DevicePath(status));
        }
    }

    let interface = ProtocolInterface::SimpleFileSystem(Box::new(volume));
    match bs.install_protocol_interface(report.handle, interface) {
        Ok(handle) => {
            info!(target: TARGET, "added protocol interface to handle {:#x}", handle.as_usize());
            report.handle = Some(handle);
            report.file_system_installed = true;
        }
        Err(status) => {
            error!(target: TARGET, "could not install protocol: {:#x}", status.as_usize());
            report.errors.push(InstallError::FileSystem(status));
        }
    }

    match bs.locate_handle_buffer() {
        Ok(handles) => {
            for handle in handles {
                if !bs.connect_controller(handle, true).is_error() {
                    report.connected += 1;
                }
            }
        }
        Err(status) => {
            warn!(target: TARGET, "could not enumerate handles: {:#x}", status.as_usize());
            report.errors.push(InstallError::HandleBuffer(status));
        }
    }

    let shell = bs
        .open_shell_protocol(image)
        .or_else(|_| bs.locate_shell_protocol());
    match shell {
        Ok(mut shell) => {
            let status = shell.set_map(&device_path, VFS_MAP_NAME);
            if status.is_error() {
                warn!(target: TARGET, "SetMap failed: {:#x}", status.as_usize());
                report.errors.push(InstallError::SetMap(status));
            } else {
                info!(target: TARGET, "mapped {}", VFS_MAP_NAME);
                report.mapped = true;
            }
        }
        Err(status) => {
            warn!(target: TARGET, "shell protocol not found: {:#x}", status.as_usize());
            report.errors.push(InstallError::ShellNotFound(status));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efi::calendar;
    use crate::efi::sim::{FixedClock, ShellPlacement, SimBootServices};
    use crate::efi::{FileMode, FileAttribute, Status};
    use r_efi::protocols::{device_path, simple_file_system};

    fn volume() -> SyntheticVolume {
        SyntheticVolume::new(FixedClock(calendar(2024, 1, 1, 0, 0, 0)))
    }

    #[test]
    fn test_full_install() {
        let mut bs = SimBootServices::new(ShellPlacement::OnImage);
        let existing = bs.add_handle();
        let image = bs.image_handle();

        let report = install_vfs_protocol(&mut bs, image, volume());
        assert!(report.is_complete());
        let handle = report.handle.expect("no handle");
        assert_ne!(handle, image);
        assert_ne!(handle, existing);
        assert_eq!(report.connected, 3);
        assert!(bs.connected().iter().all(|&(_, recursive)| recursive));

        let guids: Vec<_> = bs
            .interfaces(handle)
            .expect("handle missing")
            .iter()
            .map(ProtocolInterface::guid)
            .collect();
        assert_eq!(
            guids,
            [device_path::PROTOCOL_GUID, simple_file_system::PROTOCOL_GUID]
        );
        assert_eq!(
            bs.device_path(handle),
            Some(VendorDevicePath::new(VFS_VENDOR_GUID))
        );

        let mappings = bs.mappings();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].0, VFS_MAP_NAME);
        assert_eq!(mappings[0].1.vendor(), VFS_VENDOR_GUID);
    }

    #[test]
    fn test_installed_volume_is_reachable() {
        let mut bs = SimBootServices::new(ShellPlacement::OnImage);
        let image = bs.image_handle();
        let report = install_vfs_protocol(&mut bs, image, volume());
        let handle = report.handle.expect("no handle");

        let fs = bs.file_system(handle).expect("no file system");
        let mut root = fs.open_volume().expect("open volume failed");
        let name = crate::efi::wide::to_wide("x").expect("conversion failed");
        let leaf = root
            .open(&name, FileMode::READ, FileAttribute::empty())
            .expect("open failed");
        let _ = leaf.close();
        let _ = root.close();
    }

    #[test]
    fn test_shell_fallback_to_locate() {
        let mut bs = SimBootServices::new(ShellPlacement::Registered);
        let image = bs.image_handle();
        let report = install_vfs_protocol(&mut bs, image, volume());
        assert!(report.mapped);
        assert_eq!(bs.mappings().len(), 1);
    }

    #[test]
    fn test_missing_shell_is_not_fatal() {
        let mut bs = SimBootServices::new(ShellPlacement::Absent);
        let image = bs.image_handle();
        let report = install_vfs_protocol(&mut bs, image, volume());
        assert!(report.file_system_installed);
        assert!(!report.mapped);
        assert_eq!(report.errors, [InstallError::ShellNotFound(Status::NOT_FOUND)]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_install_failures_are_collected() {
        let mut bs = SimBootServices::new(ShellPlacement::OnImage);
        bs.fail_install(simple_file_system::PROTOCOL_GUID, Status::OUT_OF_RESOURCES);
        bs.fail_locate(Some(Status::DEVICE_ERROR));
        bs.fail_set_map(Some(Status::ACCESS_DENIED));
        let image = bs.image_handle();

        let report = install_vfs_protocol(&mut bs, image, volume());
        assert!(report.handle.is_some());
        assert!(!report.file_system_installed);
        assert_eq!(report.connected, 0);
        assert_eq!(
            report.errors,
            [
                InstallError::FileSystem(Status::OUT_OF_RESOURCES),
                InstallError::HandleBuffer(Status::DEVICE_ERROR),
                InstallError::SetMap(Status::ACCESS_DENIED),
            ]
        );
    }

    #[test]
    fn test_device_path_failure_still_installs_volume() {
        let mut bs = SimBootServices::new(ShellPlacement::OnImage);
        bs.fail_install(device_path::PROTOCOL_GUID, Status::INVALID_PARAMETER);
        let image = bs.image_handle();

        let report = install_vfs_protocol(&mut bs, image, volume());
        assert!(report.file_system_installed);
        assert_eq!(
            report.errors,
            [InstallError::DevicePath(Status::INVALID_PARAMETER)]
        );
        let handle = report.handle.expect("no handle");
        assert!(bs.file_system(handle).is_some());
        assert_eq!(bs.device_path(handle), None);
    }
}

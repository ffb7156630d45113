// tests/synthetic_volume.rs
//! Installs the synthetic volume into the simulated handle database and
//! drives it the way the shell and the stream API would.

use efivfs::constants::{VFS_MAP_NAME, VFS_NODE_SIZE, VFS_VENDOR_GUID};
use efivfs::efi::sim::{FixedClock, ShellPlacement, SimBootServices};
use efivfs::efi::{calendar, wide, FileAttribute, FileInfo, FileMode, Status};
use efivfs::kernel::fs::metadata;
use efivfs::{install_vfs_protocol, Errno, PosixFs, SyntheticVolume, Whence};

fn clock() -> FixedClock {
    FixedClock(calendar(2030, 12, 31, 23, 59, 59))
}

#[test]
fn test_shell_can_list_the_mapped_volume() {
    let mut bs = SimBootServices::new(ShellPlacement::OnImage);
    let image = bs.image_handle();
    let report = install_vfs_protocol(&mut bs, image, SyntheticVolume::new(clock()));
    assert!(report.is_complete(), "install report: {report:?}");

    let mappings = bs.mappings();
    let (alias, device_path) = &mappings[0];
    assert_eq!(alias, VFS_MAP_NAME);
    assert_eq!(device_path.vendor(), VFS_VENDOR_GUID);

    let handle = report.handle.expect("no handle");
    let fs = bs.file_system(handle).expect("no file system");
    let mut root = fs.open_volume().expect("open volume failed");

    let mut entries = Vec::new();
    loop {
        let mut size = 0;
        let status = root.read(&mut size, &mut []);
        if status == Status::SUCCESS && size == 0 {
            break;
        }
        assert_eq!(status, Status::BUFFER_TOO_SMALL);
        let mut buf = vec![0u8; size];
        assert_eq!(root.read(&mut size, &mut buf), Status::SUCCESS);
        entries.push(FileInfo::decode(&buf[..size]).expect("decode failed"));
    }
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_name, ".");
    assert!(entries[0].is_directory());
    assert_eq!(entries[0].modification_time.year, 2030);
    assert_eq!(root.close(), Status::SUCCESS);
}

#[test]
fn test_each_open_volume_starts_a_fresh_enumeration() {
    let mut bs = SimBootServices::new(ShellPlacement::OnImage);
    let image = bs.image_handle();
    let handle = install_vfs_protocol(&mut bs, image, SyntheticVolume::new(clock()))
        .handle
        .expect("no handle");
    let fs = bs.file_system(handle).expect("no file system");

    for _ in 0..2 {
        let mut root = fs.open_volume().expect("open volume failed");
        let mut size = 0;
        assert_eq!(root.read(&mut size, &mut []), Status::BUFFER_TOO_SMALL);
        let _ = root.close();
    }
}

#[test]
fn test_leaves_report_placeholder_metadata() {
    let mut volume = SyntheticVolume::new(clock());
    let mut root = efivfs::efi::SimpleFileSystem::open_volume(&mut volume)
        .expect("open volume failed");
    let name = wide::to_wide("initrd").expect("conversion failed");
    let mut leaf = root
        .open(&name, FileMode::READ, FileAttribute::empty())
        .expect("open failed");

    let info = metadata::file_info(leaf.as_mut()).expect("query failed");
    assert_eq!(info.file_name, "initrd");
    assert_eq!(info.file_size, VFS_NODE_SIZE);
    assert_eq!(info.physical_size, VFS_NODE_SIZE);
    assert!(info.is_directory());

    let _ = leaf.close();
    let _ = root.close();
}

#[test]
fn test_stream_api_over_the_synthetic_volume() {
    let mut volume = SyntheticVolume::new(clock());
    let root = efivfs::efi::SimpleFileSystem::open_volume(&mut volume)
        .expect("open volume failed");
    let mut fs = PosixFs::new();
    fs.init(root);

    let stream = fs.open("anything", "r").expect("open failed");
    assert_eq!(fs.size(stream).expect("size failed"), VFS_NODE_SIZE);
    assert!(fs.is_directory(stream).expect("query failed"));
    assert_eq!(fs.modification_time(stream).expect("mtime failed"), 1_924_991_999);

    let mut buf = [0u8; 16];
    assert_eq!(fs.read(stream, &mut buf, 1, 16).expect("read failed"), 0);
    assert!(fs.feof(stream));

    assert_eq!(fs.tell(stream).expect_err("tell").errno(), Errno::Fault);
    assert_eq!(
        fs.seek(stream, 0, Whence::Set).expect_err("seek").errno(),
        Errno::Fault
    );
    assert_eq!(fs.write(stream, b"x", 1, 1).expect_err("write").errno(), Errno::Fault);
    assert!(fs.ferror(stream));
    fs.close(stream).expect("close failed");

    assert_eq!(fs.open("..", "r").expect_err("open").errno(), Errno::NoEntry);
    assert_eq!(fs.open("file", "w").expect_err("open").errno(), Errno::Fault);
    assert_eq!(fs.mkdir("dir", 0).expect_err("mkdir").errno(), Errno::Fault);
    assert_eq!(fs.remove("file").expect_err("remove").errno(), Errno::Fault);
}

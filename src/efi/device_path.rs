// src/efi/device_path.rs
//! Vendor messaging device path identifying the synthetic volume
//!
//! ```text
//!   offset  size  field
//!   0       1     type      = MESSAGING (0x03)
//!   1       1     sub type  = VENDOR    (0x0a)
//!   2       2     length    = 20
//!   4       16    vendor GUID
//!   20      1     type      = END (0x7f)
//!   21      1     sub type  = ENTIRE (0xff)
//!   22      2     length    = 4
//! ```

use r_efi::efi::Guid;
use r_efi::protocols::device_path;

/// Sub type of a vendor-defined messaging node
pub const MSG_VENDOR_DP: u8 = 0x0a;

/// Encoded size of the full path, terminator included
pub const VENDOR_DEVICE_PATH_SIZE: usize = 24;

/// Generic node header shared by every device path node
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeHeader {
    kind: u8,
    sub_kind: u8,
    length: [u8; 2],
}

impl NodeHeader {
    const fn new(kind: u8, sub_kind: u8, length: u16) -> Self {
        Self {
            kind,
            sub_kind,
            length: length.to_le_bytes(),
        }
    }
}

/// Two-node device path: one vendor messaging node followed by the terminator
///
/// The layout is byte-compatible with `EFI_DEVICE_PATH_PROTOCOL`, so a pointer
/// to this struct can be handed to firmware as-is.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorDevicePath {
    header: NodeHeader,
    guid: [u8; 16],
    end: NodeHeader,
}

impl VendorDevicePath {
    /// Build the path for `vendor`
    #[must_use]
    pub const fn new(vendor: Guid) -> Self {
        Self {
            header: NodeHeader::new(device_path::TYPE_MESSAGING, MSG_VENDOR_DP, 20),
            guid: *vendor.as_bytes(),
            end: NodeHeader::new(device_path::TYPE_END, device_path::End::SUBTYPE_ENTIRE, 4),
        }
    }

    /// Vendor GUID carried by the messaging node
    #[must_use]
    pub const fn vendor(&self) -> Guid {
        Guid::from_bytes(&self.guid)
    }

    /// Length field of the vendor node
    #[must_use]
    pub const fn node_length(&self) -> u16 {
        u16::from_le_bytes(self.header.length)
    }

    /// Wire encoding of the whole path
    #[must_use]
    pub fn to_bytes(&self) -> [u8; VENDOR_DEVICE_PATH_SIZE] {
        let mut out = [0u8; VENDOR_DEVICE_PATH_SIZE];
        out[0] = self.header.kind;
        out[1] = self.header.sub_kind;
        out[2..4].copy_from_slice(&self.header.length);
        out[4..20].copy_from_slice(&self.guid);
        out[20] = self.end.kind;
        out[21] = self.end.sub_kind;
        out[22..24].copy_from_slice(&self.end.length);
        out
    }

    /// Pointer suitable for firmware calls taking `EFI_DEVICE_PATH_PROTOCOL *`
    #[must_use]
    pub fn as_protocol_ptr(&self) -> *mut device_path::Protocol {
        (self as *const Self).cast_mut().cast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VFS_VENDOR_GUID;

    #[test]
    fn test_layout_matches_firmware_node() {
        assert_eq!(core::mem::size_of::<VendorDevicePath>(), VENDOR_DEVICE_PATH_SIZE);
        let dp = VendorDevicePath::new(VFS_VENDOR_GUID);
        let bytes = dp.to_bytes();
        assert_eq!(&bytes[..4], &[0x03, 0x0a, 20, 0]);
        assert_eq!(&bytes[20..], &[0x7f, 0xff, 4, 0]);
        assert_eq!(dp.node_length(), 20);
    }

    #[test]
    fn test_guid_bytes_are_little_endian_fields() {
        let dp = VendorDevicePath::new(VFS_VENDOR_GUID);
        let bytes = dp.to_bytes();
        assert_eq!(&bytes[4..8], &[0x0d, 0xa7, 0x33, 0x65]);
        assert_eq!(&bytes[14..20], &[0xbb, 0xe2, 0xc5, 0x67, 0x2c, 0xa1]);
        assert_eq!(dp.vendor(), VFS_VENDOR_GUID);
    }
}

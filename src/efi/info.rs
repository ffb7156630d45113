// src/efi/info.rs
//! Information records exchanged through `GetInfo` and directory reads
//!
//! Records are kept as owned Rust values and (de)serialized at the boundary in
//! the firmware's little-endian layout.
//!
//! # `EFI_FILE_INFO`
//!
//! ```text
//!   @0   u64   Size (whole record, name included)
//!   @8   u64   FileSize
//!   @16  u64   PhysicalSize
//!   @24  TIME  CreateTime
//!   @40  TIME  LastAccessTime
//!   @56  TIME  ModificationTime
//!   @72  u64   Attribute
//!   @80  u16[] FileName, NUL-terminated
//! ```
//!
//! # `EFI_FILE_SYSTEM_INFO`
//!
//! ```text
//!   @0   u64   Size
//!   @8   u8    ReadOnly
//!   @16  u64   VolumeSize
//!   @24  u64   FreeSpace
//!   @32  u32   BlockSize
//!   @36  u16[] VolumeLabel, NUL-terminated
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use r_efi::efi::Time;

use super::wide;
use super::FileAttribute;

/// Encoded size of one `EFI_TIME`
pub const TIME_SIZE: usize = 16;

/// Offset of the name in an encoded `EFI_FILE_INFO`
pub const FILE_INFO_SIZE: usize = 80;

/// Offset of the label in an encoded `EFI_FILE_SYSTEM_INFO`
pub const FILE_SYSTEM_INFO_LABEL_OFFSET: usize = 36;

/// Minimum size of an encoded `EFI_FILE_SYSTEM_INFO` (`sizeof` in C)
pub const FILE_SYSTEM_INFO_SIZE: usize = 40;

/// Encode a calendar record into 16 bytes
pub fn encode_time(time: &Time, out: &mut [u8]) {
    out[0..2].copy_from_slice(&time.year.to_le_bytes());
    out[2] = time.month;
    out[3] = time.day;
    out[4] = time.hour;
    out[5] = time.minute;
    out[6] = time.second;
    out[7] = 0;
    out[8..12].copy_from_slice(&time.nanosecond.to_le_bytes());
    out[12..14].copy_from_slice(&time.timezone.to_le_bytes());
    out[14] = time.daylight;
    out[15] = 0;
}

/// Decode a calendar record from 16 bytes
#[must_use]
pub fn decode_time(raw: &[u8]) -> Time {
    Time {
        year: u16::from_le_bytes([raw[0], raw[1]]),
        month: raw[2],
        day: raw[3],
        hour: raw[4],
        minute: raw[5],
        second: raw[6],
        pad1: 0,
        nanosecond: read_u32(raw, 8),
        timezone: i16::from_le_bytes([raw[12], raw[13]]),
        daylight: raw[14],
        pad2: 0,
    }
}

/// Owned `EFI_FILE_INFO`
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Logical size in bytes
    pub file_size: u64,
    /// Allocated size in bytes
    pub physical_size: u64,
    /// Creation time
    pub create_time: Time,
    /// Last access time
    pub last_access_time: Time,
    /// Last modification time
    pub modification_time: Time,
    /// Attribute bits
    pub attribute: FileAttribute,
    /// Entry name
    pub file_name: String,
}

impl FileInfo {
    /// Size of the encoded record, name and terminator included
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FILE_INFO_SIZE + wide::wide_size(&self.file_name)
    }

    /// Serialize into `out`, which must hold at least [`Self::encoded_len`]
    /// bytes. Returns the number of bytes written.
    ///
    /// The `Size` field is set to the encoded length.
    pub fn encode(&self, out: &mut [u8]) -> usize {
        let len = self.encoded_len();
        let out = &mut out[..len];
        out[0..8].copy_from_slice(&(len as u64).to_le_bytes());
        out[8..16].copy_from_slice(&self.file_size.to_le_bytes());
        out[16..24].copy_from_slice(&self.physical_size.to_le_bytes());
        encode_time(&self.create_time, &mut out[24..40]);
        encode_time(&self.last_access_time, &mut out[40..56]);
        encode_time(&self.modification_time, &mut out[56..72]);
        out[72..80].copy_from_slice(&self.attribute.bits().to_le_bytes());
        encode_name(&self.file_name, &mut out[FILE_INFO_SIZE..]);
        len
    }

    /// Parse an encoded record. Returns `None` when `raw` is shorter than the
    /// fixed header.
    #[must_use]
    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() < FILE_INFO_SIZE {
            return None;
        }
        Some(Self {
            file_size: read_u64(raw, 8),
            physical_size: read_u64(raw, 16),
            create_time: decode_time(&raw[24..40]),
            last_access_time: decode_time(&raw[40..56]),
            modification_time: decode_time(&raw[56..72]),
            attribute: FileAttribute::from_bits_retain(read_u64(raw, 72)),
            file_name: decode_name(&raw[FILE_INFO_SIZE..]),
        })
    }

    /// Whether the directory attribute is set
    #[inline]
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.attribute.contains(FileAttribute::DIRECTORY)
    }
}

/// Owned `EFI_FILE_SYSTEM_INFO`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemInfo {
    /// Volume rejects writes
    pub read_only: bool,
    /// Volume size in bytes
    pub volume_size: u64,
    /// Free space in bytes
    pub free_space: u64,
    /// Block size in bytes
    pub block_size: u32,
    /// Volume label
    pub volume_label: String,
}

impl FileSystemInfo {
    /// Size of the encoded record, label and terminator included
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        (FILE_SYSTEM_INFO_LABEL_OFFSET + wide::wide_size(&self.volume_label))
            .max(FILE_SYSTEM_INFO_SIZE)
    }

    /// Serialize into `out`, which must hold at least [`Self::encoded_len`]
    /// bytes. Returns the number of bytes written.
    pub fn encode(&self, out: &mut [u8]) -> usize {
        let len = self.encoded_len();
        let out = &mut out[..len];
        out.fill(0);
        out[0..8].copy_from_slice(&(len as u64).to_le_bytes());
        out[8] = u8::from(self.read_only);
        out[16..24].copy_from_slice(&self.volume_size.to_le_bytes());
        out[24..32].copy_from_slice(&self.free_space.to_le_bytes());
        out[32..36].copy_from_slice(&self.block_size.to_le_bytes());
        encode_name(&self.volume_label, &mut out[FILE_SYSTEM_INFO_LABEL_OFFSET..]);
        len
    }

    /// Parse an encoded record
    #[must_use]
    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() < FILE_SYSTEM_INFO_LABEL_OFFSET {
            return None;
        }
        Some(Self {
            read_only: raw[8] != 0,
            volume_size: read_u64(raw, 16),
            free_space: read_u64(raw, 24),
            block_size: read_u32(raw, 32),
            volume_label: decode_name(&raw[FILE_SYSTEM_INFO_LABEL_OFFSET..]),
        })
    }
}

/// Size field of an encoded record, if present
#[must_use]
pub fn record_size(raw: &[u8]) -> Option<u64> {
    (raw.len() >= 8).then(|| read_u64(raw, 0))
}

fn encode_name(name: &str, out: &mut [u8]) {
    let mut offset = 0;
    for unit in name.encode_utf16().chain(core::iter::once(0)) {
        out[offset..offset + 2].copy_from_slice(&unit.to_le_bytes());
        offset += 2;
    }
}

fn decode_name(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    wide::from_wide(&units)
}

fn read_u64(raw: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&raw[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn read_u32(raw: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&raw[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

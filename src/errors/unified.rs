// src/errors/unified.rs

//! Unified error types for the filesystem bridge
//!
//! This module provides a consistent error handling approach across the
//! POSIX layer, the timestamp bridge and the protocol installer.

use core::fmt;

use r_efi::efi::Status;

/// Result type alias for POSIX-layer operations
pub type FsResult<T> = core::result::Result<T, FsError>;

/// POSIX error numbers reported through the last-error channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Errno {
    /// No such file or directory (`ENOENT`)
    NoEntry,
    /// Bad file descriptor (`EBADF`)
    BadDescriptor,
    /// Out of memory (`ENOMEM`)
    OutOfMemory,
    /// Generic substrate failure (`EFAULT`)
    Fault,
    /// Invalid argument (`EINVAL`)
    InvalidArgument,
    /// Descriptor namespace exhausted (`EMFILE`)
    TooManyOpenFiles,
}

impl Errno {
    /// Returns the classic numeric value of this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::NoEntry => 2,
            Self::BadDescriptor => 9,
            Self::OutOfMemory => 12,
            Self::Fault => 14,
            Self::InvalidArgument => 22,
            Self::TooManyOpenFiles => 24,
        }
    }

    /// Returns a string representation of the error.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoEntry => "no such file or directory",
            Self::BadDescriptor => "bad file descriptor",
            Self::OutOfMemory => "out of memory",
            Self::Fault => "substrate fault",
            Self::InvalidArgument => "invalid argument",
            Self::TooManyOpenFiles => "too many open files",
        }
    }

    /// Maps a substrate status to the errno the POSIX layer reports for it.
    ///
    /// Only `NOT_FOUND` and `OUT_OF_RESOURCES` are distinguished; every other
    /// failure collapses into [`Errno::Fault`].
    #[must_use]
    pub fn from_status(status: Status) -> Self {
        if status == Status::NOT_FOUND {
            Self::NoEntry
        } else if status == Status::OUT_OF_RESOURCES {
            Self::OutOfMemory
        } else {
            Self::Fault
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the POSIX layer (errno with optional context)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsError {
    errno: Errno,
    context: Option<&'static str>,
}

impl FsError {
    /// Create a new error without context
    #[inline]
    #[must_use]
    pub const fn new(errno: Errno) -> Self {
        Self {
            errno,
            context: None,
        }
    }

    /// Create an error carrying a static context string
    #[inline]
    #[must_use]
    pub const fn with_context(errno: Errno, ctx: &'static str) -> Self {
        Self {
            errno,
            context: Some(ctx),
        }
    }

    /// Error number
    #[inline]
    #[must_use]
    pub const fn errno(&self) -> Errno {
        self.errno
    }

    /// Context attached at the failure site, if any
    #[inline]
    #[must_use]
    pub const fn context(&self) -> Option<&'static str> {
        self.context
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.context {
            Some(ctx) => write!(f, "{}: {}", ctx, self.errno),
            None => write!(f, "{}", self.errno),
        }
    }
}

impl From<Errno> for FsError {
    fn from(errno: Errno) -> Self {
        Self::new(errno)
    }
}

impl From<Status> for FsError {
    fn from(status: Status) -> Self {
        Self::new(Errno::from_status(status))
    }
}

/// Calendar validation failures of the timestamp bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    /// Year outside 1998..=2099
    YearOutOfRange(u16),
    /// Month outside 1..=12
    MonthOutOfRange(u8),
    /// Day is zero or above 31
    DayOutOfRange(u8),
    /// Hour above 23
    HourOutOfRange(u8),
    /// Minute above 59
    MinuteOutOfRange(u8),
    /// Second above 59
    SecondOutOfRange(u8),
    /// Time zone outside -1440..=1440 and not the unspecified marker
    TimeZoneOutOfRange(i16),
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YearOutOfRange(v) => write!(f, "year {v} out of range"),
            Self::MonthOutOfRange(v) => write!(f, "month {v} out of range"),
            Self::DayOutOfRange(v) => write!(f, "day {v} out of range"),
            Self::HourOutOfRange(v) => write!(f, "hour {v} out of range"),
            Self::MinuteOutOfRange(v) => write!(f, "minute {v} out of range"),
            Self::SecondOutOfRange(v) => write!(f, "second {v} out of range"),
            Self::TimeZoneOutOfRange(v) => write!(f, "time zone {v} out of range"),
        }
    }
}

/// Failures of individual protocol installer steps
///
/// None of these abort start-up; the installer logs them and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallError {
    /// Installing the vendor device path failed
    DevicePath(Status),
    /// Installing the simple file system protocol failed
    FileSystem(Status),
    /// Enumerating the handle database failed
    HandleBuffer(Status),
    /// No shell protocol instance could be found
    ShellNotFound(Status),
    /// The shell refused the mapping
    SetMap(Status),
}

impl InstallError {
    /// Status code reported by the substrate for this failure
    #[must_use]
    pub const fn status(&self) -> Status {
        match *self {
            Self::DevicePath(s)
            | Self::FileSystem(s)
            | Self::HandleBuffer(s)
            | Self::ShellNotFound(s)
            | Self::SetMap(s) => s,
        }
    }
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DevicePath(s) => write!(f, "device path install failed: {:#x}", s.as_usize()),
            Self::FileSystem(s) => write!(f, "protocol install failed: {:#x}", s.as_usize()),
            Self::HandleBuffer(s) => write!(f, "handle enumeration failed: {:#x}", s.as_usize()),
            Self::ShellNotFound(s) => write!(f, "shell protocol not found: {:#x}", s.as_usize()),
            Self::SetMap(s) => write!(f, "SetMap failed: {:#x}", s.as_usize()),
        }
    }
}

/// Helper trait for error context
pub trait ErrorContext {
    /// Get a detailed description of the error
    fn context(&self) -> &'static str;
}

impl ErrorContext for Errno {
    fn context(&self) -> &'static str {
        match self {
            Errno::NoEntry => "The substrate reported that the path does not exist",
            Errno::BadDescriptor => "Descriptor is reserved, closed or was never issued",
            Errno::OutOfMemory => "Allocation failed while preparing a substrate call",
            Errno::Fault => "The substrate rejected the request",
            Errno::InvalidArgument => "An argument was outside its accepted domain",
            Errno::TooManyOpenFiles => "The descriptor counter reached the table capacity",
        }
    }
}

impl ErrorContext for TimeError {
    fn context(&self) -> &'static str {
        "EFI_TIME record failed calendar validation"
    }
}

impl ErrorContext for InstallError {
    fn context(&self) -> &'static str {
        match self {
            InstallError::DevicePath(_) | InstallError::FileSystem(_) => {
                "Synthetic volume is not reachable through the handle database"
            }
            InstallError::HandleBuffer(_) => "Drivers were not reconnected to the new protocol",
            InstallError::ShellNotFound(_) => "No shell is running; the alias was not bound",
            InstallError::SetMap(_) => "Shell refused to bind the alias",
        }
    }
}

// src/kernel/fs/stream.rs
//! Stream record
//!
//! One open firmware file handle plus the status flags the POSIX layer keeps
//! for it. The record owns the handle; dropping the record without calling
//! [`Stream::close`] leaks the firmware side of the handle, so the table
//! always goes through `close` or `delete`.

use alloc::boxed::Box;

use super::descriptor::Descriptor;
use crate::efi::{FileProtocol, Status};
use crate::errors::{Errno, FsError, FsResult};

/// Open stream bound to a firmware file handle
pub struct Stream {
    handle: Box<dyn FileProtocol>,
    descriptor: Descriptor,
    eof: bool,
    error: bool,
    tty: Option<usize>,
}

impl Stream {
    /// Wrap a freshly opened handle
    #[must_use]
    pub fn new(handle: Box<dyn FileProtocol>, descriptor: Descriptor) -> Self {
        Self {
            handle,
            descriptor,
            eof: false,
            error: false,
            tty: None,
        }
    }

    /// Descriptor this stream was registered under
    #[inline]
    #[must_use]
    pub const fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// Sticky end-of-file flag
    #[inline]
    #[must_use]
    pub const fn eof(&self) -> bool {
        self.eof
    }

    /// Error flag
    #[inline]
    #[must_use]
    pub const fn error(&self) -> bool {
        self.error
    }

    /// Whether the stream is attached to a terminal
    #[inline]
    #[must_use]
    pub const fn is_tty(&self) -> bool {
        self.tty.is_some()
    }

    /// Terminal index, when attached
    #[inline]
    #[must_use]
    pub const fn tty_index(&self) -> Option<usize> {
        self.tty
    }

    pub(crate) fn attach_tty(&mut self, index: usize) {
        self.tty = Some(index);
    }

    pub(crate) fn clear_eof(&mut self) {
        self.eof = false;
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = false;
    }

    pub(crate) fn handle_mut(&mut self) -> &mut dyn FileProtocol {
        self.handle.as_mut()
    }

    /// Read into the whole of `buf`; a short read sets EOF
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let mut moved = buf.len();
        let status = self.handle.read(&mut moved, buf);
        self.settle(status, moved, buf.len(), "read")
    }

    /// Write the whole of `buf`; a short write sets EOF
    pub(crate) fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        let mut moved = buf.len();
        let status = self.handle.write(&mut moved, buf);
        self.settle(status, moved, buf.len(), "write")
    }

    fn settle(
        &mut self,
        status: Status,
        moved: usize,
        requested: usize,
        op: &'static str,
    ) -> FsResult<usize> {
        if status.is_error() {
            self.error = true;
            return Err(FsError::with_context(Errno::Fault, op));
        }
        if moved != requested {
            self.eof = true;
        }
        Ok(moved.min(requested))
    }

    /// Close the firmware handle
    pub(crate) fn close(self) -> Status {
        self.handle.close()
    }

    /// Delete the file behind the handle (the handle is released either way)
    pub(crate) fn delete(self) -> Status {
        self.handle.delete()
    }
}

impl core::fmt::Debug for Stream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stream")
            .field("descriptor", &self.descriptor)
            .field("eof", &self.eof)
            .field("error", &self.error)
            .field("tty", &self.tty)
            .finish()
    }
}

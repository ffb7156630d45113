// src/kernel/fs/posix.rs
//! POSIX-style stream API
//!
//! `fopen`/`fread`/`fwrite`/`fseek`/... translated onto firmware file handles.
//!
//! # Design
//!
//! ```text
//!   PosixFs
//!   ├── root      working directory every path is resolved against
//!   ├── table     DescriptorTable (0/1/2 reserved, counter from 3)
//!   ├── channels  ChannelBindings for Input/Output/Error
//!   └── errno     last error, set by every failing call
//! ```
//!
//! Every failing call returns `Err` and also records the errno, which callers
//! porting C code can read back through [`PosixFs::errno`].

use alloc::boxed::Box;

use log::{debug, warn};

use super::descriptor::{Descriptor, DescriptorTable};
use super::metadata;
use super::stdio::{ChannelBindings, ChannelReader, ChannelWriter, StreamId};
use super::stream::Stream;
use crate::constants::{SEEK_CUR, SEEK_END, SEEK_SET};
use crate::efi::{wide, FileAttribute, FileMode, FileProtocol, Status};
use crate::errors::{Errno, FsError, FsResult};
use crate::kernel::time;

const TARGET: &str = "efilibc";

/// Reference point of a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute offset
    Set,
    /// Relative to the current position
    Cur,
    /// Relative to the end of file
    End,
}

impl Whence {
    /// Decode a raw `whence` value
    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            SEEK_SET => Some(Self::Set),
            SEEK_CUR => Some(Self::Cur),
            SEEK_END => Some(Self::End),
            _ => None,
        }
    }

    /// Raw `whence` value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Set => SEEK_SET,
            Self::Cur => SEEK_CUR,
            Self::End => SEEK_END,
        }
    }
}

/// Saved stream position (`fpos_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FilePosition(u64);

impl FilePosition {
    /// Byte offset from the start of the file
    #[inline]
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.0
    }
}

/// Stream API bound to one working root
pub struct PosixFs {
    root: Option<Box<dyn FileProtocol>>,
    table: DescriptorTable,
    channels: ChannelBindings,
    errno: Option<Errno>,
}

impl PosixFs {
    /// Unbound API with a default-sized descriptor table
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(DescriptorTable::new())
    }

    /// Unbound API over a caller-provided table
    #[must_use]
    pub fn with_table(table: DescriptorTable) -> Self {
        Self {
            root: None,
            table,
            channels: ChannelBindings::new(),
            errno: None,
        }
    }

    /// Bind the working root every path is resolved against
    ///
    /// A previously bound root is closed.
    pub fn init(&mut self, root: Box<dyn FileProtocol>) {
        if let Some(old) = self.root.replace(root) {
            let _ = old.close();
        }
        debug!(target: TARGET, "working root bound");
    }

    /// Whether [`init`](Self::init) has been called
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.root.is_some()
    }

    /// Descriptor table backing the API
    #[must_use]
    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    /// Last error recorded by a failing call
    #[must_use]
    pub fn errno(&self) -> Option<Errno> {
        self.errno
    }

    /// Reset the last-error channel
    pub fn clear_errno(&mut self) {
        self.errno = None;
    }

    /// Route the output channel to `writer`
    pub fn register_output_writer(&mut self, writer: impl ChannelWriter + 'static) {
        self.channels.register_output(Box::new(writer));
    }

    /// Route the error channel to `writer`
    pub fn register_error_writer(&mut self, writer: impl ChannelWriter + 'static) {
        self.channels.register_error(Box::new(writer));
    }

    /// Feed the input channel from `reader`
    pub fn register_input_reader(&mut self, reader: impl ChannelReader + 'static) {
        self.channels.register_input(Box::new(reader));
    }

    fn record<T>(&mut self, result: FsResult<T>) -> FsResult<T> {
        if let Err(err) = &result {
            self.errno = Some(err.errno());
        }
        result
    }

    fn stream_mut(&mut self, stream: StreamId) -> FsResult<&mut Stream> {
        match stream {
            StreamId::Handle(descriptor) => self
                .table
                .get_mut(descriptor)
                .ok_or(FsError::with_context(Errno::BadDescriptor, "stream not open")),
            StreamId::Input | StreamId::Output | StreamId::Error => Err(FsError::with_context(
                Errno::BadDescriptor,
                "operation not supported on a standard channel",
            )),
        }
    }

    /// Open `path` relative to the working root
    ///
    /// `"r"` opens read-only, `"r+"` and every other mode read-write. Files
    /// are never created, truncated or positioned for append.
    ///
    /// # Errors
    ///
    /// - `EFAULT` before [`init`](Self::init), or when the firmware rejects the open
    /// - `EMFILE` once the descriptor counter is exhausted
    /// - `EINVAL` for an empty mode
    /// - `ENOMEM` when the path cannot be converted
    /// - `ENOENT` when the file does not exist
    pub fn open(&mut self, path: &str, mode: &str) -> FsResult<StreamId> {
        let result = self.open_descriptor(path, mode).map(StreamId::Handle);
        self.record(result)
    }

    fn open_descriptor(&mut self, path: &str, mode: &str) -> FsResult<Descriptor> {
        let Some(root) = self.root.as_mut() else {
            warn!(target: TARGET, "fopen(): call init() before fopen()");
            return Err(FsError::with_context(Errno::Fault, "no working root"));
        };
        if self.table.is_exhausted() {
            return Err(FsError::with_context(Errno::TooManyOpenFiles, "fopen"));
        }
        let open_mode = parse_mode(mode)?;
        let name = wide::to_native_path(path)?;
        let handle = root
            .open(&name, open_mode, FileAttribute::empty())
            .map_err(|status| open_error("fopen", path, status))?;

        match self.table.insert(handle) {
            Ok(descriptor) => {
                debug!(target: TARGET, "fopen({}) = {}", path, descriptor);
                Ok(descriptor)
            }
            Err(full) => {
                let _ = full.into_handle().close();
                Err(FsError::with_context(Errno::TooManyOpenFiles, "fopen"))
            }
        }
    }

    /// Read up to `count` items of `size` bytes into `buf`
    ///
    /// Returns the number of whole items read. A short read sets the EOF flag.
    /// The input channel reads from its registered reader; output and error
    /// yield 0.
    ///
    /// # Errors
    ///
    /// - `EINVAL` when `buf` is shorter than `size * count`
    /// - `EBADF` for a stream that is not open
    /// - `EFAULT` when the firmware read fails (the error flag is set)
    pub fn read(
        &mut self,
        stream: StreamId,
        buf: &mut [u8],
        size: usize,
        count: usize,
    ) -> FsResult<usize> {
        let result = self.read_items(stream, buf, size, count);
        self.record(result)
    }

    fn read_items(
        &mut self,
        stream: StreamId,
        buf: &mut [u8],
        size: usize,
        count: usize,
    ) -> FsResult<usize> {
        let len = transfer_len(buf.len(), size, count)?;
        match stream {
            StreamId::Input => Ok(self.channels.read(&mut buf[..len], size, count)),
            StreamId::Output | StreamId::Error => Ok(0),
            StreamId::Handle(_descriptor) => {
                let open = self.stream_mut(stream)?;
                if len == 0 {
                    return Ok(0);
                }
                let moved = open.read(&mut buf[..len])?;
                #[cfg(feature = "io_trace")]
                log::trace!(target: TARGET, "fread({}) {}/{} bytes", _descriptor, moved, len);
                Ok(moved / size)
            }
        }
    }

    /// Write up to `count` items of `size` bytes from `buf`
    ///
    /// Returns the number of whole items written. A short write sets the EOF
    /// flag. Output and error go to their registered writers; input yields 0.
    ///
    /// # Errors
    ///
    /// - `EINVAL` when `buf` is shorter than `size * count`
    /// - `EBADF` for a stream that is not open
    /// - `EFAULT` when the firmware write fails (the error flag is set)
    pub fn write(
        &mut self,
        stream: StreamId,
        buf: &[u8],
        size: usize,
        count: usize,
    ) -> FsResult<usize> {
        let result = self.write_items(stream, buf, size, count);
        self.record(result)
    }

    fn write_items(
        &mut self,
        stream: StreamId,
        buf: &[u8],
        size: usize,
        count: usize,
    ) -> FsResult<usize> {
        let len = transfer_len(buf.len(), size, count)?;
        match stream {
            StreamId::Input => Ok(0),
            StreamId::Output | StreamId::Error => {
                Ok(self.channels.write(stream, &buf[..len], size, count))
            }
            StreamId::Handle(_descriptor) => {
                let open = self.stream_mut(stream)?;
                if len == 0 {
                    return Ok(0);
                }
                let moved = open.write(&buf[..len])?;
                #[cfg(feature = "io_trace")]
                log::trace!(target: TARGET, "fwrite({}) {}/{} bytes", _descriptor, moved, len);
                Ok(moved / size)
            }
        }
    }

    /// Read one byte, or `None` at end of file
    ///
    /// # Errors
    ///
    /// Fails as [`read`](Self::read) does.
    pub fn getc(&mut self, stream: StreamId) -> FsResult<Option<u8>> {
        let mut byte = [0u8; 1];
        let items = self.read(stream, &mut byte, 1, 1)?;
        Ok((items == 1).then_some(byte[0]))
    }

    /// Write one byte, returning it, or `None` when nothing was written
    ///
    /// # Errors
    ///
    /// Fails as [`write`](Self::write) does.
    pub fn putc(&mut self, stream: StreamId, byte: u8) -> FsResult<Option<u8>> {
        let items = self.write(stream, &[byte], 1, 1)?;
        Ok((items == 1).then_some(byte))
    }

    /// Close a stream and release its descriptor slot
    ///
    /// The descriptor number itself is never handed out again.
    ///
    /// # Errors
    ///
    /// `EBADF` for the standard channels and for streams that are not open.
    pub fn close(&mut self, stream: StreamId) -> FsResult<()> {
        let result = self.close_stream(stream);
        self.record(result)
    }

    fn close_stream(&mut self, stream: StreamId) -> FsResult<()> {
        let StreamId::Handle(descriptor) = stream else {
            return Err(FsError::with_context(
                Errno::BadDescriptor,
                "standard channels cannot be closed",
            ));
        };
        let open = self
            .table
            .remove(descriptor)
            .ok_or(FsError::with_context(Errno::BadDescriptor, "stream not open"))?;
        let status = open.close();
        if status.is_error() {
            warn!(target: TARGET, "fclose({}): error {:#x}", descriptor, status.as_usize());
        }
        debug!(target: TARGET, "fclose({})", descriptor);
        Ok(())
    }

    /// Move the position of a stream and clear its EOF flag
    ///
    /// # Errors
    ///
    /// - `EBADF` for the standard channels and for streams that are not open
    /// - `EINVAL` when the target lies before the start of the file
    /// - `EFAULT` when the firmware cannot report or move the position
    pub fn seek(&mut self, stream: StreamId, offset: i64, whence: Whence) -> FsResult<()> {
        let result = self.seek_stream(stream, offset, whence);
        self.record(result)
    }

    /// [`seek`](Self::seek) taking a raw `whence` value
    ///
    /// # Errors
    ///
    /// `EINVAL` for an unknown `whence`, otherwise as [`seek`](Self::seek).
    pub fn seek_raw(&mut self, stream: StreamId, offset: i64, whence: i32) -> FsResult<()> {
        match Whence::from_raw(whence) {
            Some(whence) => self.seek(stream, offset, whence),
            None => self.record(Err(FsError::with_context(
                Errno::InvalidArgument,
                "unknown whence",
            ))),
        }
    }

    fn seek_stream(&mut self, stream: StreamId, offset: i64, whence: Whence) -> FsResult<()> {
        let open = self.stream_mut(stream)?;
        let before_start = FsError::with_context(Errno::InvalidArgument, "seek before start");
        let target = match whence {
            Whence::Set => u64::try_from(offset).map_err(|_| before_start)?,
            Whence::Cur => {
                let current = open
                    .handle_mut()
                    .get_position()
                    .map_err(|_| FsError::with_context(Errno::Fault, "GetPosition"))?;
                current.checked_add_signed(offset).ok_or(before_start)?
            }
            Whence::End => {
                let size = metadata::file_info(open.handle_mut())?.file_size;
                size.checked_add_signed(offset).ok_or(before_start)?
            }
        };
        move_to(open, target)
    }

    /// Rewind to the start of the file and clear the error flag
    ///
    /// # Errors
    ///
    /// Fails as [`seek`](Self::seek) does; the error flag is then left alone.
    pub fn rewind(&mut self, stream: StreamId) -> FsResult<()> {
        self.seek(stream, 0, Whence::Set)?;
        if let Ok(open) = self.stream_mut(stream) {
            open.clear_error();
        }
        Ok(())
    }

    /// Current byte position
    ///
    /// # Errors
    ///
    /// - `EBADF` for the standard channels and for streams that are not open
    /// - `EFAULT` when the firmware cannot report the position
    pub fn tell(&mut self, stream: StreamId) -> FsResult<u64> {
        let result = self.stream_mut(stream).and_then(|open| {
            open.handle_mut()
                .get_position()
                .map_err(|_| FsError::with_context(Errno::Fault, "GetPosition"))
        });
        self.record(result)
    }

    /// Save the current position (`fgetpos`)
    ///
    /// # Errors
    ///
    /// Fails as [`tell`](Self::tell) does.
    pub fn get_position(&mut self, stream: StreamId) -> FsResult<FilePosition> {
        self.tell(stream).map(FilePosition)
    }

    /// Return to a saved position (`fsetpos`)
    ///
    /// # Errors
    ///
    /// Fails as [`seek`](Self::seek) does.
    pub fn set_position(&mut self, stream: StreamId, position: FilePosition) -> FsResult<()> {
        let result = self
            .stream_mut(stream)
            .and_then(|open| move_to(open, position.0));
        self.record(result)
    }

    /// Flush buffered data of a stream
    ///
    /// Output and error are unbuffered and always succeed.
    ///
    /// # Errors
    ///
    /// - `EBADF` for the input channel and for streams that are not open
    /// - `EFAULT` when the firmware flush fails
    pub fn flush(&mut self, stream: StreamId) -> FsResult<()> {
        let result = match stream {
            StreamId::Input => Err(FsError::with_context(
                Errno::BadDescriptor,
                "input channel cannot be flushed",
            )),
            StreamId::Output | StreamId::Error => Ok(()),
            StreamId::Handle(_) => self.stream_mut(stream).and_then(|open| {
                let status = open.handle_mut().flush();
                if status.is_error() {
                    warn!(target: TARGET, "fflush failed: {:#x}", status.as_usize());
                    return Err(FsError::with_context(Errno::Fault, "Flush"));
                }
                Ok(())
            }),
        };
        self.record(result)
    }

    /// Delete the file at `path`
    ///
    /// The file is opened read-only first, which consumes a descriptor.
    ///
    /// # Errors
    ///
    /// - any error of [`open`](Self::open)
    /// - `EFAULT` when the firmware reports that the delete failed
    pub fn remove(&mut self, path: &str) -> FsResult<()> {
        let result = self.remove_path(path);
        self.record(result)
    }

    fn remove_path(&mut self, path: &str) -> FsResult<()> {
        let descriptor = self.open_descriptor(path, "r")?;
        let open = self
            .table
            .remove(descriptor)
            .ok_or(FsError::with_context(Errno::BadDescriptor, "stream not open"))?;
        if open.delete() == Status::WARN_DELETE_FAILURE {
            warn!(target: TARGET, "remove: could not remove {}", path);
            return Err(FsError::with_context(Errno::Fault, "Delete"));
        }
        debug!(target: TARGET, "remove({})", path);
        Ok(())
    }

    /// Create the directory `path` (or open it if it exists) and close it
    ///
    /// `mode` is accepted for signature compatibility and ignored.
    ///
    /// # Errors
    ///
    /// - `EFAULT` before [`init`](Self::init), or when the firmware rejects the open
    /// - `ENOMEM` when the path cannot be converted
    /// - `ENOENT` when a parent directory does not exist
    pub fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<()> {
        let _ = mode;
        let result = self.make_dir(path);
        self.record(result)
    }

    fn make_dir(&mut self, path: &str) -> FsResult<()> {
        let Some(root) = self.root.as_mut() else {
            warn!(target: TARGET, "mkdir(): call init() before mkdir()");
            return Err(FsError::with_context(Errno::Fault, "no working root"));
        };
        let name = wide::to_native_path(path)?;
        let handle = root
            .open(
                &name,
                FileMode::READ | FileMode::WRITE | FileMode::CREATE,
                FileAttribute::DIRECTORY,
            )
            .map_err(|status| open_error("mkdir", path, status))?;
        let _ = handle.close();
        Ok(())
    }

    /// End-of-file indicator
    ///
    /// Always false for input and always true for output and error.
    #[must_use]
    pub fn feof(&self, stream: StreamId) -> bool {
        match stream {
            StreamId::Input => false,
            StreamId::Output | StreamId::Error => true,
            StreamId::Handle(descriptor) => self.table.get(descriptor).is_some_and(Stream::eof),
        }
    }

    /// Error indicator
    ///
    /// Always false for the standard channels and true for streams that are
    /// not open.
    #[must_use]
    pub fn ferror(&self, stream: StreamId) -> bool {
        match stream {
            StreamId::Input | StreamId::Output | StreamId::Error => false,
            StreamId::Handle(descriptor) => self.table.get(descriptor).is_none_or(Stream::error),
        }
    }

    /// Clear the EOF and error indicators (no-op on the standard channels)
    pub fn clearerr(&mut self, stream: StreamId) {
        if let StreamId::Handle(descriptor) = stream
            && let Some(open) = self.table.get_mut(descriptor)
        {
            open.clear_eof();
            open.clear_error();
        }
    }

    /// Descriptor number of a stream
    ///
    /// # Errors
    ///
    /// `EBADF` when the stream is not open.
    pub fn fileno(&mut self, stream: StreamId) -> FsResult<Descriptor> {
        let result = match stream {
            StreamId::Handle(descriptor) if !self.table.is_open(descriptor) => Err(
                FsError::with_context(Errno::BadDescriptor, "stream not open"),
            ),
            _ => Ok(stream.descriptor()),
        };
        self.record(result)
    }

    /// Whether descriptor `fd` refers to a terminal
    ///
    /// The standard channels always do. An open stream does only when a
    /// console driver attached it with [`attach_tty`](Self::attach_tty).
    ///
    /// # Errors
    ///
    /// `EBADF` when `fd` is beyond the table or names no open stream.
    pub fn isatty(&mut self, fd: usize) -> FsResult<bool> {
        let descriptor = Descriptor::new(fd);
        let result = if fd >= self.table.capacity() {
            Err(FsError::with_context(Errno::BadDescriptor, "descriptor out of range"))
        } else if self.table.is_reserved(descriptor) {
            Ok(true)
        } else {
            self.table
                .get(descriptor)
                .map(Stream::is_tty)
                .ok_or(FsError::with_context(Errno::BadDescriptor, "stream not open"))
        };
        self.record(result)
    }

    /// Mark an open stream as terminal `index`
    ///
    /// # Errors
    ///
    /// `EBADF` for the standard channels and for streams that are not open.
    pub fn attach_tty(&mut self, stream: StreamId, index: usize) -> FsResult<()> {
        let result = self.stream_mut(stream).map(|open| open.attach_tty(index));
        self.record(result)
    }

    /// Size of the file in bytes
    ///
    /// # Errors
    ///
    /// - `EBADF` for the standard channels and for streams that are not open
    /// - `EFAULT` or `ENOMEM` when the metadata query fails
    pub fn size(&mut self, stream: StreamId) -> FsResult<u64> {
        let result = self
            .stream_mut(stream)
            .and_then(|open| metadata::file_info(open.handle_mut()))
            .map(|info| info.file_size);
        self.record(result)
    }

    /// Last modification time in epoch seconds (0 when the firmware reports an
    /// invalid calendar record)
    ///
    /// # Errors
    ///
    /// Fails as [`size`](Self::size) does.
    pub fn modification_time(&mut self, stream: StreamId) -> FsResult<i64> {
        let result = self
            .stream_mut(stream)
            .and_then(|open| metadata::file_info(open.handle_mut()))
            .map(|info| time::epoch(&info.modification_time));
        self.record(result)
    }

    /// Whether the stream refers to a directory
    ///
    /// # Errors
    ///
    /// Fails as [`size`](Self::size) does.
    pub fn is_directory(&mut self, stream: StreamId) -> FsResult<bool> {
        let result = self
            .stream_mut(stream)
            .and_then(|open| metadata::file_info(open.handle_mut()))
            .map(|info| info.is_directory());
        self.record(result)
    }
}

impl Default for PosixFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PosixFs {
    fn drop(&mut self) {
        self.table.close_all();
        if let Some(root) = self.root.take() {
            let _ = root.close();
        }
    }
}

impl core::fmt::Debug for PosixFs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PosixFs")
            .field("initialized", &self.root.is_some())
            .field("table", &self.table)
            .field("channels", &self.channels)
            .field("errno", &self.errno)
            .finish()
    }
}

fn parse_mode(mode: &str) -> FsResult<FileMode> {
    match mode.as_bytes() {
        [] => Err(FsError::with_context(Errno::InvalidArgument, "empty mode")),
        [b'r', b'+', ..] => Ok(FileMode::READ | FileMode::WRITE),
        [b'r', ..] => Ok(FileMode::READ),
        _ => Ok(FileMode::READ | FileMode::WRITE),
    }
}

fn transfer_len(available: usize, size: usize, count: usize) -> FsResult<usize> {
    match size.checked_mul(count) {
        Some(len) if len <= available => Ok(len),
        _ => Err(FsError::with_context(
            Errno::InvalidArgument,
            "buffer shorter than size * count",
        )),
    }
}

fn open_error(op: &str, path: &str, status: Status) -> FsError {
    if status == Status::NOT_FOUND {
        warn!(target: TARGET, "{}({}): not found", op, path);
        FsError::with_context(Errno::NoEntry, "Open")
    } else {
        warn!(target: TARGET, "{}({}): error {:#x}", op, path, status.as_usize());
        FsError::with_context(Errno::Fault, "Open")
    }
}

fn move_to(open: &mut Stream, target: u64) -> FsResult<()> {
    if open.handle_mut().set_position(target).is_error() {
        return Err(FsError::with_context(Errno::Fault, "SetPosition"));
    }
    open.clear_eof();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FIRST_FILENO;
    use crate::efi::calendar;
    use crate::efi::sim::MemVolume;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    fn mounted(volume: &MemVolume) -> PosixFs {
        let mut fs = PosixFs::new();
        fs.init(volume.open_root());
        fs
    }

    #[test]
    fn test_open_before_init_faults() {
        let mut fs = PosixFs::new();
        let err = fs.open("a.txt", "r").expect_err("open should fail");
        assert_eq!(err.errno(), Errno::Fault);
        assert_eq!(fs.errno(), Some(Errno::Fault));
        assert!(!fs.is_initialized());
    }

    #[test]
    fn test_open_read_close_lifecycle() {
        let volume = MemVolume::new();
        volume.add_file("docs/a.txt", b"hello world");
        let mut fs = mounted(&volume);

        let stream = fs.open("/docs/a.txt", "r").expect("open failed");
        assert_eq!(stream, StreamId::Handle(Descriptor::new(FIRST_FILENO)));
        assert_eq!(fs.fileno(stream).expect("fileno failed").as_usize(), 3);

        let mut buf = [0u8; 5];
        assert_eq!(fs.read(stream, &mut buf, 1, 5).expect("read failed"), 5);
        assert_eq!(&buf, b"hello");
        assert!(!fs.feof(stream));

        fs.close(stream).expect("close failed");
        assert_eq!(
            fs.fileno(stream).expect_err("fileno should fail").errno(),
            Errno::BadDescriptor
        );
        assert_eq!(
            fs.close(stream).expect_err("double close should fail").errno(),
            Errno::BadDescriptor
        );

        let again = fs.open("docs/a.txt", "r").expect("reopen failed");
        assert_eq!(again, StreamId::Handle(Descriptor::new(4)));
        fs.close(again).expect("close failed");
    }

    #[test]
    fn test_failed_open_does_not_consume_descriptor() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"");
        let mut fs = mounted(&volume);

        let err = fs.open("missing.txt", "r").expect_err("open should fail");
        assert_eq!(err.errno(), Errno::NoEntry);
        assert_eq!(fs.errno(), Some(Errno::NoEntry));

        volume.fail_open(Some(Status::DEVICE_ERROR));
        let err = fs.open("a.txt", "r").expect_err("open should fail");
        assert_eq!(err.errno(), Errno::Fault);
        volume.fail_open(None);

        let err = fs.open("a.txt", "").expect_err("empty mode should fail");
        assert_eq!(err.errno(), Errno::InvalidArgument);

        let stream = fs.open("a.txt", "r").expect("open failed");
        assert_eq!(stream, StreamId::Handle(Descriptor::new(3)));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(parse_mode("r").expect("mode"), FileMode::READ);
        assert_eq!(parse_mode("rb").expect("mode"), FileMode::READ);
        assert_eq!(parse_mode("r+").expect("mode"), FileMode::READ | FileMode::WRITE);
        assert_eq!(parse_mode("w").expect("mode"), FileMode::READ | FileMode::WRITE);
        assert_eq!(parse_mode("a+").expect("mode"), FileMode::READ | FileMode::WRITE);
        assert!(parse_mode("").is_err());
    }

    #[test]
    fn test_descriptor_exhaustion() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"");
        let mut fs = PosixFs::with_table(DescriptorTable::with_capacity(5));
        fs.init(volume.open_root());

        let first = fs.open("a.txt", "r").expect("open failed");
        let _second = fs.open("a.txt", "r").expect("open failed");
        fs.close(first).expect("close failed");

        let err = fs.open("a.txt", "r").expect_err("table should be exhausted");
        assert_eq!(err.errno(), Errno::TooManyOpenFiles);
        assert_eq!(fs.errno(), Some(Errno::TooManyOpenFiles));
    }

    #[test]
    fn test_short_read_sets_eof_and_seek_clears_it() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"abcdef");
        let mut fs = mounted(&volume);
        let stream = fs.open("a.txt", "r").expect("open failed");

        let mut buf = [0u8; 4];
        assert_eq!(fs.read(stream, &mut buf, 2, 2).expect("read failed"), 2);
        assert_eq!(fs.read(stream, &mut buf, 2, 2).expect("read failed"), 1);
        assert_eq!(&buf[..2], b"ef");
        assert!(fs.feof(stream));

        fs.seek(stream, 1, Whence::Set).expect("seek failed");
        assert!(!fs.feof(stream));
        assert_eq!(fs.getc(stream).expect("getc failed"), Some(b'b'));
    }

    #[test]
    fn test_getc_reports_end_of_file() {
        let volume = MemVolume::new();
        volume.add_file("one", b"x");
        let mut fs = mounted(&volume);
        let stream = fs.open("one", "r").expect("open failed");

        assert_eq!(fs.getc(stream).expect("getc failed"), Some(b'x'));
        assert_eq!(fs.getc(stream).expect("getc failed"), None);
        assert!(fs.feof(stream));
    }

    #[test]
    fn test_write_then_read_back() {
        let volume = MemVolume::new();
        volume.add_file("out.txt", b"");
        let mut fs = mounted(&volume);
        let stream = fs.open("out.txt", "w").expect("open failed");

        assert_eq!(fs.write(stream, b"abcd", 2, 2).expect("write failed"), 2);
        assert_eq!(fs.putc(stream, b'!').expect("putc failed"), Some(b'!'));
        assert_eq!(volume.contents("out.txt").as_deref(), Some(&b"abcd!"[..]));

        fs.rewind(stream).expect("rewind failed");
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(stream, &mut buf, 5, 1).expect("read failed"), 1);
        assert_eq!(&buf, b"abcd!");
    }

    #[test]
    fn test_write_to_read_only_stream_sets_error() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"abc");
        let mut fs = mounted(&volume);
        let stream = fs.open("a.txt", "r").expect("open failed");

        let err = fs.write(stream, b"x", 1, 1).expect_err("write should fail");
        assert_eq!(err.errno(), Errno::Fault);
        assert!(fs.ferror(stream));

        fs.rewind(stream).expect("rewind failed");
        assert!(!fs.ferror(stream));
    }

    #[test]
    fn test_buffer_shorter_than_request() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"abc");
        let mut fs = mounted(&volume);
        let stream = fs.open("a.txt", "r").expect("open failed");

        let mut buf = [0u8; 2];
        let err = fs.read(stream, &mut buf, 1, 3).expect_err("read should fail");
        assert_eq!(err.errno(), Errno::InvalidArgument);
        assert_eq!(fs.read(stream, &mut buf, 0, 3).expect("read failed"), 0);
    }

    #[test]
    fn test_seek_and_tell() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"0123456789");
        let mut fs = mounted(&volume);
        let stream = fs.open("a.txt", "r").expect("open failed");

        fs.seek(stream, 4, Whence::Set).expect("seek failed");
        assert_eq!(fs.tell(stream).expect("tell failed"), 4);
        fs.seek(stream, 3, Whence::Cur).expect("seek failed");
        assert_eq!(fs.tell(stream).expect("tell failed"), 7);
        fs.seek(stream, -5, Whence::Cur).expect("seek failed");
        assert_eq!(fs.tell(stream).expect("tell failed"), 2);
        fs.seek(stream, 0, Whence::End).expect("seek failed");
        assert_eq!(fs.tell(stream).expect("tell failed"), 10);
        assert_eq!(fs.size(stream).expect("size failed"), 10);
        fs.seek(stream, -1, Whence::End).expect("seek failed");
        assert_eq!(fs.getc(stream).expect("getc failed"), Some(b'9'));

        let err = fs.seek(stream, -1, Whence::Set).expect_err("seek should fail");
        assert_eq!(err.errno(), Errno::InvalidArgument);
        let err = fs.seek(stream, -100, Whence::Cur).expect_err("seek should fail");
        assert_eq!(err.errno(), Errno::InvalidArgument);
        let err = fs.seek_raw(stream, 0, 7).expect_err("seek should fail");
        assert_eq!(err.errno(), Errno::InvalidArgument);
        fs.seek_raw(stream, 0, SEEK_SET).expect("raw seek failed");
        assert_eq!(fs.tell(stream).expect("tell failed"), 0);
    }

    #[test]
    fn test_saved_positions() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"abcdef");
        let mut fs = mounted(&volume);
        let stream = fs.open("a.txt", "r").expect("open failed");

        fs.seek(stream, 3, Whence::Set).expect("seek failed");
        let saved = fs.get_position(stream).expect("fgetpos failed");
        assert_eq!(saved.offset(), 3);
        fs.seek(stream, 0, Whence::End).expect("seek failed");
        fs.set_position(stream, saved).expect("fsetpos failed");
        assert_eq!(fs.getc(stream).expect("getc failed"), Some(b'd'));
    }

    #[test]
    fn test_standard_channels() {
        let volume = MemVolume::new();
        let mut fs = mounted(&volume);
        let out = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&out);
        fs.register_output_writer(move |buf: &[u8], _size: usize, count: usize| {
            sink.borrow_mut().extend_from_slice(buf);
            count
        });
        fs.register_input_reader(|buf: &mut [u8], size: usize, count: usize| {
            buf.fill(b'z');
            (buf.len() / size).min(count)
        });

        assert_eq!(fs.write(StreamId::Output, b"hi", 1, 2).expect("write failed"), 2);
        assert_eq!(fs.write(StreamId::Error, b"hi", 1, 2).expect("write failed"), 0);
        assert_eq!(fs.write(StreamId::Input, b"hi", 1, 2).expect("write failed"), 0);
        assert_eq!(out.borrow().as_slice(), b"hi");

        assert_eq!(fs.getc(StreamId::Input).expect("getc failed"), Some(b'z'));
        let mut buf = [0u8; 2];
        assert_eq!(fs.read(StreamId::Output, &mut buf, 1, 2).expect("read failed"), 0);

        assert!(!fs.feof(StreamId::Input));
        assert!(fs.feof(StreamId::Output));
        assert!(fs.feof(StreamId::Error));
        assert!(!fs.ferror(StreamId::Output));

        for channel in [StreamId::Input, StreamId::Output, StreamId::Error] {
            assert_eq!(fs.close(channel).expect_err("close").errno(), Errno::BadDescriptor);
            assert_eq!(fs.tell(channel).expect_err("tell").errno(), Errno::BadDescriptor);
            assert_eq!(
                fs.seek(channel, 0, Whence::Set).expect_err("seek").errno(),
                Errno::BadDescriptor
            );
            fs.clearerr(channel);
        }
        assert_eq!(fs.fileno(StreamId::Error).expect("fileno failed").as_usize(), 2);

        assert_eq!(
            fs.flush(StreamId::Input).expect_err("flush").errno(),
            Errno::BadDescriptor
        );
        fs.flush(StreamId::Output).expect("flush failed");
        fs.flush(StreamId::Error).expect("flush failed");
    }

    #[test]
    fn test_flush_failure_faults() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"");
        let mut fs = mounted(&volume);
        let stream = fs.open("a.txt", "r+").expect("open failed");

        fs.flush(stream).expect("flush failed");
        volume.fail_flush(Some(Status::DEVICE_ERROR));
        assert_eq!(fs.flush(stream).expect_err("flush").errno(), Errno::Fault);
    }

    #[test]
    fn test_isatty() {
        let volume = MemVolume::new();
        volume.add_file("con", b"");
        let mut fs = mounted(&volume);

        for fd in 0..3 {
            assert!(fs.isatty(fd).expect("isatty failed"));
        }
        assert_eq!(fs.isatty(3).expect_err("isatty").errno(), Errno::BadDescriptor);
        assert_eq!(fs.isatty(4096).expect_err("isatty").errno(), Errno::BadDescriptor);

        let stream = fs.open("con", "r").expect("open failed");
        fs.clear_errno();
        assert!(!fs.isatty(3).expect("isatty failed"));
        assert_eq!(fs.errno(), None);

        fs.attach_tty(stream, 1).expect("attach failed");
        assert!(fs.isatty(3).expect("isatty failed"));
        assert_eq!(
            fs.attach_tty(StreamId::Output, 0).expect_err("attach").errno(),
            Errno::BadDescriptor
        );
    }

    #[test]
    fn test_remove() {
        let volume = MemVolume::new();
        volume.add_file("gone.txt", b"x");
        volume.add_file("kept.txt", b"x");
        volume.set_read_only("kept.txt");
        let mut fs = mounted(&volume);

        fs.remove("gone.txt").expect("remove failed");
        assert!(!volume.exists("gone.txt"));

        assert_eq!(fs.remove("kept.txt").expect_err("remove").errno(), Errno::Fault);
        assert!(volume.exists("kept.txt"));

        assert_eq!(fs.remove("gone.txt").expect_err("remove").errno(), Errno::NoEntry);

        // Both successful opens consumed a descriptor.
        assert_eq!(fs.table().next_descriptor(), Some(Descriptor::new(5)));
        assert_eq!(fs.table().open_count(), 0);
    }

    #[test]
    fn test_mkdir() {
        let volume = MemVolume::new();
        let mut fs = mounted(&volume);

        fs.mkdir("logs", 0o755).expect("mkdir failed");
        assert!(volume.is_directory("logs"));
        fs.mkdir("logs", 0o755).expect("mkdir of existing directory failed");
        assert_eq!(fs.mkdir("no/such/parent", 0).expect_err("mkdir").errno(), Errno::NoEntry);
        assert_eq!(fs.table().next_descriptor(), Some(Descriptor::new(3)));

        let dir = fs.open("logs", "r").expect("open failed");
        assert!(fs.is_directory(dir).expect("query failed"));
    }

    #[test]
    fn test_metadata_queries() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"12345");
        volume.set_modified("a.txt", calendar(1998, 1, 1, 0, 0, 0));
        let mut fs = mounted(&volume);
        let stream = fs.open("a.txt", "r").expect("open failed");

        assert_eq!(fs.size(stream).expect("size failed"), 5);
        assert!(!fs.is_directory(stream).expect("query failed"));
        assert_eq!(fs.modification_time(stream).expect("mtime failed"), 883_612_800);

        volume.set_modified("a.txt", calendar(1970, 1, 1, 0, 0, 0));
        assert_eq!(fs.modification_time(stream).expect("mtime failed"), 0);

        volume.fail_get_info(Some(Status::DEVICE_ERROR));
        assert_eq!(fs.size(stream).expect_err("size").errno(), Errno::Fault);
        assert_eq!(fs.errno(), Some(Errno::Fault));
        assert_eq!(
            fs.size(StreamId::Output).expect_err("size").errno(),
            Errno::BadDescriptor
        );
    }

    #[test]
    fn test_drop_releases_handles() {
        let volume = MemVolume::new();
        volume.add_file("a.txt", b"");
        {
            let mut fs = mounted(&volume);
            let _a = fs.open("a.txt", "r").expect("open failed");
            let _b = fs.open("a.txt", "r").expect("open failed");
            assert_eq!(volume.open_handles(), 3);
        }
        assert_eq!(volume.open_handles(), 0);
    }
}

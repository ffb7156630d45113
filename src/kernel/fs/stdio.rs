// src/kernel/fs/stdio.rs
//! Standard I/O channels (stdin, stdout, stderr)
//!
//! Descriptors 0, 1 and 2 never reach the firmware. Reads and writes on them
//! are dispatched to callbacks registered by the console driver. A channel
//! with nothing registered transfers zero items.

use alloc::boxed::Box;

use super::descriptor::Descriptor;

/// Standard input descriptor
pub const STDIN_FILENO: usize = 0;
/// Standard output descriptor
pub const STDOUT_FILENO: usize = 1;
/// Standard error descriptor
pub const STDERR_FILENO: usize = 2;

/// Identity of a stream as seen by callers
///
/// Reserved channels are told apart by discriminant. `Handle` names a slot in
/// the descriptor table; it stays `Copy` after close, and every operation on
/// a freed slot fails with `EBADF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// Descriptor 0
    Input,
    /// Descriptor 1
    Output,
    /// Descriptor 2
    Error,
    /// A stream opened through the firmware
    Handle(Descriptor),
}

impl StreamId {
    /// Map a descriptor number to the stream identity it denotes
    #[must_use]
    pub const fn from_descriptor(descriptor: Descriptor) -> Self {
        match descriptor.as_usize() {
            STDIN_FILENO => Self::Input,
            STDOUT_FILENO => Self::Output,
            STDERR_FILENO => Self::Error,
            _ => Self::Handle(descriptor),
        }
    }

    /// Descriptor number of this stream
    #[must_use]
    pub const fn descriptor(self) -> Descriptor {
        match self {
            Self::Input => Descriptor::new(STDIN_FILENO),
            Self::Output => Descriptor::new(STDOUT_FILENO),
            Self::Error => Descriptor::new(STDERR_FILENO),
            Self::Handle(descriptor) => descriptor,
        }
    }

    /// Whether this is one of the three reserved channels
    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        !matches!(self, Self::Handle(_))
    }
}

impl From<Descriptor> for StreamId {
    fn from(descriptor: Descriptor) -> Self {
        Self::from_descriptor(descriptor)
    }
}

/// Sink for the output and error channels
///
/// `buf` holds `size * count` bytes. Returns the number of whole items
/// consumed.
pub trait ChannelWriter {
    /// Consume up to `count` items of `size` bytes.
    fn write(&mut self, buf: &[u8], size: usize, count: usize) -> usize;
}

/// Source for the input channel
pub trait ChannelReader {
    /// Fill up to `count` items of `size` bytes, returning the items produced.
    fn read(&mut self, buf: &mut [u8], size: usize, count: usize) -> usize;
}

impl<F> ChannelWriter for F
where
    F: FnMut(&[u8], usize, usize) -> usize,
{
    fn write(&mut self, buf: &[u8], size: usize, count: usize) -> usize {
        self(buf, size, count)
    }
}

impl<F> ChannelReader for F
where
    F: FnMut(&mut [u8], usize, usize) -> usize,
{
    fn read(&mut self, buf: &mut [u8], size: usize, count: usize) -> usize {
        self(buf, size, count)
    }
}

/// Callbacks bound to the reserved channels
#[derive(Default)]
pub struct ChannelBindings {
    input: Option<Box<dyn ChannelReader>>,
    output: Option<Box<dyn ChannelWriter>>,
    error: Option<Box<dyn ChannelWriter>>,
}

impl ChannelBindings {
    /// Bindings with nothing registered
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the output writer
    pub fn register_output(&mut self, writer: Box<dyn ChannelWriter>) {
        self.output = Some(writer);
    }

    /// Replace the error writer
    pub fn register_error(&mut self, writer: Box<dyn ChannelWriter>) {
        self.error = Some(writer);
    }

    /// Replace the input reader
    pub fn register_input(&mut self, reader: Box<dyn ChannelReader>) {
        self.input = Some(reader);
    }

    /// Read from the input channel
    pub fn read(&mut self, buf: &mut [u8], size: usize, count: usize) -> usize {
        self.input
            .as_mut()
            .map_or(0, |reader| reader.read(buf, size, count))
    }

    /// Write to the output or error channel
    ///
    /// `Input` and `Handle` identities are not writable here and yield 0.
    pub fn write(&mut self, stream: StreamId, buf: &[u8], size: usize, count: usize) -> usize {
        let writer = match stream {
            StreamId::Output => self.output.as_mut(),
            StreamId::Error => self.error.as_mut(),
            StreamId::Input | StreamId::Handle(_) => None,
        };
        writer.map_or(0, |writer| writer.write(buf, size, count))
    }
}

impl core::fmt::Debug for ChannelBindings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelBindings")
            .field("input", &self.input.is_some())
            .field("output", &self.output.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[test]
    fn test_stream_id_from_descriptor() {
        assert_eq!(StreamId::from(Descriptor::new(0)), StreamId::Input);
        assert_eq!(StreamId::from(Descriptor::new(1)), StreamId::Output);
        assert_eq!(StreamId::from(Descriptor::new(2)), StreamId::Error);
        assert_eq!(
            StreamId::from(Descriptor::new(3)),
            StreamId::Handle(Descriptor::new(3))
        );
        assert_eq!(StreamId::Error.descriptor(), Descriptor::new(2));
        assert!(StreamId::Output.is_reserved());
        assert!(!StreamId::Handle(Descriptor::new(7)).is_reserved());
    }

    #[test]
    fn test_unbound_channels_transfer_nothing() {
        let mut channels = ChannelBindings::new();
        let mut buf = [0u8; 4];
        assert_eq!(channels.read(&mut buf, 1, 4), 0);
        assert_eq!(channels.write(StreamId::Output, b"abcd", 1, 4), 0);
        assert_eq!(channels.write(StreamId::Error, b"abcd", 2, 2), 0);
    }

    #[test]
    fn test_writers_are_routed_by_channel() {
        let out = Rc::new(RefCell::new(Vec::new()));
        let err = Rc::new(RefCell::new(Vec::new()));
        let mut channels = ChannelBindings::new();

        let sink = Rc::clone(&out);
        channels.register_output(Box::new(move |buf: &[u8], _size: usize, count: usize| {
            sink.borrow_mut().extend_from_slice(buf);
            count
        }));
        let sink = Rc::clone(&err);
        channels.register_error(Box::new(move |buf: &[u8], _size: usize, count: usize| {
            sink.borrow_mut().extend_from_slice(buf);
            count
        }));

        assert_eq!(channels.write(StreamId::Output, b"out", 1, 3), 3);
        assert_eq!(channels.write(StreamId::Error, b"err", 3, 1), 1);
        assert_eq!(channels.write(StreamId::Input, b"in", 1, 2), 0);
        assert_eq!(out.borrow().as_slice(), b"out");
        assert_eq!(err.borrow().as_slice(), b"err");
    }

    #[test]
    fn test_reader_fills_buffer() {
        let mut channels = ChannelBindings::new();
        channels.register_input(Box::new(|buf: &mut [u8], _size: usize, _count: usize| {
            buf[0] = b'k';
            1
        }));
        let mut buf = [0u8; 1];
        assert_eq!(channels.read(&mut buf, 1, 1), 1);
        assert_eq!(buf[0], b'k');
    }
}

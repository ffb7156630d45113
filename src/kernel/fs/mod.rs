// src/kernel/fs/mod.rs
//! POSIX-style file streams
//!
//! - [`descriptor`]: the descriptor table and its never-reused counter
//! - [`stream`]: one open firmware handle plus EOF/error flags
//! - [`stdio`]: the three reserved channels and their callbacks
//! - [`metadata`]: two-phase `GetInfo` queries
//! - [`posix`]: the `fopen`/`fread`/`fseek`/... surface

pub mod descriptor;
pub mod metadata;
pub mod posix;
pub mod stdio;
pub mod stream;

pub use descriptor::{Descriptor, DescriptorTable, TableFull};
pub use posix::{FilePosition, PosixFs, Whence};
pub use stdio::{
    ChannelBindings, ChannelReader, ChannelWriter, StreamId, STDERR_FILENO, STDIN_FILENO,
    STDOUT_FILENO,
};
pub use stream::Stream;

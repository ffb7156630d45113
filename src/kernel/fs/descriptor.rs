// src/kernel/fs/descriptor.rs
//! Descriptor table
//!
//! Fixed-capacity registry mapping small integers to open streams.
//!
//! # Design
//!
//! ```text
//!   slot:   0         1         2         3      4      5    ...  capacity-1
//!         Reserved  Reserved  Reserved  Open   Empty  Open   ...  Empty
//!                                                             ▲
//!                                                           next
//! ```
//!
//! - Slots 0, 1 and 2 belong to the standard channels and are never allocated
//! - Descriptors come from a monotonic counter starting at 3 and are never
//!   reused, so the namespace is exhausted once the counter reaches the
//!   capacity even if earlier slots have been freed
//! - Slot storage grows on demand; only `next` slots are ever materialised

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use super::stream::Stream;
use crate::constants::{FIRST_FILENO, MAX_FILENO};
use crate::efi::FileProtocol;

/// Small integer naming a slot of a [`DescriptorTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(usize);

impl Descriptor {
    /// Wrap a raw descriptor number
    #[inline]
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw descriptor number
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Insert rejected because the descriptor counter is exhausted
pub struct TableFull(Box<dyn FileProtocol>);

impl TableFull {
    /// Take back the handle that could not be registered
    #[must_use]
    pub fn into_handle(self) -> Box<dyn FileProtocol> {
        self.0
    }
}

impl fmt::Debug for TableFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TableFull")
    }
}

enum Slot {
    Reserved,
    Empty,
    Open(Stream),
}

/// Registry of open streams
pub struct DescriptorTable {
    slots: Vec<Slot>,
    next: usize,
    capacity: usize,
}

impl DescriptorTable {
    /// Table with the default capacity of [`MAX_FILENO`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_FILENO)
    }

    /// Table handing out descriptors below `capacity`
    ///
    /// The capacity never drops below the three reserved slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(FIRST_FILENO);
        slots.extend((0..FIRST_FILENO).map(|_| Slot::Reserved));
        Self {
            slots,
            next: FIRST_FILENO,
            capacity: capacity.max(FIRST_FILENO),
        }
    }

    /// Number of descriptors the table can name
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Descriptor the next successful insert will receive
    #[must_use]
    pub const fn next_descriptor(&self) -> Option<Descriptor> {
        if self.next < self.capacity {
            Some(Descriptor(self.next))
        } else {
            None
        }
    }

    /// Whether the descriptor counter has run out
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.next >= self.capacity
    }

    /// Register an open handle under the next descriptor
    ///
    /// # Errors
    ///
    /// Returns [`TableFull`] carrying the untouched handle when the counter is
    /// exhausted.
    pub fn insert(&mut self, handle: Box<dyn FileProtocol>) -> Result<Descriptor, TableFull> {
        if self.is_exhausted() {
            return Err(TableFull(handle));
        }
        let descriptor = Descriptor(self.next);
        self.next += 1;
        self.slots.push(Slot::Open(Stream::new(handle, descriptor)));
        Ok(descriptor)
    }

    /// Stream registered under `descriptor`
    #[must_use]
    pub fn get(&self, descriptor: Descriptor) -> Option<&Stream> {
        match self.slots.get(descriptor.0)? {
            Slot::Open(stream) => Some(stream),
            Slot::Reserved | Slot::Empty => None,
        }
    }

    /// Mutable access to the stream registered under `descriptor`
    pub fn get_mut(&mut self, descriptor: Descriptor) -> Option<&mut Stream> {
        match self.slots.get_mut(descriptor.0)? {
            Slot::Open(stream) => Some(stream),
            Slot::Reserved | Slot::Empty => None,
        }
    }

    /// Free the slot of `descriptor`, handing its stream to the caller
    ///
    /// The descriptor is not returned to the counter.
    pub fn remove(&mut self, descriptor: Descriptor) -> Option<Stream> {
        let slot = self.slots.get_mut(descriptor.0)?;
        if !matches!(slot, Slot::Open(_)) {
            return None;
        }
        match core::mem::replace(slot, Slot::Empty) {
            Slot::Open(stream) => Some(stream),
            Slot::Reserved | Slot::Empty => None,
        }
    }

    /// Whether `descriptor` names an open stream
    #[must_use]
    pub fn is_open(&self, descriptor: Descriptor) -> bool {
        self.get(descriptor).is_some()
    }

    /// Whether `descriptor` is one of the standard channels
    #[inline]
    #[must_use]
    pub const fn is_reserved(&self, descriptor: Descriptor) -> bool {
        descriptor.0 < FIRST_FILENO
    }

    /// Number of open streams
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Open(_)))
            .count()
    }

    /// Close every open stream, leaving the counter untouched
    pub fn close_all(&mut self) {
        for slot in &mut self.slots {
            if matches!(slot, Slot::Open(_))
                && let Slot::Open(stream) = core::mem::replace(slot, Slot::Empty)
            {
                let _ = stream.close();
            }
        }
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorTable")
            .field("capacity", &self.capacity)
            .field("next", &self.next)
            .field("open", &self.open_count())
            .finish()
    }
}

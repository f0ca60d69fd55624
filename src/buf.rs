//! The growable staging buffer.

use std::{
    collections::TryReserveError,
    fmt::{self, Display, Formatter},
};

/// The default capacity of a stage buffer, in bytes.
pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

/// A growable byte buffer that stages incoming data for a decoder.
///
/// Chunks of arbitrary size are appended at the tail with
/// [`refill`](StageBuf::refill), and fixed-size spans are pulled off the
/// front with [`consume`](StageBuf::consume) or
/// [`consume_to_vec`](StageBuf::consume_to_vec). The buffer grows and
/// compacts its backing storage on its own; the caller never reasons about
/// capacity.
///
/// The buffer is single-owner: every mutating operation takes `&mut self`,
/// so concurrent use does not compile.
pub struct StageBuf {
    storage: Box<[u8]>,
    filled: usize,
    consumed: usize,
}

impl StageBuf {
    /// Creates a new stage buffer with the given capacity.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        Ok(StageBuf {
            storage: alloc_storage(capacity)?,
            filled: 0,
            consumed: 0,
        })
    }

    /// Creates a new stage buffer with [`DEFAULT_CAPACITY`].
    pub fn with_default_capacity() -> Result<Self, Error> {
        StageBuf::new(DEFAULT_CAPACITY)
    }

    /// Creates a stage buffer, runs `action` on it, and releases the
    /// storage on every exit path of `action`.
    pub fn scoped<T>(capacity: usize, action: impl FnOnce(&mut StageBuf) -> T) -> Result<T, Error> {
        let mut buf = StageBuf::new(capacity)?;
        Ok(action(&mut buf))
    }

    /// Returns the total size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.filled - self.consumed
    }

    /// Returns true if there are no unread bytes.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Appends `data` behind the unread bytes, copying it into the
    /// backing storage.
    ///
    /// The storage grows by 1.5x steps when the unread bytes plus `data`
    /// exceed the capacity, and already consumed space is reclaimed when
    /// the tail has no room left. Growth allocates before any offset is
    /// updated, so the buffer is unchanged when this fails with
    /// [`Error::Allocation`].
    pub fn refill(&mut self, data: &[u8]) -> Result<(), Error> {
        let residue = self.remaining();

        if self.capacity() < data.len() + residue {
            self.grow(data.len() + residue)?;
        }

        if self.consumed == self.filled || data.len() + self.filled > self.capacity() {
            self.compact();
        }

        self.storage[self.filled..self.filled + data.len()].copy_from_slice(data);
        self.filled += data.len();

        Ok(())
    }

    /// Consumes the next `n` unread bytes without copying them.
    ///
    /// Returns a span into the backing storage. The span borrows the
    /// buffer, so no refill or consume can run until it is dropped; copy
    /// the bytes out first to keep them past the next operation.
    ///
    /// When fewer than `n` unread bytes are available, returns
    /// [`Error::Shortfall`] with the number of missing bytes and leaves
    /// the buffer unchanged.
    pub fn consume(&mut self, n: usize) -> Result<&[u8], Error> {
        if self.remaining() < n {
            return Err(Error::Shortfall(n - self.remaining()));
        }

        let start = self.consumed;
        self.consumed += n;

        Ok(&self.storage[start..start + n])
    }

    /// Consumes the next `n` unread bytes into an owned vector.
    ///
    /// Same selection as [`consume`](StageBuf::consume), but the returned
    /// bytes are independent of later buffer operations.
    pub fn consume_to_vec(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        Ok(self.consume(n)?.to_vec())
    }

    /// Reallocates the backing storage to the first 1.5x capacity step
    /// that covers `required` bytes, preserving the written bytes in
    /// place.
    fn grow(&mut self, required: usize) -> Result<(), Error> {
        let mut capacity = self.capacity();
        while capacity < required {
            capacity = next_capacity(capacity);
        }

        let mut storage = alloc_storage(capacity)?;
        storage[..self.filled].copy_from_slice(&self.storage[..self.filled]);

        log::trace!("grow: {} -> {} bytes", self.storage.len(), capacity);

        self.storage = storage;

        Ok(())
    }

    /// Moves the unread bytes to the front of the storage and resets the
    /// consumed offset.
    fn compact(&mut self) {
        let residue = self.remaining();

        self.storage.copy_within(self.consumed..self.filled, 0);

        log::trace!(
            "compact: {} residue bytes, {} bytes reclaimed",
            residue,
            self.consumed
        );

        self.consumed = 0;
        self.filled = residue;
    }
}

/// The next capacity step, 1.5x the current one rounded up, at least one
/// byte larger.
fn next_capacity(capacity: usize) -> usize {
    usize::max(capacity + 1, capacity + (capacity + 1) / 2)
}

fn alloc_storage(capacity: usize) -> Result<Box<[u8]>, Error> {
    let mut storage = Vec::new();
    storage.try_reserve_exact(capacity).map_err(Error::Allocation)?;
    storage.resize(capacity, 0);

    Ok(storage.into_boxed_slice())
}

/// Errors during staging.
#[derive(Debug)]
pub enum Error {
    /// The allocator cannot satisfy an allocation or growth request.
    Allocation(TryReserveError),

    /// A consume request exceeds the unread bytes currently available.
    ///
    /// Carries the number of missing bytes: refill at least that many
    /// bytes and retry the same request.
    Shortfall(usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Allocation(e) => write!(f, "allocation failed: {}", e),
            Error::Shortfall(missing) => write!(f, "{} more bytes required", missing),
        }
    }
}

impl std::error::Error for Error {}

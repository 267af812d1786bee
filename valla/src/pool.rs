//! Reusable scratch buffers.
use std::{
    cell::RefCell,
    fmt,
    ops::{Deref, DerefMut},
};

/// A pool of empty vectors that keep their allocation between uses.
///
/// Tree maps need temporary stacks and element buffers for every insertion and read. Taking a
/// buffer from the pool avoids allocating them anew each time. The pool uses a [`RefCell`] so that
/// buffers can be taken through a shared reference, which makes it `Send` but not `Sync`.
pub struct ScratchPool<T> {
    idle: RefCell<Vec<Vec<T>>>,
}

impl<T> Default for ScratchPool<T> {
    fn default() -> Self {
        Self {
            idle: RefCell::new(Vec::new()),
        }
    }
}

impl<T> Clone for ScratchPool<T> {
    /// Returns a new empty pool, buffers are never shared.
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<T> fmt::Debug for ScratchPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchPool")
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl<T> ScratchPool<T> {
    /// Returns an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out an empty buffer, which returns to the pool when the guard is dropped.
    pub fn take(&self) -> Pooled<'_, T> {
        Pooled {
            pool: self,
            buffer: self.detach(),
        }
    }

    /// Hands out an empty buffer without a guard.
    ///
    /// The buffer can be given back using [`restore`][Self::restore]. This is needed when the
    /// buffer must outlive a borrow of the pool's owner.
    pub fn detach(&self) -> Vec<T> {
        self.idle.borrow_mut().pop().unwrap_or_default()
    }

    /// Returns a buffer to the pool, clearing it.
    pub fn restore(&self, mut buffer: Vec<T>) {
        buffer.clear();
        self.idle.borrow_mut().push(buffer);
    }

    /// Number of buffers available for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle.borrow().len()
    }

    /// Heap memory held by idle buffers in bytes.
    pub fn mem_usage(&self) -> usize {
        self.idle
            .borrow()
            .iter()
            .map(|buffer| buffer.capacity() * std::mem::size_of::<T>())
            .sum()
    }
}

/// An empty buffer on loan from a [`ScratchPool`].
pub struct Pooled<'a, T> {
    pool: &'a ScratchPool<T>,
    buffer: Vec<T>,
}

impl<T> Deref for Pooled<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.buffer
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.buffer
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.restore(std::mem::take(&mut self.buffer));
    }
}

//! Growable double-ended buffer
//!
//! [`GrowableBuffer`] is the sequence container behind instruction streams.
//! It reads like an immutable value (every mutating call consumes `self` and
//! hands back a buffer) but builds in place on the hot linear path:
//!
//! - The live window `(start, len)` sits inside a larger backing allocation,
//!   with headroom on both sides of a configurable split point, so both
//!   `append` and `prepend` are amortized O(1).
//! - Backing storage is reference counted. A buffer that owns its backing
//!   alone writes in place; a buffer whose backing is shared with a clone
//!   (a second branch built from the same point) copies the backing first.
//!   Branches therefore never observe each other's writes.
//! - Running out of room on either side doubles the capacity (repeatedly, if
//!   needed) and moves the live window across.
//!
//! # Example
//!
//! ```rust
//! use stackparsec::engine::buffer::GrowableBuffer;
//!
//! let base = GrowableBuffer::<u8>::new().append(1).append(2);
//! let left = base.clone().append(3);
//! let right = base.prepend(0);
//!
//! assert_eq!(left.as_slice(), &[1, 2, 3]);
//! assert_eq!(right.as_slice(), &[0, 1, 2]);
//! ```

use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;

/// Default backing capacity allocated on first write
pub const DEFAULT_CAPACITY: usize = 32;

/// Errors raised when constructing a buffer over invalid backing memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The supplied backing allocation has no room at all
    ZeroCapacity,
    /// The split point lies outside the backing allocation
    SplitOutOfRange {
        /// Requested split point
        split: usize,
        /// Capacity of the backing allocation
        capacity: usize,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::ZeroCapacity => write!(f, "buffer backing must not be empty"),
            BufferError::SplitOutOfRange { split, capacity } => write!(
                f,
                "split point {} exceeds backing capacity {}",
                split, capacity
            ),
        }
    }
}

impl std::error::Error for BufferError {}

/// A persistent-feeling growable sequence with front and back headroom
pub struct GrowableBuffer<T> {
    /// Shared backing storage, allocated lazily on first write
    backing: Option<Arc<Vec<T>>>,
    /// Index of the first live element in the backing
    start: usize,
    /// Number of live elements
    len: usize,
    /// Capacity to allocate when the backing is created lazily
    initial_capacity: usize,
}

impl<T> Clone for GrowableBuffer<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            backing: self.backing.clone(),
            start: self.start,
            len: self.len,
            initial_capacity: self.initial_capacity,
        }
    }
}

impl<T: Copy + Default> Default for GrowableBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default> GrowableBuffer<T> {
    /// Create an empty buffer; nothing is allocated until the first write
    #[inline]
    pub fn new() -> Self {
        Self {
            backing: None,
            start: 0,
            len: 0,
            initial_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Allocate a buffer of at least `initial_capacity`, split at the midpoint
    ///
    /// A zero capacity falls back to lazy allocation of [`DEFAULT_CAPACITY`].
    pub fn empty(initial_capacity: usize) -> Self {
        if initial_capacity == 0 {
            return Self::new();
        }
        let capacity = initial_capacity.next_power_of_two();
        Self {
            backing: Some(Arc::new(vec![T::default(); capacity])),
            start: capacity / 2,
            len: 0,
            initial_capacity: capacity,
        }
    }

    /// Allocate a buffer with an explicit split point
    ///
    /// `split` elements of headroom go to the front, the rest to the back.
    pub fn with_split(capacity: usize, split: usize) -> Result<Self, BufferError> {
        Self::from_backing(vec![T::default(); capacity], split)
    }

    /// Build an empty buffer over caller-supplied backing memory
    ///
    /// The contents of `backing` are treated as free space.
    pub fn from_backing(backing: Vec<T>, split: usize) -> Result<Self, BufferError> {
        let capacity = backing.len();
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        if split > capacity {
            return Err(BufferError::SplitOutOfRange { split, capacity });
        }
        Ok(Self {
            backing: Some(Arc::new(backing)),
            start: split,
            len: 0,
            initial_capacity: capacity,
        })
    }

    /// Copy a slice into a fresh buffer, leaving headroom at both ends
    pub fn from_slice(values: &[T]) -> Self {
        Self::new().extend_from_slice(values)
    }

    /// Number of live elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity of the backing allocation (0 before the first write)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.backing.as_ref().map_or(0, |b| b.len())
    }

    /// Free slots in front of the live window
    #[inline]
    pub fn front_headroom(&self) -> usize {
        self.start
    }

    /// Free slots behind the live window
    #[inline]
    pub fn back_headroom(&self) -> usize {
        self.capacity().saturating_sub(self.start + self.len)
    }

    /// The live elements
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match &self.backing {
            Some(backing) => &backing[self.start..self.start + self.len],
            None => &[],
        }
    }

    /// A zero-copy view of part of the live window
    ///
    /// # Panics
    /// Panics if the range falls outside the live window, like slice indexing.
    #[inline]
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> &[T] {
        let live = self.as_slice();
        let bounds = (range.start_bound().cloned(), range.end_bound().cloned());
        &live[bounds]
    }

    /// Add one element at the back
    #[inline]
    pub fn append(self, value: T) -> Self {
        self.extend_from_slice(std::slice::from_ref(&value))
    }

    /// Add one element at the front
    #[inline]
    pub fn prepend(self, value: T) -> Self {
        self.prepend_slice(std::slice::from_ref(&value))
    }

    /// Add a run of elements at the back, preserving their order
    pub fn extend_from_slice(mut self, values: &[T]) -> Self {
        if values.is_empty() {
            return self;
        }
        self.reserve_back(values.len());
        let at = self.start + self.len;
        let backing = self.backing_mut();
        backing[at..at + values.len()].copy_from_slice(values);
        self.len += values.len();
        self
    }

    /// Add a run of elements at the front, preserving their order
    pub fn prepend_slice(mut self, values: &[T]) -> Self {
        if values.is_empty() {
            return self;
        }
        self.reserve_front(values.len());
        let at = self.start - values.len();
        let backing = self.backing_mut();
        backing[at..at + values.len()].copy_from_slice(values);
        self.start = at;
        self.len += values.len();
        self
    }

    /// Mutable access to the backing, copying it if another buffer shares it
    #[inline]
    fn backing_mut(&mut self) -> &mut Vec<T> {
        let backing = self
            .backing
            .get_or_insert_with(|| Arc::new(Vec::new()));
        Arc::make_mut(backing)
    }

    fn reserve_back(&mut self, extra: usize) {
        if self.backing.is_none() {
            let capacity = self.initial_capacity.max(extra * 2).next_power_of_two();
            self.backing = Some(Arc::new(vec![T::default(); capacity]));
            self.start = capacity / 2;
            if self.start + extra > capacity {
                self.start = 0;
            }
        }
        let capacity = self.capacity();
        let needed = self.start + self.len + extra;
        if needed <= capacity {
            return;
        }
        let mut new_capacity = capacity.max(1);
        while self.start + self.len + extra > new_capacity {
            new_capacity *= 2;
        }
        self.relocate(new_capacity, self.start);
    }

    fn reserve_front(&mut self, extra: usize) {
        if self.backing.is_none() {
            let capacity = self.initial_capacity.max(extra * 2).next_power_of_two();
            self.backing = Some(Arc::new(vec![T::default(); capacity]));
            self.start = capacity / 2;
            if self.start < extra {
                self.start = capacity;
            }
        }
        if self.start >= extra {
            return;
        }
        let capacity = self.capacity();
        let mut new_capacity = capacity.max(1);
        while self.start + (new_capacity - capacity) < extra {
            new_capacity *= 2;
        }
        let new_start = self.start + (new_capacity - capacity);
        self.relocate(new_capacity, new_start);
    }

    /// Move the live window into a fresh allocation of `capacity` at `start`
    fn relocate(&mut self, capacity: usize, start: usize) {
        let mut fresh = vec![T::default(); capacity];
        fresh[start..start + self.len].copy_from_slice(self.as_slice());
        self.backing = Some(Arc::new(fresh));
        self.start = start;
    }
}

impl<T: Copy + Default + fmt::Debug> fmt::Debug for GrowableBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowableBuffer")
            .field("items", &self.as_slice())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T: Copy + Default + PartialEq> PartialEq for GrowableBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Copy + Default + Eq> Eq for GrowableBuffer<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_allocation() {
        let buffer = GrowableBuffer::<u8>::new();
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.is_empty());

        let buffer = buffer.append(7);
        assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);
        assert_eq!(buffer.as_slice(), &[7]);
    }

    #[test]
    fn test_append_and_prepend_keep_order() {
        let buffer = GrowableBuffer::<u8>::empty(8)
            .append(3)
            .append(4)
            .prepend(2)
            .prepend(1);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_slices_keep_order() {
        let buffer = GrowableBuffer::<u8>::new()
            .extend_from_slice(&[4, 5])
            .prepend_slice(&[1, 2, 3]);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(buffer.slice(1..3), &[2, 3]);
        assert_eq!(buffer.slice(3..), &[4, 5]);
    }

    #[test]
    fn test_back_growth_doubles() {
        let mut buffer = GrowableBuffer::<u32>::empty(4);
        for i in 0..100 {
            buffer = buffer.append(i);
        }
        assert_eq!(buffer.len(), 100);
        assert!(buffer.capacity().is_power_of_two());
        assert_eq!(buffer.as_slice()[99], 99);
    }

    #[test]
    fn test_front_growth_doubles() {
        let mut buffer = GrowableBuffer::<u32>::empty(4);
        for i in 0..100 {
            buffer = buffer.prepend(i);
        }
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.as_slice()[0], 99);
        assert_eq!(buffer.as_slice()[99], 0);
    }

    #[test]
    fn test_branches_are_independent() {
        let base = GrowableBuffer::<u8>::empty(8).append(1).append(2);
        let left = base.clone().append(10);
        let right = base.clone().append(20);

        assert_eq!(left.as_slice(), &[1, 2, 10]);
        assert_eq!(right.as_slice(), &[1, 2, 20]);
        assert_eq!(base.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_unique_backing_is_written_in_place() {
        let buffer = GrowableBuffer::<u8>::empty(16).append(1);
        let before = buffer.backing.as_ref().map(|b| Arc::as_ptr(b));
        let buffer = buffer.append(2);
        let after = buffer.backing.as_ref().map(|b| Arc::as_ptr(b));
        assert_eq!(before, after);
    }

    #[test]
    fn test_caller_backing() {
        let buffer = GrowableBuffer::from_backing(vec![0u8; 4], 0).unwrap();
        assert_eq!(buffer.front_headroom(), 0);
        assert_eq!(buffer.back_headroom(), 4);

        let buffer = buffer.prepend(9);
        assert_eq!(buffer.as_slice(), &[9]);
        assert!(buffer.capacity() >= 8);
    }

    #[test]
    fn test_invalid_backing() {
        assert_eq!(
            GrowableBuffer::<u8>::from_backing(Vec::new(), 0).unwrap_err(),
            BufferError::ZeroCapacity
        );
        assert_eq!(
            GrowableBuffer::<u8>::with_split(4, 5).unwrap_err(),
            BufferError::SplitOutOfRange {
                split: 5,
                capacity: 4
            }
        );
    }
}

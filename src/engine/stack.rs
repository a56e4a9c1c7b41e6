//! Untyped value stack
//!
//! One contiguous byte region holds two structures growing towards each
//! other:
//!
//! ```text
//!  0                      top                 capacity - 4*len        capacity
//!  | payload | hdr | payload | hdr | ... free ... | entry n-1 | ... | entry 0 |
//!  '------- arena grows up ------->               <---- index table grows down
//! ```
//!
//! - **Inline slots** (`Copy` values: tokens, spans, positions, function
//!   pointers) store their raw bytes in the arena followed by an 8-byte header
//!   `(size: u32, tag: u32)`. The index entry holds the header offset.
//! - **Object slots** (closures, custom errors, nested programs, owned parse
//!   values) live in a side list of reference-counted `Any` values. The index
//!   entry holds the list index with [`OBJECT_FLAG`] set.
//!
//! The stack is strictly LIFO. Popping a slot whose bytes or object are not
//! the newest ones means the interpreter lost track of its layout, which is a
//! bug and panics rather than surfacing as a parse failure.
//!
//! Memory is either a caller-supplied scratch slice or a heap allocation.
//! Running out of room doubles the capacity on the heap, up to a hard limit.

use super::type_registry::type_tag;
use std::any::Any;
use std::fmt;
use std::mem::{size_of, MaybeUninit};
use std::ptr;
use std::sync::Arc;

/// A boxed value held in the object list
pub type Object = Arc<dyn Any + Send + Sync>;

/// Capacity allocated when a stack first needs heap memory
pub const DEFAULT_STACK_SIZE: usize = 64;

/// Hard cap on stack growth
pub const DEFAULT_MAX_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Marks an index entry as referring to the object list
pub const OBJECT_FLAG: u32 = 0x1000_0000;

const INDEX_MASK: u32 = OBJECT_FLAG - 1;
const ENTRY_SIZE: usize = 4;
const HEADER_SIZE: usize = 8;

/// Report a broken stack invariant
#[cold]
#[inline(never)]
pub(crate) fn corrupted(message: &str) -> ! {
    panic!("stack corrupted: {}", message)
}

/// Backing bytes of a stack
enum Memory<'s> {
    Borrowed(&'s mut [MaybeUninit<u8>]),
    Owned(Vec<MaybeUninit<u8>>),
}

impl Memory<'_> {
    #[inline]
    fn bytes(&self) -> &[MaybeUninit<u8>] {
        match self {
            Memory::Borrowed(bytes) => bytes,
            Memory::Owned(bytes) => bytes,
        }
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [MaybeUninit<u8>] {
        match self {
            Memory::Borrowed(bytes) => bytes,
            Memory::Owned(bytes) => bytes,
        }
    }
}

/// Decoded index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Inline { header: usize },
    Object { index: usize },
}

/// Type-erased LIFO stack of inline values and boxed objects
pub struct Stack<'s> {
    memory: Memory<'s>,
    /// Arena bytes in use
    top: usize,
    /// Number of slots (index entries)
    count: usize,
    objects: Vec<Object>,
    limit: usize,
}

impl Stack<'static> {
    /// Create an empty heap-backed stack; memory is allocated on first push
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a heap-backed stack with `capacity` bytes up front
    pub fn with_capacity(capacity: usize) -> Self {
        Stack {
            memory: Memory::Owned(vec![MaybeUninit::uninit(); capacity]),
            top: 0,
            count: 0,
            objects: Vec::new(),
            limit: DEFAULT_MAX_STACK_SIZE.max(capacity),
        }
    }
}

impl Default for Stack<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s> Stack<'s> {
    /// Create a stack over caller-supplied scratch memory
    ///
    /// The scratch is used until it runs out, after which the stack moves to
    /// the heap. An empty scratch slice simply means "allocate on first push".
    pub fn from_scratch(scratch: &'s mut [MaybeUninit<u8>]) -> Self {
        let limit = DEFAULT_MAX_STACK_SIZE.max(scratch.len());
        Stack {
            memory: Memory::Borrowed(scratch),
            top: 0,
            count: 0,
            objects: Vec::new(),
            limit,
        }
    }

    /// Set the capacity past which growth panics with a stack overflow
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(self.capacity());
        self
    }

    /// Number of slots
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the stack holds no slots
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Arena bytes in use
    #[inline]
    pub fn top(&self) -> usize {
        self.top
    }

    /// Index-table bytes in use
    #[inline]
    pub fn bottom(&self) -> usize {
        self.count * ENTRY_SIZE
    }

    /// Total bytes available before the next growth
    #[inline]
    pub fn capacity(&self) -> usize {
        self.memory.bytes().len()
    }

    /// Number of live boxed objects
    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Whether the stack still lives in caller-supplied scratch memory
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.memory, Memory::Borrowed(_))
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Push a `Copy` value inline
    pub fn push_value<A: Copy + 'static>(&mut self, value: A) {
        let size = size_of::<A>();
        self.reserve(size + HEADER_SIZE + ENTRY_SIZE);

        let at = self.top;
        let dst = self.memory.bytes_mut()[at..].as_mut_ptr() as *mut A;
        // SAFETY: `reserve` guarantees `size` writable bytes at `at`; the
        // write is unaligned-tolerant.
        unsafe { ptr::write_unaligned(dst, value) };

        let header = at + size;
        self.write_u32(header, size as u32);
        self.write_u32(header + 4, type_tag::<A>());
        self.top = header + HEADER_SIZE;
        self.push_entry(encode_inline(header));
    }

    /// Push a value into the object list
    #[inline]
    pub fn push_object<A: Any + Send + Sync>(&mut self, value: A) {
        self.push_shared(Arc::new(value));
    }

    /// Push an already-boxed object
    pub fn push_shared(&mut self, object: Object) {
        self.reserve(ENTRY_SIZE);
        let index = self.objects.len();
        self.objects.push(object);
        self.push_entry(encode_object(index));
    }

    /// Copy slot `index` of `other` onto this stack
    ///
    /// Inline bytes are copied verbatim; objects are shared, not cloned.
    pub fn read_from_and_push(&mut self, other: &Stack<'_>, index: usize) {
        match other.slot(index) {
            Slot::Object { index } => {
                let object = match other.objects.get(index) {
                    Some(object) => Arc::clone(object),
                    None => corrupted("object index past the object list"),
                };
                self.push_shared(object);
            }
            Slot::Inline { header } => {
                let size = other.read_u32(header) as usize;
                let total = size + HEADER_SIZE;
                self.reserve(total + ENTRY_SIZE);

                let at = self.top;
                let source = &other.memory.bytes()[header - size..header + HEADER_SIZE];
                self.memory.bytes_mut()[at..at + total].copy_from_slice(source);
                self.top = at + total;
                self.push_entry(encode_inline(at + size));
            }
        }
    }

    /// Concatenate `other` on top of this stack
    ///
    /// Every copied entry is re-pointed past this stack's arena bytes and
    /// object list.
    pub fn append(&mut self, other: &Stack<'_>) {
        self.reserve(other.top + other.bottom());

        let byte_base = self.top;
        let object_base = self.objects.len();
        self.memory.bytes_mut()[byte_base..byte_base + other.top]
            .copy_from_slice(&other.memory.bytes()[..other.top]);
        self.top += other.top;

        for i in 0..other.count {
            let entry = match other.slot(i) {
                Slot::Inline { header } => encode_inline(header + byte_base),
                Slot::Object { index } => encode_object(index + object_base),
            };
            self.push_entry(entry);
        }
        self.objects.extend(other.objects.iter().cloned());
    }

    // ========================================================================
    // Peek
    // ========================================================================

    /// Read the top slot as an inline `A`
    #[inline]
    pub fn peek<A: Copy + 'static>(&self) -> Option<A> {
        self.peek_at(0)
    }

    /// Read the slot `depth` places below the top as an inline `A`
    #[inline]
    pub fn peek_at<A: Copy + 'static>(&self, depth: usize) -> Option<A> {
        self.read_inline(self.depth_index(depth)?)
    }

    /// Read slot `index` (counted from the bottom) as an inline `A`
    #[inline]
    pub fn get<A: Copy + 'static>(&self, index: usize) -> Option<A> {
        if index >= self.count {
            return None;
        }
        self.read_inline(index)
    }

    /// Read the top slot as an `A` without popping it, cloning boxed values
    pub fn peek_cloned<A: Clone + 'static>(&self) -> Option<A> {
        let index = self.depth_index(0)?;
        match self.slot(index) {
            Slot::Inline { .. } => self.read_inline::<A>(index),
            Slot::Object { .. } => self.object::<A>(index).cloned(),
        }
    }

    /// Borrow the top slot as an object of type `A`
    #[inline]
    pub fn peek_object<A: Any>(&self) -> Option<&A> {
        self.object(self.depth_index(0)?)
    }

    /// Borrow slot `index` (counted from the bottom) as an object of type `A`
    pub fn object<A: Any>(&self, index: usize) -> Option<&A> {
        if index >= self.count {
            return None;
        }
        match self.slot(index) {
            Slot::Object { index } => {
                let object: &(dyn Any + Send + Sync) = &**self.objects.get(index)?;
                object.downcast_ref::<A>()
            }
            Slot::Inline { .. } => None,
        }
    }

    /// Whether the slot `depth` places below the top holds an `A`, inline or boxed
    pub fn holds<A: Any>(&self, depth: usize) -> bool {
        let Some(index) = self.depth_index(depth) else {
            return false;
        };
        match self.slot(index) {
            Slot::Inline { header } => {
                self.read_u32(header + 4) == type_tag::<A>()
                    && self.read_u32(header) as usize == size_of::<A>()
            }
            Slot::Object { index } => match self.objects.get(index) {
                Some(object) => {
                    let object: &(dyn Any + Send + Sync) = &**object;
                    object.is::<A>()
                }
                None => false,
            },
        }
    }

    /// Whether the slot `depth` places below the top is an object slot
    pub fn is_object(&self, depth: usize) -> bool {
        self.depth_index(depth)
            .map_or(false, |index| matches!(self.slot(index), Slot::Object { .. }))
    }

    // ========================================================================
    // Pop
    // ========================================================================

    /// Remove the top slot
    ///
    /// # Panics
    /// Panics if the stack is empty or its top slot is not the newest arena
    /// payload / object.
    pub fn pop(&mut self) {
        let Some(index) = self.count.checked_sub(1) else {
            corrupted("pop on an empty stack")
        };
        match self.slot(index) {
            Slot::Object { index } => {
                if index + 1 != self.objects.len() {
                    corrupted("popped object is not the newest object");
                }
                self.objects.pop();
            }
            Slot::Inline { header } => {
                if header + HEADER_SIZE != self.top {
                    corrupted("popped slot is not the newest arena payload");
                }
                self.top = header - self.read_u32(header) as usize;
            }
        }
        self.count = index;
    }

    /// Remove the top `n` slots
    #[inline]
    pub fn pop_n(&mut self, n: usize) {
        for _ in 0..n {
            self.pop();
        }
    }

    /// Pop the top slot as an inline `A`; leaves the stack untouched on mismatch
    #[inline]
    pub fn pop_value<A: Copy + 'static>(&mut self) -> Option<A> {
        let value = self.peek::<A>()?;
        self.pop();
        Some(value)
    }

    /// Pop the top slot as an `A`, whether it was pushed inline or boxed
    ///
    /// Boxed values are moved out when this stack holds the only reference
    /// and cloned otherwise (constants copied in with
    /// [`read_from_and_push`](Self::read_from_and_push) stay shared).
    pub fn take<A: Clone + Send + Sync + 'static>(&mut self) -> Option<A> {
        let index = self.count.checked_sub(1)?;
        match self.slot(index) {
            Slot::Inline { .. } => {
                let value = self.read_inline::<A>(index)?;
                self.pop();
                Some(value)
            }
            Slot::Object { .. } => {
                let shared = self.take_shared::<A>()?;
                Some(Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone()))
            }
        }
    }

    /// Pop the top object slot as a shared `A` without cloning it
    pub fn take_shared<A: Any + Send + Sync>(&mut self) -> Option<Arc<A>> {
        if !self.is_object(0) || !self.holds::<A>(0) {
            return None;
        }
        let object = match self.objects.last() {
            Some(object) => Arc::clone(object),
            None => corrupted("object slot without an object"),
        };
        self.pop();
        object.downcast::<A>().ok()
    }

    /// Remove `drop` slots lying directly beneath the top `keep` slots
    ///
    /// The kept slots slide down: their arena bytes move over the freed
    /// region and their entries are re-pointed.
    pub fn drop_under(&mut self, keep: usize, drop: usize) {
        if drop == 0 {
            return;
        }
        if keep + drop > self.count {
            corrupted("drop_under past the bottom of the stack");
        }

        let first_kept = self.count - keep;
        let first_dropped = first_kept - drop;
        let (byte_lo, object_lo) = self.marks_below(first_dropped);
        let (byte_mid, object_mid) = self.marks_below(first_kept);
        let byte_shift = byte_mid - byte_lo;
        let object_shift = object_mid - object_lo;

        if byte_shift > 0 {
            let top = self.top;
            self.memory.bytes_mut().copy_within(byte_mid..top, byte_lo);
            self.top -= byte_shift;
        }
        if object_shift > 0 {
            self.objects.drain(object_lo..object_mid);
        }

        for i in first_kept..self.count {
            let entry = match self.slot(i) {
                Slot::Inline { header } => encode_inline(header - byte_shift),
                Slot::Object { index } => encode_object(index - object_shift),
            };
            self.write_entry(i - drop, entry);
        }
        self.count -= drop;
    }

    // ========================================================================
    // Internals
    // ========================================================================

    #[inline]
    fn depth_index(&self, depth: usize) -> Option<usize> {
        self.count.checked_sub(depth + 1)
    }

    #[inline]
    fn entry_offset(&self, index: usize) -> usize {
        self.capacity() - (index + 1) * ENTRY_SIZE
    }

    #[inline]
    fn slot(&self, index: usize) -> Slot {
        if index >= self.count {
            corrupted("slot index past the top of the stack");
        }
        let entry = self.read_u32(self.entry_offset(index));
        if entry & OBJECT_FLAG != 0 {
            Slot::Object {
                index: (entry & INDEX_MASK) as usize,
            }
        } else {
            Slot::Inline {
                header: entry as usize,
            }
        }
    }

    #[inline]
    fn write_entry(&mut self, index: usize, entry: u32) {
        let at = self.entry_offset(index);
        self.write_u32(at, entry);
    }

    /// Append an index entry; space must already be reserved
    #[inline]
    fn push_entry(&mut self, entry: u32) {
        self.write_entry(self.count, entry);
        self.count += 1;
    }

    /// Arena length and object count of the stack cut down to `len` slots
    fn marks_below(&self, len: usize) -> (usize, usize) {
        let mut bytes = None;
        let mut objects = None;
        for i in (0..len).rev() {
            match self.slot(i) {
                Slot::Inline { header } if bytes.is_none() => bytes = Some(header + HEADER_SIZE),
                Slot::Object { index } if objects.is_none() => objects = Some(index + 1),
                _ => {}
            }
            if bytes.is_some() && objects.is_some() {
                break;
            }
        }
        (bytes.unwrap_or(0), objects.unwrap_or(0))
    }

    fn read_inline<A: 'static>(&self, index: usize) -> Option<A> {
        let Slot::Inline { header } = self.slot(index) else {
            return None;
        };
        let size = self.read_u32(header) as usize;
        if self.read_u32(header + 4) != type_tag::<A>() || size != size_of::<A>() {
            return None;
        }
        let src = self.memory.bytes()[header - size..].as_ptr() as *const A;
        // SAFETY: the tag identifies `A`, and only `push_value::<A>` (which
        // requires `A: Copy`) writes it, so these bytes are a valid `A`.
        Some(unsafe { ptr::read_unaligned(src) })
    }

    #[inline]
    fn read_u32(&self, at: usize) -> u32 {
        let mut out = [0u8; 4];
        for (byte, slot) in out.iter_mut().zip(&self.memory.bytes()[at..at + 4]) {
            // SAFETY: headers and entries are always written before being read.
            *byte = unsafe { slot.assume_init() };
        }
        u32::from_le_bytes(out)
    }

    #[inline]
    fn write_u32(&mut self, at: usize, value: u32) {
        for (slot, byte) in self.memory.bytes_mut()[at..at + 4]
            .iter_mut()
            .zip(value.to_le_bytes())
        {
            *slot = MaybeUninit::new(byte);
        }
    }

    #[inline]
    fn reserve(&mut self, extra: usize) {
        let needed = self.top + self.bottom() + extra;
        if needed > self.capacity() {
            self.grow(needed);
        }
    }

    fn grow(&mut self, needed: usize) {
        let capacity = self.capacity();
        let mut new_capacity = capacity.max(DEFAULT_STACK_SIZE);
        while new_capacity < needed {
            new_capacity *= 2;
        }
        if new_capacity > self.limit {
            if needed > self.limit {
                panic!(
                    "stack overflow: {} bytes needed, limit is {} bytes",
                    needed, self.limit
                );
            }
            new_capacity = self.limit;
        }

        let table = self.bottom();
        let mut fresh = vec![MaybeUninit::uninit(); new_capacity];
        fresh[..self.top].copy_from_slice(&self.memory.bytes()[..self.top]);
        fresh[new_capacity - table..].copy_from_slice(&self.memory.bytes()[capacity - table..]);
        self.memory = Memory::Owned(fresh);
    }
}

#[inline]
fn encode_inline(header: usize) -> u32 {
    if header > INDEX_MASK as usize {
        panic!("stack overflow: arena offset {} out of range", header);
    }
    header as u32
}

#[inline]
fn encode_object(index: usize) -> u32 {
    if index > INDEX_MASK as usize {
        panic!("stack overflow: object index {} out of range", index);
    }
    OBJECT_FLAG | index as u32
}

impl Clone for Stack<'_> {
    fn clone(&self) -> Self {
        Stack {
            memory: Memory::Owned(self.memory.bytes().to_vec()),
            top: self.top,
            count: self.count,
            objects: self.objects.clone(),
            limit: self.limit,
        }
    }
}

impl fmt::Debug for Stack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("len", &self.count)
            .field("top", &self.top)
            .field("bottom", &self.bottom())
            .field("objects", &self.objects.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_inline_round_trip() {
        let mut stack = Stack::new();
        stack.push_value(42u8);
        stack.push_value(Point { x: 1, y: -2 });
        stack.push_value('z');

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop_value::<char>(), Some('z'));
        assert_eq!(stack.pop_value::<Point>(), Some(Point { x: 1, y: -2 }));
        assert_eq!(stack.pop_value::<u8>(), Some(42));
        assert!(stack.is_empty());
        assert_eq!(stack.top(), 0);
    }

    #[test]
    fn test_type_mismatch_is_soft() {
        let mut stack = Stack::new();
        stack.push_value(7u32);
        assert_eq!(stack.peek::<i32>(), None);
        assert_eq!(stack.pop_value::<i32>(), None);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.peek::<u32>(), Some(7));
    }

    #[test]
    fn test_objects_interleave_with_inline() {
        let mut stack = Stack::new();
        stack.push_value(1u16);
        stack.push_object(String::from("boxed"));
        stack.push_value(2u16);

        assert!(stack.is_object(1));
        assert!(!stack.is_object(0));
        assert_eq!(stack.peek_cloned::<u16>(), Some(2));
        assert_eq!(stack.pop_value::<u16>(), Some(2));
        assert_eq!(stack.peek_object::<String>().map(String::as_str), Some("boxed"));
        assert_eq!(stack.peek_cloned::<String>(), Some(String::from("boxed")));
        assert_eq!(stack.take::<String>(), Some(String::from("boxed")));
        assert_eq!(stack.take::<u16>(), Some(1));
        assert_eq!(stack.object_count(), 0);
    }

    #[test]
    fn test_zero_sized_values() {
        let mut stack = Stack::new();
        stack.push_value(());
        stack.push_value(());
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.top(), 2 * HEADER_SIZE);
        assert_eq!(stack.pop_value::<()>(), Some(()));
        assert_eq!(stack.pop_value::<()>(), Some(()));
    }

    #[test]
    fn test_grows_out_of_scratch() {
        let mut scratch = [MaybeUninit::<u8>::uninit(); 32];
        let mut stack = Stack::from_scratch(&mut scratch);
        assert!(stack.is_borrowed());

        for i in 0..50u64 {
            stack.push_value(i);
        }
        assert!(!stack.is_borrowed());
        for i in (0..50u64).rev() {
            assert_eq!(stack.pop_value::<u64>(), Some(i));
        }
    }

    #[test]
    fn test_empty_scratch_allocates_lazily() {
        let mut scratch: [MaybeUninit<u8>; 0] = [];
        let mut stack = Stack::from_scratch(&mut scratch);
        assert_eq!(stack.capacity(), 0);
        stack.push_value(3i64);
        assert!(stack.capacity() >= DEFAULT_STACK_SIZE);
    }

    #[test]
    #[should_panic(expected = "stack overflow")]
    fn test_overflow_past_limit_panics() {
        let mut stack = Stack::new().with_limit(128);
        for i in 0..100u64 {
            stack.push_value(i);
        }
    }

    #[test]
    #[should_panic(expected = "stack corrupted")]
    fn test_pop_empty_panics() {
        Stack::new().pop();
    }

    #[test]
    fn test_read_from_and_push() {
        let mut constants = Stack::new();
        constants.push_value('a');
        constants.push_object(vec![1u8, 2, 3]);

        let mut live = Stack::new();
        live.push_value(9u32);
        live.read_from_and_push(&constants, 1);
        live.read_from_and_push(&constants, 0);

        assert_eq!(live.pop_value::<char>(), Some('a'));
        assert_eq!(live.take::<Vec<u8>>(), Some(vec![1, 2, 3]));
        assert_eq!(live.pop_value::<u32>(), Some(9));
        // The constant pool is untouched.
        assert_eq!(constants.get::<char>(0), Some('a'));
        assert_eq!(constants.object::<Vec<u8>>(1), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn test_append_repoints_entries() {
        let mut first = Stack::new();
        first.push_value(10u32);
        first.push_object(String::from("one"));

        let mut second = Stack::new();
        second.push_object(String::from("two"));
        second.push_value(20u32);

        first.append(&second);
        assert_eq!(first.len(), 4);
        assert_eq!(first.get::<u32>(0), Some(10));
        assert_eq!(first.object::<String>(1).map(String::as_str), Some("one"));
        assert_eq!(first.object::<String>(2).map(String::as_str), Some("two"));
        assert_eq!(first.get::<u32>(3), Some(20));

        assert_eq!(first.pop_value::<u32>(), Some(20));
        assert_eq!(first.take::<String>(), Some(String::from("two")));
        assert_eq!(first.take::<String>(), Some(String::from("one")));
        assert_eq!(first.pop_value::<u32>(), Some(10));
    }

    #[test]
    fn test_drop_under() {
        let mut stack = Stack::new();
        stack.push_value(1u8);
        stack.push_object(String::from("gone"));
        stack.push_value(2u64);
        stack.push_object(String::from("kept"));
        stack.push_value(3u16);

        stack.drop_under(2, 2);
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.object_count(), 1);
        assert_eq!(stack.pop_value::<u16>(), Some(3));
        assert_eq!(stack.take::<String>(), Some(String::from("kept")));
        assert_eq!(stack.pop_value::<u8>(), Some(1));
        assert!(stack.is_empty());
        assert_eq!(stack.top(), 0);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut stack = Stack::new();
        stack.push_value(5i32);
        let mut copy = stack.clone();
        copy.push_value(6i32);

        assert_eq!(stack.len(), 1);
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.pop_value::<i32>(), Some(6));
        assert_eq!(copy.pop_value::<i32>(), Some(5));
        assert_eq!(stack.peek::<i32>(), Some(5));
    }

    #[test]
    fn test_shared_take_clones() {
        let mut constants = Stack::new();
        constants.push_object(vec![String::from("x")]);

        let mut live = Stack::new();
        live.read_from_and_push(&constants, 0);
        let taken = live.take::<Vec<String>>();
        assert_eq!(taken, Some(vec![String::from("x")]));
        assert!(constants.object::<Vec<String>>(0).is_some());
    }
}

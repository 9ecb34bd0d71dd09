use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::ptr::NonNull;
use std::{fmt, mem, slice};

use crate::{Region, RegionWriter, UncheckedWriter};

/// The sole owner of one heap-allocated byte buffer.
///
/// The buffer is allocated when the block is created and released when the block is dropped.
/// Blocks cannot be cloned - there is only ever one owner of a given buffer, which makes a
/// double free impossible. Ownership moves with the block itself. Use [`take()`](Self::take)
/// to move the buffer out of a block that you can only reach by exclusive reference, which
/// leaves the empty block behind.
///
/// Moving a block never moves its bytes. A [`Region`] obtained from a block stays valid for
/// as long as the buffer is owned by some block, wherever that block is moved to.
///
/// # Example
///
/// ```rust
/// use staging_pool::OwnedBlock;
///
/// let mut block = OwnedBlock::new(64);
/// let region = block.region();
///
/// let moved = block.take();
/// assert!(block.is_empty());
///
/// // The region still describes the same bytes, now owned by `moved`.
/// assert_eq!(moved.region(), region);
/// ```
pub struct OwnedBlock {
    /// Dangling if the block is empty.
    ptr: NonNull<u8>,

    /// Zero if the block is empty.
    size: usize,
}

impl OwnedBlock {
    /// Allocates a zero-initialized buffer of `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or too large to be allocated as a single buffer.
    ///
    /// Allocation failure is not handled - the process is aborted via
    /// [`handle_alloc_error`].
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size != 0, "OwnedBlock must have non-zero size");

        let layout = Self::layout(size);

        // SAFETY: The layout has non-zero size, as asserted above.
        let ptr = unsafe { alloc_zeroed(layout) };

        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };

        Self { ptr, size }
    }

    /// Creates the empty block, which owns no buffer.
    #[must_use]
    #[inline]
    pub const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            size: 0,
        }
    }

    fn layout(size: usize) -> Layout {
        Layout::array::<u8>(size).expect("block size exceeds the maximum allocation size")
    }

    /// Moves the buffer out of this block into a new block, leaving this block empty.
    #[must_use]
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// The size of the owned buffer in bytes. Zero for the empty block.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the block owns no buffer.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// A pointer to the start of the owned buffer. Dangling for the empty block.
    #[must_use]
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// A non-owning view over the full extent of the owned buffer.
    ///
    /// The empty block yields an empty region.
    #[must_use]
    #[inline]
    pub fn region(&self) -> Region {
        Region::from_start_and_size(self.ptr, self.size)
    }

    /// The contents of the owned buffer.
    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: We own the buffer, it was zero-initialized on allocation and the shared borrow
        // of `self` prevents safe code from writing to it for the lifetime of the slice.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    /// The contents of the owned buffer, for modification.
    #[must_use]
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: We own the buffer, it was zero-initialized on allocation and the exclusive
        // borrow of `self` prevents any other safe access for the lifetime of the slice.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }

    /// A bounds-checked writer over the full extent of the owned buffer.
    #[must_use]
    #[inline]
    pub fn writer(&mut self) -> RegionWriter<'_> {
        RegionWriter::new(self.as_bytes_mut())
    }

    /// A writer over the owned buffer that performs no bounds checking.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that all writes through the returned writer stay within the
    /// first [`size()`](Self::size) bytes of the buffer, that the block outlives the writer
    /// and that no reference to the buffer contents exists while writing.
    #[must_use]
    #[inline]
    pub unsafe fn unchecked_writer(&self) -> UncheckedWriter {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe { UncheckedWriter::new(self.ptr) }
    }
}

impl Default for OwnedBlock {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for OwnedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedBlock")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .finish()
    }
}

impl Drop for OwnedBlock {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }

        // SAFETY: A non-empty block owns a buffer allocated in `new()` with this same layout,
        // and ownership is never shared, so this is the only deallocation of that buffer.
        unsafe {
            dealloc(self.ptr.as_ptr(), Self::layout(self.size));
        }
    }
}

// SAFETY: The block exclusively owns its buffer and does not rely on any thread-local state,
// so it can be moved to another thread just like a `Box<[u8]>`.
unsafe impl Send for OwnedBlock {}

// SAFETY: Shared access only exposes `&[u8]`, which is safe to share between threads.
unsafe impl Sync for OwnedBlock {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(OwnedBlock: Send, Sync, Default, fmt::Debug);
    assert_not_impl_any!(OwnedBlock: Clone, Copy);

    #[test]
    fn new_allocates_zeroed_buffer() {
        let block = OwnedBlock::new(32);

        assert_eq!(block.size(), 32);
        assert!(!block.is_empty());
        assert!(block.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    #[should_panic]
    fn zero_size_panics() {
        let _block = OwnedBlock::new(0);
    }

    #[test]
    fn region_covers_whole_buffer() {
        let block = OwnedBlock::new(100);
        let region = block.region();

        assert_eq!(region.start(), block.as_ptr());
        assert_eq!(region.size(), 100);

        // Idempotent.
        assert_eq!(block.region(), region);
    }

    #[test]
    fn take_leaves_empty_block() {
        let mut block = OwnedBlock::new(16);
        let original = block.region();

        let taken = block.take();

        assert!(block.is_empty());
        assert_eq!(block.size(), 0);
        assert!(block.region().is_empty());

        assert_eq!(taken.region(), original);
        assert_eq!(taken.size(), 16);
    }

    #[test]
    fn move_keeps_bytes_in_place() {
        let mut block = OwnedBlock::new(8);
        block.as_bytes_mut().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let region = block.region();

        let mut blocks = vec![block];

        // Force the Vec to relocate its records.
        for _ in 0..64 {
            blocks.push(OwnedBlock::new(1));
        }

        assert_eq!(blocks[0].region(), region);
        assert_eq!(unsafe { region.as_bytes() }, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn empty_block_drops_without_freeing() {
        let block = OwnedBlock::empty();

        assert!(block.is_empty());
        assert!(block.as_bytes().is_empty());
        drop(block);

        let defaulted = OwnedBlock::default();
        assert!(defaulted.is_empty());
    }

    #[test]
    fn writer_fills_buffer() {
        let mut block = OwnedBlock::new(4);

        let mut writer = block.writer();
        assert!(writer.write_bytes(&[4, 3, 2, 1]));
        assert!(!writer.write_bytes(&[0]));

        assert_eq!(block.as_bytes(), &[4, 3, 2, 1]);
    }

    #[test]
    fn unchecked_writer_starts_at_buffer() {
        let block = OwnedBlock::new(4);

        let writer = unsafe { block.unchecked_writer() };
        assert_eq!(writer.as_ptr(), block.as_ptr());
    }

    #[test]
    fn mem_replace_drops_previous_buffer_once() {
        let mut block = OwnedBlock::new(8);
        let replacement = OwnedBlock::new(16);

        // The previous buffer is dropped here and must be freed exactly once.
        drop(mem::replace(&mut block, replacement));

        assert_eq!(block.size(), 16);
    }
}

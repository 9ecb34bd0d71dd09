use std::iter;
use std::num::NonZero;

use tracing::debug;

use crate::{OwnedBlock, Region};

/// Creates equally sized [`OwnedBlock`]s in batches and keeps every one of them alive.
///
/// The allocator hands out [`Region`] views of the blocks it creates but never gives up
/// ownership of the blocks themselves. Blocks are only freed when the allocator is dropped,
/// so its memory footprint only ever grows.
///
/// # Out of band access
///
/// The allocator does not create or keep references to the block contents, so it is valid to
/// access the memory via the issued regions from unsafe code even when not holding any
/// reference to the allocator, as long as the allocator is alive.
///
/// # Example
///
/// ```rust
/// use std::num::NonZero;
///
/// use staging_pool::BulkAllocator;
///
/// let mut allocator = BulkAllocator::new();
/// let mut regions = Vec::new();
///
/// allocator.alloc_blocks(
///     NonZero::new(128).unwrap(),
///     NonZero::new(3).unwrap(),
///     &mut regions,
/// );
///
/// assert_eq!(regions.len(), 3);
/// assert_eq!(allocator.block_count(), 3);
/// assert_eq!(allocator.total_bytes(), 3 * 128);
/// ```
#[derive(Debug, Default)]
pub struct BulkAllocator {
    /// Growing this Vec moves the `OwnedBlock` records but not the buffers they own,
    /// so previously issued regions stay valid.
    blocks: Vec<OwnedBlock>,

    /// Sum of the sizes of all blocks. We track this to avoid summing on every query.
    total_bytes: usize,
}

impl BulkAllocator {
    /// Creates an allocator that does not own any blocks yet.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `amount` new blocks of `block_size` bytes each and appends their regions, in
    /// creation order, to `destination`.
    ///
    /// The allocator retains ownership of the new blocks for as long as it exists.
    ///
    /// # Panics
    ///
    /// Panics if the total size of all blocks would exceed the size of virtual memory.
    ///
    /// Allocation failure is not handled - the process is aborted.
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    pub fn alloc_blocks<D>(
        &mut self,
        block_size: NonZero<usize>,
        amount: NonZero<usize>,
        destination: &mut D,
    ) where
        D: Extend<Region> + ?Sized,
    {
        let added_bytes = block_size
            .get()
            .checked_mul(amount.get())
            .expect("requested capacity exceeds size of virtual memory");

        self.total_bytes = self
            .total_bytes
            .checked_add(added_bytes)
            .expect("requested capacity exceeds size of virtual memory");

        let first_new = self.blocks.len();

        self.blocks.reserve(amount.get());
        self.blocks.extend(
            iter::repeat_with(|| OwnedBlock::new(block_size.get())).take(amount.get()),
        );

        #[expect(
            clippy::indexing_slicing,
            reason = "we just pushed the blocks starting at this index"
        )]
        let new_blocks = &self.blocks[first_new..];

        destination.extend(new_blocks.iter().map(OwnedBlock::region));

        debug!(
            block_size = block_size.get(),
            amount = amount.get(),
            block_count = self.blocks.len(),
            total_bytes = self.total_bytes,
            "allocated blocks"
        );
    }

    /// The number of blocks created by this allocator.
    #[must_use]
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The total number of bytes held by this allocator.
    #[must_use]
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::collections::VecDeque;

    use new_zealand::nz;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(BulkAllocator: Send, Default, std::fmt::Debug);
    assert_not_impl_any!(BulkAllocator: Clone);

    #[test]
    fn new_allocator_is_empty() {
        let allocator = BulkAllocator::new();

        assert_eq!(allocator.block_count(), 0);
        assert_eq!(allocator.total_bytes(), 0);
    }

    #[test]
    fn alloc_blocks_appends_regions_of_requested_size() {
        let mut allocator = BulkAllocator::new();
        let mut regions = Vec::new();

        allocator.alloc_blocks(nz!(32), nz!(4), &mut regions);

        assert_eq!(regions.len(), 4);
        assert!(regions.iter().all(|r| r.size() == 32));
        assert_eq!(allocator.block_count(), 4);
        assert_eq!(allocator.total_bytes(), 128);
    }

    #[test]
    fn regions_are_distinct() {
        let mut allocator = BulkAllocator::new();
        let mut regions = Vec::new();

        allocator.alloc_blocks(nz!(8), nz!(16), &mut regions);

        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                assert_ne!(a.start(), b.start());
            }
        }
    }

    #[test]
    fn existing_destination_contents_are_kept() {
        let mut allocator = BulkAllocator::new();
        let mut regions = vec![Region::default()];

        allocator.alloc_blocks(nz!(8), nz!(2), &mut regions);

        assert_eq!(regions.len(), 3);
        assert!(regions[0].is_empty());
        assert_eq!(regions[1].size(), 8);
    }

    #[test]
    fn any_extendable_destination_works() {
        let mut allocator = BulkAllocator::new();
        let mut regions = VecDeque::new();

        allocator.alloc_blocks(nz!(8), nz!(3), &mut regions);

        assert_eq!(regions.len(), 3);
    }

    #[test]
    fn growth_keeps_earlier_regions_valid() {
        let mut allocator = BulkAllocator::new();
        let mut regions = Vec::new();

        allocator.alloc_blocks(nz!(4), nz!(1), &mut regions);
        let mut first = regions[0];
        unsafe { first.as_bytes_mut() }.copy_from_slice(&[9, 8, 7, 6]);

        // Enough growth to force the internal Vec to reallocate several times.
        for _ in 0..10 {
            allocator.alloc_blocks(nz!(4), nz!(7), &mut regions);
        }

        assert_eq!(allocator.block_count(), 71);
        assert_eq!(regions[0], first);
        assert_eq!(unsafe { first.as_bytes() }, &[9, 8, 7, 6]);
    }

    #[test]
    fn blocks_of_different_sizes_can_coexist() {
        let mut allocator = BulkAllocator::new();
        let mut small = Vec::new();
        let mut large = Vec::new();

        allocator.alloc_blocks(nz!(8), nz!(2), &mut small);
        allocator.alloc_blocks(nz!(256), nz!(1), &mut large);

        assert_eq!(allocator.total_bytes(), 2 * 8 + 256);
        assert_eq!(large[0].size(), 256);
    }

    #[test]
    #[should_panic]
    fn overflowing_total_size_panics() {
        let mut allocator = BulkAllocator::new();
        let mut regions = Vec::new();

        allocator.alloc_blocks(NonZero::new(usize::MAX).unwrap(), nz!(2), &mut regions);
    }
}

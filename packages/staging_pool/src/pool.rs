use std::num::NonZero;

use tracing::{debug, trace};

use crate::{BulkAllocator, Region, RegionPoolBuilder};

/// A pool of equally sized memory blocks, dispensed as [`Region`]s.
///
/// The pool is meant for staging buffers of bulk copy operations (e.g. CPU-to-device
/// transfers) where the same size of buffer is needed over and over again. Instead of
/// allocating and freeing a buffer for every operation, the caller acquires a region from the
/// pool, fills it (typically via a [`RegionWriter`][crate::RegionWriter]), hands it to the
/// transfer mechanism and releases it back to the pool once the transfer is complete.
///
/// # Free list
///
/// Free regions are kept on a stack: the most recently released region is the first one to be
/// acquired again, which tends to keep recently touched memory hot in caches. When no free
/// region is available, the pool allocates `allocation_amount` new blocks at once.
///
/// The pool only tracks free regions. It does not know which regions are currently acquired -
/// the caller is the sole record of that. Releasing a region that did not come from this pool,
/// or releasing the same region twice, is not detected and will cause the pool to later hand
/// out foreign or aliased regions.
///
/// # Resource usage
///
/// Memory held by the pool only ever grows. All of it is freed when the pool is dropped,
/// regardless of whether regions are still acquired - such regions become dangling and must
/// no longer be used.
///
/// # Example
///
/// ```rust
/// use staging_pool::RegionPool;
///
/// let mut pool = RegionPool::new(64, 4);
///
/// let region = pool.acquire();
/// assert_eq!(region.size(), 64);
/// assert_eq!(pool.free_count(), 3);
///
/// pool.release(region);
/// assert_eq!(pool.free_count(), 4);
///
/// // The most recently released region is handed out first.
/// assert_eq!(pool.acquire(), region);
/// ```
///
/// # Thread safety
///
/// The pool is thread-mobile ([`Send`]) and can be moved between threads, but it is not
/// thread-safe ([`Sync`]). Sharing a pool between threads requires external synchronization
/// around every acquire and release.
#[derive(Debug)]
pub struct RegionPool {
    block_size: NonZero<usize>,

    /// How many blocks we allocate whenever we run out of free blocks.
    allocation_amount: NonZero<usize>,

    /// Regions that are available to be acquired, used as a stack. Every entry aliases a block
    /// owned by `allocator`.
    free: Vec<Region>,

    allocator: BulkAllocator,
}

impl RegionPool {
    /// Creates a pool of blocks of `block_size` bytes that allocates `allocation_amount` blocks
    /// at a time, starting with one such allocation.
    ///
    /// # Example
    ///
    /// ```rust
    /// use staging_pool::RegionPool;
    ///
    /// let pool = RegionPool::new(1024, 8);
    ///
    /// assert_eq!(pool.block_size(), 1024);
    /// assert_eq!(pool.free_count(), 8);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if either `block_size` or `allocation_amount` is zero.
    #[must_use]
    pub fn new(block_size: usize, allocation_amount: usize) -> Self {
        Self::builder()
            .block_size(block_size)
            .allocation_amount(allocation_amount)
            .build()
    }

    /// Creates a builder for configuring and constructing a [`RegionPool`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use staging_pool::RegionPool;
    ///
    /// let pool = RegionPool::builder().block_size(512).build();
    ///
    /// assert_eq!(pool.allocation_amount(), 1);
    /// ```
    #[inline]
    pub fn builder() -> RegionPoolBuilder {
        RegionPoolBuilder::new()
    }

    #[must_use]
    pub(crate) fn new_inner(
        block_size: NonZero<usize>,
        allocation_amount: NonZero<usize>,
    ) -> Self {
        let mut pool = Self {
            block_size,
            allocation_amount,
            free: Vec::new(),
            allocator: BulkAllocator::new(),
        };

        debug!(
            block_size = block_size.get(),
            allocation_amount = allocation_amount.get(),
            "creating region pool"
        );

        pool.grow(allocation_amount);
        pool
    }

    /// The size in bytes of every region dispensed by the pool.
    #[must_use]
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size.get()
    }

    /// How many blocks the pool allocates whenever it runs out of free blocks.
    #[must_use]
    #[inline]
    pub fn allocation_amount(&self) -> usize {
        self.allocation_amount.get()
    }

    /// The number of regions that can be acquired without the pool allocating more memory.
    #[must_use]
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// The total number of blocks the pool has allocated, whether free or acquired.
    #[must_use]
    #[inline]
    pub fn block_count(&self) -> usize {
        self.allocator.block_count()
    }

    /// The total number of bytes held by the pool, whether free or acquired.
    #[must_use]
    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.allocator.total_bytes()
    }

    /// Takes a region from the pool.
    ///
    /// If no region is free, the pool first allocates `allocation_amount` new blocks.
    ///
    /// The region remains valid until the pool is dropped. Return it with
    /// [`release()`](Self::release) once it is no longer needed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use staging_pool::RegionPool;
    ///
    /// let mut pool = RegionPool::new(32, 1);
    ///
    /// let first = pool.acquire();
    /// assert_eq!(pool.block_count(), 1);
    ///
    /// // No free regions left, so this grows the pool.
    /// let second = pool.acquire();
    /// assert_eq!(pool.block_count(), 2);
    /// assert_ne!(first, second);
    /// ```
    #[must_use]
    pub fn acquire(&mut self) -> Region {
        if self.free.is_empty() {
            self.grow(self.allocation_amount);
        }

        let region = self
            .free
            .pop()
            .expect("free list cannot be empty right after growing the pool");

        trace!(start = ?region.start(), free_count = self.free.len(), "acquired region");

        region
    }

    /// Takes `count` regions from the pool at once.
    ///
    /// If fewer than `count` regions are free, the pool first allocates
    /// `allocation_amount + (count - free_count)` new blocks in one step, so that at least
    /// `allocation_amount` regions remain free afterwards.
    ///
    /// The regions are taken from the top of the free stack and returned in stack order,
    /// i.e. the most recently released region is last.
    ///
    /// # Example
    ///
    /// ```rust
    /// use staging_pool::RegionPool;
    ///
    /// let mut pool = RegionPool::new(32, 2);
    ///
    /// // 2 free, 5 needed: the pool grows by 2 + 3 = 5 blocks.
    /// let regions = pool.acquire_many(5);
    ///
    /// assert_eq!(regions.len(), 5);
    /// assert_eq!(pool.block_count(), 7);
    /// assert_eq!(pool.free_count(), 2);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    #[must_use]
    pub fn acquire_many(&mut self, count: usize) -> Vec<Region> {
        assert!(count != 0, "cannot acquire zero regions from a RegionPool");

        let free_count = self.free.len();

        if free_count < count {
            // Cannot wrap because we just checked that free_count < count.
            let shortfall = count.wrapping_sub(free_count);

            let growth = self
                .allocation_amount
                .checked_add(shortfall)
                .expect("requested capacity exceeds size of virtual memory");

            self.grow(growth);
        }

        // Cannot wrap because after growing there are always at least `count` free regions.
        let split_index = self.free.len().wrapping_sub(count);
        let regions = self.free.split_off(split_index);

        trace!(count, free_count = self.free.len(), "acquired regions");

        regions
    }

    /// Returns a region to the pool, making it available to be acquired again.
    ///
    /// The region is not validated. It must have been acquired from this pool and must not
    /// already have been released since. Violating this will make the pool hand out regions
    /// that are aliased or that do not belong to it.
    ///
    /// The caller must no longer use the region to access memory after releasing it.
    pub fn release(&mut self, region: Region) {
        self.free.push(region);

        trace!(start = ?region.start(), free_count = self.free.len(), "released region");
    }

    /// Returns several regions to the pool at once, in the given order.
    ///
    /// The last region in the slice is the first one to be acquired again.
    ///
    /// The same requirements as for [`release()`](Self::release) apply to every region.
    ///
    /// # Example
    ///
    /// ```rust
    /// use staging_pool::RegionPool;
    ///
    /// let mut pool = RegionPool::new(16, 3);
    /// let regions = pool.acquire_many(3);
    ///
    /// pool.release_many(&regions);
    /// assert_eq!(pool.free_count(), 3);
    /// assert_eq!(pool.acquire(), regions[2]);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `regions` is empty.
    pub fn release_many(&mut self, regions: &[Region]) {
        assert!(
            !regions.is_empty(),
            "cannot release an empty set of regions to a RegionPool"
        );

        self.free.extend_from_slice(regions);

        trace!(
            count = regions.len(),
            free_count = self.free.len(),
            "released regions"
        );
    }

    fn grow(&mut self, amount: NonZero<usize>) {
        self.allocator
            .alloc_blocks(self.block_size, amount, &mut self.free);
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::collections::HashSet;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::RegionWriter;

    assert_impl_all!(RegionPool: Send, std::fmt::Debug);
    assert_not_impl_any!(RegionPool: Sync, Clone);

    #[test]
    fn smoke_test() {
        let mut pool = RegionPool::new(64, 2);

        assert_eq!(pool.block_size(), 64);
        assert_eq!(pool.allocation_amount(), 2);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.capacity_bytes(), 128);

        let a = pool.acquire();
        let b = pool.acquire();

        assert_eq!(a.size(), 64);
        assert_eq!(b.size(), 64);
        assert_ne!(a, b);
        assert_eq!(pool.free_count(), 0);

        pool.release(a);
        pool.release(b);

        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.block_count(), 2);
    }

    #[test]
    fn initial_batch_serves_first_acquires() {
        let mut pool = RegionPool::new(16, 5);

        for _ in 0..5 {
            _ = pool.acquire();
            assert_eq!(pool.block_count(), 5);
        }

        // The next one triggers exactly one growth of 5.
        _ = pool.acquire();
        assert_eq!(pool.block_count(), 10);
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn release_then_acquire_is_lifo() {
        let mut pool = RegionPool::new(16, 3);

        let x = pool.acquire();
        let y = pool.acquire();

        pool.release(x);
        assert_eq!(pool.acquire(), x);

        pool.release(y);
        pool.release(x);
        assert_eq!(pool.acquire(), x);
        assert_eq!(pool.acquire(), y);
    }

    #[test]
    fn scenario_sixty_four_by_four() {
        let mut pool = RegionPool::new(64, 4);

        let mut acquired = Vec::new();
        for _ in 0..4 {
            acquired.push(pool.acquire());
        }
        assert_eq!(pool.block_count(), 4);

        acquired.push(pool.acquire());
        assert_eq!(pool.block_count(), 8);

        for region in &acquired {
            pool.release(*region);
        }

        let reacquired: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        let expected: Vec<_> = acquired.iter().rev().copied().collect();

        assert_eq!(reacquired, expected);
        assert_eq!(pool.block_count(), 8);
    }

    #[test]
    fn acquire_many_without_shortfall_does_not_grow() {
        let mut pool = RegionPool::new(8, 6);

        let regions = pool.acquire_many(4);

        assert_eq!(regions.len(), 4);
        assert_eq!(pool.block_count(), 6);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn acquire_many_with_shortfall_grows_once_by_formula() {
        let mut pool = RegionPool::new(8, 2);
        _ = pool.acquire();

        // 1 free, 10 needed: grow by 2 + (10 - 1) = 11.
        let regions = pool.acquire_many(10);

        assert_eq!(regions.len(), 10);
        assert!(regions.iter().all(|r| r.size() == 8));
        assert_eq!(pool.block_count(), 2 + 11);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn acquire_many_exact_fit_does_not_grow() {
        let mut pool = RegionPool::new(8, 3);

        let regions = pool.acquire_many(3);

        assert_eq!(regions.len(), 3);
        assert_eq!(pool.block_count(), 3);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn acquire_many_takes_top_of_stack_in_order() {
        let mut pool = RegionPool::new(8, 4);
        let all = pool.acquire_many(4);

        pool.release_many(&all);

        let top_two = pool.acquire_many(2);
        assert_eq!(top_two, &all[2..]);

        let rest = pool.acquire_many(2);
        assert_eq!(rest, &all[..2]);
    }

    #[test]
    fn acquired_regions_are_unique() {
        let mut pool = RegionPool::new(8, 3);

        let mut regions = pool.acquire_many(7);
        regions.push(pool.acquire());
        regions.extend(pool.acquire_many(5));

        let unique: HashSet<_> = regions.iter().copied().collect();
        assert_eq!(unique.len(), regions.len());
    }

    #[test]
    #[should_panic]
    fn acquire_many_zero_panics() {
        let mut pool = RegionPool::new(8, 1);
        let _regions = pool.acquire_many(0);
    }

    #[test]
    #[should_panic]
    fn release_many_empty_panics() {
        let mut pool = RegionPool::new(8, 1);
        pool.release_many(&[]);
    }

    #[test]
    #[should_panic]
    fn zero_block_size_panics() {
        let _pool = RegionPool::new(0, 4);
    }

    #[test]
    #[should_panic]
    fn zero_allocation_amount_panics() {
        let _pool = RegionPool::new(64, 0);
    }

    #[test]
    fn release_is_unchecked() {
        let mut pool = RegionPool::new(8, 1);
        let mut foreign_bytes = [0_u8; 3];
        let foreign = Region::from_slice(&mut foreign_bytes);

        // The pool accepts anything. This is a caller contract violation, not a pool error.
        pool.release(foreign);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.acquire(), foreign);
    }

    #[test]
    fn contents_survive_growth() {
        let mut pool = RegionPool::new(4, 1);
        let region = pool.acquire();

        let mut writer = unsafe { RegionWriter::from_region(region) };
        assert!(writer.write_bytes(&[1, 2, 3, 4]));

        for _ in 0..100 {
            _ = pool.acquire();
        }

        assert_eq!(unsafe { region.as_bytes() }, &[1, 2, 3, 4]);
    }

    #[test]
    fn pool_can_move_between_threads() {
        let mut pool = RegionPool::new(32, 2);
        let region = pool.acquire();

        let handle = std::thread::spawn(move || {
            pool.release(region);
            pool
        });

        let pool = handle.join().expect("thread completed successfully");
        assert_eq!(pool.free_count(), 2);
    }
}

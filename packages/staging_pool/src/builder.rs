use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::{Error, RegionPool, Result};

/// How many blocks a pool allocates at a time unless configured otherwise.
pub(crate) const DEFAULT_ALLOCATION_AMOUNT: NonZero<usize> = nz!(1);

/// Builder for creating an instance of [`RegionPool`].
///
/// The block size is mandatory. The allocation amount (how many blocks the pool allocates
/// whenever it runs out of free blocks) is optional and defaults to 1.
///
/// # Examples
///
/// ```
/// use staging_pool::RegionPool;
///
/// let pool = RegionPool::builder()
///     .block_size(4096)
///     .allocation_amount(16)
///     .build();
///
/// assert_eq!(pool.block_size(), 4096);
/// assert_eq!(pool.free_count(), 16);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) and can be safely transferred between threads,
/// allowing pool configuration to happen on different threads than where the pool is used.
/// However, it is not thread-safe ([`Sync`]) as it contains mutable configuration state.
#[derive(Debug)]
#[must_use]
pub struct RegionPoolBuilder {
    block_size: Option<usize>,
    allocation_amount: usize,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl RegionPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            block_size: None,
            allocation_amount: DEFAULT_ALLOCATION_AMOUNT.get(),
            _not_sync: PhantomData,
        }
    }

    /// Sets the size in bytes of every block dispensed by the pool.
    ///
    /// # Examples
    ///
    /// ```
    /// use staging_pool::RegionPool;
    ///
    /// let pool = RegionPool::builder().block_size(256).build();
    /// ```
    #[inline]
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Sets how many blocks the pool allocates whenever it runs out of free blocks.
    ///
    /// The pool also allocates this many blocks up front when it is built.
    ///
    /// # Examples
    ///
    /// ```
    /// use staging_pool::RegionPool;
    ///
    /// let pool = RegionPool::builder()
    ///     .block_size(256)
    ///     .allocation_amount(8)
    ///     .build();
    ///
    /// assert_eq!(pool.block_count(), 8);
    /// ```
    #[inline]
    pub fn allocation_amount(mut self, allocation_amount: usize) -> Self {
        self.allocation_amount = allocation_amount;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the block size has not been set, or if either the block size or the
    /// allocation amount is zero. Use [`try_build()`](Self::try_build) to receive these
    /// as an [`Error`] instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use staging_pool::RegionPool;
    ///
    /// let pool = RegionPool::builder().block_size(64).build();
    /// ```
    #[must_use]
    #[inline]
    pub fn build(self) -> RegionPool {
        match self.try_build() {
            Ok(pool) => pool,
            Err(e) => panic!("invalid RegionPool configuration: {e}"),
        }
    }

    /// Builds the pool with the specified configuration, returning an error if the
    /// configuration is invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if the block size has not been set, or if either the block size or
    /// the allocation amount is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use staging_pool::{Error, RegionPool};
    ///
    /// let result = RegionPool::builder()
    ///     .block_size(64)
    ///     .allocation_amount(0)
    ///     .try_build();
    ///
    /// assert_eq!(result.unwrap_err(), Error::ZeroAllocationAmount);
    /// ```
    #[inline]
    pub fn try_build(self) -> Result<RegionPool> {
        let block_size = self.block_size.ok_or(Error::MissingBlockSize)?;
        let block_size = NonZero::new(block_size).ok_or(Error::ZeroBlockSize)?;
        let allocation_amount =
            NonZero::new(self.allocation_amount).ok_or(Error::ZeroAllocationAmount)?;

        Ok(RegionPool::new_inner(block_size, allocation_amount))
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(RegionPoolBuilder: Send, std::fmt::Debug);
    assert_not_impl_any!(RegionPoolBuilder: Sync);

    #[test]
    fn builder_new_creates_default_state() {
        let builder = RegionPoolBuilder::new();

        assert!(builder.block_size.is_none());
        assert_eq!(builder.allocation_amount, 1);
    }

    #[test]
    fn settings_are_applied() {
        let pool = RegionPoolBuilder::new()
            .block_size(48)
            .allocation_amount(3)
            .build();

        assert_eq!(pool.block_size(), 48);
        assert_eq!(pool.allocation_amount(), 3);
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn settings_can_be_overridden() {
        let pool = RegionPoolBuilder::new()
            .block_size(8)
            .allocation_amount(2)
            .block_size(16)
            .allocation_amount(5)
            .build();

        assert_eq!(pool.block_size(), 16);
        assert_eq!(pool.allocation_amount(), 5);
    }

    #[test]
    fn default_allocation_amount_is_one() {
        let pool = RegionPoolBuilder::new().block_size(8).build();

        assert_eq!(pool.allocation_amount(), 1);
        assert_eq!(pool.block_count(), 1);
    }

    #[test]
    fn try_build_reports_missing_block_size() {
        let result = RegionPoolBuilder::new().allocation_amount(4).try_build();

        assert_eq!(result.unwrap_err(), Error::MissingBlockSize);
    }

    #[test]
    fn try_build_reports_zero_block_size() {
        let result = RegionPoolBuilder::new().block_size(0).try_build();

        assert_eq!(result.unwrap_err(), Error::ZeroBlockSize);
    }

    #[test]
    fn try_build_reports_zero_allocation_amount() {
        let result = RegionPoolBuilder::new()
            .block_size(8)
            .allocation_amount(0)
            .try_build();

        assert_eq!(result.unwrap_err(), Error::ZeroAllocationAmount);
    }

    #[test]
    #[should_panic]
    fn build_without_block_size_panics() {
        let _pool = RegionPoolBuilder::new().build();
    }

    #[test]
    #[should_panic]
    fn build_with_zero_block_size_panics() {
        let _pool = RegionPoolBuilder::new().block_size(0).build();
    }

    #[test]
    #[should_panic]
    fn build_with_zero_allocation_amount_panics() {
        let _pool = RegionPoolBuilder::new()
            .block_size(8)
            .allocation_amount(0)
            .build();
    }

    #[test]
    fn builder_send_trait() {
        // Verify builder can be moved between threads.
        let builder = RegionPoolBuilder::new().block_size(32);
        let handle = std::thread::spawn(move || builder.build().block_size());

        assert_eq!(handle.join().expect("thread completed successfully"), 32);
    }
}

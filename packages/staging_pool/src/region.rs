use std::fmt;
use std::ptr::NonNull;
use std::slice;

/// A non-owning view of a contiguous range of bytes.
///
/// A region is just a pair of addresses. It does not own the bytes it describes and does not
/// keep them alive - validity is entirely borrowed from whatever owns the underlying memory,
/// typically an [`OwnedBlock`][crate::OwnedBlock] held by a [`RegionPool`][crate::RegionPool].
///
/// Regions are cheap to copy. Copying a region does not copy the bytes.
///
/// # Example
///
/// ```rust
/// use staging_pool::Region;
///
/// let mut bytes = [0_u8; 32];
/// let region = Region::from_slice(&mut bytes);
///
/// assert_eq!(region.size(), 32);
/// assert!(!region.is_empty());
/// ```
///
/// # Thread safety
///
/// Regions are thread-mobile ([`Send`]) so that they can travel together with the pool that
/// issued them. Accessing the bytes from multiple threads requires external synchronization.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Region {
    start: NonNull<u8>,

    /// One past the last byte of the region. Never less than `start`.
    end: NonNull<u8>,
}

impl Region {
    /// Creates a region spanning `[start, end)`.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `end` is less than `start`.
    #[must_use]
    #[inline]
    pub fn new(start: NonNull<u8>, end: NonNull<u8>) -> Self {
        debug_assert!(
            start <= end,
            "region end {end:?} is before region start {start:?}"
        );

        Self { start, end }
    }

    /// Creates a region spanning `size` bytes starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics if the end address would not fit in the address space.
    #[must_use]
    #[inline]
    pub fn from_start_and_size(start: NonNull<u8>, size: usize) -> Self {
        assert!(
            start.addr().get().checked_add(size).is_some(),
            "region of {size} bytes at {start:?} extends beyond the address space"
        );

        // We only compute an address here, we never dereference it, so wrapping
        // arithmetic is fine. The assertion above guarantees it does not actually wrap.
        let end = NonNull::new(start.as_ptr().wrapping_add(size))
            .expect("end address cannot be null because it did not wrap around");

        Self { start, end }
    }

    /// Creates a region that describes the bytes of a slice.
    ///
    /// The region does not borrow the slice - it is the caller's responsibility to keep
    /// the slice alive for as long as the region is used to access memory.
    #[must_use]
    #[inline]
    pub fn from_slice(bytes: &mut [u8]) -> Self {
        let len = bytes.len();
        let start = NonNull::from(bytes).cast::<u8>();

        Self::from_start_and_size(start, len)
    }

    /// The address of the first byte of the region.
    #[must_use]
    #[inline]
    pub fn start(&self) -> NonNull<u8> {
        self.start
    }

    /// The address one past the last byte of the region.
    #[must_use]
    #[inline]
    pub fn end(&self) -> NonNull<u8> {
        self.end
    }

    /// The number of bytes in the region.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        // Cannot wrap because `start <= end` is an invariant of the type.
        self.end.addr().get().wrapping_sub(self.start.addr().get())
    }

    /// Whether the region contains zero bytes.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the bytes described by the region as a shared slice.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    ///
    /// * The region describes initialized memory that is alive for the lifetime of the slice.
    /// * No exclusive reference to any of the bytes exists for the lifetime of the slice.
    #[must_use]
    #[inline]
    pub unsafe fn as_bytes(&self) -> &[u8] {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe { slice::from_raw_parts(self.start.as_ptr(), self.size()) }
    }

    /// Returns the bytes described by the region as an exclusive slice.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    ///
    /// * The region describes initialized memory that is alive for the lifetime of the slice.
    /// * No other reference to any of the bytes exists for the lifetime of the slice.
    #[must_use]
    #[inline]
    pub unsafe fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe { slice::from_raw_parts_mut(self.start.as_ptr(), self.size()) }
    }
}

impl Default for Region {
    /// The empty region, which describes no memory at all.
    #[inline]
    fn default() -> Self {
        let dangling = NonNull::dangling();

        Self {
            start: dangling,
            end: dangling,
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("start", &self.start)
            .field("size", &self.size())
            .finish()
    }
}

// SAFETY: A region is only a pair of addresses. Accessing the bytes behind them always requires
// unsafe code in which the caller vouches for validity, so moving the addresses to another
// thread does not by itself grant any access that was not already available.
unsafe impl Send for Region {}

/// Rounds `size` up to the nearest multiple of `alignment`.
///
/// Useful for sizing pool blocks so that consecutive records written into a block keep
/// their natural alignment.
///
/// # Example
///
/// ```rust
/// use staging_pool::aligned_size;
///
/// assert_eq!(aligned_size(0, 8), 0);
/// assert_eq!(aligned_size(13, 8), 16);
/// assert_eq!(aligned_size(16, 8), 16);
/// ```
///
/// # Panics
///
/// Panics if `alignment` is not a power of two or if the aligned size overflows `usize`.
#[must_use]
#[inline]
pub fn aligned_size(size: usize, alignment: usize) -> usize {
    assert!(
        alignment.is_power_of_two(),
        "alignment {alignment} is not a power of two"
    );

    // Cannot wrap because a power of two is never zero.
    let mask = alignment.wrapping_sub(1);

    size.checked_add(mask)
        .expect("aligned size overflows usize")
        & !mask
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(Region: Send, Copy, fmt::Debug);
    assert_not_impl_any!(Region: Sync);

    #[test]
    fn size_is_distance_between_addresses() {
        let mut bytes = [0_u8; 48];
        let region = Region::from_slice(&mut bytes);

        let distance = region.end().addr().get() - region.start().addr().get();
        assert_eq!(region.size(), distance);
        assert_eq!(region.size(), 48);
    }

    #[test]
    fn new_and_from_start_and_size_agree() {
        let mut bytes = [0_u8; 16];
        let by_size = Region::from_slice(&mut bytes);
        let by_end = Region::new(by_size.start(), by_size.end());

        assert_eq!(by_size, by_end);
        assert_eq!(by_end.size(), 16);
    }

    #[test]
    fn default_is_empty() {
        let region = Region::default();

        assert!(region.is_empty());
        assert_eq!(region.size(), 0);
    }

    #[test]
    fn empty_slice_gives_empty_region() {
        let mut bytes: [u8; 0] = [];
        let region = Region::from_slice(&mut bytes);

        assert!(region.is_empty());
    }

    #[test]
    fn copies_alias_same_bytes() {
        let mut bytes = [0_u8; 4];
        let mut region = Region::from_slice(&mut bytes);
        let copy = region;

        unsafe { region.as_bytes_mut() }.copy_from_slice(&[1, 2, 3, 4]);

        assert_eq!(unsafe { copy.as_bytes() }, &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic]
    fn size_beyond_address_space_panics() {
        let start = NonNull::<u8>::dangling();
        let _region = Region::from_start_and_size(start, usize::MAX);
    }

    #[test]
    fn debug_shows_size() {
        let mut bytes = [0_u8; 7];
        let region = Region::from_slice(&mut bytes);

        let output = format!("{region:?}");
        assert!(output.contains("Region"));
        assert!(output.contains("size: 7"));
    }

    #[test]
    fn aligned_size_rounds_up() {
        assert_eq!(aligned_size(0, 8), 0);
        assert_eq!(aligned_size(1, 8), 8);
        assert_eq!(aligned_size(13, 8), 16);
        assert_eq!(aligned_size(16, 8), 16);
        assert_eq!(aligned_size(17, 1), 17);
        assert_eq!(aligned_size(100, 64), 128);
    }

    #[test]
    #[should_panic]
    fn aligned_size_rejects_non_power_of_two() {
        let _size = aligned_size(10, 12);
    }

    #[test]
    #[should_panic]
    fn aligned_size_rejects_zero_alignment() {
        let _size = aligned_size(10, 0);
    }

    #[test]
    #[should_panic]
    fn aligned_size_overflow_panics() {
        let _size = aligned_size(usize::MAX, 8);
    }
}

use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::Region;

/// Copies `amount` bytes from `src` to `cursor` if they fit into `remaining` bytes.
///
/// Returns the advanced cursor on success. On failure, nothing is copied and `None` is returned.
///
/// # Safety
///
/// The caller must guarantee that `src` is valid for reads of `amount` bytes and that
/// `cursor` is valid for writes of `remaining` bytes, with the two ranges not overlapping.
#[inline]
unsafe fn copy_if_fits(
    cursor: NonNull<u8>,
    remaining: usize,
    src: *const u8,
    amount: usize,
) -> Option<NonNull<u8>> {
    if amount > remaining {
        return None;
    }

    // SAFETY: The caller guarantees `src` is readable for `amount` bytes and the destination
    // is writable for `remaining >= amount` bytes without overlap.
    unsafe {
        ptr::copy_nonoverlapping(src, cursor.as_ptr(), amount);
    }

    // SAFETY: `amount <= remaining`, so the new cursor is at most one past the end of the
    // writable range, which is still within (or one past) the same allocation.
    Some(unsafe { cursor.add(amount) })
}

/// A write cursor over a [`Region`] that refuses writes which would overrun the region.
///
/// Every write either fully succeeds and advances the cursor by exactly the number of bytes
/// written, or fully fails and leaves both the cursor and the region contents untouched.
/// Running out of space is an ordinary condition, reported as a `false` return value.
///
/// The writer also behaves as a region: [`region()`](Self::region) returns the region being
/// written and the writer converts into a [`Region`] via [`From`].
///
/// # Example
///
/// ```rust
/// use staging_pool::RegionWriter;
///
/// let mut bytes = [0_u8; 16];
/// let mut writer = RegionWriter::new(&mut bytes);
///
/// assert!(writer.write_bytes(&[1; 10]));
/// assert_eq!(writer.bytes_remaining(), 6);
///
/// // Does not fit - nothing is written.
/// assert!(!writer.write_bytes(&[2; 8]));
/// assert_eq!(writer.bytes_written(), 10);
///
/// assert!(writer.write_value(&0x0403_0201_u32));
/// assert_eq!(writer.bytes_remaining(), 2);
/// ```
///
/// Writing into a region dispensed by a pool:
///
/// ```rust
/// use staging_pool::{RegionPool, RegionWriter};
///
/// let mut pool = RegionPool::new(64, 4);
/// let region = pool.acquire();
///
/// // SAFETY: The region was just acquired from a live pool and is not used elsewhere.
/// let mut writer = unsafe { RegionWriter::from_region(region) };
/// assert!(writer.write_slice(&[1_u16, 2, 3]));
/// assert_eq!(writer.bytes_written(), 6);
///
/// pool.release(region);
/// ```
pub struct RegionWriter<'a> {
    region: Region,

    /// Where the next write starts. Always within `[region.start(), region.end()]`.
    cursor: NonNull<u8>,

    _bytes: PhantomData<&'a mut [u8]>,
}

impl<'a> RegionWriter<'a> {
    /// Creates a writer over a slice of bytes, starting at the beginning of the slice.
    #[must_use]
    #[inline]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        // SAFETY: The region describes the slice, which we borrow exclusively for 'a.
        unsafe { Self::from_region(Region::from_slice(bytes)) }
    }

    /// Creates a writer over a region, starting at the beginning of the region.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that for the lifetime `'a`, the region describes memory that
    /// is valid for writes and is not accessed through any other path.
    #[must_use]
    #[inline]
    pub unsafe fn from_region(region: Region) -> Self {
        Self {
            region,
            cursor: region.start(),
            _bytes: PhantomData,
        }
    }

    /// Writes `amount` bytes read from `src`.
    ///
    /// Returns `true` if the bytes were written, `false` if the region does not have enough
    /// space remaining, in which case nothing was written.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `src` is valid for reads of `amount` bytes and does not
    /// overlap the region being written.
    #[must_use]
    #[inline]
    pub unsafe fn write_raw(&mut self, src: *const u8, amount: usize) -> bool {
        // SAFETY: The source requirements are forwarded from our caller and the destination
        // is valid for `bytes_remaining()` bytes as guaranteed when the writer was created.
        match unsafe { copy_if_fits(self.cursor, self.bytes_remaining(), src, amount) } {
            Some(cursor) => {
                self.cursor = cursor;
                true
            }
            None => false,
        }
    }

    /// Writes a slice of bytes.
    ///
    /// Returns `true` if the bytes were written, `false` if the region does not have enough
    /// space remaining, in which case nothing was written.
    #[must_use]
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        // SAFETY: The slice is valid for reads of its own length and, being a shared borrow,
        // cannot overlap the exclusively borrowed destination.
        unsafe { self.write_raw(bytes.as_ptr(), bytes.len()) }
    }

    /// Writes the in-memory representation of a value, `size_of::<T>()` bytes long.
    ///
    /// Returns `true` if the value was written, `false` if the region does not have enough
    /// space remaining, in which case nothing was written.
    #[must_use]
    #[inline]
    pub fn write_value<T>(&mut self, value: &T) -> bool
    where
        T: bytemuck::NoUninit,
    {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Writes the in-memory representation of a contiguous sequence of values,
    /// `values.len() * size_of::<T>()` bytes long.
    ///
    /// Returns `true` if the values were written, `false` if the region does not have enough
    /// space remaining, in which case nothing was written.
    #[must_use]
    #[inline]
    pub fn write_slice<T>(&mut self, values: &[T]) -> bool
    where
        T: bytemuck::NoUninit,
    {
        self.write_bytes(bytemuck::cast_slice(values))
    }

    /// The number of bytes that can still be written before the region is full.
    #[must_use]
    #[inline]
    pub fn bytes_remaining(&self) -> usize {
        // Cannot wrap because the cursor never moves past the end of the region.
        self.region
            .end()
            .addr()
            .get()
            .wrapping_sub(self.cursor.addr().get())
    }

    /// The number of bytes written since the writer was created or last reset.
    #[must_use]
    #[inline]
    pub fn bytes_written(&self) -> usize {
        // Cannot wrap because the cursor never moves before the start of the region.
        self.cursor
            .addr()
            .get()
            .wrapping_sub(self.region.start().addr().get())
    }

    /// Rewinds the cursor to the start of the region.
    ///
    /// Previously written bytes are left as they are. Subsequent writes overwrite them.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = self.region.start();
    }

    /// The region being written.
    #[must_use]
    #[inline]
    pub fn region(&self) -> Region {
        self.region
    }

    /// The total size of the region being written.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        self.region.size()
    }
}

impl From<&RegionWriter<'_>> for Region {
    #[inline]
    fn from(writer: &RegionWriter<'_>) -> Self {
        writer.region
    }
}

impl From<RegionWriter<'_>> for Region {
    #[inline]
    fn from(writer: RegionWriter<'_>) -> Self {
        writer.region
    }
}

impl AsRef<Region> for RegionWriter<'_> {
    #[inline]
    fn as_ref(&self) -> &Region {
        &self.region
    }
}

impl fmt::Debug for RegionWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionWriter")
            .field("region", &self.region)
            .field("bytes_written", &self.bytes_written())
            .field("bytes_remaining", &self.bytes_remaining())
            .finish()
    }
}

/// A compact write cursor with the same bounds checking as [`RegionWriter`].
///
/// This variant tracks its position with 32-bit counters instead of keeping a copy of the
/// region, making it smaller at the cost of not being convertible back into a [`Region`]
/// and of supporting regions of at most `u32::MAX` bytes.
///
/// # Example
///
/// ```rust
/// use staging_pool::SmallRegionWriter;
///
/// let mut bytes = [0_u8; 8];
/// let mut writer = SmallRegionWriter::new(&mut bytes);
///
/// assert!(writer.write_value(&7_u32));
/// assert!(!writer.write_value(&7_u64));
/// assert_eq!(writer.bytes_remaining(), 4);
///
/// writer.reset();
/// assert_eq!(writer.bytes_written(), 0);
/// ```
pub struct SmallRegionWriter<'a> {
    /// Where the next write starts.
    cursor: NonNull<u8>,

    remaining: u32,
    written: u32,

    _bytes: PhantomData<&'a mut [u8]>,
}

impl<'a> SmallRegionWriter<'a> {
    /// Creates a writer over a slice of bytes, starting at the beginning of the slice.
    ///
    /// # Panics
    ///
    /// Panics if the slice is longer than `u32::MAX` bytes.
    #[must_use]
    #[inline]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        // SAFETY: The region describes the slice, which we borrow exclusively for 'a.
        unsafe { Self::from_region(Region::from_slice(bytes)) }
    }

    /// Creates a writer over a region, starting at the beginning of the region.
    ///
    /// # Panics
    ///
    /// Panics if the region is larger than `u32::MAX` bytes.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that for the lifetime `'a`, the region describes memory that
    /// is valid for writes and is not accessed through any other path.
    #[must_use]
    #[inline]
    pub unsafe fn from_region(region: Region) -> Self {
        let remaining = u32::try_from(region.size()).unwrap_or_else(|_| {
            panic!(
                "SmallRegionWriter supports regions of at most {} bytes but got {}",
                u32::MAX,
                region.size()
            )
        });

        Self {
            cursor: region.start(),
            remaining,
            written: 0,
            _bytes: PhantomData,
        }
    }

    /// Writes `amount` bytes read from `src`.
    ///
    /// Returns `true` if the bytes were written, `false` if the region does not have enough
    /// space remaining, in which case nothing was written.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `src` is valid for reads of `amount` bytes and does not
    /// overlap the region being written.
    #[must_use]
    #[inline]
    pub unsafe fn write_raw(&mut self, src: *const u8, amount: usize) -> bool {
        // SAFETY: The source requirements are forwarded from our caller and the destination
        // is valid for `remaining` bytes as guaranteed when the writer was created.
        let copied = unsafe { copy_if_fits(self.cursor, self.bytes_remaining(), src, amount) };

        let Some(cursor) = copied else {
            return false;
        };

        #[expect(
            clippy::cast_possible_truncation,
            reason = "amount fit into the remaining space, which is a u32"
        )]
        let amount = amount as u32;

        self.cursor = cursor;

        // Cannot wrap because the amount fit into the remaining space and the sum of
        // both counters always equals the region size, which is a u32.
        self.remaining = self.remaining.wrapping_sub(amount);
        self.written = self.written.wrapping_add(amount);

        true
    }

    /// Writes a slice of bytes.
    ///
    /// Returns `true` if the bytes were written, `false` if the region does not have enough
    /// space remaining, in which case nothing was written.
    #[must_use]
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        // SAFETY: The slice is valid for reads of its own length and, being a shared borrow,
        // cannot overlap the exclusively borrowed destination.
        unsafe { self.write_raw(bytes.as_ptr(), bytes.len()) }
    }

    /// Writes the in-memory representation of a value, `size_of::<T>()` bytes long.
    ///
    /// Returns `true` if the value was written, `false` if the region does not have enough
    /// space remaining, in which case nothing was written.
    #[must_use]
    #[inline]
    pub fn write_value<T>(&mut self, value: &T) -> bool
    where
        T: bytemuck::NoUninit,
    {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Writes the in-memory representation of a contiguous sequence of values.
    ///
    /// Returns `true` if the values were written, `false` if the region does not have enough
    /// space remaining, in which case nothing was written.
    #[must_use]
    #[inline]
    pub fn write_slice<T>(&mut self, values: &[T]) -> bool
    where
        T: bytemuck::NoUninit,
    {
        self.write_bytes(bytemuck::cast_slice(values))
    }

    /// The number of bytes that can still be written before the region is full.
    #[must_use]
    #[inline]
    pub fn bytes_remaining(&self) -> usize {
        self.remaining as usize
    }

    /// The number of bytes written since the writer was created or last reset.
    #[must_use]
    #[inline]
    pub fn bytes_written(&self) -> usize {
        self.written as usize
    }

    /// Rewinds the cursor to the start of the region.
    ///
    /// Previously written bytes are left as they are. Subsequent writes overwrite them.
    #[inline]
    pub fn reset(&mut self) {
        // SAFETY: We advanced the cursor by exactly `written` bytes from the region start,
        // so stepping back by the same amount lands on the region start again.
        self.cursor = unsafe { self.cursor.sub(self.written as usize) };

        // Cannot wrap because the sum of both counters is the region size, which is a u32.
        self.remaining = self.remaining.wrapping_add(self.written);
        self.written = 0;
    }
}

impl fmt::Debug for SmallRegionWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmallRegionWriter")
            .field("cursor", &self.cursor)
            .field("bytes_written", &self.written)
            .field("bytes_remaining", &self.remaining)
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(RegionWriter<'static>: fmt::Debug, AsRef<Region>);
    assert_not_impl_any!(RegionWriter<'static>: Send, Sync, Clone);
    assert_impl_all!(SmallRegionWriter<'static>: fmt::Debug);
    assert_not_impl_any!(SmallRegionWriter<'static>: Send, Sync, Clone);

    #[test]
    fn fresh_writer_has_whole_region_remaining() {
        let mut bytes = [0_u8; 24];
        let writer = RegionWriter::new(&mut bytes);

        assert_eq!(writer.bytes_remaining(), 24);
        assert_eq!(writer.bytes_written(), 0);
        assert_eq!(writer.size(), 24);
    }

    #[test]
    fn sixteen_byte_scenario() {
        let mut bytes = [0_u8; 16];
        let mut writer = RegionWriter::new(&mut bytes);

        assert!(writer.write_bytes(&[0xAA; 10]));
        assert_eq!(writer.bytes_remaining(), 6);

        assert!(!writer.write_bytes(&[0xBB; 8]));
        assert_eq!(writer.bytes_written(), 10);

        assert!(writer.write_bytes(&[0xCC; 6]));
        assert_eq!(writer.bytes_remaining(), 0);
        assert_eq!(writer.bytes_written(), 16);

        drop(writer);
        assert_eq!(&bytes[..10], &[0xAA; 10]);
        assert_eq!(&bytes[10..], &[0xCC; 6]);
    }

    #[test]
    fn failed_write_leaves_contents_untouched() {
        let mut bytes = [0_u8; 4];
        let mut writer = RegionWriter::new(&mut bytes);

        assert!(writer.write_bytes(&[1, 2]));
        assert!(!writer.write_bytes(&[9, 9, 9]));

        drop(writer);
        assert_eq!(bytes, [1, 2, 0, 0]);
    }

    #[test]
    fn empty_write_always_succeeds() {
        let mut bytes = [0_u8; 2];
        let mut writer = RegionWriter::new(&mut bytes);

        assert!(writer.write_bytes(&[7, 7]));
        assert!(writer.write_bytes(&[]));
        assert_eq!(writer.bytes_written(), 2);
    }

    #[test]
    fn reset_rewinds_without_clearing() {
        let mut bytes = [0_u8; 8];
        let mut writer = RegionWriter::new(&mut bytes);

        assert!(writer.write_bytes(&[5; 8]));
        writer.reset();

        assert_eq!(writer.bytes_written(), 0);
        assert_eq!(writer.bytes_remaining(), 8);

        assert!(writer.write_bytes(&[6, 6]));

        drop(writer);
        assert_eq!(bytes, [6, 6, 5, 5, 5, 5, 5, 5]);
    }

    #[test]
    fn write_value_uses_native_representation() {
        let mut bytes = [0_u8; 8];
        let mut writer = RegionWriter::new(&mut bytes);

        assert!(writer.write_value(&0x1122_3344_u32));
        assert_eq!(writer.bytes_written(), 4);

        drop(writer);
        assert_eq!(&bytes[..4], &0x1122_3344_u32.to_ne_bytes());
    }

    #[test]
    fn write_slice_writes_all_elements() {
        let mut bytes = [0_u8; 8];
        let mut writer = RegionWriter::new(&mut bytes);

        assert!(writer.write_slice(&[1_u16, 2, 3]));
        assert_eq!(writer.bytes_written(), 6);

        // Two more u16 would need 4 bytes but only 2 remain.
        assert!(!writer.write_slice(&[4_u16, 5]));
        assert_eq!(writer.bytes_written(), 6);
    }

    #[test]
    fn write_raw_copies_from_pointer() {
        let source = [3_u8, 1, 4, 1, 5];
        let mut bytes = [0_u8; 5];
        let mut writer = RegionWriter::new(&mut bytes);

        assert!(unsafe { writer.write_raw(source.as_ptr(), source.len()) });

        drop(writer);
        assert_eq!(bytes, source);
    }

    #[test]
    fn writer_behaves_as_region() {
        let mut bytes = [0_u8; 12];
        let expected = Region::from_slice(&mut bytes);
        let mut writer = RegionWriter::new(&mut bytes);

        assert!(writer.write_bytes(&[1; 3]));

        // The region is always the full extent, regardless of cursor position.
        assert_eq!(writer.region(), expected);
        assert_eq!(Region::from(&writer), expected);
        assert_eq!(*writer.as_ref(), expected);
        assert_eq!(Region::from(writer), expected);
    }

    #[test]
    fn writer_over_empty_region() {
        let mut bytes: [u8; 0] = [];
        let mut writer = RegionWriter::new(&mut bytes);

        assert_eq!(writer.bytes_remaining(), 0);
        assert!(!writer.write_bytes(&[1]));
        assert!(writer.write_bytes(&[]));
    }

    #[test]
    fn small_writer_sixteen_byte_scenario() {
        let mut bytes = [0_u8; 16];
        let mut writer = SmallRegionWriter::new(&mut bytes);

        assert_eq!(writer.bytes_remaining(), 16);
        assert_eq!(writer.bytes_written(), 0);

        assert!(writer.write_bytes(&[1; 10]));
        assert_eq!(writer.bytes_remaining(), 6);

        assert!(!writer.write_bytes(&[2; 8]));
        assert_eq!(writer.bytes_written(), 10);

        assert!(writer.write_bytes(&[3; 6]));
        assert_eq!(writer.bytes_remaining(), 0);
    }

    #[test]
    fn small_writer_reset_rewinds_without_clearing() {
        let mut bytes = [0_u8; 6];
        let mut writer = SmallRegionWriter::new(&mut bytes);

        assert!(writer.write_bytes(&[4; 5]));
        writer.reset();

        assert_eq!(writer.bytes_written(), 0);
        assert_eq!(writer.bytes_remaining(), 6);

        assert!(writer.write_value(&9_u8));

        drop(writer);
        assert_eq!(bytes, [9, 4, 4, 4, 4, 0]);
    }

    #[test]
    fn small_writer_write_raw_is_all_or_nothing() {
        let mut bytes = [0_u8; 5];
        let source = [7_u8; 4];
        let mut writer = SmallRegionWriter::new(&mut bytes);

        assert!(unsafe { writer.write_raw(source.as_ptr(), 3) });
        assert_eq!(writer.bytes_written(), 3);

        assert!(!unsafe { writer.write_raw(source.as_ptr(), 4) });
        assert_eq!(writer.bytes_written(), 3);
        assert_eq!(writer.bytes_remaining(), 2);

        assert!(unsafe { writer.write_raw(source.as_ptr(), 2) });
        assert_eq!(writer.bytes_remaining(), 0);

        drop(writer);
        assert_eq!(bytes, [7, 7, 7, 7, 7]);
    }

    #[test]
    fn small_writer_is_smaller_than_full_writer() {
        assert!(size_of::<SmallRegionWriter<'static>>() < size_of::<RegionWriter<'static>>());
    }

    #[test]
    fn small_writer_from_pool_region() {
        let block = crate::OwnedBlock::new(32);
        let region = block.region();

        let mut writer = unsafe { SmallRegionWriter::from_region(region) };
        assert!(writer.write_slice(&[0xDEAD_BEEF_u32; 8]));
        assert!(!writer.write_bytes(&[0]));

        drop(writer);
        assert_eq!(&block.as_bytes()[..4], &0xDEAD_BEEF_u32.to_ne_bytes());
    }
}

use std::ptr::{self, NonNull};

/// A write cursor that performs no bounds checking at all.
///
/// This is an escape hatch for callers that have already proven, by construction, that every
/// write fits into the destination - for example, when filling a block with a fixed sequence
/// of fixed-width fields whose total size is known to be at most the block size.
///
/// Prefer [`RegionWriter`][crate::RegionWriter] in all other cases. There is intentionally no
/// way to turn a bounds-checked writer into an unchecked one.
///
/// # Example
///
/// ```rust
/// use staging_pool::OwnedBlock;
///
/// let block = OwnedBlock::new(16);
///
/// // SAFETY: We write exactly 4 + 12 = 16 bytes into a 16-byte block.
/// unsafe {
///     let mut writer = block.unchecked_writer();
///     writer.write_bytes(&7_u32.to_ne_bytes());
///     writer.write_str_fixed("device-0", 12);
/// }
///
/// assert_eq!(&block.as_bytes()[4..12], b"device-0");
/// assert_eq!(&block.as_bytes()[12..], &[0, 0, 0, 0]);
/// ```
#[derive(Debug)]
pub struct UncheckedWriter {
    cursor: NonNull<u8>,
}

impl UncheckedWriter {
    /// Creates a writer that starts writing at `start`.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that every write made through the returned writer targets
    /// memory that is valid for writes and not accessed through any other path while the
    /// write takes place.
    #[must_use]
    #[inline]
    pub unsafe fn new(start: NonNull<u8>) -> Self {
        Self { cursor: start }
    }

    /// Copies `bytes` to the cursor and advances the cursor past them.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `bytes.len()` bytes starting at the cursor are valid for
    /// writes and do not overlap `bytes`.
    #[inline]
    pub unsafe fn write_bytes(&mut self, bytes: &[u8]) {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.cursor.as_ptr(), bytes.len());
        }

        // SAFETY: The caller guarantees the bytes we just wrote are in bounds, so the new cursor
        // is at most one past the end of the same allocation.
        self.cursor = unsafe { self.cursor.add(bytes.len()) };
    }

    /// Writes a string into a fixed-width field of `width` bytes and advances the cursor by
    /// exactly `width` bytes.
    ///
    /// If the string is longer than the field, it is truncated. If it is shorter, the rest of
    /// the field is filled with zero bytes. There is no terminating zero byte if the string is
    /// at least `width` bytes long.
    ///
    /// Truncation operates on bytes and may split a multi-byte UTF-8 character.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `width` bytes starting at the cursor are valid for writes
    /// and do not overlap `src`.
    #[inline]
    pub unsafe fn write_str_fixed(&mut self, src: &str, width: usize) {
        let copied = src.len().min(width);

        // Cannot wrap because `copied <= width`.
        let padding = width.wrapping_sub(copied);

        // SAFETY: `copied <= width`, so both the copy and the fill stay within the `width`
        // bytes that the caller guarantees to be writable.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.cursor.as_ptr(), copied);
            ptr::write_bytes(self.cursor.as_ptr().add(copied), 0, padding);
        }

        // SAFETY: The caller guarantees `width` bytes are in bounds, so the new cursor is at
        // most one past the end of the same allocation.
        self.cursor = unsafe { self.cursor.add(width) };
    }

    /// The address where the next write will start.
    #[must_use]
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.cursor
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{Region, RegionWriter};

    assert_not_impl_any!(UncheckedWriter: Send, Sync, Clone, From<RegionWriter<'static>>);

    fn writer_for(bytes: &mut [u8]) -> UncheckedWriter {
        unsafe { UncheckedWriter::new(Region::from_slice(bytes).start()) }
    }

    #[test]
    fn write_bytes_advances_cursor() {
        let mut bytes = [0_u8; 6];
        let start = Region::from_slice(&mut bytes).start();
        let mut writer = writer_for(&mut bytes);

        unsafe {
            writer.write_bytes(&[1, 2]);
            writer.write_bytes(&[3, 4, 5]);
        }

        assert_eq!(writer.as_ptr().addr().get() - start.addr().get(), 5);
        assert_eq!(bytes, [1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn write_str_fixed_pads_short_input() {
        let mut bytes = [0xFF_u8; 8];
        let mut writer = writer_for(&mut bytes);

        unsafe {
            writer.write_str_fixed("abc", 8);
        }

        assert_eq!(&bytes, b"abc\0\0\0\0\0");
    }

    #[test]
    fn write_str_fixed_truncates_long_input() {
        let mut bytes = [0xFF_u8; 6];
        let mut writer = writer_for(&mut bytes);

        unsafe {
            writer.write_str_fixed("abcdef", 4);
            writer.write_bytes(&[9, 9]);
        }

        // No terminator when the input fills the field.
        assert_eq!(&bytes, b"abcd\x09\x09");
    }

    #[test]
    fn write_str_fixed_exact_width_has_no_terminator() {
        let mut bytes = [0xFF_u8; 4];
        let mut writer = writer_for(&mut bytes);

        unsafe {
            writer.write_str_fixed("wxyz", 4);
        }

        assert_eq!(&bytes, b"wxyz");
    }

    #[test]
    fn consecutive_fixed_fields() {
        let mut bytes = [0xFF_u8; 10];
        let mut writer = writer_for(&mut bytes);

        unsafe {
            writer.write_str_fixed("id", 4);
            writer.write_str_fixed("name", 6);
        }

        assert_eq!(&bytes, b"id\0\0name\0\0");
    }
}

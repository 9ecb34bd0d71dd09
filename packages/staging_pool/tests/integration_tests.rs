//! Integration tests for the `staging_pool` package.
//!
//! These exercise the full acquire, write, hand off, release cycle through the public API.

#![allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]

use staging_pool::{
    Error, OwnedBlock, Region, RegionPool, RegionWriter, SmallRegionWriter, aligned_size,
};

/// Stands in for a transfer mechanism that consumes a filled region.
fn fake_transfer(region: Region, written: usize) -> Vec<u8> {
    let bytes = unsafe { region.as_bytes() };
    bytes[..written].to_vec()
}

#[test]
fn staging_cycle() {
    let mut pool = RegionPool::new(32, 2);

    let region = pool.acquire();
    let mut writer = unsafe { RegionWriter::from_region(region) };

    assert!(writer.write_value(&0xABCD_u16));
    assert!(writer.write_bytes(b"frame"));
    let written = writer.bytes_written();

    let transferred = fake_transfer(region, written);
    assert_eq!(&transferred[..2], &0xABCD_u16.to_ne_bytes());
    assert_eq!(&transferred[2..], b"frame");

    pool.release(region);
    assert_eq!(pool.free_count(), 2);
}

#[test]
fn fresh_writer_matches_region_size() {
    let mut pool = RegionPool::new(100, 1);
    let region = pool.acquire();

    let writer = unsafe { RegionWriter::from_region(region) };
    assert_eq!(writer.bytes_remaining(), region.size());
    assert_eq!(writer.bytes_written(), 0);

    let small = unsafe { SmallRegionWriter::from_region(region) };
    assert_eq!(small.bytes_remaining(), region.size());
    assert_eq!(small.bytes_written(), 0);
}

#[test]
fn growth_happens_after_initial_batch() {
    let mut pool = RegionPool::new(8, 3);

    let _a = pool.acquire();
    let _b = pool.acquire();
    let _c = pool.acquire();
    assert_eq!(pool.block_count(), 3);

    let _d = pool.acquire();
    assert_eq!(pool.block_count(), 6);
}

#[test]
fn release_then_acquire_returns_same_address() {
    let mut pool = RegionPool::new(8, 4);
    let region = pool.acquire();
    let start = region.start();

    pool.release(region);

    assert_eq!(pool.acquire().start(), start);
}

#[test]
fn sixty_four_by_four_scenario() {
    let mut pool = RegionPool::new(64, 4);

    let acquired: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
    assert_eq!(pool.block_count(), 8);

    for region in &acquired {
        pool.release(*region);
    }

    for expected in acquired.iter().rev() {
        assert_eq!(pool.acquire(), *expected);
    }
}

#[test]
fn bulk_cycle() {
    let mut pool = RegionPool::new(16, 4);

    // 4 free, 9 needed: grows by 4 + 5 = 9.
    let regions = pool.acquire_many(9);
    assert_eq!(regions.len(), 9);
    assert_eq!(pool.block_count(), 13);
    assert!(regions.iter().all(|r| r.size() == 16));

    for (index, region) in regions.iter().enumerate() {
        let mut writer = unsafe { RegionWriter::from_region(*region) };
        assert!(writer.write_value(&u64::try_from(index).unwrap()));
    }

    for (index, region) in regions.iter().enumerate() {
        let bytes = unsafe { region.as_bytes() };
        assert_eq!(&bytes[..8], &u64::try_from(index).unwrap().to_ne_bytes());
    }

    pool.release_many(&regions);
    assert_eq!(pool.free_count(), 13);
}

#[test]
fn bulk_growth_with_single_block_batches() {
    let mut pool = RegionPool::new(8, 1);

    // 1 free, 50 needed: grows once by 1 + 49 = 50.
    let regions = pool.acquire_many(50);
    assert_eq!(regions.len(), 50);
    assert_eq!(pool.block_count(), 51);
    assert_eq!(pool.free_count(), 1);

    pool.release_many(&regions);
    assert_eq!(pool.free_count(), 51);

    // The last region in the released slice is on top of the stack.
    assert_eq!(pool.acquire(), regions[49]);
    assert_eq!(pool.acquire(), regions[48]);
}

#[test]
fn configuration_errors_are_reported() {
    for (block_size, allocation_amount, expected) in [
        (0, 4, Error::ZeroBlockSize),
        (64, 0, Error::ZeroAllocationAmount),
        (0, 0, Error::ZeroBlockSize),
    ] {
        let result = RegionPool::builder()
            .block_size(block_size)
            .allocation_amount(allocation_amount)
            .try_build();

        assert_eq!(result.unwrap_err(), expected);
    }
}

#[test]
fn writer_reset_allows_restaging() {
    let mut pool = RegionPool::new(4, 1);
    let region = pool.acquire();

    let mut writer = unsafe { RegionWriter::from_region(region) };
    assert!(writer.write_bytes(&[1, 1, 1, 1]));
    assert!(!writer.write_bytes(&[2]));

    writer.reset();
    assert_eq!(writer.bytes_remaining(), 4);
    assert_eq!(unsafe { region.as_bytes() }, &[1, 1, 1, 1]);

    assert!(writer.write_bytes(&[3, 3]));
    assert_eq!(unsafe { region.as_bytes() }, &[3, 3, 1, 1]);
}

#[test]
fn aligned_block_sizes() {
    let record_size = 13;
    let block_size = aligned_size(record_size, 8) * 4;

    let mut pool = RegionPool::new(block_size, 1);
    assert_eq!(pool.acquire().size(), 64);
}

#[test]
fn owned_block_outside_pool() {
    let mut block = OwnedBlock::new(6);

    let mut writer = block.writer();
    assert!(writer.write_bytes(b"abc"));
    assert!(writer.write_bytes(b"def"));
    assert!(!writer.write_bytes(b"g"));

    assert_eq!(block.as_bytes(), b"abcdef");
}

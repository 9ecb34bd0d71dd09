#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A pool of fixed-size memory blocks for staging bulk copy operations, with bounds-checked
//! write cursors for filling them.
//!
//! This crate provides [`RegionPool`], which dispenses equally sized blocks of memory as
//! [`Region`]s and takes them back when the caller is done with them. Blocks are allocated in
//! batches and reused, so repeatedly staging data of the same size (e.g. for CPU-to-device
//! transfers) does not cause per-operation heap allocations.
//!
//! # Key Features
//!
//! - **Fixed-size blocks**: Every region dispensed by a pool has the same size
//! - **Batch growth**: The pool allocates a configurable number of blocks whenever it runs dry
//! - **Stack discipline**: The most recently released region is the first to be reused
//! - **Stable addresses**: Growing the pool never moves the bytes of existing blocks
//! - **Bounded writers**: [`RegionWriter`] and [`SmallRegionWriter`] refuse writes that would
//!   overrun a region, without ever writing partial data
//! - **Explicit escape hatch**: [`UncheckedWriter`] for callers that have proven bounds externally
//!
//! # Building blocks
//!
//! - [`Region`] - a non-owning view of a contiguous range of bytes.
//! - [`OwnedBlock`] - the sole owner of one heap-allocated buffer.
//! - [`BulkAllocator`] - creates blocks in batches and keeps all of them alive.
//! - [`RegionPool`] - a free list of regions on top of a [`BulkAllocator`].
//!
//! # Example
//!
//! ```rust
//! use staging_pool::{RegionPool, RegionWriter};
//!
//! let mut pool = RegionPool::new(64, 4);
//!
//! let region = pool.acquire();
//!
//! // SAFETY: The region was just acquired from a live pool and nothing else accesses it.
//! let mut writer = unsafe { RegionWriter::from_region(region) };
//! assert!(writer.write_value(&42_u64));
//! assert!(writer.write_bytes(b"payload"));
//! assert_eq!(writer.bytes_written(), 15);
//!
//! // ... hand the region to a transfer mechanism and wait for it to complete ...
//!
//! pool.release(region);
//! ```
//!
//! # Thread safety
//!
//! Nothing in this crate is thread-safe. The pool and its regions can be moved between threads
//! but sharing them requires external synchronization.

mod allocator;
mod block;
mod builder;
mod error;
mod pool;
mod region;
mod unchecked;
mod writer;

pub use allocator::*;
pub use block::*;
pub use builder::*;
pub use error::Error;
pub(crate) use error::Result;
pub use pool::*;
pub use region::*;
pub use unchecked::*;
pub use writer::*;

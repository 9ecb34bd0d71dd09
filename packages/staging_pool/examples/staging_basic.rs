//! Demonstrates the staging cycle: acquire a region, fill it, hand it off, release it.
//!
//! Run with `RUST_LOG=trace` to see the pool's log output.

use staging_pool::{Region, RegionPool, RegionWriter};
use tracing_subscriber::EnvFilter;

/// A fixed-size record as it would be laid out for a device.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
struct Vertex {
    position: [f32; 3],
    color: u32,
}

// SAFETY: Vertex is repr(C) and consists of 16 bytes of plain data without padding.
unsafe impl bytemuck::NoUninit for Vertex {}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let vertices_per_block = 4;
    let block_size = vertices_per_block * size_of::<Vertex>();

    let mut pool = RegionPool::builder()
        .block_size(block_size)
        .allocation_amount(2)
        .build();

    let vertices: Vec<Vertex> = (0..10_u16)
        .map(|i| Vertex {
            position: [f32::from(i), 0.0, 0.0],
            color: 0xFF00_00FF,
        })
        .collect();

    let mut in_flight = Vec::new();

    for chunk in vertices.chunks(vertices_per_block) {
        let region = pool.acquire();

        // SAFETY: The region was just acquired from a live pool and nothing else accesses it.
        let mut writer = unsafe { RegionWriter::from_region(region) };
        assert!(writer.write_slice(chunk), "chunk always fits into one block");

        in_flight.push((region, writer.bytes_written()));
    }

    for (region, written) in &in_flight {
        upload(*region, *written);
    }

    let regions: Vec<Region> = in_flight.iter().map(|(region, _)| *region).collect();
    pool.release_many(&regions);

    println!(
        "pool holds {} blocks ({} bytes), {} free",
        pool.block_count(),
        pool.capacity_bytes(),
        pool.free_count()
    );
}

/// Stands in for a CPU-to-device copy.
fn upload(region: Region, written: usize) {
    println!("uploading {written} of {} bytes at {:?}", region.size(), region.start());
}

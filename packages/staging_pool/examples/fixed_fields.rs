//! Demonstrates the unchecked writer for records whose layout is known to fit.

use staging_pool::OwnedBlock;

const NAME_WIDTH: usize = 12;
const RECORD_SIZE: usize = size_of::<u32>() + NAME_WIDTH;

fn main() {
    let block = OwnedBlock::new(RECORD_SIZE * 2);

    // SAFETY: Two records of exactly RECORD_SIZE bytes each fill the block exactly.
    unsafe {
        let mut writer = block.unchecked_writer();

        writer.write_bytes(&1_u32.to_le_bytes());
        writer.write_str_fixed("sensor-a", NAME_WIDTH);

        writer.write_bytes(&2_u32.to_le_bytes());
        writer.write_str_fixed("a-name-that-is-too-long", NAME_WIDTH);
    }

    for record in block.as_bytes().chunks(RECORD_SIZE) {
        let (id, name) = record.split_at(size_of::<u32>());
        println!("{id:?} {}", String::from_utf8_lossy(name));
    }
}

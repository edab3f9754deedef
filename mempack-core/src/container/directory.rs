use crate::error::{MemPackError, Result};
use crate::types::BlockInfo;
use std::io::Write;

/// Size of one directory entry: u32 id, u32 first_chunk_id, u32 last_chunk_id,
/// u64 offset, u64 compressed_size, u64 uncompressed_size, u64 checksum.
pub const ENTRY_SIZE: usize = 4 + 4 + 4 + 8 + 8 + 8 + 8;

pub fn write_directory(mut w: impl Write, blocks: &[BlockInfo]) -> Result<()> {
    for b in blocks {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..4].copy_from_slice(&b.id.to_le_bytes());
        buf[4..8].copy_from_slice(&b.first_chunk_id.to_le_bytes());
        buf[8..12].copy_from_slice(&b.last_chunk_id.to_le_bytes());
        buf[12..20].copy_from_slice(&b.offset.to_le_bytes());
        buf[20..28].copy_from_slice(&b.compressed_size.to_le_bytes());
        buf[28..36].copy_from_slice(&b.uncompressed_size.to_le_bytes());
        buf[36..44].copy_from_slice(&b.checksum.to_le_bytes());
        w.write_all(&buf)?;
    }
    Ok(())
}

pub fn read_directory(buf: &[u8]) -> Result<Vec<BlockInfo>> {
    if buf.len() % ENTRY_SIZE != 0 {
        return Err(MemPackError::format(format!(
            "directory size {} is not a multiple of entry size {}",
            buf.len(),
            ENTRY_SIZE
        )));
    }
    let count = buf.len() / ENTRY_SIZE;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = &buf[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE];
        out.push(BlockInfo {
            id: u32::from_le_bytes(e[0..4].try_into().unwrap()),
            first_chunk_id: u32::from_le_bytes(e[4..8].try_into().unwrap()),
            last_chunk_id: u32::from_le_bytes(e[8..12].try_into().unwrap()),
            offset: u64::from_le_bytes(e[12..20].try_into().unwrap()),
            compressed_size: u64::from_le_bytes(e[20..28].try_into().unwrap()),
            uncompressed_size: u64::from_le_bytes(e[28..36].try_into().unwrap()),
            checksum: u64::from_le_bytes(e[36..44].try_into().unwrap()),
        });
    }
    Ok(out)
}

/// Binary-search the (id-sorted) directory for the block owning `chunk_id`.
pub fn find_owning_block(directory: &[BlockInfo], chunk_id: u32) -> Option<usize> {
    directory
        .binary_search_by(|b| {
            if chunk_id < b.first_chunk_id {
                std::cmp::Ordering::Greater
            } else if chunk_id > b.last_chunk_id {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<BlockInfo> {
        vec![
            BlockInfo {
                id: 0,
                first_chunk_id: 0,
                last_chunk_id: 9,
                uncompressed_size: 100,
                compressed_size: 60,
                offset: 108,
                checksum: 42,
            },
            BlockInfo {
                id: 1,
                first_chunk_id: 10,
                last_chunk_id: 19,
                uncompressed_size: 100,
                compressed_size: 58,
                offset: 168,
                checksum: 43,
            },
        ]
    }

    #[test]
    fn directory_round_trips() {
        let blocks = sample();
        let mut buf = Vec::new();
        write_directory(&mut buf, &blocks).unwrap();
        assert_eq!(buf.len(), blocks.len() * ENTRY_SIZE);
        let parsed = read_directory(&buf).unwrap();
        assert_eq!(parsed, blocks);
    }

    #[test]
    fn find_owning_block_locates_correct_entry() {
        let blocks = sample();
        assert_eq!(find_owning_block(&blocks, 0), Some(0));
        assert_eq!(find_owning_block(&blocks, 9), Some(0));
        assert_eq!(find_owning_block(&blocks, 10), Some(1));
        assert_eq!(find_owning_block(&blocks, 19), Some(1));
        assert_eq!(find_owning_block(&blocks, 20), None);
    }
}

use crate::codec::{CodecId, get_decoder_u8};
use crate::config::{HnswParams, PackConfig};
use crate::container::directory::{self, ENTRY_SIZE};
use crate::container::header::{
    FLAG_HARD_CUT_CHUNKING, FLAG_HAS_GLOBAL_HASH, FLAG_NORMALIZED, HEADER_LEN, PackHeader,
};
use crate::container::trailer::{PackTrailer, TRAILER_LEN};
use crate::error::Result;
use crate::pack::block::encode_block;
use crate::types::{BlockInfo, Chunk};
use crate::util::atomic::atomic_write;
use crate::util::checksum::xxh3_64;
use std::io::Write;
use std::path::Path;

/// Small Write adapter that counts bytes written, used to size a trial
/// compression pass before deciding whether it is worth keeping.
struct CountingWriter {
    n: u64,
}
impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.n += buf.len() as u64;
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn should_compress(u: usize, c: usize, min_gain: f32) -> bool {
    (u as f64 - c as f64) >= (u as f64 * min_gain as f64)
}

/// Groups `chunks` (already ordered by ascending id) into blocks of roughly
/// `target_block_size` uncompressed bytes, compresses each, and writes the
/// full pack file (header + blocks + directory + trailer) atomically to
/// `out`. Returns the block directory, for use in build statistics.
pub fn write_pack(
    out: &Path,
    chunks: &[Chunk],
    cfg: &PackConfig,
    dim: u32,
    model_name: &str,
    hnsw: HnswParams,
) -> Result<Vec<BlockInfo>> {
    let compressor = get_decoder_u8(cfg.compressor as u8)?;
    let mut groups: Vec<&[Chunk]> = Vec::new();
    let mut start = 0usize;
    let mut acc = 0usize;
    for (i, c) in chunks.iter().enumerate() {
        acc += c.text.len();
        if acc >= cfg.target_block_size {
            groups.push(&chunks[start..=i]);
            start = i + 1;
            acc = 0;
        }
    }
    if start < chunks.len() {
        groups.push(&chunks[start..]);
    }
    if groups.is_empty() && !chunks.is_empty() {
        groups.push(chunks);
    }

    let mut blocks = Vec::with_capacity(groups.len());
    let mut bodies: Vec<Vec<u8>> = Vec::with_capacity(groups.len());

    for (block_id, group) in groups.iter().enumerate() {
        let raw = encode_block(group)?;
        let checksum = xxh3_64(&raw);

        let mut trial = CountingWriter { n: 0 };
        compressor.compress(&mut &raw[..], &mut trial, 3)?;
        let c_size = trial.n as usize;

        let body = if cfg.compressor != CodecId::Store && should_compress(raw.len(), c_size, cfg.min_gain)
        {
            let mut out_buf = Vec::with_capacity(c_size);
            compressor.compress(&mut &raw[..], &mut out_buf, 3)?;
            out_buf
        } else {
            raw.clone()
        };

        blocks.push(BlockInfo {
            id: block_id as u32,
            first_chunk_id: group.first().map(|c| c.id).unwrap_or(0),
            last_chunk_id: group.last().map(|c| c.id).unwrap_or(0),
            uncompressed_size: raw.len() as u64,
            compressed_size: body.len() as u64,
            offset: 0, // patched below
            checksum,
        });
        bodies.push(body);
    }

    let mut cursor = HEADER_LEN;
    for b in &mut blocks {
        b.offset = cursor;
        cursor += b.compressed_size;
    }
    let directory_offset = cursor;
    let directory_size = (blocks.len() * ENTRY_SIZE) as u64;
    let trailer_offset = directory_offset + directory_size;

    let mut flags = FLAG_HAS_GLOBAL_HASH | FLAG_HARD_CUT_CHUNKING;
    if chunks.iter().all(|c| l2_is_normalized(&c.embedding)) {
        flags |= FLAG_NORMALIZED;
    }

    let header = PackHeader {
        compressor_tag: cfg.compressor as u32,
        flags,
        dim,
        model_name: model_name.to_string(),
        n_chunks: chunks.len() as u64,
        n_blocks: blocks.len() as u64,
        hnsw_m: hnsw.m as u32,
        hnsw_ef_construction: hnsw.ef_construction as u32,
        hnsw_ef_search: hnsw.ef_search as u32,
        directory_offset,
        directory_size,
        trailer_offset,
    };

    let mut directory_buf = Vec::with_capacity(directory_size as usize);
    directory::write_directory(&mut directory_buf, &blocks)?;
    let directory_checksum = xxh3_64(&directory_buf);

    atomic_write(out, |f| {
        header.write_to(&mut *f)?;
        for body in &bodies {
            f.write_all(body)?;
        }
        f.write_all(&directory_buf)?;

        let mut prefix_hasher_input = Vec::with_capacity(trailer_offset as usize);
        header.write_to(&mut prefix_hasher_input)?;
        for body in &bodies {
            prefix_hasher_input.write_all(body)?;
        }
        prefix_hasher_input.write_all(&directory_buf)?;
        let global_checksum = xxh3_64(&prefix_hasher_input);

        let trailer = PackTrailer {
            global_checksum,
            directory_checksum,
        };
        let mut trailer_buf = Vec::with_capacity(TRAILER_LEN as usize);
        trailer.write_to(&mut trailer_buf)?;
        f.write_all(&trailer_buf)?;
        Ok(())
    })?;

    Ok(blocks)
}

fn l2_is_normalized(v: &[f32]) -> bool {
    if v.is_empty() {
        return true;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    (norm - 1.0).abs() < 1e-3
}

use crate::error::{MemPackError, Result};
use crate::types::{Chunk, ChunkMeta};
use std::io::Write;

/// One block body in uncompressed form: `u32 count` then `count` records of
/// `{u32 text_len, bytes text, u32 meta_len, bytes meta_json}`.
pub fn encode_block(chunks: &[Chunk]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.write_all(&(chunks.len() as u32).to_le_bytes())?;
    for c in chunks {
        let meta_json = serde_json::to_vec(&c.meta)
            .map_err(|e| MemPackError::Internal(format!("meta serialize failed: {e}")))?;
        buf.write_all(&(c.text.len() as u32).to_le_bytes())?;
        buf.write_all(c.text.as_bytes())?;
        buf.write_all(&(meta_json.len() as u32).to_le_bytes())?;
        buf.write_all(&meta_json)?;
    }
    Ok(buf)
}

/// Decodes a block body into `(text, meta, offset_in_block)` triples, in the
/// original append order (which is also ascending chunk id order).
pub fn decode_block(buf: &[u8]) -> Result<Vec<(String, ChunkMeta, u32)>> {
    if buf.len() < 4 {
        return Err(MemPackError::format("block body truncated (missing count)"));
    }
    let count = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    let mut out = Vec::with_capacity(count);
    let mut off = 4usize;
    for _ in 0..count {
        let record_start = off as u32;
        if off + 4 > buf.len() {
            return Err(MemPackError::format("block body truncated (text_len)"));
        }
        let text_len = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap()) as usize;
        off += 4;
        if off + text_len > buf.len() {
            return Err(MemPackError::format("block body truncated (text)"));
        }
        let text = std::str::from_utf8(&buf[off..off + text_len])
            .map_err(|_| MemPackError::format("chunk text is not valid utf-8"))?
            .to_string();
        off += text_len;

        if off + 4 > buf.len() {
            return Err(MemPackError::format("block body truncated (meta_len)"));
        }
        let meta_len = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap()) as usize;
        off += 4;
        if off + meta_len > buf.len() {
            return Err(MemPackError::format("block body truncated (meta)"));
        }
        let meta: ChunkMeta = serde_json::from_slice(&buf[off..off + meta_len])
            .map_err(|e| MemPackError::format(format!("invalid meta json: {e}")))?;
        off += meta_len;

        out.push((text, meta, record_start));
    }
    Ok(out)
}

use crate::error::{MemPackError, Result};
use std::io::{Read, Write};

pub const MAGIC: &[u8; 8] = b"MPACK\0\0\0";
pub const VERSION: u64 = 1;
pub const HEADER_LEN: u64 = 120;
pub const MODEL_NAME_LEN: usize = 32;

pub const FLAG_NORMALIZED: u32 = 1 << 0;
pub const FLAG_HAS_GLOBAL_HASH: u32 = 1 << 1;
/// Records the §4.1 decision: the chunker hard-cuts at the nominal position
/// when no sentence boundary falls inside the search window.
pub const FLAG_HARD_CUT_CHUNKING: u32 = 1 << 2;

#[derive(Debug, Clone)]
pub struct PackHeader {
    pub compressor_tag: u32,
    pub flags: u32,
    pub dim: u32,
    pub model_name: String,
    pub n_chunks: u64,
    pub n_blocks: u64,
    /// HNSW build parameters, duplicated from the ANN sidecar header so a
    /// retriever can cross-check the two files agree without opening the
    /// ANN file first.
    pub hnsw_m: u32,
    pub hnsw_ef_construction: u32,
    pub hnsw_ef_search: u32,
    pub directory_offset: u64,
    pub directory_size: u64,
    pub trailer_offset: u64,
}

impl PackHeader {
    pub fn write_to(&self, mut w: impl Write) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&self.compressor_tag.to_le_bytes())?;
        w.write_all(&self.flags.to_le_bytes())?;
        w.write_all(&self.dim.to_le_bytes())?;

        let mut name_buf = [0u8; MODEL_NAME_LEN];
        let name_bytes = self.model_name.as_bytes();
        let n = name_bytes.len().min(MODEL_NAME_LEN);
        name_buf[..n].copy_from_slice(&name_bytes[..n]);
        w.write_all(&name_buf)?;

        w.write_all(&self.n_chunks.to_le_bytes())?;
        w.write_all(&self.n_blocks.to_le_bytes())?;
        w.write_all(&self.hnsw_m.to_le_bytes())?;
        w.write_all(&self.hnsw_ef_construction.to_le_bytes())?;
        w.write_all(&self.hnsw_ef_search.to_le_bytes())?;
        w.write_all(&self.directory_offset.to_le_bytes())?;
        w.write_all(&self.directory_size.to_le_bytes())?;
        w.write_all(&self.trailer_offset.to_le_bytes())?;
        w.write_all(&[0u8; 8])?; // reserved
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN as usize];
        r.read_exact(&mut buf)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN as usize {
            return Err(MemPackError::format("pack header truncated"));
        }
        if &buf[0..8] != MAGIC {
            return Err(MemPackError::format("bad pack magic"));
        }
        let version = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        if version != VERSION {
            return Err(MemPackError::format(format!(
                "unsupported pack version {version}"
            )));
        }
        let compressor_tag = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        let flags = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        let dim = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        let model_name = {
            let raw = &buf[28..60];
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[..end]).into_owned()
        };
        let n_chunks = u64::from_le_bytes(buf[60..68].try_into().unwrap());
        let n_blocks = u64::from_le_bytes(buf[68..76].try_into().unwrap());
        let hnsw_m = u32::from_le_bytes(buf[76..80].try_into().unwrap());
        let hnsw_ef_construction = u32::from_le_bytes(buf[80..84].try_into().unwrap());
        let hnsw_ef_search = u32::from_le_bytes(buf[84..88].try_into().unwrap());
        let directory_offset = u64::from_le_bytes(buf[88..96].try_into().unwrap());
        let directory_size = u64::from_le_bytes(buf[96..104].try_into().unwrap());
        let trailer_offset = u64::from_le_bytes(buf[104..112].try_into().unwrap());

        Ok(Self {
            compressor_tag,
            flags,
            dim,
            model_name,
            n_chunks,
            n_blocks,
            hnsw_m,
            hnsw_ef_construction,
            hnsw_ef_search,
            directory_offset,
            directory_size,
            trailer_offset,
        })
    }
}

use crate::error::{MemPackError, Result};
use std::io::{Read, Write};

pub const MAGIC: &[u8; 8] = b"MPACKANN";
pub const VERSION: u32 = 1;
pub const HEADER_LEN: usize = 64;

#[derive(Clone, Copy, Debug)]
pub enum DistanceTag {
    Cosine = 0,
}

#[derive(Debug, Clone)]
pub struct AnnSidecarHeader {
    pub dim: u32,
    pub n: u64,
    pub m: u32,
    pub ef_construction: u32,
    pub distance_tag: u8,
    pub ef_search: u32,
    /// xxh3 digest over the hnsw_rs-produced graph+data files, checked on load
    /// to mitigate RUSTSEC-2025-0141 (hnsw_rs's bincode deserialization being
    /// unmaintained).
    pub graph_checksum: u64,
}

impl AnnSidecarHeader {
    pub fn write_to(&self, mut w: impl Write) -> Result<()> {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&VERSION.to_le_bytes());
        buf[12..16].copy_from_slice(&self.dim.to_le_bytes());
        buf[16..24].copy_from_slice(&self.n.to_le_bytes());
        buf[24..28].copy_from_slice(&self.m.to_le_bytes());
        buf[28..32].copy_from_slice(&self.ef_construction.to_le_bytes());
        buf[32] = self.distance_tag;
        buf[36..40].copy_from_slice(&self.ef_search.to_le_bytes());
        buf[40..48].copy_from_slice(&self.graph_checksum.to_le_bytes());
        w.write_all(&buf)?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        r.read_exact(&mut buf)?;
        if &buf[0..8] != MAGIC {
            return Err(MemPackError::format("bad ANN sidecar magic"));
        }
        let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        if version != VERSION {
            return Err(MemPackError::format(format!(
                "unsupported ANN sidecar version {version}"
            )));
        }
        Ok(Self {
            dim: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            n: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            m: u32::from_le_bytes(buf[24..28].try_into().unwrap()),
            ef_construction: u32::from_le_bytes(buf[28..32].try_into().unwrap()),
            distance_tag: buf[32],
            ef_search: u32::from_le_bytes(buf[36..40].try_into().unwrap()),
            graph_checksum: u64::from_le_bytes(buf[40..48].try_into().unwrap()),
        })
    }
}

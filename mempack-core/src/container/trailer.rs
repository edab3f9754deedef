use crate::error::{MemPackError, Result};
use std::io::{Read, Write};

pub const TRAILER_LEN: u64 = 32;

/// ASCII tag packed little-endian into a u64, matching the other ASCII-based
/// magics in this format.
pub const FORMAT_SENTINEL: u64 = u64::from_le_bytes(*b"MPACKEND");

#[derive(Debug, Clone, Copy, Default)]
pub struct PackTrailer {
    pub global_checksum: u64,
    pub directory_checksum: u64,
}

impl PackTrailer {
    pub fn write_to(&self, mut w: impl Write) -> Result<()> {
        w.write_all(&self.global_checksum.to_le_bytes())?;
        w.write_all(&self.directory_checksum.to_le_bytes())?;
        w.write_all(&FORMAT_SENTINEL.to_le_bytes())?;
        w.write_all(&[0u8; 8])?; // reserved
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> Result<Self> {
        let mut buf = [0u8; TRAILER_LEN as usize];
        r.read_exact(&mut buf)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < TRAILER_LEN as usize {
            return Err(MemPackError::format("pack trailer truncated"));
        }
        let global_checksum = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let directory_checksum = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let sentinel = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        if sentinel != FORMAT_SENTINEL {
            return Err(MemPackError::format("bad trailer sentinel"));
        }
        Ok(Self {
            global_checksum,
            directory_checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_round_trips() {
        let t = PackTrailer {
            global_checksum: 111,
            directory_checksum: 222,
        };
        let mut buf = Vec::new();
        t.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), TRAILER_LEN as usize);
        let parsed = PackTrailer::read_from(&buf[..]).unwrap();
        assert_eq!(parsed.global_checksum, 111);
        assert_eq!(parsed.directory_checksum, 222);
    }

    #[test]
    fn trailer_rejects_bad_sentinel() {
        let mut buf = [0u8; TRAILER_LEN as usize];
        buf[16..24].copy_from_slice(&0u64.to_le_bytes());
        assert!(PackTrailer::parse(&buf).is_err());
    }
}

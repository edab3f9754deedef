use xxhash_rust::xxh3::Xxh3;

/// Primary wire-format checksum (blocks, directory, global trailer).
pub fn xxh3_64(data: &[u8]) -> u64 {
    let mut h = Xxh3::new();
    h.update(data);
    h.digest()
}

/// Secondary integrity primitive used by `verify()` as a cheap first pass
/// over raw page reads before the authoritative xxh3 compare.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xxh3_is_deterministic() {
        assert_eq!(xxh3_64(b"hello"), xxh3_64(b"hello"));
        assert_ne!(xxh3_64(b"hello"), xxh3_64(b"world"));
    }
}

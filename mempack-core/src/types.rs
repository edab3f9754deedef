use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Arbitrary JSON metadata attached to a chunk (source, timestamp, tags, ...).
pub type ChunkMeta = Map<String, serde_json::Value>;

/// A single unit of retrievable text together with its embedding and
/// placement inside the pack.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub id: u32,
    pub text: String,
    pub meta: ChunkMeta,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub block_id: u32,
    pub offset_in_block: u32,
}

/// Directory entry describing one compressed block of chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub id: u32,
    pub first_chunk_id: u32,
    pub last_chunk_id: u32,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub offset: u64,
    pub checksum: u64,
}

/// A single search result: score is cosine similarity (higher is better).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u32,
    pub score: f32,
    pub text: String,
    pub meta: ChunkMeta,
}

/// Counters produced by a completed build.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BuildStats {
    pub chunks: u64,
    pub blocks: u64,
    pub vectors: u64,
    pub bytes_written: u64,
    pub build_time_ms: f64,
    pub embedding_time_ms: f64,
    pub compression_ratio: f32,
}

/// Lifetime counters maintained by an open retriever.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RetrieverStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub avg_fetch_ms: f64,
    pub total_searches: u64,
    pub avg_search_ms: f64,
}

use serde::{Deserialize, Serialize};

/// Text splitting parameters (see [`crate::chunk`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    /// Half-width of the window (in chars, either side of `chunk_size`) the
    /// chunker searches for a sentence boundary before hard-cutting.
    pub boundary_window: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
            min_chunk_size: 32,
            boundary_window: 48,
        }
    }
}

/// Describes the embedding model a pack was (or should be) built with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dim: usize,
    pub batch_size: usize,
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "hashing-embedder-v1".to_string(),
            dim: 256,
            batch_size: 64,
            normalize: true,
        }
    }
}

/// HNSW construction and search parameters, stored in both the pack header
/// and the ANN sidecar header for cross-check on open.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub max_elements: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            max_elements: 1_000_000,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexType {
    Hnsw,
}

impl Default for IndexType {
    fn default() -> Self {
        IndexType::Hnsw
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    pub index_type: IndexType,
    pub hnsw: HnswParams,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_type: IndexType::default(),
            hnsw: HnswParams::default(),
        }
    }
}

/// Pack-level knobs: compressor, target block size, block cache budget.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackConfig {
    pub compressor: crate::codec::CodecId,
    /// Target uncompressed size of a block body, in bytes.
    pub target_block_size: usize,
    /// Only accept compression if it saves at least this fraction of bytes.
    pub min_gain: f32,
    /// Byte budget for the reader's decoded-block LRU cache.
    pub block_cache_bytes: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            compressor: crate::codec::CodecId::Zstd,
            target_block_size: 256 * 1024,
            min_gain: 0.05,
            block_cache_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Top-level configuration shared by the encoder and the retriever.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemPackConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub pack: PackConfig,
}

#![deny(unsafe_code)]

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod types;
pub mod config;
pub mod util;
pub mod codec;
pub mod chunk;
pub mod container;
pub mod pack;
pub mod ann;
pub mod embed;
pub mod encoder;
pub mod retriever;

pub use crate::config::MemPackConfig;
pub use crate::embed::{Embedder, HashingEmbedder};
pub use crate::encoder::MemPackEncoder;
pub use crate::error::{MemPackError, Result};
pub use crate::retriever::MemPackRetriever;
pub use crate::types::{BlockInfo, BuildStats, Chunk, ChunkMeta, RetrieverStats, SearchHit};

pub mod prelude {
    pub use crate::config::MemPackConfig;
    pub use crate::embed::{Embedder, HashingEmbedder};
    pub use crate::encoder::MemPackEncoder;
    pub use crate::error::{MemPackError, Result};
    pub use crate::retriever::MemPackRetriever;
    pub use crate::types::{BuildStats, Chunk, ChunkMeta, RetrieverStats, SearchHit};
}

#[allow(unsafe_code)]
pub mod hnsw;
pub mod sidecar;

use crate::config::HnswParams;
use crate::error::Result;
use std::path::Path;

/// A single approximate nearest-neighbor hit: `label` is the chunk id used
/// at insert time, `distance` is the raw metric distance (lower is closer).
#[derive(Clone, Copy, Debug)]
pub struct AnnHit {
    pub label: u32,
    pub distance: f32,
}

/// Narrow contract a vector index backend must satisfy. Encapsulating
/// hnsw_rs behind this trait keeps the door open for a future IVF-PQ
/// backend without touching the encoder/retriever pipelines.
pub trait VectorIndex: Send + Sync {
    fn build(vectors: &[Vec<f32>], labels: &[u32], params: HnswParams) -> Result<Self>
    where
        Self: Sized;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path, dim: usize) -> Result<Self>
    where
        Self: Sized;

    fn knn_query(&self, query: &[f32], k: usize, ef_search: usize) -> Vec<AnnHit>;

    fn set_ef_search(&self, ef_search: usize);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub use hnsw::HnswIndex;

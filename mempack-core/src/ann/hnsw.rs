//! HNSW-backed [`VectorIndex`] implementation.
//!
//! The underlying `hnsw_rs` crate serializes via bincode, which is
//! unmaintained (RUSTSEC-2025-0141); to mitigate deserialization risk this
//! module computes and verifies an xxh3 digest over the serialized graph
//! files on save/load (see [`super::sidecar`]).
//!
//! ## Self-referential load
//!
//! `HnswIo::load_hnsw()` returns an `Hnsw<'a>` borrowing from `&'a mut
//! HnswIo`. To keep a loaded index alongside its backing `HnswIo` in one
//! owned struct, `LoadedHnsw` heap-allocates the `HnswIo`, holds a raw
//! pointer to it, and transmutes the borrowed `Hnsw` to `'static` — sound
//! only because the `HnswIo` is never freed before the `Hnsw` it backs, an
//! invariant enforced by `LoadedHnsw`'s `Drop` impl (graph first, then the
//! io buffer).

use super::{AnnHit, VectorIndex};
use super::sidecar::{AnnSidecarHeader, DistanceTag};
use crate::config::HnswParams;
use crate::error::{MemPackError, Result};
use crate::util::checksum::xxh3_64;
use hnsw_rs::anndists::dist::distances::DistCosine;
use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::hnswio::HnswIo;
use std::io::Write;
use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

struct LoadedHnsw {
    io_ptr: *mut HnswIo,
    hnsw: ManuallyDrop<Hnsw<'static, f32, DistCosine>>,
}

impl Drop for LoadedHnsw {
    fn drop(&mut self) {
        // SAFETY: drop order is graph-then-io, matching the requirement
        // that the HnswIo buffer outlive every borrow into it.
        unsafe {
            ManuallyDrop::drop(&mut self.hnsw);
            drop(Box::from_raw(self.io_ptr));
        }
    }
}

// SAFETY: io_ptr only ever addresses file-backed buffers owned exclusively
// by this LoadedHnsw; all external access goes through &self methods that
// hnsw_rs itself documents as thread-safe for concurrent reads.
unsafe impl Send for LoadedHnsw {}
unsafe impl Sync for LoadedHnsw {}

enum Inner {
    Owned(Hnsw<'static, f32, DistCosine>),
    Loaded(LoadedHnsw),
}

impl Inner {
    fn hnsw(&self) -> &Hnsw<'static, f32, DistCosine> {
        match self {
            Inner::Owned(h) => h,
            Inner::Loaded(l) => &l.hnsw,
        }
    }
}

pub struct HnswIndex {
    inner: Inner,
    dim: usize,
    params: HnswParams,
    ef_search: AtomicUsize,
    len: usize,
}

impl VectorIndex for HnswIndex {
    fn build(vectors: &[Vec<f32>], labels: &[u32], params: HnswParams) -> Result<Self> {
        if vectors.len() != labels.len() {
            return Err(MemPackError::validation(
                "vectors and labels must have the same length",
            ));
        }
        if vectors.is_empty() {
            return Err(MemPackError::validation("cannot build an ANN index from zero vectors"));
        }
        let dim = vectors[0].len();
        for v in vectors {
            if v.len() != dim {
                return Err(MemPackError::validation("embedding dimension mismatch within batch"));
            }
        }

        let max_layer = 16usize;
        let hnsw: Hnsw<'static, f32, DistCosine> = Hnsw::new(
            params.m,
            params.max_elements.max(vectors.len()),
            max_layer,
            params.ef_construction,
            DistCosine {},
        );

        let data_for_insert: Vec<(&Vec<f32>, usize)> = vectors
            .iter()
            .zip(labels.iter())
            .map(|(v, &label)| (v, label as usize))
            .collect();
        hnsw.parallel_insert_data(&data_for_insert);

        Ok(Self {
            inner: Inner::Owned(hnsw),
            dim,
            params,
            ef_search: AtomicUsize::new(params.ef_search),
            len: vectors.len(),
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let basename = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MemPackError::validation("ANN path must have a file name"))?;

        self.inner
            .hnsw()
            .file_dump(dir, basename)
            .map_err(|e| MemPackError::Index(format!("hnsw file_dump failed: {e}")))?;

        let graph_path = dir.join(format!("{basename}.hnsw.graph"));
        let data_path = dir.join(format!("{basename}.hnsw.data"));
        let mut combined = std::fs::read(&graph_path)?;
        combined.extend(std::fs::read(&data_path)?);
        let graph_checksum = xxh3_64(&combined);

        let header = AnnSidecarHeader {
            dim: self.dim as u32,
            n: self.len as u64,
            m: self.params.m as u32,
            ef_construction: self.params.ef_construction as u32,
            distance_tag: DistanceTag::Cosine as u8,
            ef_search: self.current_ef_search() as u32,
            graph_checksum,
        };
        crate::util::atomic::atomic_write(path, |f| {
            header.write_to(&mut *f)?;
            f.write_all(basename.as_bytes()).map_err(MemPackError::from)
        })
    }

    fn load(path: &Path, dim: usize) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let header = AnnSidecarHeader::read_from(&bytes[..])?;
        if header.dim as usize != dim {
            tracing::warn!(
                ann_dim = header.dim,
                pack_dim = dim,
                "ANN dimension does not match pack dimension"
            );
            return Err(MemPackError::format(format!(
                "ANN dimension {} does not match pack dimension {}",
                header.dim, dim
            )));
        }
        let basename = std::str::from_utf8(&bytes[super::sidecar::HEADER_LEN..])
            .map_err(|_| MemPackError::format("ANN sidecar basename is not valid utf-8"))?
            .to_string();
        let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        let graph_path = dir.join(format!("{basename}.hnsw.graph"));
        let data_path = dir.join(format!("{basename}.hnsw.data"));
        let mut combined = std::fs::read(&graph_path)?;
        combined.extend(std::fs::read(&data_path)?);
        if xxh3_64(&combined) != header.graph_checksum {
            tracing::warn!("ANN graph checksum mismatch on load");
            return Err(MemPackError::corruption(u32::MAX, "ANN graph checksum mismatch"));
        }

        let io = Box::new(HnswIo::new(&dir, &basename));
        let io_ptr = Box::into_raw(io);
        // SAFETY: io_ptr was just allocated by Box::into_raw above and is
        // not aliased anywhere else; load_hnsw borrows from it for the
        // lifetime we extend to 'static, which LoadedHnsw's Drop respects.
        let hnsw: Hnsw<'static, f32, DistCosine> = unsafe {
            let io_ref: &mut HnswIo = &mut *io_ptr;
            std::mem::transmute(
                io_ref
                    .load_hnsw::<f32, DistCosine>()
                    .map_err(|e| MemPackError::Index(format!("hnsw load failed: {e}")))?,
            )
        };

        let params = HnswParams {
            m: header.m as usize,
            ef_construction: header.ef_construction as usize,
            ef_search: header.ef_search as usize,
            max_elements: header.n as usize,
        };

        Ok(Self {
            inner: Inner::Loaded(LoadedHnsw {
                io_ptr,
                hnsw: ManuallyDrop::new(hnsw),
            }),
            dim,
            params,
            ef_search: AtomicUsize::new(params.ef_search),
            len: header.n as usize,
        })
    }

    fn knn_query(&self, query: &[f32], k: usize, ef_search: usize) -> Vec<AnnHit> {
        self.inner
            .hnsw()
            .search(query, k, ef_search)
            .into_iter()
            .map(|n| AnnHit {
                label: n.d_id as u32,
                distance: n.distance,
            })
            .collect()
    }

    fn set_ef_search(&self, ef_search: usize) {
        self.ef_search.store(ef_search, Ordering::Relaxed);
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl HnswIndex {
    pub fn current_ef_search(&self) -> usize {
        self.ef_search.load(Ordering::Relaxed)
    }

    pub fn m(&self) -> usize {
        self.params.m
    }

    pub fn ef_construction(&self) -> usize {
        self.params.ef_construction
    }

    pub fn knn_query_default(&self, query: &[f32], k: usize) -> Vec<AnnHit> {
        self.knn_query(query, k, self.current_ef_search())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_vec(seed: u32, dim: usize) -> Vec<f32> {
        let mut v: Vec<f32> = (0..dim)
            .map(|i| ((seed as f32 * 0.1) + (i as f32 * 0.01)).sin())
            .collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    #[test]
    fn build_and_query_returns_self_as_nearest() {
        let dim = 16;
        let vectors: Vec<Vec<f32>> = (0..20).map(|i| seeded_vec(i, dim)).collect();
        let labels: Vec<u32> = (0..20).collect();
        let index = HnswIndex::build(&vectors, &labels, HnswParams::default()).unwrap();
        assert_eq!(index.len(), 20);

        let hits = index.knn_query(&vectors[5], 3, 64);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].label, 5);
    }

    #[test]
    fn build_rejects_mismatched_lengths() {
        let vectors = vec![vec![0.0f32; 4]];
        let labels: Vec<u32> = vec![];
        assert!(HnswIndex::build(&vectors, &labels, HnswParams::default()).is_err());
    }

    #[test]
    fn save_and_load_round_trips_queries() {
        let dim = 8;
        let vectors: Vec<Vec<f32>> = (0..10).map(|i| seeded_vec(i, dim)).collect();
        let labels: Vec<u32> = (0..10).collect();
        let index = HnswIndex::build(&vectors, &labels, HnswParams::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let ann_path = dir.path().join("index.ann");
        index.save(&ann_path).unwrap();

        let loaded = HnswIndex::load(&ann_path, dim).unwrap();
        assert_eq!(loaded.len(), 10);
        let hits = loaded.knn_query(&vectors[2], 1, 64);
        assert_eq!(hits[0].label, 2);
        assert_eq!(loaded.current_ef_search(), HnswParams::default().ef_search);
        assert_eq!(loaded.m(), HnswParams::default().m);
        assert_eq!(loaded.ef_construction(), HnswParams::default().ef_construction);
    }

    #[test]
    fn save_persists_custom_ef_search() {
        let dim = 8;
        let vectors: Vec<Vec<f32>> = (0..5).map(|i| seeded_vec(i, dim)).collect();
        let labels: Vec<u32> = (0..5).collect();
        let params = HnswParams {
            ef_search: 128,
            ..HnswParams::default()
        };
        let index = HnswIndex::build(&vectors, &labels, params).unwrap();
        index.set_ef_search(200);

        let dir = tempfile::tempdir().unwrap();
        let ann_path = dir.path().join("index.ann");
        index.save(&ann_path).unwrap();

        let loaded = HnswIndex::load(&ann_path, dim).unwrap();
        assert_eq!(loaded.current_ef_search(), 200);
    }
}

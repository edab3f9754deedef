use crate::ann::{HnswIndex, VectorIndex};
use crate::config::MemPackConfig;
use crate::embed::Embedder;
use crate::error::{MemPackError, Result};
use crate::pack::reader::PackReader;
use crate::types::{ChunkMeta, RetrieverStats, SearchHit};
use crate::util::timer::Timer;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_searches: AtomicU64,
    search_time_ns: AtomicU64,
    fetch_time_ns: AtomicU64,
}

/// Opens a pack + ANN file pair and answers top-k semantic queries against
/// them. Lifecycle is `Open -> Closed`; `close()` is idempotent and a
/// `Drop` impl closes automatically if still open when the retriever goes
/// out of scope.
pub struct MemPackRetriever<'a> {
    state: State,
    pack: PackReader,
    ann: HnswIndex,
    embedder: &'a dyn Embedder,
    config: MemPackConfig,
    counters: Counters,
}

impl<'a> MemPackRetriever<'a> {
    pub fn open(
        pack_path: &Path,
        ann_path: &Path,
        embedder: &'a dyn Embedder,
        config: MemPackConfig,
    ) -> Result<Self> {
        let pack = PackReader::open(pack_path, config.pack.block_cache_bytes)?;
        if pack.header.dim as usize != config.embedding.dim {
            tracing::warn!(
                pack_dim = pack.header.dim,
                config_dim = config.embedding.dim,
                "pack embedding dim does not match configured dim"
            );
            return Err(MemPackError::format(format!(
                "pack embedding dim {} does not match configured dim {}",
                pack.header.dim, config.embedding.dim
            )));
        }
        if pack.header.model_name != embedder.model_name() {
            tracing::warn!(
                pack_model = %pack.header.model_name,
                query_model = %embedder.model_name(),
                "embedder model name does not match the pack's recorded model"
            );
        }

        let ann = HnswIndex::load(ann_path, config.embedding.dim)?;
        if pack.header.hnsw_m as usize != ann.m()
            || pack.header.hnsw_ef_construction as usize != ann.ef_construction()
            || pack.header.hnsw_ef_search as usize != ann.current_ef_search()
        {
            tracing::warn!(
                header_m = pack.header.hnsw_m,
                header_ef_construction = pack.header.hnsw_ef_construction,
                header_ef_search = pack.header.hnsw_ef_search,
                ann_m = ann.m(),
                ann_ef_construction = ann.ef_construction(),
                ann_ef_search = ann.current_ef_search(),
                "HNSW params mismatch between pack header and ANN file"
            );
            return Err(MemPackError::format(format!(
                "HNSW params mismatch between pack header (m={}, ef_construction={}, ef_search={}) \
                 and ANN file (m={}, ef_construction={}, ef_search={})",
                pack.header.hnsw_m,
                pack.header.hnsw_ef_construction,
                pack.header.hnsw_ef_search,
                ann.m(),
                ann.ef_construction(),
                ann.current_ef_search()
            )));
        }

        Ok(Self {
            state: State::Open,
            pack,
            ann,
            embedder,
            config,
            counters: Counters::default(),
        })
    }

    /// Marks the retriever closed. Idempotent; further `search`/`get_chunk`
    /// calls return an error after this.
    pub fn close(&mut self) {
        self.state = State::Closed;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state != State::Open {
            return Err(MemPackError::Internal("retriever is closed".to_string()));
        }
        Ok(())
    }

    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&dyn Fn(&ChunkMeta) -> bool>,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_open()?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut timer = Timer::new();
        timer.start();

        let mut query_vec = self
            .embedder
            .embed(&[query])?
            .into_iter()
            .next()
            .ok_or_else(|| MemPackError::Embed("embedder returned no vector for query".to_string()))?;
        if self.config.embedding.normalize {
            let norm: f32 = query_vec.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut query_vec {
                    *x /= norm;
                }
            }
        }

        let over_fetch = if filter.is_some() { top_k.saturating_mul(4).max(top_k + 8) } else { top_k };
        let ef_search = self.ann.current_ef_search().max(over_fetch);
        let hits = self.ann.knn_query(&query_vec, over_fetch, ef_search);

        let ids: Vec<u32> = hits.iter().map(|h| h.label).collect();
        let mut fetch_timer = Timer::new();
        fetch_timer.start();
        let fetched = self.pack.get_chunks(ids)?;
        fetch_timer.stop();
        self.counters
            .fetch_time_ns
            .fetch_add((fetch_timer.elapsed_ms() * 1_000_000.0) as u64, Ordering::Relaxed);

        let mut by_id: std::collections::HashMap<u32, (String, ChunkMeta)> = fetched
            .into_iter()
            .map(|(id, text, meta)| (id, (text, meta)))
            .collect();

        let mut out: Vec<SearchHit> = Vec::with_capacity(hits.len());
        for hit in &hits {
            let Some((text, meta)) = by_id.remove(&hit.label) else {
                continue;
            };
            if let Some(f) = filter {
                if !f(&meta) {
                    continue;
                }
            }
            out.push(SearchHit {
                id: hit.label,
                score: 1.0 - hit.distance,
                text,
                meta,
            });
        }

        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        out.truncate(top_k);

        timer.stop();
        self.counters.total_searches.fetch_add(1, Ordering::Relaxed);
        self.counters
            .search_time_ns
            .fetch_add((timer.elapsed_ms() * 1_000_000.0) as u64, Ordering::Relaxed);

        Ok(out)
    }

    pub fn search_batch(
        &self,
        queries: &[&str],
        top_k: usize,
        filter: Option<&dyn Fn(&ChunkMeta) -> bool>,
    ) -> Result<Vec<Vec<SearchHit>>> {
        queries.iter().map(|q| self.search(q, top_k, filter)).collect()
    }

    pub fn get_chunk_by_id(&self, id: u32) -> Result<(String, ChunkMeta)> {
        self.ensure_open()?;
        match self.pack.get_chunk(id) {
            Ok(v) => {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                Ok(v)
            }
            Err(e) => {
                self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn verify(&self) -> std::result::Result<(), u32> {
        self.pack.verify()
    }

    pub fn get_stats(&self) -> RetrieverStats {
        let total_searches = self.counters.total_searches.load(Ordering::Relaxed);
        let search_ns = self.counters.search_time_ns.load(Ordering::Relaxed);
        let fetch_ns = self.counters.fetch_time_ns.load(Ordering::Relaxed);
        RetrieverStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            avg_fetch_ms: if total_searches == 0 {
                0.0
            } else {
                (fetch_ns as f64 / total_searches as f64) / 1_000_000.0
            },
            total_searches,
            avg_search_ms: if total_searches == 0 {
                0.0
            } else {
                (search_ns as f64 / total_searches as f64) / 1_000_000.0
            },
        }
    }
}

impl<'a> Drop for MemPackRetriever<'a> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemPackConfig;
    use crate::embed::HashingEmbedder;
    use crate::encoder::MemPackEncoder;
    use crate::types::ChunkMeta;
    use serde_json::json;

    fn build_sample(dir: &std::path::Path, dim: usize) -> MemPackConfig {
        let mut cfg = MemPackConfig::default();
        cfg.embedding.dim = dim;
        let embedder = HashingEmbedder::new(dim);
        let mut encoder = MemPackEncoder::new(cfg.clone(), &embedder);

        let mut meta_ai = ChunkMeta::new();
        meta_ai.insert("topic".to_string(), json!("ai"));
        encoder.add_text(
            "Artificial intelligence studies agents that perceive and act rationally.",
            meta_ai,
        );

        let mut meta_ml = ChunkMeta::new();
        meta_ml.insert("topic".to_string(), json!("ml"));
        encoder.add_text(
            "Machine learning builds models from data rather than explicit rules.",
            meta_ml,
        );

        let mut meta_dl = ChunkMeta::new();
        meta_dl.insert("topic".to_string(), json!("dl"));
        encoder.add_text(
            "Deep learning stacks neural network layers to learn representations.",
            meta_dl,
        );

        encoder
            .build(&dir.join("kb.mpack"), &dir.join("kb.ann"))
            .unwrap();
        cfg
    }

    #[test]
    fn search_returns_ranked_hits() {
        let dir = tempfile::tempdir().unwrap();
        let dim = 32;
        let cfg = build_sample(dir.path(), dim);
        let embedder = HashingEmbedder::new(dim);
        let retriever = MemPackRetriever::open(
            &dir.path().join("kb.mpack"),
            &dir.path().join("kb.ann"),
            &embedder,
            cfg,
        )
        .unwrap();

        let hits = retriever.search("machine learning models", 2, None).unwrap();
        assert!(!hits.is_empty());
        assert!(hits.len() <= 2);
        for w in hits.windows(2) {
            assert!(w[0].score >= w[1].score);
        }
        assert_eq!(retriever.get_stats().total_searches, 1);
    }

    #[test]
    fn search_applies_meta_filter() {
        let dir = tempfile::tempdir().unwrap();
        let dim = 32;
        let cfg = build_sample(dir.path(), dim);
        let embedder = HashingEmbedder::new(dim);
        let retriever = MemPackRetriever::open(
            &dir.path().join("kb.mpack"),
            &dir.path().join("kb.ann"),
            &embedder,
            cfg,
        )
        .unwrap();

        let filter = |m: &ChunkMeta| m.get("topic").and_then(|v| v.as_str()) == Some("dl");
        let hits = retriever.search("neural networks", 5, Some(&filter)).unwrap();
        assert!(hits.iter().all(|h| h.meta.get("topic").and_then(|v| v.as_str()) == Some("dl")));
    }

    #[test]
    fn close_is_idempotent_and_blocks_search() {
        let dir = tempfile::tempdir().unwrap();
        let dim = 32;
        let cfg = build_sample(dir.path(), dim);
        let embedder = HashingEmbedder::new(dim);
        let mut retriever = MemPackRetriever::open(
            &dir.path().join("kb.mpack"),
            &dir.path().join("kb.ann"),
            &embedder,
            cfg,
        )
        .unwrap();

        retriever.close();
        retriever.close();
        assert!(retriever.search("anything", 1, None).is_err());
    }

    #[test]
    fn open_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let dim = 32;
        let mut cfg = build_sample(dir.path(), dim);
        cfg.embedding.dim = dim + 1;
        let embedder = HashingEmbedder::new(dim + 1);
        let result = MemPackRetriever::open(
            &dir.path().join("kb.mpack"),
            &dir.path().join("kb.ann"),
            &embedder,
            cfg,
        );
        assert!(matches!(result, Err(MemPackError::Format(_))));
    }

    #[test]
    fn open_rejects_hnsw_param_mismatch() {
        use crate::container::header::{HEADER_LEN, PackHeader};

        let dir = tempfile::tempdir().unwrap();
        let dim = 32;
        let cfg = build_sample(dir.path(), dim);
        let pack_path = dir.path().join("kb.mpack");

        // Rewrite the pack header's recorded ef_search so it disagrees with
        // the ANN file's actual value, without touching anything checksummed.
        let mut bytes = std::fs::read(&pack_path).unwrap();
        let mut header = PackHeader::parse(&bytes).unwrap();
        header.hnsw_ef_search += 1;
        let mut new_header_bytes = Vec::new();
        header.write_to(&mut new_header_bytes).unwrap();
        bytes[..HEADER_LEN as usize].copy_from_slice(&new_header_bytes);
        std::fs::write(&pack_path, &bytes).unwrap();

        let embedder = HashingEmbedder::new(dim);
        let result = MemPackRetriever::open(&pack_path, &dir.path().join("kb.ann"), &embedder, cfg);
        assert!(matches!(result, Err(MemPackError::Format(_))));
    }
}

use crate::ann::{HnswIndex, VectorIndex};
use crate::chunk::chunk_text;
use crate::config::MemPackConfig;
use crate::embed::Embedder;
use crate::error::{MemPackError, Result};
use crate::pack::writer::write_pack;
use crate::types::{BuildStats, Chunk, ChunkMeta};
use crate::util::timer::Timer;
use std::path::Path;

struct PendingDoc {
    text: String,
    meta: ChunkMeta,
}

/// Builds a pack + ANN index pair from a set of text documents.
pub struct MemPackEncoder<'a> {
    config: MemPackConfig,
    embedder: &'a dyn Embedder,
    pending: Vec<PendingDoc>,
}

impl<'a> MemPackEncoder<'a> {
    pub fn new(config: MemPackConfig, embedder: &'a dyn Embedder) -> Self {
        Self {
            config,
            embedder,
            pending: Vec::new(),
        }
    }

    /// Queues a document for chunking and embedding. `meta` is attached to
    /// every chunk produced from `text`.
    pub fn add_text(&mut self, text: &str, meta: ChunkMeta) {
        self.pending.push(PendingDoc {
            text: text.to_string(),
            meta,
        });
    }

    /// Walks `dir` for files matching `pattern` (a glob relative to `dir`),
    /// reads each as UTF-8, and queues it with a `source` meta field set to
    /// its path. Returns the number of files queued.
    pub fn add_directory(&mut self, dir: &Path, pattern: &str) -> Result<usize> {
        let full_pattern = dir.join(pattern);
        let full_pattern_str = full_pattern
            .to_str()
            .ok_or_else(|| MemPackError::validation("directory path is not valid utf-8"))?;

        let mut count = 0usize;
        for entry in glob::glob(full_pattern_str)
            .map_err(|e| MemPackError::validation(format!("bad glob pattern: {e}")))?
        {
            let path = entry.map_err(|e| MemPackError::Io(e.into_error()))?;
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            let mut meta = ChunkMeta::new();
            meta.insert(
                "source".to_string(),
                serde_json::Value::String(path.display().to_string()),
            );
            self.add_text(&text, meta);
            count += 1;
        }
        Ok(count)
    }

    /// Chunks and embeds every queued document, writes the pack and ANN
    /// files, and returns build statistics. Consumes the queued documents.
    pub fn build(mut self, pack_path: &Path, ann_path: &Path) -> Result<BuildStats> {
        let mut total_timer = Timer::new();
        total_timer.start();

        let _span = tracing::info_span!("mempack_build", docs = self.pending.len()).entered();

        let mut texts: Vec<String> = Vec::new();
        let mut metas: Vec<ChunkMeta> = Vec::new();
        for doc in self.pending.drain(..) {
            let pieces = chunk_text(&doc.text, &self.config.chunking);
            tracing::debug!(pieces = pieces.len(), "chunked document");
            for piece in pieces {
                texts.push(piece);
                metas.push(doc.meta.clone());
            }
        }

        if texts.is_empty() {
            return Err(MemPackError::validation(
                "no chunks produced from the queued documents",
            ));
        }

        let dim = self.config.embedding.dim;
        let batch_size = self.config.embedding.batch_size.max(1);
        let mut embed_timer = Timer::new();
        embed_timer.start();

        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let refs: Vec<&str> = batch.iter().map(|s| s.as_str()).collect();
            let mut batch_embeddings = self.embedder.embed(&refs)?;
            for v in &batch_embeddings {
                if v.len() != dim {
                    return Err(MemPackError::Embed(format!(
                        "embedder returned dim {}, expected {}",
                        v.len(),
                        dim
                    )));
                }
            }
            if self.config.embedding.normalize {
                use rayon::prelude::*;
                batch_embeddings.par_iter_mut().for_each(|v| normalize(v));
            }
            embeddings.append(&mut batch_embeddings);
        }
        embed_timer.stop();

        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(metas)
            .zip(embeddings.iter().cloned())
            .enumerate()
            .map(|(i, ((text, meta), embedding))| Chunk {
                id: i as u32,
                text,
                meta,
                embedding,
                block_id: 0,
                offset_in_block: 0,
            })
            .collect();

        let blocks = {
            let _span = tracing::info_span!("pack_write", chunks = chunks.len()).entered();
            write_pack(
                pack_path,
                &chunks,
                &self.config.pack,
                dim as u32,
                &self.config.embedding.model_name,
                self.config.index.hnsw,
            )?
        };

        let labels: Vec<u32> = chunks.iter().map(|c| c.id).collect();
        {
            let _span = tracing::info_span!("ann_build", vectors = embeddings.len()).entered();
            let index = HnswIndex::build(&embeddings, &labels, self.config.index.hnsw)?;
            index.save(ann_path)?;
        }

        total_timer.stop();

        let bytes_written: u64 = blocks.iter().map(|b| b.compressed_size).sum();
        let uncompressed: u64 = blocks.iter().map(|b| b.uncompressed_size).sum();
        let compression_ratio = if bytes_written == 0 {
            1.0
        } else {
            uncompressed as f32 / bytes_written as f32
        };

        Ok(BuildStats {
            chunks: chunks.len() as u64,
            blocks: blocks.len() as u64,
            vectors: embeddings.len() as u64,
            bytes_written,
            build_time_ms: total_timer.elapsed_ms(),
            embedding_time_ms: embed_timer.elapsed_ms(),
            compression_ratio,
        })
    }
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;

    #[test]
    fn build_rejects_empty_input() {
        let cfg = MemPackConfig::default();
        let embedder = HashingEmbedder::new(cfg.embedding.dim);
        let encoder = MemPackEncoder::new(cfg, &embedder);
        let dir = tempfile::tempdir().unwrap();
        let result = encoder.build(&dir.path().join("p.mpack"), &dir.path().join("p.ann"));
        assert!(result.is_err());
    }

    #[test]
    fn build_produces_stats_for_three_records() {
        let mut cfg = MemPackConfig::default();
        cfg.embedding.dim = 32;
        let embedder = HashingEmbedder::new(cfg.embedding.dim);
        let mut encoder = MemPackEncoder::new(cfg, &embedder);
        encoder.add_text("Artificial intelligence is the study of intelligent agents.", ChunkMeta::new());
        encoder.add_text("Machine learning is a subset of AI focused on data-driven models.", ChunkMeta::new());
        encoder.add_text("Deep learning uses layered neural networks to learn representations.", ChunkMeta::new());

        let dir = tempfile::tempdir().unwrap();
        let stats = encoder
            .build(&dir.path().join("kb.mpack"), &dir.path().join("kb.ann"))
            .unwrap();
        assert!(stats.chunks >= 3);
        assert_eq!(stats.vectors, stats.chunks);
        assert!(stats.blocks >= 1);
    }
}

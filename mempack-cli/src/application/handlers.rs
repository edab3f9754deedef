use std::path::{Path, PathBuf};

use mempack_core::ann::{HnswIndex, VectorIndex};
use mempack_core::config::MemPackConfig;
use mempack_core::embed::HashingEmbedder;
use mempack_core::encoder::MemPackEncoder;
use mempack_core::error::{MemPackError, Result};
use mempack_core::pack::reader::PackReader;
use mempack_core::retriever::MemPackRetriever;
use mempack_core::types::ChunkMeta;

fn load_config(path: Option<PathBuf>) -> Result<MemPackConfig> {
    match path {
        None => Ok(MemPackConfig::default()),
        Some(p) => {
            let text = std::fs::read_to_string(&p)?;
            toml::from_str(&text)
                .map_err(|e| MemPackError::validation(format!("bad config at {}: {e}", p.display())))
        }
    }
}

fn parse_filter(spec: &str) -> Result<(String, String)> {
    let (key, value) = spec
        .split_once('=')
        .ok_or_else(|| MemPackError::validation("--filter must be of the form key=value"))?;
    Ok((key.to_string(), value.to_string()))
}

pub fn handle_build(
    input: PathBuf,
    pattern: String,
    pack: PathBuf,
    ann: PathBuf,
    config: Option<PathBuf>,
) -> Result<()> {
    let cfg = load_config(config)?;
    let embedder = HashingEmbedder::new(cfg.embedding.dim);
    let mut encoder = MemPackEncoder::new(cfg, &embedder);
    let n = encoder.add_directory(&input, &pattern)?;
    tracing::info!(files = n, input = %input.display(), "queued documents");

    let stats = encoder.build(&pack, &ann)?;
    let rendered = serde_json::to_string_pretty(&stats)
        .map_err(|e| MemPackError::Internal(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

pub fn handle_search(
    pack: PathBuf,
    ann: PathBuf,
    query: String,
    top_k: usize,
    filter: Option<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    let cfg = load_config(config)?;
    let embedder = HashingEmbedder::new(cfg.embedding.dim);
    let retriever = MemPackRetriever::open(&pack, &ann, &embedder, cfg)?;

    let parsed_filter = filter.as_deref().map(parse_filter).transpose()?;
    let predicate = |meta: &ChunkMeta| -> bool {
        match &parsed_filter {
            None => true,
            Some((key, value)) => meta
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s == value)
                .unwrap_or(false),
        }
    };
    let filter_ref: Option<&dyn Fn(&ChunkMeta) -> bool> = if parsed_filter.is_some() {
        Some(&predicate)
    } else {
        None
    };

    let hits = retriever.search(&query, top_k, filter_ref)?;
    let rendered = serde_json::to_string_pretty(&hits)
        .map_err(|e| MemPackError::Internal(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

pub fn handle_verify(pack: PathBuf) -> Result<()> {
    let reader = PackReader::open(&pack, 64 * 1024 * 1024)?;
    match reader.verify() {
        Ok(()) => {
            eprintln!("verify: OK ({} chunks)", reader.n_chunks());
            Ok(())
        }
        Err(u32::MAX) => Err(MemPackError::corruption(u32::MAX, "directory or trailer checksum mismatch")),
        Err(block_id) => Err(MemPackError::corruption(block_id, "block checksum mismatch")),
    }
}

pub fn handle_stats(pack: PathBuf, ann: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let cfg = load_config(config)?;
    let reader = PackReader::open(&pack, cfg.pack.block_cache_bytes)?;
    let index = HnswIndex::load(&ann, cfg.embedding.dim)?;

    println!(
        "{}",
        serde_json::json!({
            "n_chunks": reader.n_chunks(),
            "n_blocks": reader.directory.len(),
            "ann_vectors": index.len(),
            "dim": reader.header.dim,
            "model_name": reader.header.model_name,
            "pack_path": path_str(&pack),
            "ann_path": path_str(&ann),
        })
    );
    Ok(())
}

fn path_str(p: &Path) -> String {
    p.display().to_string()
}

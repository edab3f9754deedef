//! The embedding model itself is an external collaborator: this module
//! defines the trait real model-backed embedders (ONNX, HTTP) implement, and
//! a deterministic, dependency-free default so the crate is runnable and
//! testable without a live model.

use crate::error::{MemPackError, Result};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn model_name(&self) -> &str;
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic bag-of-tokens embedder: hashes each token into one of `dim`
/// buckets and L2-normalizes the result. Not semantically meaningful, but
/// stable across runs, which is what the build/search integration tests and
/// the CLI need.
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "hashing-embedder-v1"
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if self.dim == 0 {
            return Err(MemPackError::validation("embedding dimension must be > 0"));
        }
        Ok(texts.iter().map(|t| embed_one(t, self.dim)).collect())
    }
}

fn embed_one(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    for token in text.split_whitespace() {
        let h = fnv1a(token.as_bytes());
        let bucket = (h as usize) % dim;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_is_deterministic_and_normalized() {
        let e = HashingEmbedder::new(32);
        let a = e.embed(&["hello world"]).unwrap();
        let b = e.embed(&["hello world"]).unwrap();
        assert_eq!(a, b);
        let norm: f32 = a[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[test]
    fn embed_rejects_zero_dim() {
        let e = HashingEmbedder::new(0);
        assert!(e.embed(&["x"]).is_err());
    }
}

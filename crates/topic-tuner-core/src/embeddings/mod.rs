//! Document embedding providers.
//!
//! The tuner treats embeddings as a pure input. [`EmbeddingProvider`] is the
//! seam for real models; [`HashingEmbedder`] is a deterministic,
//! dependency-free provider based on signed feature hashing of word unigrams
//! and bigrams.

use std::fmt;

use rayon::prelude::*;

use crate::error::{Result, TunerError};
use crate::matrix::EmbeddingMatrix;

/// Default output dimension of [`HashingEmbedder`].
pub const DEFAULT_HASHING_DIMENSION: usize = 256;

/// Weight of a bigram relative to a unigram.
const BIGRAM_WEIGHT: f32 = 0.5;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Turns documents into one fixed-length vector each.
pub trait EmbeddingProvider: Send + Sync + fmt::Debug {
    /// Embed `documents` in order, one row per document.
    ///
    /// # Errors
    ///
    /// `EmptyInput` when `documents` is empty.
    fn embed(&self, documents: &[String]) -> Result<EmbeddingMatrix>;

    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Identifier of the model.
    fn model_id(&self) -> &str;
}

/// Signed feature-hashing embedder, L2-normalised.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    bigrams: bool,
    model_id: String,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl HashingEmbedder {
    /// Embedder with the given dimension, bigrams enabled.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            bigrams: true,
            model_id: format!("hashing-{dimension}"),
        }
    }

    /// Toggle bigram features.
    #[must_use]
    pub fn with_bigrams(mut self, enabled: bool) -> Self {
        self.bigrams = enabled;
        self
    }

    /// Embed a single document.
    pub fn embed_one(&self, document: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        let tokens = tokenize(document);

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        if self.bigrams {
            for pair in tokens.windows(2) {
                self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, documents: &[String]) -> Result<EmbeddingMatrix> {
        if documents.is_empty() {
            return Err(TunerError::EmptyInput);
        }
        if self.dimension == 0 {
            return Err(TunerError::invalid_configuration(
                "hashing dimension must be >= 1",
            ));
        }

        let data: Vec<f32> = documents
            .par_iter()
            .flat_map_iter(|doc| self.embed_one(doc))
            .collect();

        tracing::debug!(
            documents = documents.len(),
            dimension = self.dimension,
            model = %self.model_id,
            "Documents embedded"
        );

        EmbeddingMatrix::from_flat(data, documents.len(), self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// 64-bit FNV-1a. Stable across platforms and compiler releases.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |h, &b| {
        (h ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Lowercased alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::cosine_similarity;

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(tokenize("Hello, World! rust-lang 2024"), vec!["hello", "world", "rust", "lang", "2024"]);
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_feature_hash_is_fixed() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"rust"), 0xbffe_df1f_6f66_c727);

        // "a" lands in bucket 4 of 8 with a negative sign.
        let v = HashingEmbedder::new(8).with_bigrams(false).embed_one("a");
        assert_eq!(v, vec![0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0]);
        println!("[PASS] test_feature_hash_is_fixed");
    }

    #[test]
    fn test_embed_shape_and_norm() {
        let e = HashingEmbedder::new(64);
        let m = e.embed(&docs(&["the cat sat", "a dog ran", ""])).unwrap();
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_cols(), 64);
        for i in 0..2 {
            let norm: f32 = m.row(i).iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        assert!(m.row(2).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_embed_is_deterministic() {
        let e = HashingEmbedder::default();
        let d = docs(&["gradient descent converges", "topic models cluster documents"]);
        assert_eq!(e.embed(&d).unwrap(), e.embed(&d).unwrap());
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let e = HashingEmbedder::default();
        let a = e.embed_one("rust borrow checker lifetimes ownership");
        let b = e.embed_one("ownership and lifetimes in the rust borrow checker");
        let c = e.embed_one("banana bread recipe with walnuts");
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
        println!("[PASS] test_shared_vocabulary_is_closer");
    }

    #[test]
    fn test_empty_document_list_rejected() {
        assert_eq!(HashingEmbedder::default().embed(&[]).unwrap_err(), TunerError::EmptyInput);
    }

    #[test]
    fn test_model_id_names_dimension() {
        let e = HashingEmbedder::new(128).with_bigrams(false);
        assert_eq!(e.model_id(), "hashing-128");
        assert_eq!(e.dimension(), 128);
    }
}

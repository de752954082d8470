//! Feature-hashing embedder.
//!
//! Produces deterministic dense vectors by hashing lowercase terms into
//! fixed-dimension buckets (FNV-1a) weighted by term frequency. Not as
//! semantically rich as a neural model, but always available and stable
//! across runs, which makes it the default for offline evaluation and tests.

use crate::embed::{Embedder, Embedding};
use crate::error::Result;
use crate::hnsw::l2_normalize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Hash a term into a bucket index using FNV-1a.
    fn bucket(&self, term: &str) -> usize {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        (h % self.dimension as u64) as usize
    }

    /// Embeds one text; the result is unit length unless the text has no terms.
    pub fn embed_one(&self, text: &str) -> Embedding {
        let mut tf: HashMap<String, f32> = HashMap::new();
        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
        {
            *tf.entry(term.to_lowercase()).or_default() += 1.0;
        }

        let mut v = vec![0.0f32; self.dimension];
        // Sorted so float accumulation order never depends on HashMap iteration.
        let mut terms: Vec<(String, f32)> = tf.into_iter().collect();
        terms.sort_by(|a, b| a.0.cmp(&b.0));
        for (term, count) in &terms {
            // Dampen very short terms, which are mostly function words.
            let weight = 1.0 + (term.chars().count() as f32).ln();
            v[self.bucket(term)] += count.sqrt() * weight;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::dot;

    #[test]
    fn test_deterministic_and_normalized() {
        let e = HashingEmbedder::new(64);
        let a = e.embed_one("The first President of the United States");
        let b = e.embed_one("The first President of the United States");
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_texts_closer() {
        let e = HashingEmbedder::new(256);
        let q = e.embed_one("president united states");
        let near = e.embed_one("george washington president of the united states");
        let far = e.embed_one("photosynthesis in green plants");
        assert!(dot(&q, &near) > dot(&q, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed_one("  ").iter().all(|&x| x == 0.0));
    }
}

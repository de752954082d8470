//! Text embedding interface.
//!
//! Dense retrieval needs one vector per document body and one per query. The
//! embedding model is an external collaborator behind [`Embedder`]; the
//! pipeline always calls it through [`embed_in_batches`], which also
//! L2-normalizes every output so inner product equals cosine similarity.

mod hashing;

pub use hashing::HashingEmbedder;

use crate::error::{Error, Result};
use crate::hnsw::l2_normalize;

/// A vector embedding.
pub type Embedding = Vec<f32>;

/// Trait for text embedding models.
pub trait Embedder: Send + Sync {
    /// Embed one batch of texts. Outputs need not be normalized.
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn name(&self) -> &str;
}

/// Embeds `texts` with one call per `batch_size` chunk and normalizes every vector.
///
/// A failing call, a short batch, or a vector of the wrong width yields
/// [`Error::EmbeddingUnavailable`].
pub fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Embedding>> {
    if batch_size == 0 {
        return Err(Error::InvalidInput("embed batch size must be > 0".into()));
    }
    let dim = embedder.dimension();
    let mut out = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let batch = embedder.embed(chunk).map_err(|e| match e {
            Error::EmbeddingUnavailable(msg) => Error::EmbeddingUnavailable(msg),
            other => Error::EmbeddingUnavailable(format!("{}: {other}", embedder.name())),
        })?;
        if batch.len() != chunk.len() {
            return Err(Error::EmbeddingUnavailable(format!(
                "{} returned {} vectors for {} texts",
                embedder.name(),
                batch.len(),
                chunk.len()
            )));
        }
        for mut v in batch {
            if v.len() != dim {
                return Err(Error::EmbeddingUnavailable(format!(
                    "{} returned a {}-wide vector, expected {dim}",
                    embedder.name(),
                    v.len()
                )));
            }
            l2_normalize(&mut v);
            out.push(v);
        }
    }
    Ok(out)
}

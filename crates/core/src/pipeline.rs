//! End-to-end retrieval, feature extraction, ranking and evaluation.
//!
//! A [`RetrievalPipeline`] owns the document store and both indices. It is
//! never mutated after construction, so per-query work fans out over `rayon`
//! with shared `&self` borrows. The cross-encoder is the one stage that does
//! not run per query: every candidate of every query is scored in a single
//! batched pass between the two feature phases.

use crate::bm25::{score_all, tokenize, top_k, InvertedIndex};
use crate::config::{PipelineConfig, BM25_B, BM25_EPSILON, BM25_K1};
use crate::document::{DocumentStore, Query};
use crate::embed::{embed_in_batches, Embedder, Embedding};
use crate::error::{Error, Result};
use crate::eval::{evaluate_results, titles_match, Metrics};
use crate::features::{
    FeatureExtractor, FeatureVector, PartialFeatures, QueryContext, FEATURE_DIM, FEATURE_NAMES,
};
use crate::hnsw::HnswIndex;
use crate::ranker::{LogisticRanker, TrainConfig};
use crate::scoring::{score_in_batches, RelevanceScorer};
use crate::search::fuse_candidates;
use crate::storage::{ArtifactHeader, ArtifactKind, ArtifactStore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const LEXICAL_SCHEMA_VERSION: u32 = 2;
pub const DENSE_SCHEMA_VERSION: u32 = 1;
pub const RANKER_SCHEMA_VERSION: u32 = 1;

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub doc_id: u32,
    pub title: String,
    /// Ranker probability.
    pub score: f32,
}

/// Ranked candidates of one query, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Index of the query in the input slice.
    pub query_id: usize,
    pub entries: Vec<RankedEntry>,
}

/// Fused candidates of one query plus the per-query signals features need.
#[derive(Debug, Clone)]
pub struct QueryCandidates {
    pub query_id: usize,
    /// Dense hits first, then lexical hits, deduplicated.
    pub doc_ids: Vec<u32>,
    /// BM25 score of every document for the clue.
    pub lexical_scores: Vec<f32>,
    /// Normalized embedding of the full query text.
    pub query_embedding: Embedding,
}

/// Read-only retrieval state: documents, lexical index, dense index.
#[derive(Debug)]
pub struct RetrievalPipeline {
    store: DocumentStore,
    lexical: InvertedIndex,
    dense: HnswIndex,
    config: PipelineConfig,
}

impl RetrievalPipeline {
    /// Embeds every document body in batches and builds both indices.
    pub fn build(
        store: DocumentStore,
        embedder: &dyn Embedder,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let started = Instant::now();
        let lexical = InvertedIndex::build(&store);
        let embeddings = embed_in_batches(embedder, &store.bodies(), config.embed_batch_size)?;
        let dense = HnswIndex::build(&embeddings, config.hnsw.clone())?;
        tracing::info!(
            documents = store.len(),
            embedder = embedder.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built retrieval pipeline"
        );
        Ok(Self {
            store,
            lexical,
            dense,
            config,
        })
    }

    /// Assembles a pipeline from previously built indices.
    ///
    /// Both indices must cover exactly the documents in `store`.
    pub fn from_parts(
        store: DocumentStore,
        lexical: InvertedIndex,
        dense: HnswIndex,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        if lexical.num_documents() != store.len() {
            return Err(Error::InvalidInput(format!(
                "lexical index covers {} documents, store has {}",
                lexical.num_documents(),
                store.len()
            )));
        }
        if dense.len() != store.len() {
            return Err(Error::InvalidInput(format!(
                "dense index covers {} documents, store has {}",
                dense.len(),
                store.len()
            )));
        }
        Ok(Self {
            store,
            lexical,
            dense,
            config,
        })
    }

    /// Restores both indices from `artifacts`, building and saving whichever
    /// is missing or stale. `rebuild` ignores existing artifacts.
    pub fn load_or_build(
        store: DocumentStore,
        embedder: &dyn Embedder,
        config: PipelineConfig,
        artifacts: &ArtifactStore,
        rebuild: bool,
    ) -> Result<Self> {
        config.validate()?;
        let corpus_key = store.content_hash();

        let lexical_header = ArtifactHeader {
            kind: ArtifactKind::LexicalIndex,
            schema_version: LEXICAL_SCHEMA_VERSION,
            content_key: corpus_key.clone(),
        };
        let cached_lexical = if rebuild {
            None
        } else {
            artifacts.load::<InvertedIndex>(&lexical_header)?
        };
        let lexical = match cached_lexical {
            Some(index) => index,
            None => {
                let index = InvertedIndex::build(&store);
                artifacts.save(&lexical_header, &index)?;
                index
            }
        };

        let dense_header = ArtifactHeader {
            kind: ArtifactKind::DenseIndex,
            schema_version: DENSE_SCHEMA_VERSION,
            content_key: dense_content_key(&corpus_key, embedder, &config)?,
        };
        let cached_dense = if rebuild {
            None
        } else {
            artifacts.load::<HnswIndex>(&dense_header)?
        };
        let dense = match cached_dense {
            Some(index) => {
                index
                    .validate()
                    .map_err(|e| Error::Artifact(format!("dense index: {e}")))?;
                index
            }
            None => {
                let embeddings =
                    embed_in_batches(embedder, &store.bodies(), config.embed_batch_size)?;
                let index = HnswIndex::build(&embeddings, config.hnsw.clone())?;
                artifacts.save(&dense_header, &index)?;
                index
            }
        };

        Self::from_parts(store, lexical, dense, config)
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn lexical(&self) -> &InvertedIndex {
        &self.lexical
    }

    pub fn dense(&self) -> &HnswIndex {
        &self.dense
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fused dense + lexical candidates for every query, in query order.
    ///
    /// Query texts are embedded in one batched pass. Fails with
    /// [`Error::IndexEmpty`] when the corpus is empty.
    pub fn candidates(
        &self,
        queries: &[Query],
        embedder: &dyn Embedder,
    ) -> Result<Vec<QueryCandidates>> {
        let started = Instant::now();
        let texts: Vec<String> = queries.iter().map(Query::full_text).collect();
        let embeddings = embed_in_batches(embedder, &texts, self.config.embed_batch_size)?;

        let candidates = queries
            .par_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(query_id, (query, query_embedding))| -> Result<QueryCandidates> {
                let clue_tokens = tokenize(&query.clue);
                let lexical_scores = score_all(&self.lexical, clue_tokens.iter());
                let lexical: Vec<u32> = top_k(&lexical_scores, self.config.lexical_k)
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect();
                let dense: Vec<u32> = self
                    .dense
                    .search(&query_embedding, self.config.dense_k)?
                    .into_iter()
                    .map(|hit| hit.doc_id)
                    .collect();
                Ok(QueryCandidates {
                    query_id,
                    doc_ids: fuse_candidates(&dense, &lexical),
                    lexical_scores,
                    query_embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            queries = queries.len(),
            candidates = candidates.iter().map(|c| c.doc_ids.len()).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Retrieved candidates"
        );
        Ok(candidates)
    }

    /// Complete feature vectors for every candidate, aligned with `candidates`.
    ///
    /// Structural features are computed per query in parallel. The
    /// cross-encoder then scores all `(query text, snippet)` pairs in one
    /// batched pass, and each score is merged back by flat position.
    pub fn extract(
        &self,
        queries: &[Query],
        candidates: &[QueryCandidates],
        scorer: &dyn RelevanceScorer,
    ) -> Result<Vec<Vec<FeatureVector>>> {
        let started = Instant::now();
        let extractor =
            FeatureExtractor::new(&self.store, &self.dense, self.config.snippet_words);

        let phase_one: Vec<(Vec<PartialFeatures>, Vec<(String, String)>)> = candidates
            .par_iter()
            .map(|qc| -> Result<(Vec<PartialFeatures>, Vec<(String, String)>)> {
                let query = queries.get(qc.query_id).ok_or_else(|| {
                    Error::InvalidInput(format!("candidate set for unknown query {}", qc.query_id))
                })?;
                let ctx = QueryContext::new(
                    query,
                    qc.lexical_scores.clone(),
                    qc.query_embedding.clone(),
                );
                let text = query.full_text();
                let mut partials = Vec::with_capacity(qc.doc_ids.len());
                let mut pairs = Vec::with_capacity(qc.doc_ids.len());
                for &doc_id in &qc.doc_ids {
                    partials.push(extractor.structural(&ctx, doc_id));
                    pairs.push((text.clone(), extractor.snippet(doc_id)));
                }
                Ok((partials, pairs))
            })
            .collect::<Result<Vec<_>>>()?;

        let flat_pairs: Vec<(String, String)> = phase_one
            .iter()
            .flat_map(|(_, pairs)| pairs.iter().cloned())
            .collect();
        let scores = score_in_batches(scorer, &flat_pairs, self.config.scorer_batch_size)?;

        let mut scores = scores.into_iter();
        let features = phase_one
            .into_iter()
            .map(|(partials, _)| {
                partials
                    .into_iter()
                    .map(|mut partial| {
                        if let Some(score) = scores.next() {
                            partial.fill(score);
                        }
                        partial.finish().ok_or_else(|| {
                            Error::ScoringUnavailable(format!(
                                "{} returned fewer scores than candidates",
                                scorer.name()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            pairs = flat_pairs.len(),
            scorer = scorer.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extracted features"
        );
        Ok(features)
    }

    /// `(features, is_answer)` for every candidate of every labeled query.
    ///
    /// `features` must be aligned with `candidates` as returned by
    /// [`RetrievalPipeline::extract`].
    pub fn training_examples(
        &self,
        queries: &[Query],
        candidates: &[QueryCandidates],
        features: &[Vec<FeatureVector>],
    ) -> Result<Vec<(FeatureVector, bool)>> {
        check_aligned(candidates, features)?;
        let mut examples = Vec::new();
        for (qc, rows) in candidates.iter().zip(features) {
            let Some(answer) = queries
                .get(qc.query_id)
                .and_then(|q| q.expected_answer.as_deref())
            else {
                continue;
            };
            for (&doc_id, row) in qc.doc_ids.iter().zip(rows) {
                let is_answer = self
                    .store
                    .get(doc_id)
                    .is_some_and(|doc| titles_match(&doc.title, answer));
                examples.push((*row, is_answer));
            }
        }
        Ok(examples)
    }

    /// Trains a fresh ranker on the labeled queries.
    pub fn train(
        &self,
        queries: &[Query],
        candidates: &[QueryCandidates],
        features: &[Vec<FeatureVector>],
        config: &TrainConfig,
    ) -> Result<LogisticRanker> {
        let examples = self.training_examples(queries, candidates, features)?;
        LogisticRanker::train(&examples, config)
    }

    /// Orders each query's candidates by ranker probability, keeping the
    /// first `result_budget` entries. Ties keep fusion order.
    pub fn rank(
        &self,
        ranker: &LogisticRanker,
        candidates: &[QueryCandidates],
        features: &[Vec<FeatureVector>],
    ) -> Result<Vec<RankedResult>> {
        ranker.check_width(FEATURE_DIM)?;
        check_aligned(candidates, features)?;
        let results = candidates
            .iter()
            .zip(features)
            .map(|(qc, rows)| {
                let entries = ranker
                    .rank(rows)
                    .into_iter()
                    .take(self.config.result_budget)
                    .map(|(idx, score)| {
                        let doc_id = qc.doc_ids[idx];
                        RankedEntry {
                            doc_id,
                            title: self
                                .store
                                .get(doc_id)
                                .map(|d| d.title.clone())
                                .unwrap_or_default(),
                            score,
                        }
                    })
                    .collect();
                RankedResult {
                    query_id: qc.query_id,
                    entries,
                }
            })
            .collect();
        Ok(results)
    }

    /// Candidates, features, ranking and metrics for `queries`.
    pub fn run(
        &self,
        queries: &[Query],
        embedder: &dyn Embedder,
        scorer: &dyn RelevanceScorer,
        ranker: &LogisticRanker,
    ) -> Result<(Vec<RankedResult>, Metrics)> {
        let candidates = self.candidates(queries, embedder)?;
        let features = self.extract(queries, &candidates, scorer)?;
        let results = self.rank(ranker, &candidates, &features)?;
        let metrics = evaluate_results(&results, queries);
        tracing::info!(
            queries = metrics.queries,
            precision_at_1 = metrics.precision_at_1,
            mrr = metrics.mrr,
            "Evaluated ranking"
        );
        Ok((results, metrics))
    }

    /// Loads the ranker trained on `queries` from `artifacts`, or trains and
    /// saves one. `embedder` and `scorer` must be the ones that produced
    /// `candidates` and `features`; a ranker cached under a different model,
    /// retrieval or training setup is a miss. A loaded ranker whose width
    /// differs from [`FEATURE_DIM`] is discarded and retrained.
    #[allow(clippy::too_many_arguments)]
    pub fn load_or_train_ranker(
        &self,
        artifacts: &ArtifactStore,
        queries: &[Query],
        embedder: &dyn Embedder,
        scorer: &dyn RelevanceScorer,
        candidates: &[QueryCandidates],
        features: &[Vec<FeatureVector>],
        retrain: bool,
    ) -> Result<LogisticRanker> {
        let header = ArtifactHeader {
            kind: ArtifactKind::Ranker,
            schema_version: RANKER_SCHEMA_VERSION,
            content_key: ranker_content_key(
                &self.store.content_hash(),
                queries,
                embedder,
                scorer,
                &self.config,
            )?,
        };
        if !retrain {
            if let Some(ranker) = artifacts.load::<LogisticRanker>(&header)? {
                match ranker.check_width(FEATURE_DIM) {
                    Ok(()) => return Ok(ranker),
                    Err(e) => tracing::warn!(
                        width = ranker.input_width(),
                        expected = FEATURE_DIM,
                        error = %e,
                        "Discarding ranker with wrong input width, retraining"
                    ),
                }
            }
        }
        let ranker = self.train(queries, candidates, features, &self.config.train)?;
        artifacts.save(&header, &ranker)?;
        Ok(ranker)
    }
}

/// Every query row needs one feature vector per candidate.
fn check_aligned(candidates: &[QueryCandidates], features: &[Vec<FeatureVector>]) -> Result<()> {
    if candidates.len() != features.len() {
        return Err(Error::InvalidInput(format!(
            "{} candidate sets but {} feature sets",
            candidates.len(),
            features.len()
        )));
    }
    for (qc, rows) in candidates.iter().zip(features) {
        if rows.len() != qc.doc_ids.len() {
            return Err(Error::InvalidInput(format!(
                "query {} has {} candidates but {} feature vectors",
                qc.query_id,
                qc.doc_ids.len(),
                rows.len()
            )));
        }
    }
    Ok(())
}

/// Key for a dense index: corpus, embedding model and graph parameters.
fn dense_content_key(
    corpus_key: &str,
    embedder: &dyn Embedder,
    config: &PipelineConfig,
) -> Result<String> {
    let hnsw = bincode::serialize(&config.hnsw).map_err(|e| Error::Artifact(e.to_string()))?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(corpus_key.as_bytes());
    hasher.update(embedder.name().as_bytes());
    hasher.update(&(embedder.dimension() as u64).to_le_bytes());
    hasher.update(&hnsw);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Key for ranker weights.
///
/// Covers everything the training features depend on: the dense index key,
/// lexical scoring, the cross-encoder, candidate depths, snippet length, the
/// training setup, the feature contract and the training queries. Batch sizes
/// and the result budget do not change features and are left out.
pub fn ranker_content_key(
    corpus_key: &str,
    queries: &[Query],
    embedder: &dyn Embedder,
    scorer: &dyn RelevanceScorer,
    config: &PipelineConfig,
) -> Result<String> {
    let train = bincode::serialize(&config.train).map_err(|e| Error::Artifact(e.to_string()))?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(dense_content_key(corpus_key, embedder, config)?.as_bytes());
    hasher.update(&DENSE_SCHEMA_VERSION.to_le_bytes());
    hasher.update(&LEXICAL_SCHEMA_VERSION.to_le_bytes());
    for constant in [BM25_K1, BM25_B, BM25_EPSILON] {
        hasher.update(&constant.to_bits().to_le_bytes());
    }
    let scorer_name = scorer.name();
    hasher.update(&(scorer_name.len() as u64).to_le_bytes());
    hasher.update(scorer_name.as_bytes());
    for depth in [config.dense_k, config.lexical_k, config.snippet_words] {
        hasher.update(&(depth as u64).to_le_bytes());
    }
    hasher.update(&train);
    hasher.update(&(FEATURE_DIM as u64).to_le_bytes());
    for name in FEATURE_NAMES {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
    }
    for q in queries {
        for field in [
            q.category.as_str(),
            q.clue.as_str(),
            q.expected_answer.as_deref().unwrap_or(""),
        ] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

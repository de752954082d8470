use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use triviarank_core::config::PipelineConfig;
use triviarank_core::document::{DocumentStore, ParsedDocument, Query};
use triviarank_core::embed::{Embedder, Embedding, HashingEmbedder};
use triviarank_core::features::{FeatureVector, FEATURE_DIM};
use triviarank_core::pipeline::{ranker_content_key, RetrievalPipeline, RANKER_SCHEMA_VERSION};
use triviarank_core::ranker::LogisticRanker;
use triviarank_core::scoring::{RelevanceScorer, TokenOverlapScorer};
use triviarank_core::storage::{ArtifactHeader, ArtifactKind, ArtifactStore};
use triviarank_core::{Error, Result};

const DIM: usize = 64;

fn doc(title: &str, body: &str, categories: &[&str], headers: &[&str]) -> ParsedDocument {
    ParsedDocument {
        title: title.to_string(),
        body: body.to_string(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        section_headers: headers.iter().map(|h| h.to_string()).collect(),
    }
}

fn corpus() -> DocumentStore {
    DocumentStore::from_parsed(vec![
        doc(
            "George Washington",
            "george washington was the first president of the united states and led the continental army",
            &["us presidents", "american revolution"],
            &["early life", "presidency"],
        ),
        doc(
            "Abraham Lincoln",
            "abraham lincoln was the sixteenth president and led the union through the civil war",
            &["us presidents"],
            &["civil war", "assassination"],
        ),
        doc(
            "Danube",
            "the danube is a river that flows through vienna budapest and belgrade to the black sea",
            &["rivers", "europe"],
            &["course", "tributaries"],
        ),
        doc(
            "Nile",
            "the nile is the longest river in africa and flows north through cairo",
            &["rivers", "africa"],
            &["course"],
        ),
        doc(
            "Mars",
            "mars is the fourth planet from the sun and is called the red planet",
            &["planets"],
            &["moons", "exploration"],
        ),
        doc(
            "Jupiter",
            "jupiter is the largest planet in the solar system with a great red spot",
            &["planets"],
            &["atmosphere", "moons"],
        ),
        doc(
            "Photosynthesis",
            "photosynthesis converts light into chemical energy in plants using chlorophyll",
            &["science"],
            &["light reactions"],
        ),
        doc(
            "Mount Everest",
            "mount everest is the highest mountain above sea level in the himalayas",
            &["mountains", "asia"],
            &["climbing history"],
        ),
    ])
}

fn queries() -> Vec<Query> {
    vec![
        Query::new("US Presidents", "he led the continental army", Some("George Washington")),
        Query::new(
            "US Presidents",
            "sixteenth president during the civil war",
            Some("Abraham Lincoln"),
        ),
        Query::new("Rivers", "flows through vienna and budapest", Some("Danube")),
        Query::new("Rivers", "longest river in africa", Some("Nile")),
        Query::new("Planets", "the red planet fourth from the sun", Some("Mars")),
        Query::new("Planets", "largest planet with a great red spot", Some("Jupiter")),
        Query::new("Science", "plants convert light with chlorophyll", Some("Photosynthesis")),
        Query::new("Mountains", "highest mountain in the himalayas", Some("Mount Everest")),
    ]
}

fn config() -> PipelineConfig {
    PipelineConfig {
        dense_k: 3,
        lexical_k: 4,
        scorer_batch_size: 5,
        embed_batch_size: 3,
        ..PipelineConfig::default()
    }
}

fn trained(
    pipeline: &RetrievalPipeline,
    embedder: &dyn Embedder,
    queries: &[Query],
) -> LogisticRanker {
    let candidates = pipeline.candidates(queries, embedder).unwrap();
    let features = pipeline
        .extract(queries, &candidates, &TokenOverlapScorer::new())
        .unwrap();
    pipeline
        .train(queries, &candidates, &features, &pipeline.config().train)
        .unwrap()
}

struct FailingScorer;

impl RelevanceScorer for FailingScorer {
    fn score_pairs(&self, _pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Err(Error::InvalidInput("model offline".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Scores every pair the same.
struct ConstantScorer(f32);

impl RelevanceScorer for ConstantScorer {
    fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Ok(vec![self.0; pairs.len()])
    }

    fn name(&self) -> &str {
        "constant"
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
        Err(Error::InvalidInput("no gpu".into()))
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Hashing embedder that counts batch calls.
struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: HashingEmbedder::new(DIM),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(texts)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[test]
fn test_end_to_end_ranks_answers_first() {
    let embedder = HashingEmbedder::new(DIM);
    let pipeline = RetrievalPipeline::build(corpus(), &embedder, config()).unwrap();
    let queries = queries();
    let ranker = trained(&pipeline, &embedder, &queries);
    assert_eq!(ranker.input_width(), FEATURE_DIM);

    let (results, metrics) = pipeline
        .run(&queries, &embedder, &TokenOverlapScorer::new(), &ranker)
        .unwrap();
    assert_eq!(results.len(), queries.len());
    assert_eq!(metrics.queries, queries.len());
    for result in &results {
        assert!(result.entries.len() <= config().result_budget);
        for pair in result.entries.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
    // answer_overlap is visible at training and evaluation time
    assert!(metrics.precision_at_1 >= 0.75, "p@1 = {}", metrics.precision_at_1);
    assert!(metrics.mrr >= metrics.precision_at_1);
    assert!(metrics.mrr <= 1.0);
}

#[test]
fn test_runs_are_deterministic() {
    let embedder = HashingEmbedder::new(DIM);
    let queries = queries();
    let run = || {
        let pipeline = RetrievalPipeline::build(corpus(), &embedder, config()).unwrap();
        let ranker = trained(&pipeline, &embedder, &queries);
        let (results, metrics) = pipeline
            .run(&queries, &embedder, &TokenOverlapScorer::new(), &ranker)
            .unwrap();
        (ranker, results, metrics)
    };
    let (ranker_a, results_a, metrics_a) = run();
    let (ranker_b, results_b, metrics_b) = run();
    assert_eq!(ranker_a, ranker_b);
    assert_eq!(results_a, results_b);
    assert_eq!(metrics_a, metrics_b);
}

#[test]
fn test_unlabeled_queries_rank_but_do_not_count() {
    let embedder = HashingEmbedder::new(DIM);
    let pipeline = RetrievalPipeline::build(corpus(), &embedder, config()).unwrap();
    let ranker = trained(&pipeline, &embedder, &queries());

    let inference = vec![
        Query::new("rivers", "flows through cairo", None),
        Query::new("", "", None),
    ];
    let (results, metrics) = pipeline
        .run(&inference, &embedder, &TokenOverlapScorer::new(), &ranker)
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(!results[0].entries.is_empty());
    assert_eq!(metrics.queries, 0);
    assert_eq!(metrics.precision_at_1, 0.0);
}

#[test]
fn test_scorer_failure_aborts_extraction() {
    let embedder = HashingEmbedder::new(DIM);
    let pipeline = RetrievalPipeline::build(corpus(), &embedder, config()).unwrap();
    let queries = queries();
    let ranker = trained(&pipeline, &embedder, &queries);
    let err = pipeline
        .run(&queries, &embedder, &FailingScorer, &ranker)
        .unwrap_err();
    assert!(matches!(err, Error::ScoringUnavailable(_)), "{err}");
}

#[test]
fn test_embedder_failure_aborts_build() {
    let err = RetrievalPipeline::build(corpus(), &FailingEmbedder, config()).unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable(_)), "{err}");
}

#[test]
fn test_indices_restore_from_artifacts() {
    let dir = TempDir::new().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let embedder = CountingEmbedder::new();
    let queries = queries();

    let first =
        RetrievalPipeline::load_or_build(corpus(), &embedder, config(), &artifacts, false).unwrap();
    assert!(artifacts.path_for(ArtifactKind::LexicalIndex).exists());
    assert!(artifacts.path_for(ArtifactKind::DenseIndex).exists());
    assert!(embedder.calls() > 0);

    let before = embedder.calls();
    let second =
        RetrievalPipeline::load_or_build(corpus(), &embedder, config(), &artifacts, false).unwrap();
    assert_eq!(embedder.calls(), before, "document bodies were re-embedded");

    let a = first.candidates(&queries, &embedder).unwrap();
    let b = second.candidates(&queries, &embedder).unwrap();
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.doc_ids, y.doc_ids);
        assert_eq!(x.lexical_scores, y.lexical_scores);
    }

    // --retrain ignores the cache
    let before = embedder.calls();
    RetrievalPipeline::load_or_build(corpus(), &embedder, config(), &artifacts, true).unwrap();
    assert!(embedder.calls() > before);
}

#[test]
fn test_dense_artifact_keyed_by_embedder() {
    let dir = TempDir::new().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let embedder = HashingEmbedder::new(DIM);
    RetrievalPipeline::load_or_build(corpus(), &embedder, config(), &artifacts, false).unwrap();
    // same width, different model: the cached index must not be reused
    let err =
        RetrievalPipeline::load_or_build(corpus(), &FailingEmbedder, config(), &artifacts, false)
            .unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable(_)));
}

#[test]
fn test_changed_corpus_rebuilds_indices() {
    let dir = TempDir::new().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let embedder = HashingEmbedder::new(DIM);
    RetrievalPipeline::load_or_build(corpus(), &embedder, config(), &artifacts, false).unwrap();

    let smaller = DocumentStore::from_parsed(vec![doc("Nile", "river in africa", &[], &[])]);
    let pipeline =
        RetrievalPipeline::load_or_build(smaller, &embedder, config(), &artifacts, false).unwrap();
    assert_eq!(pipeline.dense().len(), 1);
    assert_eq!(pipeline.lexical().num_documents(), 1);
}

#[test]
fn test_ranker_persists_and_reloads() {
    let dir = TempDir::new().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let embedder = HashingEmbedder::new(DIM);
    let scorer = TokenOverlapScorer::new();
    let pipeline = RetrievalPipeline::build(corpus(), &embedder, config()).unwrap();
    let queries = queries();
    let (train_queries, held_out) = queries.split_at(6);
    let candidates = pipeline.candidates(train_queries, &embedder).unwrap();
    let features = pipeline.extract(train_queries, &candidates, &scorer).unwrap();

    let saved = pipeline
        .load_or_train_ranker(
            &artifacts,
            train_queries,
            &embedder,
            &scorer,
            &candidates,
            &features,
            false,
        )
        .unwrap();
    // a hit never trains, so it needs no features
    let loaded = pipeline
        .load_or_train_ranker(&artifacts, train_queries, &embedder, &scorer, &[], &[], false)
        .unwrap();
    assert_eq!(saved, loaded);

    // rows the ranker never saw during training
    let unseen_candidates = pipeline.candidates(held_out, &embedder).unwrap();
    let unseen = pipeline.extract(held_out, &unseen_candidates, &scorer).unwrap();
    let mut rows: Vec<FeatureVector> = unseen.into_iter().flatten().collect();
    rows.push(FeatureVector::from_array([-3.0, 2.0, 0.5, 1.0, 0.0, 4.0, 1.0, 0.25]));
    rows.push(FeatureVector::from_array([100.0; FEATURE_DIM]));
    assert!(rows.len() > 2);
    for row in &rows {
        assert_eq!(saved.predict(row).to_bits(), loaded.predict(row).to_bits());
    }
    assert_eq!(saved.rank(&rows), loaded.rank(&rows));
}

#[test]
fn test_ranker_cache_misses_on_model_and_retrieval_changes() {
    let dir = TempDir::new().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let queries = queries();

    let wide = HashingEmbedder::new(DIM);
    let overlap = TokenOverlapScorer::new();
    let first = RetrievalPipeline::build(corpus(), &wide, config()).unwrap();
    let candidates = first.candidates(&queries, &wide).unwrap();
    let features = first.extract(&queries, &candidates, &overlap).unwrap();
    let cached = first
        .load_or_train_ranker(&artifacts, &queries, &wide, &overlap, &candidates, &features, false)
        .unwrap();

    // same corpus and queries; every feature source differs
    let narrow = HashingEmbedder::new(8);
    let constant = ConstantScorer(100.0);
    let shallow = PipelineConfig {
        dense_k: 1,
        lexical_k: 1,
        ..config()
    };
    let second = RetrievalPipeline::build(corpus(), &narrow, shallow).unwrap();
    let candidates = second.candidates(&queries, &narrow).unwrap();
    let features = second.extract(&queries, &candidates, &constant).unwrap();
    let served = second
        .load_or_train_ranker(
            &artifacts,
            &queries,
            &narrow,
            &constant,
            &candidates,
            &features,
            false,
        )
        .unwrap();
    let fresh = second
        .train(&queries, &candidates, &features, &second.config().train)
        .unwrap();
    assert_ne!(served, cached);
    assert_eq!(served, fresh);

    // the first setup's ranker was replaced, so it is retrained too
    let candidates = first.candidates(&queries, &wide).unwrap();
    let features = first.extract(&queries, &candidates, &overlap).unwrap();
    let again = first
        .load_or_train_ranker(&artifacts, &queries, &wide, &overlap, &candidates, &features, false)
        .unwrap();
    assert_eq!(again, cached);
}

#[test]
fn test_ranker_cache_misses_on_scorer_change_alone() {
    let dir = TempDir::new().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let embedder = HashingEmbedder::new(DIM);
    let pipeline = RetrievalPipeline::build(corpus(), &embedder, config()).unwrap();
    let queries = queries();
    let candidates = pipeline.candidates(&queries, &embedder).unwrap();

    let overlap = TokenOverlapScorer::new();
    let features = pipeline.extract(&queries, &candidates, &overlap).unwrap();
    let cached = pipeline
        .load_or_train_ranker(
            &artifacts,
            &queries,
            &embedder,
            &overlap,
            &candidates,
            &features,
            false,
        )
        .unwrap();

    let constant = ConstantScorer(0.5);
    let features = pipeline.extract(&queries, &candidates, &constant).unwrap();
    let served = pipeline
        .load_or_train_ranker(
            &artifacts,
            &queries,
            &embedder,
            &constant,
            &candidates,
            &features,
            false,
        )
        .unwrap();
    assert_ne!(served, cached);
    assert_eq!(
        served,
        pipeline
            .train(&queries, &candidates, &features, &pipeline.config().train)
            .unwrap()
    );
}

#[test]
fn test_wrong_width_ranker_is_retrained() {
    let dir = TempDir::new().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let embedder = HashingEmbedder::new(DIM);
    let scorer = TokenOverlapScorer::new();
    let pipeline = RetrievalPipeline::build(corpus(), &embedder, config()).unwrap();
    let queries = queries();
    let candidates = pipeline.candidates(&queries, &embedder).unwrap();
    let features = pipeline.extract(&queries, &candidates, &scorer).unwrap();

    let narrow = LogisticRanker {
        weights: vec![0.5; 7],
        bias: 0.0,
        feature_means: vec![0.0; 7],
        feature_scales: vec![1.0; 7],
    };
    assert!(matches!(
        pipeline.rank(&narrow, &candidates, &features),
        Err(Error::DimensionMismatch { expected: 8, actual: 7 })
    ));

    let header = ArtifactHeader {
        kind: ArtifactKind::Ranker,
        schema_version: RANKER_SCHEMA_VERSION,
        content_key: ranker_content_key(
            &pipeline.store().content_hash(),
            &queries,
            &embedder,
            &scorer,
            pipeline.config(),
        )
        .unwrap(),
    };
    artifacts.save(&header, &narrow).unwrap();

    let ranker = pipeline
        .load_or_train_ranker(
            &artifacts,
            &queries,
            &embedder,
            &scorer,
            &candidates,
            &features,
            false,
        )
        .unwrap();
    assert_eq!(ranker.input_width(), FEATURE_DIM);
    let reloaded: LogisticRanker = artifacts.load(&header).unwrap().unwrap();
    assert_eq!(reloaded.input_width(), FEATURE_DIM);
}

mod input;

use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use triviarank_core::config::PipelineConfig;
use triviarank_core::document::DocumentStore;
use triviarank_core::embed::HashingEmbedder;
use triviarank_core::eval::evaluate_results;
use triviarank_core::pipeline::RetrievalPipeline;
use triviarank_core::scoring::TokenOverlapScorer;
use triviarank_core::storage::ArtifactStore;

/// Default width of the hashing embedder.
const DEFAULT_EMBED_DIM: usize = 256;

#[derive(Parser)]
#[command(
    name = "triviarank",
    about = "Hybrid BM25 + HNSW retrieval with a learned reranker for trivia clues"
)]
struct Args {
    /// Parsed documents, one JSON object per line
    #[arg(long)]
    documents: PathBuf,

    /// Queries: `.jsonl`, or three-line blocks separated by blank lines
    #[arg(long)]
    queries: PathBuf,

    /// Directory for cached indices and ranker weights
    #[arg(long, default_value = "artifacts")]
    artifacts: PathBuf,

    /// Pipeline configuration (JSON); missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override dense hits per query
    #[arg(long)]
    dense_k: Option<usize>,

    /// Override lexical hits per query
    #[arg(long)]
    lexical_k: Option<usize>,

    /// Embedding dimension of the hashing embedder
    #[arg(long, default_value_t = DEFAULT_EMBED_DIM)]
    dim: usize,

    /// Write ranked results as JSON lines
    #[arg(long)]
    ranked_out: Option<PathBuf>,

    /// Ignore cached artifacts and rebuild everything
    #[arg(long, default_value_t = false)]
    retrain: bool,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = match &args.config {
        Some(path) => serde_json::from_str::<PipelineConfig>(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    if let Some(k) = args.dense_k {
        config.dense_k = k;
    }
    if let Some(m) = args.lexical_k {
        config.lexical_k = m;
    }
    config.validate()?;
    if args.dim == 0 {
        eprintln!("Error: --dim must be > 0");
        std::process::exit(1);
    }

    let store = DocumentStore::from_parsed(input::load_documents(&args.documents)?);
    let queries = input::load_queries(&args.queries)?;
    if queries.is_empty() {
        tracing::warn!(path = %args.queries.display(), "No queries loaded");
    }

    let embedder = HashingEmbedder::new(args.dim);
    let scorer = TokenOverlapScorer::new();
    let artifacts = ArtifactStore::new(&args.artifacts);

    let pipeline =
        RetrievalPipeline::load_or_build(store, &embedder, config, &artifacts, args.retrain)?;
    let candidates = pipeline.candidates(&queries, &embedder)?;
    let features = pipeline.extract(&queries, &candidates, &scorer)?;
    let ranker = pipeline.load_or_train_ranker(
        &artifacts,
        &queries,
        &embedder,
        &scorer,
        &candidates,
        &features,
        args.retrain,
    )?;
    let results = pipeline.rank(&ranker, &candidates, &features)?;
    let metrics = evaluate_results(&results, &queries);
    tracing::info!(
        queries = metrics.queries,
        precision_at_1 = metrics.precision_at_1,
        mrr = metrics.mrr,
        "Evaluation complete"
    );

    if let Some(path) = &args.ranked_out {
        let mut out = std::io::BufWriter::new(fs::File::create(path)?);
        for result in &results {
            serde_json::to_writer(&mut out, result)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        tracing::info!(path = %path.display(), results = results.len(), "Wrote ranked results");
    }

    println!("{}", serde_json::to_string(&metrics)?);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env()
        .add_directive(
            "triviarank_core=info"
                .parse()
                .expect("valid directive literal"),
        )
        .add_directive("triviarank=info".parse().expect("valid directive literal"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

//! Retrieval benchmark on a synthetic corpus.
//! Measures dense Recall@10 / QPS across ef_search values and BM25 QPS.
//!
//! Usage: cargo bench --bench retrieval

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::Instant;
use triviarank_core::bm25::{score_all, tokenize, top_k, InvertedIndex};
use triviarank_core::document::{DocumentStore, ParsedDocument};
use triviarank_core::hnsw::{dot, l2_normalize, HnswConfig, HnswIndex};

const NUM_DOCS: usize = 20_000;
const NUM_QUERIES: usize = 1_000;
const DIM: usize = 64;
const VOCAB: usize = 5_000;
const K: usize = 10;

fn random_unit(rng: &mut StdRng) -> Vec<f32> {
    let mut v: Vec<f32> = (0..DIM).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
    l2_normalize(&mut v);
    v
}

fn brute_force(vectors: &[Vec<f32>], query: &[f32], k: usize) -> HashSet<u32> {
    let mut all: Vec<(f32, u32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (dot(query, v), i as u32))
        .collect();
    all.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    all.into_iter().take(k).map(|(_, id)| id).collect()
}

fn random_text(rng: &mut StdRng, words: usize) -> String {
    (0..words)
        .map(|_| {
            // skewed so a few terms are very common
            let r: f64 = rng.gen();
            format!("w{}", ((r * r) * VOCAB as f64) as usize)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() {
    println!("=== Retrieval Benchmark (synthetic, {NUM_DOCS} docs x {DIM}d) ===");
    let mut rng = StdRng::seed_from_u64(42);

    // === Dense ===
    println!();
    println!("--- Dense index ---");
    let vectors: Vec<Vec<f32>> = (0..NUM_DOCS).map(|_| random_unit(&mut rng)).collect();
    let queries: Vec<Vec<f32>> = (0..NUM_QUERIES).map(|_| random_unit(&mut rng)).collect();

    let t0 = Instant::now();
    let mut index = match HnswIndex::build(&vectors, HnswConfig::default()) {
        Ok(index) => index,
        Err(e) => panic!("build failed: {e}"),
    };
    let build_time = t0.elapsed();
    println!(
        "  Build time: {:.2}s ({:.0} inserts/s)",
        build_time.as_secs_f64(),
        NUM_DOCS as f64 / build_time.as_secs_f64()
    );

    let truth: Vec<HashSet<u32>> = queries.iter().map(|q| brute_force(&vectors, q, K)).collect();

    println!();
    println!("  ef_search | Recall@10 |    QPS    | Avg latency");
    println!("  ----------+-----------+-----------+------------");
    for ef in [10, 20, 50, 100, 200] {
        index.config.ef_search = ef;
        let t0 = Instant::now();
        let mut total_recall = 0.0f64;
        for (q, gt) in queries.iter().zip(&truth) {
            let hits = index.search(q, K).unwrap_or_default();
            let found = hits.iter().filter(|h| gt.contains(&h.doc_id)).count();
            total_recall += found as f64 / K as f64;
        }
        let elapsed = t0.elapsed();
        println!(
            "  {:>9} | {:.4}    | {:>9.1} | {:.0} us",
            ef,
            total_recall / NUM_QUERIES as f64,
            NUM_QUERIES as f64 / elapsed.as_secs_f64(),
            elapsed.as_micros() as f64 / NUM_QUERIES as f64
        );
    }

    // === Lexical ===
    println!();
    println!("--- BM25 ---");
    let store = DocumentStore::from_parsed((0..NUM_DOCS).map(|i| ParsedDocument {
        title: format!("doc {i}"),
        body: random_text(&mut rng, 120),
        ..ParsedDocument::default()
    }));
    let t0 = Instant::now();
    let lexical = InvertedIndex::build(&store);
    println!("  Index time: {:.2}s", t0.elapsed().as_secs_f64());

    let clues: Vec<String> = (0..NUM_QUERIES).map(|_| random_text(&mut rng, 8)).collect();
    let t0 = Instant::now();
    let mut returned = 0usize;
    for clue in &clues {
        let tokens = tokenize(clue);
        let scores = score_all(&lexical, tokens.iter());
        returned += top_k(&scores, 50).len();
    }
    let elapsed = t0.elapsed();
    println!(
        "  {} queries, top-50: {:.1} QPS ({returned} hits)",
        NUM_QUERIES,
        NUM_QUERIES as f64 / elapsed.as_secs_f64()
    );

    println!();
    println!("=== Benchmark complete ===");
}

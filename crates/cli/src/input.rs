//! Input loading: documents as JSON lines, queries as JSON lines or
//! three-line blocks (category, clue, answer) separated by blank lines.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use triviarank_core::document::{ParsedDocument, Query};
use triviarank_core::{Error, Result};

#[derive(Debug, Deserialize)]
struct QueryLine {
    category: String,
    clue: String,
    #[serde(default)]
    expected_answer: Option<String>,
}

/// One [`ParsedDocument`] per non-empty line.
pub fn load_documents(path: &Path) -> Result<Vec<ParsedDocument>> {
    let raw = fs::read_to_string(path)?;
    let docs = parse_json_lines::<ParsedDocument>(&raw, path)?;
    tracing::info!(path = %path.display(), documents = docs.len(), "Loaded documents");
    Ok(docs)
}

/// JSON lines when the extension is `.jsonl`, three-line blocks otherwise.
pub fn load_queries(path: &Path) -> Result<Vec<Query>> {
    let raw = fs::read_to_string(path)?;
    let queries = if path.extension().is_some_and(|ext| ext == "jsonl") {
        parse_json_lines::<QueryLine>(&raw, path)?
            .into_iter()
            .map(|q| Query::new(&q.category, &q.clue, q.expected_answer.as_deref()))
            .collect()
    } else {
        parse_blocks(&raw)
    };
    tracing::info!(path = %path.display(), queries = queries.len(), "Loaded queries");
    Ok(queries)
}

fn parse_json_lines<T: serde::de::DeserializeOwned>(raw: &str, path: &Path) -> Result<Vec<T>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                Error::InvalidInput(format!("{}:{}: {e}", path.display(), n + 1))
            })
        })
        .collect()
}

/// Blocks of exactly three non-empty lines are kept; a block of any other
/// size keeps accumulating until it reaches three.
fn parse_blocks(raw: &str) -> Vec<Query> {
    let mut queries = Vec::new();
    let mut block: Vec<&str> = Vec::with_capacity(3);
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            if block.len() == 3 {
                queries.push(Query::new(block[0], block[1], Some(block[2])));
                block.clear();
            }
        } else {
            block.push(line);
        }
    }
    if block.len() == 3 {
        queries.push(Query::new(block[0], block[1], Some(block[2])));
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_format() {
        let raw = "US PRESIDENTS\nHe was the first president\nGeorge Washington\n\n\
                   RIVERS\nIt flows through Vienna\nDanube\n";
        let queries = parse_blocks(raw);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].category, "us presidents");
        assert_eq!(queries[0].clue, "He was the first president");
        assert_eq!(queries[1].expected_answer.as_deref(), Some("Danube"));
    }

    #[test]
    fn test_block_format_ignores_extra_blank_lines() {
        let raw = "\n\nscience\nH2O\nWater\n\n\n\n";
        assert_eq!(parse_blocks(raw).len(), 1);
    }

    #[test]
    fn test_jsonl_queries_and_documents() {
        let dir = tempfile::tempdir().unwrap();
        let qpath = dir.path().join("q.jsonl");
        fs::write(
            &qpath,
            "{\"category\":\"Rivers\",\"clue\":\"Vienna\",\"expected_answer\":\"Danube\"}\n\n\
             {\"category\":\"Rivers\",\"clue\":\"Cairo\"}\n",
        )
        .unwrap();
        let queries = load_queries(&qpath).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].category, "rivers");
        assert!(queries[1].expected_answer.is_none());

        let dpath = dir.path().join("d.jsonl");
        fs::write(&dpath, "{\"title\":\"Danube\",\"body\":\"river\"}\n").unwrap();
        let docs = load_documents(&dpath).unwrap();
        assert_eq!(docs[0].title, "Danube");
        assert!(docs[0].categories.is_empty());
    }

    #[test]
    fn test_bad_json_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.jsonl");
        fs::write(&path, "{\"title\":\"A\",\"body\":\"b\"}\nnot json\n").unwrap();
        let err = load_documents(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }
}

//! Artifact persistence using bincode serialization.
//!
//! File layout: `[u32 LE header length][bincode header][bincode payload][magic "TRK1"][u32 CRC32 BE]`.
//! The CRC covers everything before the magic. Writes use atomic temp-file + rename.
//!
//! A missing file, a different schema version, or a different content key is a
//! cache miss (`Ok(None)`). A checksum failure or undecodable bytes is corruption
//! and surfaces as [`Error::Artifact`].

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Magic bytes placed before the CRC32 footer.
const ARTIFACT_CRC_MAGIC: &[u8; 4] = b"TRK1";

/// The kinds of artifact the pipeline persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    LexicalIndex,
    DenseIndex,
    Ranker,
}

impl ArtifactKind {
    fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::LexicalIndex => "lexical.trk",
            ArtifactKind::DenseIndex => "dense.trk",
            ArtifactKind::Ranker => "ranker.trk",
        }
    }
}

/// Identifies what an artifact was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub kind: ArtifactKind,
    /// Bumped whenever the payload type's layout or meaning changes.
    pub schema_version: u32,
    /// Hash of the inputs (corpus, embedder, feature contract).
    pub content_key: String,
}

/// Directory of artifacts, one file per [`ArtifactKind`].
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Save `value` under `header` with an atomic write.
    pub fn save<T: Serialize>(&self, header: &ArtifactHeader, value: &T) -> Result<()> {
        let header_bytes = bincode::serialize(header).map_err(|e| Error::Artifact(e.to_string()))?;
        let payload = bincode::serialize(value).map_err(|e| Error::Artifact(e.to_string()))?;

        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len() + 8);
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&payload);
        let crc = crc32fast::hash(&output);
        output.extend_from_slice(ARTIFACT_CRC_MAGIC);
        output.extend_from_slice(&crc.to_be_bytes());

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(header.kind);
        let tmp_path = path.with_extension("trk.tmp");

        // Atomic write: write to temp, then rename
        fs::write(&tmp_path, &output)?;
        fs::rename(&tmp_path, &path)?;

        tracing::info!(
            kind = ?header.kind,
            schema_version = header.schema_version,
            content_key = %header.content_key,
            bytes = output.len(),
            crc = format_args!("{crc:#010x}"),
            "Saved artifact"
        );
        Ok(())
    }

    /// Load the artifact for `expected.kind` if it matches `expected` exactly.
    pub fn load<T: DeserializeOwned>(&self, expected: &ArtifactHeader) -> Result<Option<T>> {
        let path = self.path_for(expected.kind);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(kind = ?expected.kind, "Artifact not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let body = verify_footer(&raw, &path)?;
        if body.len() < 4 {
            return Err(Error::Artifact(format!("{path:?}: truncated header")));
        }
        let header_len = u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;
        if body.len() < 4 + header_len {
            return Err(Error::Artifact(format!("{path:?}: header length out of bounds")));
        }
        let header: ArtifactHeader = bincode::deserialize(&body[4..4 + header_len])
            .map_err(|e| Error::Artifact(format!("{path:?}: bad header: {e}")))?;

        if &header != expected {
            tracing::info!(
                kind = ?expected.kind,
                found_version = header.schema_version,
                expected_version = expected.schema_version,
                found_key = %header.content_key,
                expected_key = %expected.content_key,
                "Stale artifact, rebuilding"
            );
            return Ok(None);
        }

        let value = bincode::deserialize(&body[4 + header_len..])
            .map_err(|e| Error::Artifact(format!("{path:?}: bad payload: {e}")))?;
        tracing::info!(kind = ?expected.kind, "Loaded artifact");
        Ok(Some(value))
    }
}

/// Checks the `[magic][CRC32 BE]` footer and returns the covered bytes.
fn verify_footer<'a>(raw: &'a [u8], path: &Path) -> Result<&'a [u8]> {
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != ARTIFACT_CRC_MAGIC {
        return Err(Error::Artifact(format!("{path:?}: missing checksum footer")));
    }
    let body = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(body);
    if computed_crc != stored_crc {
        return Err(Error::Artifact(format!(
            "CRC32 mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}. File may be corrupted: {path:?}"
        )));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u32, key: &str) -> ArtifactHeader {
        ArtifactHeader {
            kind: ArtifactKind::Ranker,
            schema_version: version,
            content_key: key.to_string(),
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let value = vec![1.5f64, -2.0, 3.25];
        store.save(&header(1, "abc"), &value).unwrap();
        let loaded: Option<Vec<f64>> = store.load(&header(1, "abc")).unwrap();
        assert_eq!(loaded, Some(value));
        assert!(!store.path_for(ArtifactKind::Ranker).with_extension("trk.tmp").exists());
    }

    #[test]
    fn test_missing_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested"));
        let loaded: Option<Vec<f64>> = store.load(&header(1, "abc")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_version_or_key_mismatch_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&header(1, "abc"), &42u32).unwrap();
        assert!(store.load::<u32>(&header(2, "abc")).unwrap().is_none());
        assert!(store.load::<u32>(&header(1, "xyz")).unwrap().is_none());
        assert_eq!(store.load::<u32>(&header(1, "abc")).unwrap(), Some(42));
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&header(1, "abc"), &vec![7u8; 32]).unwrap();
        let path = store.path_for(ArtifactKind::Ranker);
        let mut raw = fs::read(&path).unwrap();
        raw[10] ^= 0xff;
        fs::write(&path, raw).unwrap();
        let err = store.load::<Vec<u8>>(&header(1, "abc")).unwrap_err();
        assert!(matches!(err, Error::Artifact(_)));
        assert!(err.to_string().contains("CRC32"));
    }
}

//! File-backed model store.
//!
//! # Storage Format
//!
//! A single artifact holds both models so a save is one atomic rename:
//! - Magic bytes (4): `AVMP`
//! - Format version (4): little-endian u32
//! - Checksum (32): SHA-256 of the payload
//! - Payload: bincode-encoded [`ModelPair`]
//!
//! A JSON sidecar with the pair's [`ModelMetadata`] is written after the
//! artifact for cheap inspection. The artifact is authoritative.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{ModelMetadata, ModelPair, ModelStore, ModelStoreError};

const ARTIFACT_FILE: &str = "models.bin";
const METADATA_FILE: &str = "models.json";
const MAGIC_BYTES: &[u8; 4] = b"AVMP";
const HEADER_SIZE: usize = 4 + 4 + 32;

#[derive(Debug)]
struct CachedPair {
    modified: SystemTime,
    pair: Arc<ModelPair>,
}

/// Model store persisting the pair under a directory.
///
/// Loaded pairs are cached and re-read only when the artifact's modification
/// time changes, so queries don't decode the models on every call while
/// still picking up a pair saved by another process.
#[derive(Debug)]
pub struct FileModelStore {
    dir: PathBuf,
    cache: RwLock<Option<CachedPair>>,
}

impl FileModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(None),
        }
    }

    /// Path of the model artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join(ARTIFACT_FILE)
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn encode(pair: &ModelPair) -> Result<Vec<u8>, ModelStoreError> {
        let payload = bincode::serde::encode_to_vec(pair, bincode::config::standard())
            .map_err(|e| ModelStoreError::Encode(e.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(MAGIC_BYTES);
        bytes.extend_from_slice(&ModelMetadata::CURRENT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&Sha256::digest(&payload));
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    fn decode(bytes: &[u8]) -> Result<ModelPair, ModelStoreError> {
        let corrupt = |reason: String| ModelStoreError::Corrupt { reason };

        if bytes.len() < HEADER_SIZE {
            return Err(corrupt(format!("artifact is only {} bytes", bytes.len())));
        }
        if &bytes[0..4] != MAGIC_BYTES {
            return Err(corrupt("missing magic bytes".to_string()));
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != ModelMetadata::CURRENT_VERSION {
            return Err(corrupt(format!(
                "format version {version} is not supported (expected {})",
                ModelMetadata::CURRENT_VERSION
            )));
        }

        let (checksum, payload) = bytes[8..].split_at(32);
        if Sha256::digest(payload).as_slice() != checksum {
            return Err(corrupt("checksum mismatch".to_string()));
        }

        let (pair, _): (ModelPair, usize) =
            bincode::serde::decode_from_slice(payload, bincode::config::standard())
                .map_err(|e| corrupt(format!("failed to decode payload: {e}")))?;
        pair.validate()?;
        Ok(pair)
    }

    fn write_atomically(&self, target: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        file.persist(target).map_err(|e| e.error)?;
        Ok(())
    }

    fn modified(&self) -> Result<SystemTime, ModelStoreError> {
        match fs::metadata(self.artifact_path()) {
            Ok(meta) => Ok(meta.modified()?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ModelStoreError::Absent {
                location: self.artifact_path().display().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> Result<Arc<ModelPair>, ModelStoreError> {
        let modified = self.modified()?;

        if let Some(cached) = self.cache.read().as_ref() {
            if cached.modified == modified {
                return Ok(Arc::clone(&cached.pair));
            }
        }

        let bytes = match fs::read(self.artifact_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ModelStoreError::Absent {
                    location: self.artifact_path().display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let pair = Arc::new(Self::decode(&bytes)?);
        debug!(
            "Loaded model pair: {} terms, reduction width {}",
            pair.metadata.vocabulary_size, pair.metadata.reduction_width
        );

        *self.cache.write() = Some(CachedPair {
            modified,
            pair: Arc::clone(&pair),
        });
        Ok(pair)
    }

    fn save(&self, pair: ModelPair) -> Result<Arc<ModelPair>, ModelStoreError> {
        pair.validate()?;
        fs::create_dir_all(&self.dir)?;

        let bytes = Self::encode(&pair)?;
        self.write_atomically(&self.artifact_path(), &bytes)?;

        match serde_json::to_vec_pretty(&pair.metadata) {
            Ok(json) => {
                if let Err(e) = self.write_atomically(&self.metadata_path(), &json) {
                    warn!("Failed to write model metadata sidecar: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize model metadata: {e}"),
        }

        let pair = Arc::new(pair);
        let modified = self.modified()?;
        *self.cache.write() = Some(CachedPair {
            modified,
            pair: Arc::clone(&pair),
        });

        info!(
            "Saved model pair to {} ({} bytes)",
            self.artifact_path().display(),
            bytes.len()
        );
        Ok(pair)
    }

    fn exists(&self) -> bool {
        self.artifact_path().exists()
    }

    fn metadata(&self) -> Result<ModelMetadata, ModelStoreError> {
        if !self.exists() {
            return Err(ModelStoreError::Absent {
                location: self.artifact_path().display().to_string(),
            });
        }

        // The sidecar is a convenience; fall back to the artifact if it is
        // missing or unreadable.
        match fs::read(self.metadata_path()) {
            Ok(json) => match serde_json::from_slice(&json) {
                Ok(metadata) => Ok(metadata),
                Err(_) => self.load().map(|pair| pair.metadata.clone()),
            },
            Err(_) => self.load().map(|pair| pair.metadata.clone()),
        }
    }
}

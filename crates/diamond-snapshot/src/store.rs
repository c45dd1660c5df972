//! Append-only snapshot history
//!
//! One stream per (chain id, diamond):
//!
//! ```text
//! <root>/<chainId>/<diamond>.json           latest snapshot
//! <root>/<chainId>/<diamond>.history.jsonl  HistoryEntry per line, hash-chained
//! ```
//!
//! Older deployments kept a JSON array of snapshots in `<diamond>.json`.
//! That layout is read transparently and imported into the history on the
//! next append; it is never written.

use crate::error::StoreError;
use crate::snapshot::DiamondSnapshot;
use diamond_artifact::{canonical_json, Address, ContentHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// One line of the history stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub sequence: u64,
    /// RFC 3339 time the entry was written
    pub recorded_at: String,
    pub prev_hash: ContentHash,
    pub hash: ContentHash,
    pub snapshot: DiamondSnapshot,
}

impl HistoryEntry {
    fn chain(
        prev_hash: ContentHash,
        sequence: u64,
        snapshot: DiamondSnapshot,
    ) -> Result<Self, serde_json::Error> {
        let hash = link_hash(prev_hash, sequence, &snapshot)?;
        Ok(Self {
            sequence,
            recorded_at: chrono::Utc::now().to_rfc3339(),
            prev_hash,
            hash,
            snapshot,
        })
    }
}

/// sha-256 over `prev_hash || sequence || canonical snapshot JSON`. The
/// write time is informational and not part of the chain.
fn link_hash(
    prev_hash: ContentHash,
    sequence: u64,
    snapshot: &DiamondSnapshot,
) -> Result<ContentHash, serde_json::Error> {
    let body = canonical_json(&serde_json::to_value(snapshot)?);
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(body.as_bytes());
    Ok(ContentHash::new(hasher.finalize().into()))
}

/// Where the history of one diamond came from
enum Stored {
    Empty,
    History(Vec<HistoryEntry>),
    /// Legacy snapshots, not yet imported
    Legacy(Vec<DiamondSnapshot>),
}

/// Filesystem snapshot store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Create store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, chain_id: u64) -> PathBuf {
        self.root.join(chain_id.to_string())
    }

    /// Path of the latest-snapshot file
    #[must_use]
    pub fn latest_path(&self, chain_id: u64, diamond: &Address) -> PathBuf {
        self.dir(chain_id).join(format!("{diamond}.json"))
    }

    /// Path of the history stream
    #[must_use]
    pub fn history_path(&self, chain_id: u64, diamond: &Address) -> PathBuf {
        self.dir(chain_id).join(format!("{diamond}.history.jsonl"))
    }

    /// Most recent snapshot, if any has been recorded.
    ///
    /// # Errors
    /// Returns error if stored files cannot be read or parsed
    pub async fn read_latest(
        &self,
        chain_id: u64,
        diamond: &Address,
    ) -> Result<Option<DiamondSnapshot>, StoreError> {
        let latest = self.latest_path(chain_id, diamond);
        if let Some(value) = read_json(&latest).await? {
            return match value {
                Value::Array(_) => {
                    let legacy: Vec<DiamondSnapshot> = serde_json::from_value(value)
                        .map_err(|e| StoreError::json_error(&latest, e))?;
                    Ok(legacy.into_iter().last())
                }
                other => serde_json::from_value(other)
                    .map(Some)
                    .map_err(|e| StoreError::json_error(&latest, e)),
            };
        }
        // latest file lost but history intact
        Ok(self
            .history(chain_id, diamond)
            .await?
            .into_iter()
            .last()
            .map(|e| e.snapshot))
    }

    /// Full history, oldest first. Legacy array files are presented as
    /// history entries without being rewritten.
    ///
    /// # Errors
    /// Returns error if stored files cannot be read or parsed
    pub async fn history(
        &self,
        chain_id: u64,
        diamond: &Address,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(match self.load(chain_id, diamond).await? {
            Stored::Empty => Vec::new(),
            Stored::History(entries) => entries,
            Stored::Legacy(snapshots) => chain_all(ContentHash::ZERO, 0, snapshots)
                .map_err(|e| StoreError::json_error(self.history_path(chain_id, diamond), e))?,
        })
    }

    /// Verify the hash chain of the stored history; returns its length.
    ///
    /// # Errors
    /// Returns [`StoreError::IntegrityViolation`] at the first entry whose
    /// link or hash does not verify
    pub async fn verify_history(&self, chain_id: u64, diamond: &Address) -> Result<usize, StoreError> {
        let path = self.history_path(chain_id, diamond);
        let entries = self.history(chain_id, diamond).await?;
        verify_chain(&path, &entries)?;
        Ok(entries.len())
    }

    /// Append a snapshot to its diamond's history and make it the latest.
    ///
    /// # Errors
    /// Returns error if the snapshot violates selector uniqueness, the
    /// existing chain does not verify, or the files cannot be written
    pub async fn append(&self, snapshot: &DiamondSnapshot) -> Result<HistoryEntry, StoreError> {
        snapshot.validate()?;
        let (chain_id, diamond) = (snapshot.chain_id, snapshot.diamond);
        let history_path = self.history_path(chain_id, &diamond);

        let dir = self.dir(chain_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io_error(&dir, e))?;

        let mut pending = Vec::new();
        let (prev_hash, sequence) = match self.load(chain_id, &diamond).await? {
            Stored::Empty => (ContentHash::ZERO, 0),
            Stored::History(entries) => {
                verify_chain(&history_path, &entries)?;
                tail(&entries)
            }
            Stored::Legacy(snapshots) => {
                tracing::info!(
                    diamond = %diamond,
                    entries = snapshots.len(),
                    "importing legacy snapshot array into history"
                );
                pending = chain_all(ContentHash::ZERO, 0, snapshots)
                    .map_err(|e| StoreError::json_error(&history_path, e))?;
                tail(&pending)
            }
        };

        let entry = HistoryEntry::chain(prev_hash, sequence, snapshot.clone())
            .map_err(|e| StoreError::json_error(&history_path, e))?;
        pending.push(entry.clone());

        let mut lines = String::new();
        for item in &pending {
            let line =
                serde_json::to_string(item).map_err(|e| StoreError::json_error(&history_path, e))?;
            lines.push_str(&line);
            lines.push('\n');
        }
        append_lines(&history_path, &lines).await?;
        self.write_latest(snapshot).await?;

        tracing::info!(
            diamond = %diamond,
            chain_id,
            sequence = entry.sequence,
            hash = %entry.hash.short(),
            "appended snapshot"
        );
        Ok(entry)
    }

    async fn load(&self, chain_id: u64, diamond: &Address) -> Result<Stored, StoreError> {
        let history_path = self.history_path(chain_id, diamond);
        match tokio::fs::read_to_string(&history_path).await {
            Ok(text) => {
                let entries = text
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(serde_json::from_str::<HistoryEntry>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StoreError::json_error(&history_path, e))?;
                return Ok(Stored::History(entries));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io_error(&history_path, e)),
        }

        let latest = self.latest_path(chain_id, diamond);
        match read_json(&latest).await? {
            None => Ok(Stored::Empty),
            Some(value @ Value::Array(_)) => serde_json::from_value(value)
                .map(Stored::Legacy)
                .map_err(|e| StoreError::json_error(&latest, e)),
            // a lone latest file without history is a one-entry legacy stream
            Some(value) => serde_json::from_value(value)
                .map(|s| Stored::Legacy(vec![s]))
                .map_err(|e| StoreError::json_error(&latest, e)),
        }
    }

    async fn write_latest(&self, snapshot: &DiamondSnapshot) -> Result<(), StoreError> {
        let path = self.latest_path(snapshot.chain_id, &snapshot.diamond);
        let tmp = path.with_extension("json.tmp");
        let body =
            serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::json_error(&path, e))?;
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| StoreError::io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io_error(&path, e))
    }
}

fn chain_all(
    mut prev: ContentHash,
    start: u64,
    snapshots: Vec<DiamondSnapshot>,
) -> Result<Vec<HistoryEntry>, serde_json::Error> {
    let mut entries = Vec::with_capacity(snapshots.len());
    for (offset, snapshot) in (0u64..).zip(snapshots) {
        let entry = HistoryEntry::chain(prev, start + offset, snapshot)?;
        prev = entry.hash;
        entries.push(entry);
    }
    Ok(entries)
}

fn tail(entries: &[HistoryEntry]) -> (ContentHash, u64) {
    entries
        .last()
        .map_or((ContentHash::ZERO, 0), |e| (e.hash, e.sequence + 1))
}

fn verify_chain(path: &Path, entries: &[HistoryEntry]) -> Result<(), StoreError> {
    let mut prev = ContentHash::ZERO;
    for (expected_seq, entry) in (0u64..).zip(entries) {
        let linked = link_hash(entry.prev_hash, entry.sequence, &entry.snapshot)
            .map_err(|e| StoreError::json_error(path, e))?;
        if entry.sequence != expected_seq || entry.prev_hash != prev || linked != entry.hash {
            return Err(StoreError::IntegrityViolation {
                path: path.to_path_buf(),
                sequence: entry.sequence,
            });
        }
        prev = entry.hash;
    }
    Ok(())
}

async fn read_json(path: &Path) -> Result<Option<Value>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::json_error(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io_error(path, e)),
    }
}

async fn append_lines(path: &Path, lines: &str) -> Result<(), StoreError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| StoreError::io_error(path, e))?;
    file.write_all(lines.as_bytes())
        .await
        .map_err(|e| StoreError::io_error(path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StoreError::io_error(path, e))
}

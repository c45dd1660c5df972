//! Audit artifacts
//!
//! ```text
//! <reports>/<network>/diff-<diamond>-<unix-ms>.json
//! <reports>/<network>/cut-<diamond>-<unix-ms>.json
//! <reports>/<network>/latest-diff.json -> newest diff (production only)
//! ```
//!
//! Written for humans; the engine never reads them back.

use crate::error::{CutError, CutResult};
use crate::instruction::{CutReceipt, FacetCut, InitCall};
use diamond_artifact::Address;
use diamond_diff::DiffReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Name of the stable pointer to the newest diff report
pub const LATEST_DIFF: &str = "latest-diff.json";

/// What was submitted, for the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutRecord {
    pub diamond: Address,
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    pub deployed: BTreeMap<String, Address>,
    pub cuts: Vec<FacetCut>,
    pub init: InitCall,
    pub receipt: CutReceipt,
}

/// Writes timestamped audit files for one network
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    production: bool,
}

impl ReportWriter {
    /// Writer into `dir`; `production` maintains the latest-diff link
    pub fn new(dir: impl Into<PathBuf>, production: bool) -> Self {
        Self {
            dir: dir.into(),
            production,
        }
    }

    /// Output directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a diff report
    ///
    /// # Errors
    /// Returns error if the file or link cannot be written
    pub async fn write_diff(&self, report: &DiffReport) -> CutResult<PathBuf> {
        let path = self.write_json(&format!("diff-{}", report.diamond), report).await?;
        if self.production {
            if let Some(name) = path.file_name() {
                self.link_latest(Path::new(name)).await?;
            }
        }
        tracing::info!(path = %path.display(), "wrote diff report");
        Ok(path)
    }

    /// Persist the submitted cut
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub async fn write_cut(&self, record: &CutRecord) -> CutResult<PathBuf> {
        let path = self.write_json(&format!("cut-{}", record.diamond), record).await?;
        tracing::info!(path = %path.display(), "wrote cut record");
        Ok(path)
    }

    /// Writes `<prefix>-<unix millis>.json`. Files are never overwritten:
    /// a name already taken gets a `-<n>` suffix.
    async fn write_json<T: Serialize>(&self, prefix: &str, value: &T) -> CutResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CutError::io_error(&self.dir, e))?;
        let body = serde_json::to_vec_pretty(value)?;
        let stem = format!("{prefix}-{}", chrono::Utc::now().timestamp_millis());

        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("{stem}.json"),
                n => format!("{stem}-{n}.json"),
            };
            let path = self.dir.join(name);
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match opened {
                Ok(mut file) => {
                    file.write_all(&body)
                        .await
                        .map_err(|e| CutError::io_error(&path, e))?;
                    file.flush().await.map_err(|e| CutError::io_error(&path, e))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(CutError::io_error(&path, e)),
            }
        }
    }

    async fn link_latest(&self, target: &Path) -> CutResult<()> {
        let link = self.dir.join(LATEST_DIFF);
        match tokio::fs::remove_file(&link).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CutError::io_error(&link, e)),
        }
        #[cfg(unix)]
        {
            tokio::fs::symlink(target, &link)
                .await
                .map_err(|e| CutError::io_error(&link, e))
        }
        #[cfg(not(unix))]
        {
            tokio::fs::copy(self.dir.join(target), &link)
                .await
                .map(|_| ())
                .map_err(|e| CutError::io_error(&link, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> DiffReport {
        DiffReport {
            diamond: Address::new([0xd1; 20]),
            chain_id: 1,
            network: "mainnet".into(),
            git_commit: None,
            reference_block: None,
            reference_timestamp: None,
            live_block: 1,
            live_timestamp: 1,
            drift_detected: false,
            drift: Vec::new(),
            facets: Vec::new(),
            moves: Vec::new(),
            removals: Vec::new(),
            warnings: Vec::new(),
            unplanned_changes: Vec::new(),
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn writes_timestamped_diff() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("localhost"), false);
        let path = writer.write_diff(&report()).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("diff-{}-", Address::new([0xd1; 20]))));
        assert!(!writer.dir().join(LATEST_DIFF).exists());

        let back: DiffReport = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, report());
    }

    #[tokio::test]
    async fn reports_in_the_same_instant_keep_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("localhost"), false);
        let mut paths = Vec::new();
        for _ in 0..5 {
            paths.push(writer.write_diff(&report()).await.unwrap());
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 5);
        assert_eq!(std::fs::read_dir(writer.dir()).unwrap().count(), 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn production_refreshes_latest_link() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("mainnet"), true);
        writer.write_diff(&report()).await.unwrap();
        let path = writer.write_diff(&report()).await.unwrap();

        let link = writer.dir().join(LATEST_DIFF);
        let target = std::fs::read_link(&link).unwrap();
        assert_eq!(target, PathBuf::from(path.file_name().unwrap()));
    }
}

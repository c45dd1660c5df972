//! Build-info cache using moka
//!
//! Build-info records are large (they carry every source file and AST of a
//! compilation) and many artifacts link to the same one. Parsed records are
//! memoized by file path and modification time. The cache is an explicit
//! object handed to the builder, so independent runs never share state
//! unless the caller wants them to.

use crate::error::BuildInfoError;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// One source file of a compilation
#[derive(Debug, Clone, Default)]
pub struct BuildSource {
    /// Original source text
    pub content: String,
    /// solc compact AST of the source unit
    pub ast: Option<Value>,
}

/// Parsed build-info record
#[derive(Debug, Clone, Default)]
pub struct BuildInfo {
    /// Sources keyed by source name (`contracts/facets/AlphaFacet.sol`)
    pub sources: HashMap<String, BuildSource>,
}

impl BuildInfo {
    /// Parse a build-info JSON document
    ///
    /// # Errors
    /// Returns error if the document does not have the build-info shape
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawBuildInfo = serde_json::from_str(json)?;
        let mut sources: HashMap<String, BuildSource> = raw
            .input
            .sources
            .into_iter()
            .map(|(name, src)| {
                (
                    name,
                    BuildSource {
                        content: src.content,
                        ast: None,
                    },
                )
            })
            .collect();
        for (name, out) in raw.output.sources {
            sources.entry(name).or_default().ast = out.ast;
        }
        Ok(Self { sources })
    }

    /// Source by name
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&BuildSource> {
        self.sources.get(name)
    }
}

#[derive(Deserialize)]
struct RawBuildInfo {
    input: RawInput,
    output: RawOutput,
}

#[derive(Deserialize)]
struct RawInput {
    #[serde(default)]
    sources: HashMap<String, RawInputSource>,
}

#[derive(Deserialize)]
struct RawInputSource {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct RawOutput {
    #[serde(default)]
    sources: HashMap<String, RawOutputSource>,
}

#[derive(Deserialize)]
struct RawOutputSource {
    #[serde(default)]
    ast: Option<Value>,
}

/// Cache key: a file is re-parsed whenever its modification time changes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildInfoKey {
    path: PathBuf,
    modified: SystemTime,
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Records currently held
    pub entry_count: u64,
}

/// Memoized build-info records
#[derive(Debug, Clone)]
pub struct BuildInfoCache {
    inner: Cache<BuildInfoKey, Arc<BuildInfo>>,
}

impl BuildInfoCache {
    /// Cache holding at most `max_capacity` parsed records
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Load a build-info file, parsing it only if this (path, mtime) pair
    /// has not been seen before.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub async fn load(&self, path: &Path) -> Result<Arc<BuildInfo>, BuildInfoError> {
        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .map_err(|e| BuildInfoError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let key = BuildInfoKey {
            path: path.to_path_buf(),
            modified,
        };

        if let Some(cached) = self.inner.get(&key).await {
            return Ok(cached);
        }

        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BuildInfoError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let info = Arc::new(BuildInfo::parse(&json).map_err(|e| BuildInfoError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?);
        tracing::debug!(path = %path.display(), sources = info.sources.len(), "parsed build info");

        self.inner.insert(key, Arc::clone(&info)).await;
        Ok(info)
    }

    /// Drop every memoized record
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for BuildInfoCache {
    /// Create cache with default capacity (64 build-info records)
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_info_json() -> String {
        json!({
            "id": "abc",
            "input": {"sources": {"contracts/A.sol": {"content": "contract A {}"}}},
            "output": {
                "sources": {"contracts/A.sol": {"id": 0, "ast": {"nodeType": "SourceUnit", "nodes": []}}},
                "contracts": {}
            }
        })
        .to_string()
    }

    #[test]
    fn parses_sources_and_asts() {
        let info = BuildInfo::parse(&build_info_json()).unwrap();
        let source = info.source("contracts/A.sol").unwrap();
        assert_eq!(source.content, "contract A {}");
        assert!(source.ast.is_some());
    }

    #[test]
    fn rejects_wrong_shape() {
        assert!(BuildInfo::parse("{\"input\": 1}").is_err());
    }

    #[tokio::test]
    async fn same_file_is_parsed_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.json");
        tokio::fs::write(&path, build_info_json()).await.unwrap();

        let cache = BuildInfoCache::default();
        let first = cache.load(&path).await.unwrap();
        let second = cache.load(&path).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn independent_caches_do_not_share_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.json");
        tokio::fs::write(&path, build_info_json()).await.unwrap();

        let a = BuildInfoCache::default();
        let b = BuildInfoCache::default();
        let first = a.load(&path).await.unwrap();
        let second = b.load(&path).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let cache = BuildInfoCache::default();
        let result = cache.load(Path::new("/nonexistent/build-info.json")).await;
        assert!(matches!(result, Err(BuildInfoError::Io { .. })));
    }
}

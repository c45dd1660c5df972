//! Catalog builder
//!
//! Scans a Hardhat-style artifact directory:
//!
//! ```text
//! artifacts/
//! ├── contracts/facets/AlphaFacet.sol/
//! │   ├── AlphaFacet.json        # name, sourceName, abi, bytecode, deployedBytecode
//! │   └── AlphaFacet.dbg.json    # { "buildInfo": "../../../build-info/<id>.json" }
//! └── build-info/<id>.json       # sources + ASTs of one compilation
//! ```
//!
//! A malformed artifact is skipped, not fatal: selector-only matching still
//! works without routine detail.

use crate::cache::{BuildInfo, BuildInfoCache};
use crate::catalog::{ArtifactCatalog, CatalogEntry};
use crate::error::{CatalogError, CatalogResult, SkipReason};
use diamond_artifact::ast::{contract_functions, AstFunction, ContractFunctions};
use diamond_artifact::{decode_hex, AbiSurface, ContentHash, FacetImplementation, Selector, SelectorInfo};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hardhat contract artifact
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    contract_name: String,
    source_name: String,
    abi: Value,
    #[serde(default)]
    bytecode: String,
    #[serde(default)]
    deployed_bytecode: String,
}

/// Hardhat debug file linking an artifact to its build-info
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DbgFile {
    build_info: String,
}

/// An artifact file that did not make it into the catalog
#[derive(Debug, Clone)]
pub struct SkippedArtifact {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of a catalog build
#[derive(Debug, Clone, Default)]
pub struct CatalogBuild {
    pub catalog: ArtifactCatalog,
    pub skipped: Vec<SkippedArtifact>,
}

/// Builds an [`ArtifactCatalog`] from a directory of artifacts
#[derive(Debug)]
pub struct CatalogBuilder<'a> {
    root: PathBuf,
    cache: &'a BuildInfoCache,
}

impl<'a> CatalogBuilder<'a> {
    /// Builder over `root`, memoizing build-info through `cache`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, cache: &'a BuildInfoCache) -> Self {
        Self {
            root: root.into(),
            cache,
        }
    }

    /// Scan the directory and index every deployable artifact.
    ///
    /// # Errors
    /// - `CatalogError::MissingRoot` if the directory does not exist
    /// - `CatalogError::Io` if a directory cannot be listed
    pub async fn build(&self) -> CatalogResult<CatalogBuild> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(CatalogError::MissingRoot(self.root.clone()));
        }

        let mut files = self.artifact_files().await?;
        files.sort();

        let mut build = CatalogBuild::default();
        for path in files {
            match self.load_artifact(&path).await {
                Ok(entry) => {
                    tracing::debug!(
                        facet = entry.name(),
                        selectors = entry.implementation.selectors().len(),
                        has_ast = entry.has_ast,
                        "cataloged facet"
                    );
                    build.catalog.insert(entry);
                }
                Err(reason) => {
                    if reason != SkipReason::NotAnArtifact && reason != SkipReason::EmptyBytecode {
                        tracing::warn!(path = %path.display(), %reason, "skipping artifact");
                    }
                    build.skipped.push(SkippedArtifact { path, reason });
                }
            }
        }

        tracing::info!(
            root = %self.root.display(),
            facets = build.catalog.len(),
            skipped = build.skipped.len(),
            "artifact catalog built"
        );
        Ok(build)
    }

    async fn artifact_files(&self) -> CatalogResult<Vec<PathBuf>> {
        let mut pending = vec![self.root.clone()];
        let mut files = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| CatalogError::io_error(&dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| CatalogError::io_error(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| CatalogError::io_error(&path, e))?;
                let file_name = entry.file_name();
                let file_name = file_name.to_string_lossy();

                if file_type.is_dir() {
                    if file_name != "build-info" {
                        pending.push(path);
                    }
                } else if file_name.ends_with(".json") && !file_name.ends_with(".dbg.json") {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }

    async fn load_artifact(&self, path: &Path) -> Result<CatalogEntry, SkipReason> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| SkipReason::NotAnArtifact)?;
        let artifact: ArtifactFile =
            serde_json::from_str(&text).map_err(|_| SkipReason::NotAnArtifact)?;

        let deployed = decode_hex(&artifact.deployed_bytecode)
            .map_err(|_| SkipReason::UndecodableBytecode)?;
        if deployed.is_empty() {
            return Err(SkipReason::EmptyBytecode);
        }
        let creation_code =
            decode_hex(&artifact.bytecode).map_err(|_| SkipReason::UndecodableBytecode)?;

        let surface =
            AbiSurface::parse(&artifact.abi).map_err(|e| SkipReason::MalformedAbi(e.to_string()))?;

        let functions = self.contract_functions(path, &artifact).await;
        let exported: HashMap<Selector, &AstFunction> = functions
            .as_ref()
            .map(|f| {
                f.exported
                    .iter()
                    .filter_map(|func| func.selector().map(|sel| (sel, func)))
                    .collect()
            })
            .unwrap_or_default();

        let selectors = surface
            .functions
            .iter()
            .map(|func| {
                let ast = exported.get(&func.selector);
                SelectorInfo {
                    selector: func.selector,
                    signature: func.signature.clone(),
                    mutability: func.mutability,
                    implementation_hash: ast.map(|a| a.implementation_hash),
                    source_hash: ast.map(|a| a.source_hash),
                    name: func.name.clone(),
                }
            })
            .collect();

        let implementation = FacetImplementation::new(
            artifact.contract_name.clone(),
            artifact.source_name.clone(),
            ContentHash::keccak256(&deployed),
            surface.abi_hash,
            selectors,
        )
        .map_err(|e| SkipReason::DuplicateSelector(e.to_string()))?
        .with_internal_routines(
            functions
                .as_ref()
                .map(|f| f.internal.clone())
                .unwrap_or_default(),
        )
        .with_events(surface.events.iter().cloned());

        Ok(CatalogEntry {
            implementation,
            creation_code,
            artifact_path: path.to_path_buf(),
            has_ast: functions.is_some(),
        })
    }

    /// Fingerprint the contract's functions from its linked build-info.
    /// Any failure degrades to `None`.
    async fn contract_functions(
        &self,
        artifact_path: &Path,
        artifact: &ArtifactFile,
    ) -> Option<ContractFunctions> {
        let build_info = self.linked_build_info(artifact_path).await?;
        let source = build_info.source(&artifact.source_name)?;
        let ast = source.ast.as_ref()?;
        let functions = contract_functions(ast, &artifact.contract_name, &source.content);
        if functions.is_none() {
            tracing::debug!(
                facet = %artifact.contract_name,
                source = %artifact.source_name,
                "contract definition not found in AST"
            );
        }
        functions
    }

    async fn linked_build_info(&self, artifact_path: &Path) -> Option<std::sync::Arc<BuildInfo>> {
        let dbg_path = dbg_path_for(artifact_path)?;
        let dbg_text = tokio::fs::read_to_string(&dbg_path).await.ok()?;
        let dbg: DbgFile = serde_json::from_str(&dbg_text).ok()?;
        let build_info_path = dbg_path.parent()?.join(dbg.build_info);

        match self.cache.load(&build_info_path).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "build info unavailable, routine detail disabled");
                None
            }
        }
    }
}

fn dbg_path_for(artifact_path: &Path) -> Option<PathBuf> {
    let stem = artifact_path.file_stem()?.to_string_lossy();
    Some(artifact_path.with_file_name(format!("{stem}.dbg.json")))
}

//! Hardhat-style artifact directories on disk

use crate::facets::FacetFixture;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

/// Temporary `artifacts/` tree
pub struct ArtifactDir {
    dir: TempDir,
}

impl ArtifactDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `<sourceName>/<Name>.json` for `facet`. No build-info link, so
    /// the catalog sees the facet without function fingerprints.
    pub fn write(&self, facet: &FacetFixture) -> &Self {
        let abi: Vec<Value> = facet
            .functions
            .iter()
            .map(|f| abi_entry("function", &f.signature))
            .chain(facet.events.iter().map(|e| abi_entry("event", e)))
            .collect();
        let code = format!("0x{}", hex::encode(&facet.code));
        let artifact = json!({
            "_format": "hh-sol-artifact-1",
            "contractName": facet.name,
            "sourceName": facet.source_name,
            "abi": abi,
            "bytecode": code,
            "deployedBytecode": code,
            "linkReferences": {},
            "deployedLinkReferences": {}
        });
        let dir = self.dir.path().join(&facet.source_name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{}.json", facet.name)),
            serde_json::to_vec_pretty(&artifact).unwrap(),
        )
        .unwrap();
        self
    }
}

impl Default for ArtifactDir {
    fn default() -> Self {
        Self::new()
    }
}

/// ABI entry for a flat signature such as `f(uint256,address)`
fn abi_entry(kind: &str, signature: &str) -> Value {
    let (name, rest) = signature.split_once('(').unwrap();
    let params = rest.trim_end_matches(')');
    let inputs: Vec<Value> = params
        .split(',')
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(i, t)| json!({ "name": format!("a{i}"), "type": t, "internalType": t }))
        .collect();
    if kind == "event" {
        return json!({ "type": "event", "name": name, "inputs": inputs, "anonymous": false });
    }
    json!({
        "type": "function",
        "name": name,
        "inputs": inputs,
        "outputs": [],
        "stateMutability": "nonpayable"
    })
}

//! Git-backed working tree

use async_trait::async_trait;
use diamond_diff::{WorkingTree, WorkingTreeError};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::process::Command;

/// Working tree of a git checkout
#[derive(Debug, Clone)]
pub struct GitWorkingTree {
    root: PathBuf,
}

impl GitWorkingTree {
    /// Checkout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn git(&self, args: &[&str]) -> Result<String, WorkingTreeError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| WorkingTreeError(format!("cannot run git: {e}")))?;
        if !output.status.success() {
            return Err(WorkingTreeError(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl WorkingTree for GitWorkingTree {
    async fn head_revision(&self) -> Result<Option<String>, WorkingTreeError> {
        let out = self.git(&["rev-parse", "HEAD"]).await?;
        let rev = out.trim();
        Ok((!rev.is_empty()).then(|| rev.to_string()))
    }

    async fn changed_files(&self) -> Result<BTreeSet<PathBuf>, WorkingTreeError> {
        let out = self
            .git(&["status", "--porcelain", "--untracked-files=all"])
            .await?;
        Ok(parse_porcelain(&out))
    }
}

/// Paths from `git status --porcelain` (v1). Renames yield the new path.
fn parse_porcelain(out: &str) -> BTreeSet<PathBuf> {
    out.lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            let path = path.rsplit_once(" -> ").map_or(path, |(_, to)| to);
            PathBuf::from(path.trim().trim_matches('"'))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_staged_unstaged_untracked_and_renames() {
        let out = " M contracts/facets/Alpha.sol\nM  contracts/facets/Beta.sol\n?? contracts/facets/New.sol\nR  old/Gamma.sol -> contracts/facets/Gamma.sol\n";
        let files = parse_porcelain(out);
        let expected: BTreeSet<PathBuf> = [
            "contracts/facets/Alpha.sol",
            "contracts/facets/Beta.sol",
            "contracts/facets/New.sol",
            "contracts/facets/Gamma.sol",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(files, expected);
    }

    #[test]
    fn quoted_paths_are_unquoted() {
        let files = parse_porcelain("?? \"contracts/with space.sol\"\n");
        assert!(files.contains(&PathBuf::from("contracts/with space.sol")));
    }

    #[tokio::test]
    async fn outside_a_checkout_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tree = GitWorkingTree::new(dir.path());
        // either git is missing or the directory is not a repository
        assert!(tree.changed_files().await.is_err());
    }
}

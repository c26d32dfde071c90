use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

use crate::error::{CiTrendError, Result};

/// Ancestry queries against the trunk branch.
pub trait SourceControl {
    /// Most recent common ancestor of `commit` and trunk.
    fn merge_base(&self, commit: &str) -> Result<String>;
}

/// Bare clone of the project repository kept in a local cache directory.
///
/// Objects are fetched from `origin` lazily: a merge-base query that fails
/// triggers a single fetch of trunk and the requested commit, then one retry.
pub struct GitRepository {
    git_dir: PathBuf,
    remote: String,
    trunk_branch: String,
}

impl GitRepository {
    pub fn new(git_dir: PathBuf, remote: String, trunk_branch: String) -> Self {
        Self {
            git_dir,
            remote,
            trunk_branch,
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        run_git(Some(&self.git_dir), args)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.git_dir.join("HEAD").exists() {
            info!(
                "Initialising repository cache at {}",
                self.git_dir.display()
            );
            fs::create_dir_all(&self.git_dir)?;
            let dir = self.git_dir.to_string_lossy();
            run_git(None, &["init", "--quiet", "--bare", dir.as_ref()])?;
        }

        // A previous run may have died between `init` and `remote add`.
        if self.git(&["remote", "get-url", "origin"]).is_err() {
            debug!("Adding origin {} to {}", self.remote, self.git_dir.display());
            self.git(&["remote", "add", "origin", &self.remote])?;
        }
        Ok(())
    }

    fn fetch(&self, commit: &str) -> Result<()> {
        let refspec = format!(
            "+refs/heads/{0}:refs/remotes/origin/{0}",
            self.trunk_branch
        );
        info!("Fetching {} from {}", self.trunk_branch, self.remote);
        self.git(&["fetch", "--quiet", "origin", &refspec])?;

        // Branch commits are not reachable from trunk; ask for them directly.
        if let Err(e) = self.git(&["fetch", "--quiet", "origin", commit]) {
            warn!("Could not fetch commit {commit} directly: {e}");
        }
        Ok(())
    }

    fn try_merge_base(&self, commit: &str) -> Result<String> {
        let trunk = format!("origin/{}", self.trunk_branch);
        self.git(&["merge-base", commit, &trunk])
    }
}

impl SourceControl for GitRepository {
    fn merge_base(&self, commit: &str) -> Result<String> {
        self.ensure_initialized()?;

        match self.try_merge_base(commit) {
            Ok(base) => Ok(base),
            Err(e) => {
                debug!("merge-base failed before fetch: {e}");
                self.fetch(commit)?;
                self.try_merge_base(commit)
            }
        }
    }
}

fn run_git(git_dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = git_dir {
        cmd.arg("--git-dir").arg(dir);
    }
    let output = cmd
        .args(args)
        .output()
        .map_err(|e| CiTrendError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        return Err(CiTrendError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

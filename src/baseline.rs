use log::{info, warn};
use serde::Serialize;

use crate::config::PipelinesConfig;
use crate::records::PipelineKind;
use crate::store::HistoryStore;
use crate::vcs::SourceControl;

/// Which historical builds a candidate is compared against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BaselineScope {
    /// Most recent trunk builds, no ceiling
    Trunk,
    /// Trunk builds up to the build of the branch's merge-base commit
    MergeBase { commit: String, ceiling: u64 },
    /// Merge-base could not be mapped to a build; unbounded trunk baseline
    Fallback { reason: String },
    /// Ceiling supplied by the caller
    Explicit { ceiling: u64 },
}

impl BaselineScope {
    pub fn ceiling(&self) -> Option<u64> {
        match self {
            Self::MergeBase { ceiling, .. } | Self::Explicit { ceiling } => Some(*ceiling),
            Self::Trunk | Self::Fallback { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Trunk => "most recent trunk builds".to_string(),
            Self::MergeBase { commit, ceiling } => {
                let short: String = commit.chars().take(8).collect();
                format!("trunk builds up to #{ceiling} (merge-base {short})")
            }
            Self::Fallback { reason } => format!("most recent trunk builds ({reason})"),
            Self::Explicit { ceiling } => format!("trunk builds up to #{ceiling}"),
        }
    }
}

/// Pull request number from a branch named `<prefix><digits>...`.
pub fn parse_pull_request(branch: &str, prefix: &str) -> Option<u64> {
    if prefix.is_empty() {
        return None;
    }
    let rest = branch.strip_prefix(prefix)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Decides the baseline scope for a candidate build.
///
/// Trunk builds compare against recent trunk history. Branch builds compare
/// against trunk as it was at their merge-base, so unrelated trunk changes
/// merged later do not show up as differences.
pub struct BaselineResolver<'a> {
    vcs: Option<&'a dyn SourceControl>,
    store: &'a HistoryStore,
    pipelines: &'a PipelinesConfig,
}

impl<'a> BaselineResolver<'a> {
    pub fn new(
        vcs: Option<&'a dyn SourceControl>,
        store: &'a HistoryStore,
        pipelines: &'a PipelinesConfig,
    ) -> Self {
        Self {
            vcs,
            store,
            pipelines,
        }
    }

    pub fn is_trunk(&self, branch: &str) -> bool {
        branch == self.pipelines.trunk_branch
    }

    /// Resolves the scope for a build on `branch` at `commit`.
    ///
    /// Never fails: anything that prevents locating the merge-base build
    /// degrades to [`BaselineScope::Fallback`].
    pub fn resolve(&self, pipeline: PipelineKind, branch: &str, commit: &str) -> BaselineScope {
        if self.is_trunk(branch) {
            return BaselineScope::Trunk;
        }

        let Some(vcs) = self.vcs else {
            return fallback("no git remote configured".to_string());
        };

        let merge_base = match vcs.merge_base(commit) {
            Ok(base) => base,
            Err(e) => return fallback(format!("merge-base lookup failed: {e}")),
        };

        match self.store.find_build_for_commit(pipeline, &merge_base) {
            Some(ceiling) => {
                info!("Branch {branch}: merge-base {merge_base} is build #{ceiling}");
                BaselineScope::MergeBase {
                    commit: merge_base,
                    ceiling,
                }
            }
            None => {
                let short: String = merge_base.chars().take(8).collect();
                fallback(format!("no stored build for merge-base {short}"))
            }
        }
    }
}

fn fallback(reason: String) -> BaselineScope {
    warn!("Falling back to unbounded baseline: {reason}");
    BaselineScope::Fallback { reason }
}

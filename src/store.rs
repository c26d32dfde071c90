use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::records::{JobRecords, PipelineKind, TimingRecord};
use crate::stats::JobStats;

/// All retained records for one job plus statistics derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobHistory {
    /// Newest first
    pub recent: Vec<TimingRecord>,
    pub stats: JobStats,
}

/// Job histories keyed by job name. Sorted keys keep the file diffable.
pub type JobHistories = BTreeMap<String, JobHistory>;

/// On-disk layout of the history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    pub generated_at: DateTime<Utc>,
    pub jobs: JobHistories,
}

/// Append-mostly history of job timings.
///
/// The upstream API only exposes a bounded window of builds, so this file is
/// the only long-term record. Records are keyed by (pipeline, build, job) and
/// are replaced only when the same build is fetched again.
///
/// An unreadable or corrupt file is treated as empty history.
pub struct HistoryStore {
    path: PathBuf,
    jobs: JobHistories,
    /// Serialized job section as last read from or written to disk
    persisted: Option<String>,
}

impl HistoryStore {
    /// Loads the history file at `path`, if any.
    pub fn open(path: &Path) -> Self {
        let document = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<StoreDocument>(&content) {
                Ok(document) => {
                    debug!(
                        "Loaded {} job histories from {}",
                        document.jobs.len(),
                        path.display()
                    );
                    Some(document)
                }
                Err(e) => {
                    warn!(
                        "History file {} is corrupt, starting from empty history: {e}",
                        path.display()
                    );
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No history at {}, starting fresh", path.display());
                None
            }
            Err(e) => {
                warn!(
                    "Failed to read history file {}, starting from empty history: {e}",
                    path.display()
                );
                None
            }
        };

        let persisted = document
            .as_ref()
            .and_then(|doc| serde_json::to_string_pretty(&doc.jobs).ok());

        Self {
            path: path.to_path_buf(),
            jobs: document.map(|doc| doc.jobs).unwrap_or_default(),
            persisted,
        }
    }

    pub fn jobs(&self) -> &JobHistories {
        &self.jobs
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Combines freshly extracted records with the retained history.
    ///
    /// For every job, fresh records win; a retained record survives unless
    /// a fresh record exists for the same (pipeline, build). Statistics are
    /// recomputed from the full merged set.
    pub fn merge(&self, fresh: &JobRecords) -> JobHistories {
        let names: BTreeSet<&str> = self
            .jobs
            .keys()
            .map(String::as_str)
            .chain(fresh.keys().map(String::as_str))
            .collect();

        names
            .into_iter()
            .map(|name| {
                let mut seen: HashSet<(PipelineKind, u64)> = HashSet::new();
                let mut records: Vec<TimingRecord> = fresh
                    .get(name)
                    .into_iter()
                    .flatten()
                    .filter(|r| seen.insert((r.pipeline, r.build)))
                    .cloned()
                    .collect();

                if let Some(existing) = self.jobs.get(name) {
                    records.extend(
                        existing
                            .recent
                            .iter()
                            .filter(|r| !seen.contains(&(r.pipeline, r.build)))
                            .cloned(),
                    );
                }

                sort_for_display(&mut records);
                let durations: Vec<f64> = records.iter().map(|r| r.duration).collect();

                (
                    name.to_string(),
                    JobHistory {
                        stats: JobStats::from_durations(&durations),
                        recent: records,
                    },
                )
            })
            .collect()
    }

    /// Persists `jobs` unless its job section is identical to what is on disk.
    ///
    /// Returns whether the file was written. The file is replaced atomically
    /// via a sibling temporary file.
    pub fn save(&mut self, jobs: JobHistories) -> Result<bool> {
        let serialized = serde_json::to_string_pretty(&jobs)?;

        if self.persisted.as_deref() == Some(serialized.as_str()) {
            info!("Job data unchanged, not rewriting {}", self.path.display());
            self.jobs = jobs;
            return Ok(false);
        }

        let document = StoreDocument {
            generated_at: Utc::now(),
            jobs,
        };
        let content = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        info!(
            "Saved {} job histories to {}",
            document.jobs.len(),
            self.path.display()
        );

        self.persisted = Some(serialized);
        self.jobs = document.jobs;
        Ok(true)
    }

    /// Lowest build number considered fully captured for `pipeline`.
    ///
    /// Takes the `depth` most recent builds of each key job within the
    /// pipeline and returns the minimum. `None` when no key job has history
    /// there, meaning everything must be fetched.
    pub fn captured_threshold(
        &self,
        pipeline: PipelineKind,
        key_jobs: &[String],
        depth: usize,
    ) -> Option<u64> {
        key_jobs
            .iter()
            .filter_map(|name| self.jobs.get(name))
            .flat_map(|history| {
                let mut builds: Vec<u64> = history
                    .recent
                    .iter()
                    .filter(|r| r.pipeline == pipeline)
                    .map(|r| r.build)
                    .collect();
                builds.sort_unstable_by(|a, b| b.cmp(a));
                builds.truncate(depth);
                builds
            })
            .min()
    }

    /// Latest build in `pipeline` whose commit matches `commit`.
    ///
    /// Either side may be a prefix of the other, since stored commits are
    /// shortened.
    pub fn find_build_for_commit(&self, pipeline: PipelineKind, commit: &str) -> Option<u64> {
        if commit.is_empty() {
            return None;
        }

        self.jobs
            .values()
            .flat_map(|history| &history.recent)
            .filter(|r| r.pipeline == pipeline && !r.commit.is_empty())
            .filter(|r| r.commit.starts_with(commit) || commit.starts_with(r.commit.as_str()))
            .map(|r| r.build)
            .max()
    }

    /// Per-job durations of the most recent passed builds in `pipeline`.
    ///
    /// Only builds at or below `ceiling` (when given) are used, and
    /// `exclude_build` is never part of the sample. Each sample holds at most
    /// `depth` durations, newest first. Jobs without any qualifying record are
    /// omitted.
    pub fn baseline_samples(
        &self,
        pipeline: PipelineKind,
        ceiling: Option<u64>,
        exclude_build: Option<u64>,
        depth: usize,
    ) -> BTreeMap<String, Vec<f64>> {
        self.jobs
            .iter()
            .filter_map(|(name, history)| {
                let mut records: Vec<&TimingRecord> = history
                    .recent
                    .iter()
                    .filter(|r| r.pipeline == pipeline && r.passed())
                    .filter(|r| ceiling.map_or(true, |c| r.build <= c))
                    .filter(|r| Some(r.build) != exclude_build)
                    .collect();
                records.sort_by(|a, b| b.build.cmp(&a.build));

                let sample: Vec<f64> = records.iter().take(depth).map(|r| r.duration).collect();
                (!sample.is_empty()).then(|| (name.clone(), sample))
            })
            .collect()
    }
}

fn sort_for_display(records: &mut [TimingRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.pipeline.cmp(&b.pipeline))
            .then_with(|| b.build.cmp(&a.build))
    });
}

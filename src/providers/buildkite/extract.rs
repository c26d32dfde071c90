use log::{debug, warn};

use super::timestamps::{elapsed_seconds, parse_timestamp};
use super::types::{RawBuild, RawJob};
use crate::config::ExtractConfig;
use crate::error::{CiTrendError, Result};
use crate::records::{JobRecords, JobState, PipelineKind, TimingRecord};

/// Turns raw builds from one pipeline into per-job timing records.
///
/// A build that cannot be extracted is logged and skipped; its siblings are
/// still processed. Jobs keep the order in which they were first seen while
/// iterating `builds`.
pub fn extract_builds(
    builds: &[RawBuild],
    pipeline: PipelineKind,
    config: &ExtractConfig,
) -> JobRecords {
    let mut by_job = JobRecords::new();

    for build in builds {
        match extract_build(build, pipeline, config) {
            Ok(records) => {
                for record in records {
                    by_job.entry(record.job.clone()).or_default().push(record);
                }
            }
            Err(e) => warn!("Skipping build: {e}"),
        }
    }

    by_job
}

/// Extracts the qualifying jobs of a single build.
///
/// # Errors
///
/// Fails when the build has no number, commit, or creation timestamp.
pub fn extract_build(
    build: &RawBuild,
    pipeline: PipelineKind,
    config: &ExtractConfig,
) -> Result<Vec<TimingRecord>> {
    let number = build.number.ok_or_else(|| CiTrendError::Extract {
        build: "<unknown>".to_string(),
        reason: "missing build number".to_string(),
    })?;

    let commit = build
        .commit
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CiTrendError::Extract {
            build: number.to_string(),
            reason: "missing commit".to_string(),
        })?;

    let created_at = build
        .created_at
        .as_deref()
        .ok_or_else(|| CiTrendError::Extract {
            build: number.to_string(),
            reason: "missing creation timestamp".to_string(),
        })
        .and_then(|ts| {
            parse_timestamp(ts).map_err(|e| CiTrendError::Extract {
                build: number.to_string(),
                reason: format!("invalid creation timestamp {ts:?}: {e}"),
            })
        })?;

    let commit: String = commit.chars().take(config.commit_length).collect();
    let author = build
        .author
        .as_ref()
        .and_then(|a| a.name.clone())
        .or_else(|| build.creator.as_ref().and_then(|c| c.name.clone()))
        .unwrap_or_default();
    let message = summarize_message(build.message.as_deref(), config.message_length);

    let records = build
        .jobs
        .iter()
        .filter(|job| is_tracked(job, config))
        .filter_map(|job| {
            let name = job.name.as_deref()?;
            let (Some(started), Some(finished)) =
                (job.started_at.as_deref(), job.finished_at.as_deref())
            else {
                debug!("Build {number}: job {name:?} has not finished, skipping");
                return None;
            };
            let Some(duration) = elapsed_seconds(started, finished) else {
                warn!("Build {number}: job {name:?} has malformed timestamps, skipping");
                return None;
            };

            Some(TimingRecord {
                pipeline,
                build: number,
                commit: commit.clone(),
                created_at,
                job: name.to_string(),
                duration,
                state: JobState::from_api(job.state.as_deref().unwrap_or_default()),
                agent: job
                    .agent
                    .as_ref()
                    .and_then(|a| a.name.clone())
                    .unwrap_or_default(),
                author: author.clone(),
                message: message.clone(),
            })
        })
        .collect();

    Ok(records)
}

fn is_tracked(job: &RawJob, config: &ExtractConfig) -> bool {
    if !job.is_script() {
        return false;
    }
    match job.name.as_deref() {
        Some(name) if !name.is_empty() => !config
            .exclude_jobs
            .iter()
            .any(|pattern| name.contains(pattern.as_str())),
        _ => false,
    }
}

fn summarize_message(message: Option<&str>, max_chars: usize) -> String {
    message
        .and_then(|m| m.lines().next())
        .map(|line| line.trim().chars().take(max_chars).collect())
        .unwrap_or_default()
}

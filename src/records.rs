use chrono::{DateTime, Utc};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timing records grouped by job name, in the order jobs were first seen.
pub type JobRecords = IndexMap<String, Vec<TimingRecord>>;

/// Which of the tracked pipelines a build belongs to.
///
/// Build numbers are only unique within one pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Trunk,
    Scheduled,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trunk => f.write_str("trunk"),
            Self::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// Terminal state of a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Passed,
    Failed,
    TimedOut,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl JobState {
    /// Maps a raw API state string onto the states we track.
    pub fn from_api(state: &str) -> Self {
        match state {
            "passed" => Self::Passed,
            "failed" | "broken" => Self::Failed,
            "timed_out" | "timing_out" | "expired" => Self::TimedOut,
            "canceled" | "canceling" => Self::Canceled,
            _ => Self::Unknown,
        }
    }
}

/// One completed job execution.
///
/// Unique by (pipeline, build, job).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub pipeline: PipelineKind,
    pub build: u64,
    /// Fixed-length commit prefix
    pub commit: String,
    pub created_at: DateTime<Utc>,
    pub job: String,
    /// Wall-clock duration in seconds
    pub duration: f64,
    pub state: JobState,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub message: String,
}

impl TimingRecord {
    pub fn passed(&self) -> bool {
        self.state == JobState::Passed
    }

    /// Whether the duration says something about the job's speed. A timed-out
    /// job ran at least as long as its timeout, so it still counts.
    pub fn is_comparable(&self) -> bool {
        matches!(self.state, JobState::Passed | JobState::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod job_state {
        use super::*;

        #[test]
        fn maps_known_api_states() {
            assert_eq!(JobState::from_api("passed"), JobState::Passed);
            assert_eq!(JobState::from_api("failed"), JobState::Failed);
            assert_eq!(JobState::from_api("timed_out"), JobState::TimedOut);
            assert_eq!(JobState::from_api("canceled"), JobState::Canceled);
        }

        #[test]
        fn maps_unrecognised_states_to_unknown() {
            assert_eq!(JobState::from_api("skipped"), JobState::Unknown);
            assert_eq!(JobState::from_api(""), JobState::Unknown);
        }

        #[test]
        fn deserializes_unrecognised_stored_state_as_unknown() {
            let state: JobState = serde_json::from_str("\"waiting_failed\"").unwrap();
            assert_eq!(state, JobState::Unknown);
        }
    }

    #[test]
    fn pipeline_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PipelineKind::Scheduled).unwrap(),
            "\"scheduled\""
        );
        assert_eq!(PipelineKind::Trunk.to_string(), "trunk");
    }
}

use std::collections::{BTreeMap, HashSet};

use log::debug;
use serde::Serialize;

use crate::baseline::BaselineScope;
use crate::config::CompareConfig;
use crate::records::{PipelineKind, TimingRecord};
use crate::stats::{cmp_f64, mean, sample_std, z_test};

/// Verdict for one job of the candidate build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub job: String,
    pub current: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub baseline_n: usize,
    pub percent_change: f64,
    pub z_score: f64,
    pub p_value: f64,
    pub significant: bool,
    /// Slower than baseline (direction only, regardless of significance)
    pub regression: bool,
}

impl ComparisonResult {
    pub fn is_significant_regression(&self) -> bool {
        self.significant && self.regression
    }

    pub fn is_significant_improvement(&self) -> bool {
        self.significant && !self.regression
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Upload/trigger/wait style job
    Mechanical,
    /// Candidate job failed or was canceled
    NotPassed,
    /// Too few baseline observations
    InsufficientBaseline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedJob {
    pub job: String,
    pub reason: SkipReason,
    pub baseline_n: usize,
}

/// Outcome of comparing one build against its baseline.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Detection {
    /// Sorted by percent change, worst regression first
    pub results: Vec<ComparisonResult>,
    pub skipped: Vec<SkippedJob>,
}

/// Everything the renderers need about one comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub build: u64,
    pub pipeline: PipelineKind,
    pub branch: String,
    pub commit: String,
    pub pull_request: Option<u64>,
    pub baseline: BaselineScope,
    pub baseline_depth: usize,
    pub threshold_percent: f64,
    pub results: Vec<ComparisonResult>,
    pub skipped: Vec<SkippedJob>,
}

impl ComparisonReport {
    pub fn regressions(&self) -> impl Iterator<Item = &ComparisonResult> {
        self.results
            .iter()
            .filter(|r| r.is_significant_regression())
    }

    pub fn improvements(&self) -> impl Iterator<Item = &ComparisonResult> {
        self.results
            .iter()
            .filter(|r| r.is_significant_improvement())
    }

    pub fn has_regressions(&self) -> bool {
        self.regressions().next().is_some()
    }
}

/// Percent change of `current` relative to `baseline_mean`. Zero for a zero
/// baseline.
pub fn percent_change(current: f64, baseline_mean: f64) -> f64 {
    if baseline_mean == 0.0 {
        return 0.0;
    }
    (current - baseline_mean) / baseline_mean * 100.0
}

/// Classifies a single job from summary statistics.
///
/// A change is significant only when it is both statistically significant
/// (`p < significance`) and larger in magnitude than `threshold_percent`.
pub fn classify(
    job: &str,
    current: f64,
    baseline_mean: f64,
    baseline_std: f64,
    baseline_n: usize,
    threshold_percent: f64,
    significance: f64,
) -> ComparisonResult {
    let change = percent_change(current, baseline_mean);
    let (z_score, p_value) = z_test(current, baseline_mean, baseline_std, baseline_n);

    ComparisonResult {
        job: job.to_string(),
        current,
        baseline_mean,
        baseline_std,
        baseline_n,
        percent_change: change,
        z_score,
        p_value,
        significant: p_value < significance && change.abs() > threshold_percent,
        regression: change > 0.0,
    }
}

/// Per-job significance testing of a build against baseline samples.
pub struct RegressionDetector {
    threshold_percent: f64,
    significance: f64,
    min_samples: usize,
    mechanical_patterns: Vec<String>,
    include_mechanical: bool,
}

impl RegressionDetector {
    pub fn new(config: &CompareConfig, threshold_percent: f64, include_mechanical: bool) -> Self {
        Self {
            threshold_percent,
            significance: config.significance,
            min_samples: config.min_samples,
            mechanical_patterns: config
                .mechanical_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            include_mechanical,
        }
    }

    pub fn is_mechanical(&self, job: &str) -> bool {
        let job = job.to_lowercase();
        self.mechanical_patterns
            .iter()
            .any(|pattern| job.contains(pattern.as_str()))
    }

    /// Compares the candidate build's records against `baseline` samples.
    ///
    /// Only the first record per job name is used. Jobs without enough
    /// baseline data get no verdict and are listed as skipped.
    pub fn detect(
        &self,
        current: &[TimingRecord],
        baseline: &BTreeMap<String, Vec<f64>>,
    ) -> Detection {
        let mut detection = Detection::default();
        let mut seen = HashSet::new();

        for record in current {
            if !seen.insert(record.job.as_str()) {
                continue;
            }

            let sample = baseline.get(&record.job).map_or(&[][..], Vec::as_slice);
            let skip = |reason| SkippedJob {
                job: record.job.clone(),
                reason,
                baseline_n: sample.len(),
            };

            if !self.include_mechanical && self.is_mechanical(&record.job) {
                detection.skipped.push(skip(SkipReason::Mechanical));
                continue;
            }
            if !record.is_comparable() {
                detection.skipped.push(skip(SkipReason::NotPassed));
                continue;
            }
            if sample.len() < self.min_samples {
                debug!(
                    "{}: only {} baseline samples, skipping",
                    record.job,
                    sample.len()
                );
                detection.skipped.push(skip(SkipReason::InsufficientBaseline));
                continue;
            }

            detection.results.push(classify(
                &record.job,
                record.duration,
                mean(sample),
                sample_std(sample),
                sample.len(),
                self.threshold_percent,
                self.significance,
            ));
        }

        detection
            .results
            .sort_by(|a, b| cmp_f64(b.percent_change, a.percent_change));

        detection
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::records::JobState;
    use chrono::Utc;

    fn current(job: &str, duration: f64) -> TimingRecord {
        TimingRecord {
            pipeline: PipelineKind::Trunk,
            build: 500,
            commit: "abcdef12".to_string(),
            created_at: Utc::now(),
            job: job.to_string(),
            duration,
            state: JobState::Passed,
            agent: String::new(),
            author: String::new(),
            message: String::new(),
        }
    }

    fn detector() -> RegressionDetector {
        RegressionDetector::new(&CompareConfig::default(), 10.0, false)
    }

    mod classify {
        use super::*;

        #[test]
        fn zero_variance_is_never_significant() {
            let sample = [100.0; 5];
            let result = classify(
                "test",
                130.0,
                mean(&sample),
                sample_std(&sample),
                sample.len(),
                10.0,
                0.05,
            );

            assert_eq!(result.z_score, 0.0);
            assert_eq!(result.p_value, 1.0);
            assert!((result.percent_change - 30.0).abs() < 1e-9);
            assert!(!result.significant);
            assert!(result.regression);
        }

        #[test]
        fn large_slowdown_is_significant_regression() {
            let result = classify("test", 130.0, 100.0, 5.0, 20, 10.0, 0.05);

            assert!((result.percent_change - 30.0).abs() < 1e-9);
            assert!(result.significant);
            assert!(result.regression);
            assert!(result.is_significant_regression());
        }

        #[test]
        fn large_speedup_is_significant_improvement() {
            let result = classify("test", 70.0, 100.0, 5.0, 20, 10.0, 0.05);

            assert!(result.significant);
            assert!(!result.regression);
            assert!(result.is_significant_improvement());
        }

        #[test]
        fn statistically_significant_but_small_change_is_not_actionable() {
            // 5% slower with a very tight baseline: p ~ 0, but below threshold
            let result = classify("test", 105.0, 100.0, 1.0, 50, 10.0, 0.05);

            assert!(result.p_value < 0.05);
            assert!(!result.significant);
        }

        #[test]
        fn large_but_noisy_change_is_not_significant() {
            let result = classify("test", 150.0, 100.0, 200.0, 3, 10.0, 0.05);

            assert!(result.p_value > 0.05);
            assert!(!result.significant);
        }

        #[test]
        fn zero_baseline_mean_has_zero_change() {
            assert_eq!(percent_change(10.0, 0.0), 0.0);
        }
    }

    mod detect {
        use super::*;

        fn baseline(entries: &[(&str, Vec<f64>)]) -> BTreeMap<String, Vec<f64>> {
            entries
                .iter()
                .map(|(name, values)| ((*name).to_string(), values.clone()))
                .collect()
        }

        #[test]
        fn sorts_worst_regression_first() {
            let base = baseline(&[
                ("a", vec![100.0, 102.0, 98.0, 101.0]),
                ("b", vec![100.0, 102.0, 98.0, 101.0]),
                ("c", vec![100.0, 102.0, 98.0, 101.0]),
            ]);
            let records = vec![current("a", 90.0), current("b", 150.0), current("c", 110.0)];

            let detection = detector().detect(&records, &base);

            let order: Vec<&str> = detection.results.iter().map(|r| r.job.as_str()).collect();
            assert_eq!(order, vec!["b", "c", "a"]);
        }

        #[test]
        fn skips_jobs_with_too_few_samples() {
            let base = baseline(&[("test", vec![100.0, 101.0])]);
            let detection = detector().detect(&[current("test", 200.0)], &base);

            assert!(detection.results.is_empty());
            assert_eq!(detection.skipped.len(), 1);
            assert_eq!(
                detection.skipped[0].reason,
                SkipReason::InsufficientBaseline
            );
            assert_eq!(detection.skipped[0].baseline_n, 2);
        }

        #[test]
        fn skips_jobs_missing_from_baseline() {
            let detection = detector().detect(&[current("new-job", 10.0)], &BTreeMap::new());

            assert_eq!(detection.skipped[0].baseline_n, 0);
        }

        #[test]
        fn excludes_mechanical_jobs_unless_included() {
            let base = baseline(&[(":pipeline: Upload", vec![5.0, 6.0, 7.0, 5.0])]);
            let records = vec![current(":pipeline: Upload", 30.0)];

            let excluded = detector().detect(&records, &base);
            assert_eq!(excluded.skipped[0].reason, SkipReason::Mechanical);

            let included = RegressionDetector::new(&CompareConfig::default(), 10.0, true)
                .detect(&records, &base);
            assert_eq!(included.results.len(), 1);
        }

        #[test]
        fn skips_failed_candidate_jobs() {
            let base = baseline(&[("test", vec![100.0, 101.0, 99.0])]);
            let mut failed = current("test", 20.0);
            failed.state = JobState::Failed;

            let detection = detector().detect(&[failed], &base);

            assert_eq!(detection.skipped[0].reason, SkipReason::NotPassed);
        }

        #[test]
        fn timed_out_candidate_is_compared() {
            let base = baseline(&[("test", vec![100.0, 101.0, 99.0, 100.0])]);
            let mut timed_out = current("test", 400.0);
            timed_out.state = JobState::TimedOut;

            let detection = detector().detect(&[timed_out], &base);

            assert!(detection.skipped.is_empty());
            assert_eq!(detection.results.len(), 1);
            assert!(detection.results[0].is_significant_regression());
        }

        #[test]
        fn uses_first_record_per_job() {
            let base = baseline(&[("test", vec![100.0, 101.0, 99.0])]);
            let records = vec![current("test", 100.0), current("test", 500.0)];

            let detection = detector().detect(&records, &base);

            assert_eq!(detection.results.len(), 1);
            assert_eq!(detection.results[0].current, 100.0);
        }
    }

    #[test]
    fn report_counts_only_significant_regressions() {
        let report = ComparisonReport {
            build: 1,
            pipeline: PipelineKind::Trunk,
            branch: "main".to_string(),
            commit: "abc".to_string(),
            pull_request: None,
            baseline: BaselineScope::Trunk,
            baseline_depth: 20,
            threshold_percent: 10.0,
            results: vec![
                classify("slow", 130.0, 100.0, 5.0, 20, 10.0, 0.05),
                classify("fast", 70.0, 100.0, 5.0, 20, 10.0, 0.05),
                classify("noisy", 130.0, 100.0, 0.0, 20, 10.0, 0.05),
            ],
            skipped: vec![],
        };

        assert!(report.has_regressions());
        assert_eq!(report.regressions().count(), 1);
        assert_eq!(report.improvements().count(), 1);
    }
}

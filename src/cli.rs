use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::auth::Token;
use crate::baseline::{parse_pull_request, BaselineResolver, BaselineScope};
use crate::config::{Config, OutputFormat};
use crate::error::CiTrendError;
use crate::output::{
    export_report, print_collect_summary, CollectSummary, PhaseProgress, PipelineCollect,
};
use crate::providers::buildkite::{
    extract_build, extract_builds, BuildSource, BuildkiteClient, IncrementalFetcher,
};
use crate::records::{JobRecords, PipelineKind};
use crate::regression::{ComparisonReport, RegressionDetector};
use crate::store::HistoryStore;
use crate::vcs::{GitRepository, SourceControl};

/// How a successful run ended, mapped to the process exit status by `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    Regressions,
}

#[derive(Parser)]
#[command(name = "citrend")]
#[command(author, version, about = "CI job timing regression tracker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./citrend.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Buildkite API token
    #[arg(short, long, global = true, env = "BUILDKITE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new builds and merge their job timings into the history file
    Collect,

    /// Compare a build's job timings against historical trunk builds
    Compare {
        /// Build number of the candidate build
        build: u64,

        /// Number of baseline builds per job
        #[arg(short, long)]
        depth: Option<usize>,

        /// Highest trunk build number allowed in the baseline
        #[arg(long)]
        ceiling: Option<u64>,

        /// Minimum absolute percent change to report
        #[arg(long)]
        threshold: Option<f64>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,

        /// Pipeline the candidate build belongs to
        #[arg(long, value_enum, default_value_t = PipelineKind::Trunk)]
        pipeline: PipelineKind,

        /// Also compare upload, trigger and similar orchestration jobs
        #[arg(long, default_value_t = false)]
        include_mechanical: bool,
    },
}

impl Cli {
    fn token(&self, config: &Config) -> Result<Token> {
        self.token
            .as_deref()
            .or(config.api.token.as_deref())
            .filter(|t| !t.is_empty())
            .map(Token::from)
            .ok_or_else(|| CiTrendError::MissingToken.into())
    }

    fn writer(&self) -> Result<Box<dyn Write>> {
        match &self.output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                Ok(Box::new(file))
            }
            None => Ok(Box::new(io::stdout().lock())),
        }
    }

    async fn execute_collect(&self, config: &Config) -> Result<Outcome> {
        let pipelines = config.pipelines.configured();
        if pipelines.is_empty() {
            return Err(CiTrendError::Config("no pipelines configured".to_string()).into());
        }

        let client = BuildkiteClient::new(&config.api, Some(self.token(config)?))?;
        let fetcher = IncrementalFetcher::new(&client, config.api.page_size, config.api.max_pages);
        let mut store = HistoryStore::open(&config.store.path);
        info!(
            "Loaded history for {} jobs from {}",
            store.jobs().len(),
            store.path().display()
        );

        let progress = PhaseProgress::start_phase_1();
        let mut fresh = JobRecords::new();
        let mut collected = Vec::new();

        for (kind, slug) in pipelines {
            let threshold = store.captured_threshold(
                kind,
                &config.store.key_jobs,
                config.store.key_job_depth,
            );
            let branch = match kind {
                PipelineKind::Trunk => Some(config.pipelines.trunk_branch.as_str()),
                PipelineKind::Scheduled => None,
            };
            info!("Collecting {kind} pipeline {slug} (captured below: {threshold:?})");
            progress.set_message(&format!("Fetching builds of {slug}"));

            let outcome = fetcher.fetch(slug, branch, threshold.unwrap_or(0)).await;
            if let Some(e) = &outcome.error {
                warn!("{slug}: collection incomplete: {e}");
            }

            for (job, records) in extract_builds(&outcome.builds, kind, &config.extract) {
                fresh.entry(job).or_default().extend(records);
            }

            collected.push(PipelineCollect {
                pipeline: kind,
                slug: slug.to_string(),
                threshold,
                builds: outcome.builds.len(),
                pages: outcome.pages_fetched,
                error: outcome.error.map(|e| e.to_string()),
            });
        }

        let builds = collected.iter().map(|p| p.builds).sum();
        let progress = progress.finish_phase_1_start_phase_2(builds);
        let merged = store.merge(&fresh);

        let progress = progress.finish_phase_2_start_phase_3(merged.len());
        let jobs = merged.len();
        let written = store
            .save(merged)
            .with_context(|| format!("Failed to write {}", store.path().display()))?;
        progress.finish_phase_3(written);

        print_collect_summary(&CollectSummary {
            pipelines: collected,
            jobs,
            written,
            path: store.path().to_path_buf(),
        });

        Ok(Outcome::Clean)
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_compare(
        &self,
        config: &Config,
        build: u64,
        depth: Option<usize>,
        ceiling: Option<u64>,
        threshold: Option<f64>,
        format: OutputFormat,
        pipeline: PipelineKind,
        include_mechanical: bool,
    ) -> Result<Outcome> {
        let slug = config.pipelines.slug(pipeline).ok_or_else(|| {
            CiTrendError::Config(format!("no slug configured for the {pipeline} pipeline"))
        })?;
        let depth = depth.unwrap_or(config.compare.baseline_depth);
        let threshold_percent = threshold.unwrap_or(config.compare.threshold_percent);

        let client = BuildkiteClient::new(&config.api, Some(self.token(config)?))?;
        info!("Fetching build #{build} of {slug}");
        let raw = client.fetch_build(slug, build).await?;
        let current = extract_build(&raw, pipeline, &config.extract)?;

        let store = HistoryStore::open(&config.store.path);
        let commit = raw.commit.clone().unwrap_or_default();

        let scope = match ceiling {
            Some(ceiling) => BaselineScope::Explicit { ceiling },
            None => {
                let repo = config.git.remote.as_ref().and_then(|remote| {
                    config.git.resolved_cache_dir().map(|dir| {
                        GitRepository::new(
                            dir,
                            remote.clone(),
                            config.pipelines.trunk_branch.clone(),
                        )
                    })
                });
                let vcs = repo.as_ref().map(|r| r as &dyn SourceControl);
                BaselineResolver::new(vcs, &store, &config.pipelines).resolve(
                    PipelineKind::Trunk,
                    &raw.branch,
                    &commit,
                )
            }
        };
        info!("Baseline: {}", scope.describe());

        // A trunk build must not be part of its own baseline.
        let exclude = (pipeline == PipelineKind::Trunk).then_some(build);
        let baseline = store.baseline_samples(PipelineKind::Trunk, scope.ceiling(), exclude, depth);
        if baseline.is_empty() {
            return Err(CiTrendError::MissingBaseline(format!(
                "no trunk history in {} for {}; run `citrend collect` first",
                store.path().display(),
                scope.describe()
            ))
            .into());
        }

        let detector = RegressionDetector::new(&config.compare, threshold_percent, include_mechanical);
        let detection = detector.detect(&current, &baseline);

        let report = ComparisonReport {
            build,
            pipeline,
            pull_request: parse_pull_request(&raw.branch, &config.pipelines.pr_branch_prefix),
            branch: raw.branch.clone(),
            commit: commit.chars().take(config.extract.commit_length).collect(),
            baseline: scope,
            baseline_depth: depth,
            threshold_percent,
            results: detection.results,
            skipped: detection.skipped,
        };

        let mut writer = self.writer()?;
        export_report(
            &report,
            format,
            self.pretty,
            config.compare.significance,
            &mut writer,
        )?;
        writer.flush()?;

        if report.has_regressions() {
            Ok(Outcome::Regressions)
        } else {
            Ok(Outcome::Clean)
        }
    }

    pub async fn execute(&self) -> Result<Outcome> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Collect => self.execute_collect(&config).await,
            Commands::Compare {
                build,
                depth,
                ceiling,
                threshold,
                format,
                pipeline,
                include_mechanical,
            } => {
                self.execute_compare(
                    &config,
                    *build,
                    *depth,
                    *ceiling,
                    *threshold,
                    *format,
                    *pipeline,
                    *include_mechanical,
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compare_flags() {
        let cli = Cli::try_parse_from([
            "citrend",
            "compare",
            "812",
            "--depth",
            "30",
            "--ceiling",
            "800",
            "--format",
            "markdown",
            "--pipeline",
            "scheduled",
            "--include-mechanical",
        ])
        .unwrap();

        match cli.command {
            Commands::Compare {
                build,
                depth,
                ceiling,
                threshold,
                format,
                pipeline,
                include_mechanical,
            } => {
                assert_eq!(build, 812);
                assert_eq!(depth, Some(30));
                assert_eq!(ceiling, Some(800));
                assert_eq!(threshold, None);
                assert_eq!(format, OutputFormat::Markdown);
                assert_eq!(pipeline, PipelineKind::Scheduled);
                assert!(include_mechanical);
            }
            Commands::Collect => panic!("expected compare"),
        }
    }

    #[test]
    fn test_compare_requires_build_number() {
        assert!(Cli::try_parse_from(["citrend", "compare"]).is_err());
        assert!(Cli::try_parse_from(["citrend", "compare", "latest"]).is_err());
    }

    #[test]
    fn test_cli_token_wins_over_config() {
        let cli = Cli::try_parse_from(["citrend", "--token", "from-cli", "collect"]).unwrap();
        let mut config = Config::default();
        config.api.token = Some("from-config".to_string());

        assert_eq!(cli.token(&config).unwrap().as_str(), "from-cli");
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let cli = Cli {
            command: Commands::Collect,
            config: None,
            token: None,
            output: None,
            pretty: false,
        };

        let err = cli.token(&Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CiTrendError>(),
            Some(CiTrendError::MissingToken)
        ));
    }
}

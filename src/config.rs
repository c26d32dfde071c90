use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::records::PipelineKind;

/// Configuration file structure for citrend.
///
/// Every component receives the section it needs at construction time.
/// Configuration files are loaded from the current directory or specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Remote CI API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Tracked pipelines and branch conventions
    #[serde(default)]
    pub pipelines: PipelinesConfig,

    /// Job filtering during extraction
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Historical store location and capture settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Regression detection parameters
    #[serde(default)]
    pub compare: CompareConfig,

    /// Source-control settings for merge-base lookups
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// REST API base URL
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Organization slug
    #[serde(default)]
    pub organization: String,

    /// API access token
    pub token: Option<String>,

    /// Builds requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on pages fetched per pipeline
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Fixed wait before retrying a rate-limited request
    #[serde(default = "default_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelinesConfig {
    /// Pipeline slug for trunk (and pull request) builds
    #[serde(default)]
    pub trunk: String,

    /// Optional scheduled pipeline slug (e.g. nightly coverage)
    pub scheduled: Option<String>,

    /// Name of the trunk branch
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,

    /// Branch-name prefix preceding a pull request number
    #[serde(default = "default_pr_branch_prefix")]
    pub pr_branch_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractConfig {
    /// Jobs whose name contains any of these substrings are ignored
    #[serde(default)]
    pub exclude_jobs: Vec<String>,

    /// Commit messages are truncated to this many characters
    #[serde(default = "default_message_length")]
    pub message_length: usize,

    /// Commits are stored as a prefix of this length
    #[serde(default = "default_commit_length")]
    pub commit_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Persisted history document
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Jobs expected in every build, used to derive the captured threshold
    #[serde(default)]
    pub key_jobs: Vec<String>,

    /// Most recent records per key job considered for the threshold
    #[serde(default = "default_key_job_depth")]
    pub key_job_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompareConfig {
    /// Number of baseline builds sampled per job
    #[serde(default = "default_baseline_depth")]
    pub baseline_depth: usize,

    /// Minimum absolute percent change considered actionable
    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: f64,

    /// Jobs matching any of these substrings are excluded unless requested
    #[serde(default = "default_mechanical_patterns")]
    pub mechanical_patterns: Vec<String>,

    /// Fewer baseline observations than this skips the job
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// p-value below which a change is statistically significant
    #[serde(default = "default_significance")]
    pub significance: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitConfig {
    /// Remote repository URL fetched into the local cache
    pub remote: Option<String>,

    /// Local cache directory for the bare clone
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Markdown,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            organization: String::new(),
            token: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            rate_limit_delay_secs: default_rate_limit_delay_secs(),
        }
    }
}

impl Default for PipelinesConfig {
    fn default() -> Self {
        Self {
            trunk: String::new(),
            scheduled: None,
            trunk_branch: default_trunk_branch(),
            pr_branch_prefix: default_pr_branch_prefix(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            exclude_jobs: Vec::new(),
            message_length: default_message_length(),
            commit_length: default_commit_length(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            key_jobs: Vec::new(),
            key_job_depth: default_key_job_depth(),
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            baseline_depth: default_baseline_depth(),
            threshold_percent: default_threshold_percent(),
            mechanical_patterns: default_mechanical_patterns(),
            min_samples: default_min_samples(),
            significance: default_significance(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.buildkite.com/v2/".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    50
}

fn default_rate_limit_delay_secs() -> u64 {
    60
}

fn default_trunk_branch() -> String {
    "main".to_string()
}

fn default_pr_branch_prefix() -> String {
    "pull/".to_string()
}

fn default_message_length() -> usize {
    80
}

fn default_commit_length() -> usize {
    8
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/job_timings.json")
}

fn default_key_job_depth() -> usize {
    5
}

fn default_baseline_depth() -> usize {
    20
}

fn default_threshold_percent() -> f64 {
    10.0
}

fn default_mechanical_patterns() -> Vec<String> {
    ["upload", "trigger", "launch", "wait", "block"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_min_samples() -> usize {
    3
}

fn default_significance() -> f64 {
    0.05
}

impl PipelinesConfig {
    /// Pipeline slug for the given kind, if configured.
    pub fn slug(&self, kind: PipelineKind) -> Option<&str> {
        match kind {
            PipelineKind::Trunk => Some(self.trunk.as_str()).filter(|s| !s.is_empty()),
            PipelineKind::Scheduled => self.scheduled.as_deref().filter(|s| !s.is_empty()),
        }
    }

    /// All configured pipelines with their slugs.
    pub fn configured(&self) -> Vec<(PipelineKind, &str)> {
        [PipelineKind::Trunk, PipelineKind::Scheduled]
            .into_iter()
            .filter_map(|kind| self.slug(kind).map(|slug| (kind, slug)))
            .collect()
    }
}

impl GitConfig {
    /// Cache directory for the bare clone, defaulting to the platform cache dir.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("citrend").join("repo")))
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./citrend.toml
    /// 3. ./citrend.json
    /// 4. ./citrend.yaml
    /// 5. ./citrend.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["citrend.toml", "citrend.json", "citrend.yaml", "citrend.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

use serde::{Deserialize, Serialize};

/// A build as returned by the Buildkite REST API.
///
/// Only the fields used for timing analysis are modelled; everything is
/// optional so a single odd payload never fails a whole page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBuild {
    /// Pipeline-scoped build number
    pub number: Option<u64>,
    /// Full commit SHA
    pub commit: Option<String>,
    /// Source branch (e.g. "main", "pull/123/head")
    #[serde(default)]
    pub branch: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: Option<String>,
    /// Commit message
    pub message: Option<String>,
    /// Commit author
    pub author: Option<RawPerson>,
    /// User that triggered the build
    pub creator: Option<RawPerson>,
    /// Jobs embedded in the build
    #[serde(default)]
    pub jobs: Vec<RawJob>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPerson {
    pub name: Option<String>,
}

/// A job embedded in a [`RawBuild`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJob {
    /// Job kind: "script", "waiter", "manual", "trigger"
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub state: Option<String>,
    pub agent: Option<RawAgent>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAgent {
    pub name: Option<String>,
}

impl RawJob {
    pub fn is_script(&self) -> bool {
        self.kind.as_deref() == Some("script")
    }
}

use log::{debug, info, warn};

use super::types::RawBuild;
use crate::error::{CiTrendError, Result};

/// Read access to a CI API's builds.
#[allow(async_fn_in_trait)]
pub trait BuildSource {
    /// One page of builds, newest first. Pages are 1-based.
    async fn list_builds(
        &self,
        pipeline: &str,
        branch: Option<&str>,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<RawBuild>>;

    /// A single build by its pipeline-scoped number.
    async fn fetch_build(&self, pipeline: &str, number: u64) -> Result<RawBuild>;
}

/// Result of paging through one pipeline.
///
/// `error` is set when a request failed part-way; `builds` still holds
/// everything fetched before the failure.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub builds: Vec<RawBuild>,
    pub pages_fetched: usize,
    pub error: Option<CiTrendError>,
}

/// Pages through a pipeline's builds, stopping once it reaches builds that
/// are already fully captured in the local store.
pub struct IncrementalFetcher<'a, S> {
    source: &'a S,
    page_size: usize,
    max_pages: usize,
}

impl<'a, S: BuildSource> IncrementalFetcher<'a, S> {
    pub fn new(source: &'a S, page_size: usize, max_pages: usize) -> Self {
        Self {
            source,
            page_size,
            max_pages,
        }
    }

    /// Fetches every build numbered at or above `fully_captured_below`.
    ///
    /// Paging stops when `max_pages` is exhausted, an empty page comes back,
    /// or a page reaches below the threshold. Builds older than the threshold
    /// are dropped. A threshold of 0 fetches up to `max_pages`.
    ///
    /// Jobs that finish late on builds below the threshold are not picked up.
    pub async fn fetch(
        &self,
        pipeline: &str,
        branch: Option<&str>,
        fully_captured_below: u64,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        for page in 1..=self.max_pages {
            let builds = match self
                .source
                .list_builds(pipeline, branch, page, self.page_size)
                .await
            {
                Ok(builds) => builds,
                Err(e) => {
                    warn!(
                        "Fetching page {page} of {pipeline} failed, keeping {} builds fetched so far: {e}",
                        outcome.builds.len()
                    );
                    outcome.error = Some(e);
                    break;
                }
            };
            outcome.pages_fetched += 1;

            if builds.is_empty() {
                debug!("{pipeline}: page {page} is empty, stopping");
                break;
            }

            let oldest = builds.iter().filter_map(|b| b.number).min();
            let before = outcome.builds.len();
            outcome.builds.extend(
                builds
                    .into_iter()
                    .filter(|b| b.number.map_or(true, |n| n >= fully_captured_below)),
            );
            let contributed = outcome.builds.len() - before;

            debug!(
                "{pipeline}: page {page} contributed {contributed} builds (oldest: {oldest:?})"
            );

            if contributed == 0 || oldest.is_some_and(|n| n < fully_captured_below) {
                info!(
                    "{pipeline}: reached fully captured builds below #{fully_captured_below} after {page} pages"
                );
                break;
            }
        }

        outcome
    }
}

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::fetch::BuildSource;
use super::types::RawBuild;
use crate::auth::Token;
use crate::config::ApiConfig;
use crate::error::{CiTrendError, Result};

/// Buildkite REST API client.
///
/// Requests are sent one at a time. Rate-limited responses (HTTP 429) are
/// retried after a fixed delay with no retry cap; every other failure is
/// returned to the caller.
pub struct BuildkiteClient {
    client: Client,
    api_url: Url,
    organization: String,
    token: Option<Token>,
    rate_limit_delay: Duration,
}

impl BuildkiteClient {
    pub fn new(config: &ApiConfig, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("citrend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CiTrendError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(&config.base_url)
            .map_err(|e| CiTrendError::Config(format!("Invalid base URL: {e}")))?;
        if api_url.cannot_be_a_base() {
            return Err(CiTrendError::Config(format!(
                "Base URL cannot be used for API paths: {}",
                config.base_url
            )));
        }

        if config.organization.is_empty() {
            return Err(CiTrendError::Config(
                "api.organization must be set".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_url,
            organization: config.organization.clone(),
            token,
            rate_limit_delay: Duration::from_secs(config.rate_limit_delay_secs),
        })
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// `{base}/organizations/{org}/pipelines/{pipeline}/builds[/{extra}]`
    fn builds_url(&self, pipeline: &str, extra: Option<&str>) -> Result<Url> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| CiTrendError::Config("Invalid API base URL".to_string()))?;
            segments.pop_if_empty().extend([
                "organizations",
                self.organization.as_str(),
                "pipelines",
                pipeline,
                "builds",
            ]);
            if let Some(extra) = extra {
                segments.push(extra);
            }
        }
        Ok(url)
    }

    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut attempt = 0u32;
        loop {
            let response = self
                .auth_request(self.client.get(url.clone()))
                .send()
                .await?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                attempt += 1;
                warn!(
                    "Rate limited by API. Waiting {}s before retry {attempt}...",
                    self.rate_limit_delay.as_secs()
                );
                tokio::time::sleep(self.rate_limit_delay).await;
                continue;
            }

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(CiTrendError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response.json().await?);
        }
    }
}

impl BuildSource for BuildkiteClient {
    async fn list_builds(
        &self,
        pipeline: &str,
        branch: Option<&str>,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<RawBuild>> {
        let mut url = self.builds_url(pipeline, None)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("page", &page.to_string())
                .append_pair("per_page", &per_page.to_string());
            if let Some(branch) = branch {
                query.append_pair("branch", branch);
            }
        }

        debug!("GET {url}");
        self.get_json(url).await
    }

    async fn fetch_build(&self, pipeline: &str, number: u64) -> Result<RawBuild> {
        let url = self.builds_url(pipeline, Some(&number.to_string()))?;

        debug!("GET {url}");
        self.get_json(url).await.map_err(|e| match e {
            CiTrendError::Api { status: 404, .. } => CiTrendError::BuildNotFound {
                pipeline: pipeline.to_string(),
                number,
            },
            other => other,
        })
    }
}

use std::{process::Command, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::{Octocrab, Page, service::middleware::retry::RetryConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{BranchRef, Forge, PullRequest, RebuildSpec};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: u8 = 100;

/// Looks up a GitHub token in `GITHUB_TOKEN`, `GH_TOKEN`, then `gh auth
/// token`. Returns `None` when no token is available; public repositories
/// can still be listed anonymously.
pub fn get_github_token() -> Option<String> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    let output = match Command::new("gh").args(["auth", "token"]).output() {
        Ok(output) if output.status.success() => output,
        Ok(_) => {
            debug!("gh CLI has no token, continuing unauthenticated");
            return None;
        }
        Err(err) => {
            debug!(error = %err, "gh CLI unavailable, continuing unauthenticated");
            return None;
        }
    };

    String::from_utf8(output.stdout)
        .ok()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[derive(Debug, Deserialize)]
struct RawRepo {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawBranch {
    #[serde(rename = "ref")]
    ref_name: String,
    repo: Option<RawRepo>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    html_url: String,
    updated_at: DateTime<Utc>,
    head: RawBranch,
    base: RawBranch,
}

impl From<RawBranch> for BranchRef {
    fn from(branch: RawBranch) -> Self {
        BranchRef::new(branch.ref_name, branch.repo.map(|repo| repo.id))
    }
}

impl From<RawPullRequest> for PullRequest {
    fn from(pr: RawPullRequest) -> Self {
        PullRequest {
            number: pr.number,
            title: pr.title,
            url: pr.html_url,
            updated_at: pr.updated_at,
            head: pr.head.into(),
            base: pr.base.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ListParams {
    state: &'static str,
    per_page: u8,
}

/// rustls cannot choose between the ring (octocrab) and aws-lc-rs (AWS SDK)
/// backends on its own.
fn install_crypto_provider() {
    // Err means a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// GitHub REST API forge.
pub struct GitHub {
    client: Octocrab,
}

impl GitHub {
    /// Creates a client for the API at `api_url`, authenticated when a token
    /// is given. `timeout` bounds both connecting and reading a response.
    pub fn new(api_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(api_url)
            .with_context(|| format!("Invalid GitHub API URL: '{api_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("GitHub API URL must use http or https, got: '{api_url}'");
        }

        install_crypto_provider();

        let mut builder = Octocrab::builder()
            .base_uri(api_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid GitHub API URL: '{api_url}'"))?
            .add_retry_config(RetryConfig::None)
            .set_connect_timeout(Some(timeout))
            .set_read_timeout(Some(timeout));

        if let Some(token) = token {
            builder = builder.personal_token(token);
        }

        let client = builder.build().context("Failed to create GitHub client")?;
        Ok(Self { client })
    }

    pub fn from_octocrab(client: Octocrab) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn fetch_pull_requests(&self, spec: &RebuildSpec) -> Result<Vec<PullRequest>> {
        let route = format!("/repos/{}/{}/pulls", spec.repo.owner(), spec.repo.name());
        let params = ListParams {
            state: "open",
            per_page: PER_PAGE,
        };

        let mut page: Page<RawPullRequest> = self
            .client
            .get(&route, Some(&params))
            .await
            .with_context(|| format!("GitHub request GET {route} failed"))?;

        let mut pull_requests = Vec::new();
        let mut page_count = 1;

        loop {
            pull_requests.extend(page.take_items().into_iter().map(PullRequest::from));

            if page.next.is_none() {
                break;
            }

            if page_count >= spec.max_pages {
                warn!(
                    repo = %spec.repo,
                    pages = page_count,
                    fetched = pull_requests.len(),
                    "More open pull requests exist than the page limit allows, ignoring the rest"
                );
                break;
            }

            match self
                .client
                .get_page::<RawPullRequest>(&page.next)
                .await
                .with_context(|| {
                    format!("GitHub request for page {} of {route} failed", page_count + 1)
                })?
            {
                Some(next) => page = next,
                None => break,
            }
            page_count += 1;
        }

        debug!(
            repo = %spec.repo,
            count = pull_requests.len(),
            pages = page_count,
            "Fetched open pull requests"
        );
        Ok(pull_requests)
    }
}

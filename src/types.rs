use std::{fmt, sync::LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::policy::Rejection;

/// Default maximum age, in days, of a pull request eligible for rebuild.
pub const DEFAULT_AGE_LIMIT_DAYS: u32 = 15;

/// Default branch a pull request must target to be rebuilt.
pub const DEFAULT_BASE_BRANCH: &str = "master";

/// Default cap on the number of listing pages fetched per run.
pub const DEFAULT_MAX_PAGES: usize = 10;

static GITHUB_REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/([^/?#]+)/([^/?#]+)").expect("static regex is valid")
});

/// Errors produced while turning user input into a [`Repo`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    #[error("repository cannot be empty")]
    Empty,
    #[error("repository must be in format 'owner/repo', got: '{0}'")]
    InvalidFormat(String),
    #[error("URL must look like https://github.com/owner/repo, got: '{0}'")]
    NotGitHubUrl(String),
    #[error("invalid repository component '{0}'")]
    InvalidComponent(String),
}

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();

        for part in [&owner, &name] {
            if part.is_empty() {
                return Err(RepoError::Empty);
            }
            if part.contains('/') || part.chars().any(char::is_whitespace) {
                return Err(RepoError::InvalidComponent(part.clone()));
            }
        }

        Ok(Self { owner, name })
    }

    /// Parses an `owner/repo` slug.
    pub fn parse(slug: &str) -> Result<Self, RepoError> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(RepoError::Empty);
        }

        match slug.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Self::new(*owner, *name),
            _ => Err(RepoError::InvalidFormat(slug.to_string())),
        }
    }

    /// Extracts the repository from a `http(s)://github.com/<owner>/<repo>`
    /// URL. Anything after the repository segment is ignored and a trailing
    /// `.git` is dropped.
    pub fn parse_url(url: &str) -> Result<Self, RepoError> {
        let url = url.trim();
        let captures = GITHUB_REPO_URL
            .captures(url)
            .ok_or_else(|| RepoError::NotGitHubUrl(url.to_string()))?;

        let owner = &captures[1];
        let name = captures[2].strip_suffix(".git").unwrap_or(&captures[2]);

        Self::new(owner, name)
    }

    /// Accepts either a repository URL or an `owner/repo` slug.
    pub fn parse_any(input: &str) -> Result<Self, RepoError> {
        let input = input.trim();
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::parse_url(input)
        } else {
            Self::parse(input)
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One side of a pull request: a branch in some repository.
///
/// `repo_id` is `None` when GitHub no longer knows the repository, which
/// happens once the fork a pull request came from is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub repo_id: Option<u64>,
}

impl BranchRef {
    pub fn new(name: impl Into<String>, repo_id: Option<u64>) -> Self {
        Self {
            name: name.into(),
            repo_id,
        }
    }
}

/// An open pull request as seen at fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub updated_at: DateTime<Utc>,
    pub head: BranchRef,
    pub base: BranchRef,
}

impl PullRequest {
    /// Whole days elapsed between the last update and `now`.
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_days()
    }

    /// True unless head and base are known to live in the same repository.
    pub fn is_from_fork(&self) -> bool {
        match (self.head.repo_id, self.base.repo_id) {
            (Some(head), Some(base)) => head != base,
            _ => true,
        }
    }
}

/// A request to build `branch` in build project `project`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RebuildRequest {
    pub project: String,
    pub branch: String,
}

impl RebuildRequest {
    pub fn new(project: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for RebuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.project, self.branch)
    }
}

/// Everything a rebuild run needs to know.
#[derive(Debug, Clone)]
pub struct RebuildSpec {
    pub repo: Repo,
    pub project: String,
    pub age_limit_days: u32,
    pub base_branch: String,
    pub max_pages: usize,
    /// Report what would be rebuilt without starting any builds.
    pub dry_run: bool,
    /// Abort on the first failed trigger instead of collecting failures.
    pub fail_fast: bool,
}

impl RebuildSpec {
    pub fn new(repo: Repo, project: impl Into<String>) -> Self {
        Self {
            repo,
            project: project.into(),
            age_limit_days: DEFAULT_AGE_LIMIT_DAYS,
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            dry_run: false,
            fail_fast: false,
        }
    }

    pub fn with_age_limit(mut self, days: u32) -> Self {
        self.age_limit_days = days;
        self
    }

    pub fn with_base_branch(mut self, branch: impl Into<String>) -> Self {
        self.base_branch = branch.into();
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn with_fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }
}

/// Source of pull requests.
#[async_trait]
pub trait Forge {
    /// Lists the open pull requests of `spec.repo`.
    async fn fetch_pull_requests(&self, spec: &RebuildSpec) -> anyhow::Result<Vec<PullRequest>>;
}

/// Service able to start a build of a branch.
#[async_trait]
pub trait BuildService {
    /// Starts a build and returns its identifier.
    async fn start_build(&self, request: &RebuildRequest) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Triggered { build_id: String },
    Failed { error: String },
    /// Dry run.
    Skipped,
}

/// A selected pull request and what happened when its rebuild was requested.
#[derive(Debug, Clone)]
pub struct RebuildTask {
    pub pr: PullRequest,
    pub request: RebuildRequest,
    pub outcome: TriggerOutcome,
}

/// Summary of a rebuild run.
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    /// Number of open pull requests returned by the forge.
    pub examined: usize,
    pub rejected: Vec<(PullRequest, Rejection)>,
    pub tasks: Vec<RebuildTask>,
}

impl RebuildReport {
    pub fn requests(&self) -> impl Iterator<Item = &RebuildRequest> {
        self.tasks.iter().map(|task| &task.request)
    }

    pub fn triggered(&self) -> impl Iterator<Item = &RebuildTask> {
        self.tasks
            .iter()
            .filter(|task| matches!(task.outcome, TriggerOutcome::Triggered { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &RebuildTask> {
        self.tasks
            .iter()
            .filter(|task| matches!(task.outcome, TriggerOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

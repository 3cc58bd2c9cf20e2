//! Autorebuild: restart CI builds for open GitHub pull requests.
//!
//! Lists the open pull requests of a repository, keeps those that were
//! updated recently, target the configured base branch and come from the
//! same repository, then starts one AWS CodeBuild build per selected head
//! branch. GitHub and CodeBuild sit behind the [`Forge`] and
//! [`BuildService`] traits.

pub mod cli;
pub mod codebuild;
pub mod github;
pub mod policy;
pub mod rebuild;
pub mod types;

pub use cli::{RunOptions, parse_args};
pub use codebuild::CodeBuild;
pub use github::{GitHub, get_github_token};
pub use policy::{Eligibility, Rejection, check_eligibility, requires_building};
pub use rebuild::{build_pull_requests, rebuild_pull_requests, select_pull_requests};
pub use types::{
    BranchRef, BuildService, Forge, PullRequest, RebuildReport, RebuildRequest, RebuildSpec,
    RebuildTask, Repo, RepoError, TriggerOutcome,
};

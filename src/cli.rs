use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser};

use crate::{
    github::DEFAULT_API_URL,
    types::{DEFAULT_AGE_LIMIT_DAYS, DEFAULT_BASE_BRANCH, DEFAULT_MAX_PAGES, RebuildSpec, Repo},
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Args, Debug, Clone)]
struct SelectionArgs {
    /// Skip pull requests not updated within this many days
    #[arg(
        short = 'a',
        long = "age-limit",
        value_name = "DAYS",
        default_value_t = DEFAULT_AGE_LIMIT_DAYS,
        help_heading = "Selection"
    )]
    pub age_limit: u32,

    /// Only rebuild pull requests targeting this branch
    #[arg(
        short = 'b',
        long = "base-branch",
        value_name = "BRANCH",
        default_value = DEFAULT_BASE_BRANCH,
        help_heading = "Selection"
    )]
    pub base_branch: String,

    /// Maximum number of pull request pages (100 per page) to fetch
    #[arg(
        long = "max-pages",
        value_name = "NUM",
        default_value_t = DEFAULT_MAX_PAGES,
        help_heading = "Selection"
    )]
    pub max_pages: usize,
}

#[derive(Args, Debug, Clone)]
struct ConnectionArgs {
    /// GitHub API base URL (GitHub Enterprise: https://HOST/api/v3)
    #[arg(
        long = "api-url",
        value_name = "URL",
        default_value = DEFAULT_API_URL,
        help_heading = "Connection"
    )]
    pub api_url: String,

    /// AWS region of the CodeBuild project (defaults to the AWS config chain)
    #[arg(long, value_name = "REGION", help_heading = "Connection")]
    pub region: Option<String>,

    /// Timeout in seconds for each GitHub and CodeBuild request
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 30,
        help_heading = "Connection"
    )]
    pub timeout: u64,
}

#[derive(Parser, Debug)]
#[command(
    name = "autorebuild",
    about = "Start CodeBuild builds for the recently updated, same-repository pull requests of a GitHub repository"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// GitHub repository URL (https://github.com/OWNER/REPO) or OWNER/REPO
    #[arg(value_name = "REPO-URL")]
    pub repo: String,

    /// CodeBuild project to start builds in
    #[arg(value_name = "PROJECT")]
    pub project: String,

    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// List the branches that would be rebuilt without starting builds
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Stop at the first failed build trigger
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Log progress and show skipped pull requests
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl CliArgs {
    fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            anyhow::bail!("PROJECT cannot be empty");
        }
        if self.selection.base_branch.trim().is_empty() {
            anyhow::bail!("--base-branch cannot be empty");
        }
        if self.selection.max_pages == 0 {
            anyhow::bail!("--max-pages must be at least 1");
        }
        if self.connection.timeout == 0 {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        Ok(())
    }
}

/// Settings that shape how the run talks to the outside world rather than
/// what it selects.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub api_url: String,
    pub region: Option<String>,
    pub timeout: Duration,
    pub verbose: bool,
}

fn build_spec(cli: CliArgs) -> Result<(RebuildSpec, RunOptions)> {
    cli.validate()?;

    let repo = Repo::parse_any(&cli.repo)
        .map_err(|e| anyhow::anyhow!("Invalid repository '{}': {}", cli.repo, e))?;

    let spec = RebuildSpec::new(repo, cli.project.trim())
        .with_age_limit(cli.selection.age_limit)
        .with_base_branch(cli.selection.base_branch.trim())
        .with_max_pages(cli.selection.max_pages)
        .with_dry_run(cli.dry_run)
        .with_fail_fast(cli.fail_fast);

    let options = RunOptions {
        api_url: cli.connection.api_url,
        region: cli.connection.region,
        timeout: Duration::from_secs(cli.connection.timeout),
        verbose: cli.verbose,
    };

    Ok((spec, options))
}

/// Parses command-line arguments into a rebuild specification and the
/// options for the clients that carry it out.
pub fn parse_args<I, T>(args: I) -> Result<(RebuildSpec, RunOptions)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_spec(cli)
}

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    policy::{Eligibility, Rejection, check_eligibility},
    types::{
        BuildService, Forge, PullRequest, RebuildReport, RebuildRequest, RebuildSpec, RebuildTask,
        Repo, TriggerOutcome,
    },
};

/// Splits `prs` into those selected for rebuild and those rejected, keeping
/// the order they were received in.
pub fn select_pull_requests(
    prs: Vec<PullRequest>,
    spec: &RebuildSpec,
    now: DateTime<Utc>,
) -> (Vec<PullRequest>, Vec<(PullRequest, Rejection)>) {
    let mut selected = Vec::new();
    let mut rejected = Vec::new();

    for pr in prs {
        match check_eligibility(&pr, spec.age_limit_days, &spec.base_branch, now) {
            Eligibility::Eligible => selected.push(pr),
            Eligibility::Rejected(reason) => {
                debug!(pr_number = pr.number, branch = %pr.head.name, %reason, "Skipping pull request");
                rejected.push((pr, reason));
            }
        }
    }

    (selected, rejected)
}

/// Lists open pull requests, selects the ones needing a rebuild and starts
/// one build per selected head branch.
///
/// A listing failure aborts the run before any build is started. Failed
/// triggers are recorded in the report and the remaining branches are still
/// attempted, unless `spec.fail_fast` is set, in which case the first
/// failure is returned as the error.
pub async fn rebuild_pull_requests<F, B>(
    spec: &RebuildSpec,
    forge: &F,
    builder: &B,
    now: DateTime<Utc>,
) -> anyhow::Result<RebuildReport>
where
    F: Forge + Sync,
    B: BuildService + Sync,
{
    let all_prs = forge
        .fetch_pull_requests(spec)
        .await
        .with_context(|| format!("Failed to list pull requests for {}", spec.repo))?;
    let examined = all_prs.len();

    let (selected, rejected) = select_pull_requests(all_prs, spec, now);
    info!(
        repo = %spec.repo,
        examined,
        selected = selected.len(),
        "Selected pull requests for rebuild"
    );

    let mut tasks = Vec::with_capacity(selected.len());

    for pr in selected {
        let request = RebuildRequest::new(&spec.project, &pr.head.name);

        let outcome = if spec.dry_run {
            TriggerOutcome::Skipped
        } else {
            match builder.start_build(&request).await {
                Ok(build_id) => {
                    info!(pr_number = pr.number, %request, %build_id, "Started build");
                    TriggerOutcome::Triggered { build_id }
                }
                Err(err) if spec.fail_fast => {
                    return Err(err.context(format!(
                        "Failed to start build of branch '{}' in project '{}'",
                        request.branch, request.project
                    )));
                }
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(pr_number = pr.number, %request, %error, "Failed to start build");
                    TriggerOutcome::Failed { error }
                }
            }
        };

        tasks.push(RebuildTask {
            pr,
            request,
            outcome,
        });
    }

    Ok(RebuildReport {
        examined,
        rejected,
        tasks,
    })
}

/// Rebuilds the pull requests of the repository at `repo_url` in build
/// project `project`, using the default target branch and an age limit of
/// `age_limit_days` (15 when `None`).
///
/// A malformed URL fails before the forge or build service is contacted.
pub async fn build_pull_requests<F, B>(
    repo_url: &str,
    project: &str,
    age_limit_days: Option<u32>,
    forge: &F,
    builder: &B,
) -> anyhow::Result<RebuildReport>
where
    F: Forge + Sync,
    B: BuildService + Sync,
{
    let repo = Repo::parse_url(repo_url)
        .with_context(|| format!("Invalid repository URL: '{repo_url}'"))?;

    let mut spec = RebuildSpec::new(repo, project);
    if let Some(days) = age_limit_days {
        spec = spec.with_age_limit(days);
    }

    rebuild_pull_requests(&spec, forge, builder, Utc::now()).await
}

use std::io::Write;

use anyhow::Result;
use autorebuild::{PullRequest, RebuildReport, RebuildTask, Rejection, TriggerOutcome};
use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;

const COLUMN_SEPARATOR: &str = "  ";
const TABLE_HEADERS: &[&str] = &["URL", "BRANCH", "UPDATED", "BUILD", "TITLE"];

fn format_relative_time(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    HumanTime::from(time - now).to_string()
}

fn format_outcome(outcome: &TriggerOutcome) -> String {
    match outcome {
        TriggerOutcome::Triggered { build_id } => build_id.clone(),
        TriggerOutcome::Failed { .. } => "FAILED".to_string(),
        TriggerOutcome::Skipped => "dry-run".to_string(),
    }
}

fn task_to_table_row(task: &RebuildTask, now: DateTime<Utc>) -> Vec<String> {
    vec![
        task.pr.url.clone(),
        task.request.branch.clone(),
        format_relative_time(task.pr.updated_at, now),
        format_outcome(&task.outcome),
        task.pr.title.clone(),
    ]
}

/// Widest cell per column, headers included.
fn column_widths(rows: &[Vec<String>]) -> Vec<usize> {
    TABLE_HEADERS
        .iter()
        .enumerate()
        .map(|(column, header)| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .map(|cell| cell.chars().count())
                .fold(header.len(), usize::max)
        })
        .collect()
}

fn render_row<W: Write, S: AsRef<str>>(cells: &[S], widths: &[usize], writer: &mut W) -> Result<()> {
    let last = cells.len().saturating_sub(1);
    for (i, cell) in cells.iter().enumerate() {
        if i == last {
            write!(writer, "{}", cell.as_ref())?;
        } else {
            write!(writer, "{:<width$}{COLUMN_SEPARATOR}", cell.as_ref(), width = widths[i])?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn render_table_separator<W: Write>(widths: &[usize], writer: &mut W) -> Result<()> {
    let dashes: Vec<String> = widths.iter().map(|&width| "-".repeat(width)).collect();
    writeln!(writer, "{}", dashes.join(COLUMN_SEPARATOR))?;
    Ok(())
}

fn display_tasks_table<W: Write>(
    tasks: &[RebuildTask],
    now: DateTime<Utc>,
    writer: &mut W,
) -> Result<()> {
    let rows: Vec<Vec<String>> = tasks.iter().map(|task| task_to_table_row(task, now)).collect();
    let widths = column_widths(&rows);

    render_row(TABLE_HEADERS, &widths, writer)?;
    render_table_separator(&widths, writer)?;
    for row in &rows {
        render_row(row, &widths, writer)?;
    }
    Ok(())
}

fn display_rejected<W: Write>(rejected: &[(PullRequest, Rejection)], writer: &mut W) -> Result<()> {
    writeln!(writer, "Skipped:")?;
    for (i, (pr, reason)) in rejected.iter().enumerate() {
        let prefix = if i == rejected.len() - 1 { "└─" } else { "├─" };
        writeln!(writer, "{prefix}#{} {}: {reason}", pr.number, pr.head.name)?;
    }
    Ok(())
}

fn display_failures<W: Write>(report: &RebuildReport, writer: &mut W) -> Result<()> {
    for task in report.failures() {
        if let TriggerOutcome::Failed { error } = &task.outcome {
            writeln!(writer, "Build of {} failed: {error}", task.request)?;
        }
    }
    Ok(())
}

/// Writes the outcome of a rebuild run: one row per selected pull request,
/// the pull requests that were skipped (when `verbose`) and a summary line.
pub fn display_report<W: Write>(
    report: &RebuildReport,
    dry_run: bool,
    verbose: bool,
    now: DateTime<Utc>,
    writer: &mut W,
) -> Result<()> {
    if report.tasks.is_empty() {
        writeln!(writer, "No pull requests need rebuilding.")?;
    } else {
        display_tasks_table(&report.tasks, now, writer)?;
    }

    if verbose && !report.rejected.is_empty() {
        writeln!(writer)?;
        display_rejected(&report.rejected, writer)?;
    }

    display_failures(report, writer)?;

    writeln!(writer)?;
    if dry_run {
        writeln!(
            writer,
            "{} of {} open pull requests would be rebuilt.",
            report.tasks.len(),
            report.examined
        )?;
    } else {
        let failed = report.failures().count();
        write!(
            writer,
            "Started {} of {} builds ({} open pull requests examined)",
            report.triggered().count(),
            report.tasks.len(),
            report.examined
        )?;
        if failed > 0 {
            write!(writer, ", {failed} failed")?;
        }
        writeln!(writer, ".")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use autorebuild::{BranchRef, RebuildRequest};
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn pr(number: u64, branch: &str, head_repo: Option<u64>) -> PullRequest {
        PullRequest {
            number,
            title: format!("Change {number}"),
            url: format!("https://github.com/acme/widgets/pull/{number}"),
            updated_at: now() - Duration::hours(3),
            head: BranchRef::new(branch, head_repo),
            base: BranchRef::new("master", Some(1)),
        }
    }

    fn task(number: u64, branch: &str, outcome: TriggerOutcome) -> RebuildTask {
        RebuildTask {
            pr: pr(number, branch, Some(1)),
            request: RebuildRequest::new("widgets-ci", branch),
            outcome,
        }
    }

    fn render(report: &RebuildReport, dry_run: bool, verbose: bool) -> String {
        let mut output = Vec::new();
        display_report(report, dry_run, verbose, now(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_report_table() {
        let report = RebuildReport {
            examined: 3,
            rejected: vec![(pr(3, "fork-fix", Some(2)), Rejection::Fork)],
            tasks: vec![
                task(
                    1,
                    "feature-a",
                    TriggerOutcome::Triggered {
                        build_id: "widgets-ci:0001".to_string(),
                    },
                ),
                task(
                    2,
                    "feature-b",
                    TriggerOutcome::Failed {
                        error: "AccessDenied".to_string(),
                    },
                ),
            ],
        };

        let result = render(&report, false, false);

        for header in TABLE_HEADERS {
            assert!(result.contains(header), "missing {header}");
        }
        assert!(result.contains("https://github.com/acme/widgets/pull/1"));
        assert!(result.contains("feature-a"));
        assert!(result.contains("widgets-ci:0001"));
        assert!(result.contains("FAILED"));
        assert!(result.contains("Build of widgets-ci@feature-b failed: AccessDenied"));
        assert!(result.contains("Started 1 of 2 builds (3 open pull requests examined), 1 failed."));
        assert!(!result.contains("Skipped:"));
    }

    #[test]
    fn test_verbose_lists_skipped() {
        let report = RebuildReport {
            examined: 2,
            rejected: vec![
                (pr(3, "fork-fix", Some(2)), Rejection::Fork),
                (
                    pr(4, "old", Some(1)),
                    Rejection::TooOld {
                        age_days: 40,
                        limit_days: 15,
                    },
                ),
            ],
            tasks: vec![],
        };

        let result = render(&report, false, true);

        assert!(result.contains("No pull requests need rebuilding."));
        assert!(result.contains("Skipped:"));
        assert!(result.contains("├─#3 fork-fix:"));
        assert!(result.contains("└─#4 old:"));
        assert!(result.contains("Started 0 of 0 builds (2 open pull requests examined)."));
    }

    #[test]
    fn test_dry_run_summary() {
        let report = RebuildReport {
            examined: 5,
            rejected: vec![],
            tasks: vec![task(1, "feature-a", TriggerOutcome::Skipped)],
        };

        let result = render(&report, true, false);

        assert!(result.contains("dry-run"));
        assert!(result.contains("1 of 5 open pull requests would be rebuilt."));
    }

    #[test]
    fn test_column_widths_count_characters() {
        let rows = vec![vec![
            "u".to_string(),
            "fix-ü".to_string(),
            "now".to_string(),
            "id".to_string(),
            "a much longer title".to_string(),
        ]];
        assert_eq!(column_widths(&rows), vec![3, 6, 7, 5, 19]);
    }
}

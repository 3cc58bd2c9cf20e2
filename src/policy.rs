//! Rules deciding which pull requests get rebuilt.
//!
//! A pull request qualifies when it was updated recently, targets the
//! configured base branch, and its head branch lives in the same repository
//! as the base.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::types::{PullRequest, RebuildSpec};

/// Why a pull request was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooOld { age_days: i64, limit_days: u32 },
    WrongBase { base: String, expected: String },
    Fork,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooOld {
                age_days,
                limit_days,
            } => write!(
                f,
                "last updated {age_days} days ago (limit {limit_days} days)"
            ),
            Rejection::WrongBase { base, expected } => {
                write!(f, "targets '{base}' instead of '{expected}'")
            }
            Rejection::Fork => write!(f, "head branch is in a different repository"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Rejected(Rejection),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Evaluates the rebuild rules against `pr` in order: age, base branch,
/// fork. The first failing rule is reported.
///
/// Age is measured between two UTC instants, so the offset GitHub reports
/// the timestamp in has no effect on the result.
pub fn check_eligibility(
    pr: &PullRequest,
    age_limit_days: u32,
    base_branch: &str,
    now: DateTime<Utc>,
) -> Eligibility {
    let age_days = pr.age_in_days(now);
    if age_days >= i64::from(age_limit_days) {
        return Eligibility::Rejected(Rejection::TooOld {
            age_days,
            limit_days: age_limit_days,
        });
    }

    if pr.base.name != base_branch {
        return Eligibility::Rejected(Rejection::WrongBase {
            base: pr.base.name.clone(),
            expected: base_branch.to_string(),
        });
    }

    if pr.is_from_fork() {
        return Eligibility::Rejected(Rejection::Fork);
    }

    Eligibility::Eligible
}

/// Convenience wrapper over [`check_eligibility`] using the settings in `spec`.
pub fn requires_building(pr: &PullRequest, spec: &RebuildSpec, now: DateTime<Utc>) -> bool {
    check_eligibility(pr, spec.age_limit_days, &spec.base_branch, now).is_eligible()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::types::{BranchRef, Repo};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn pr(days_ago: i64, base: &str, head_repo: u64, base_repo: u64) -> PullRequest {
        PullRequest {
            number: 42,
            title: "Add widget".into(),
            url: "https://github.com/acme/widgets/pull/42".into(),
            updated_at: now() - TimeDelta::days(days_ago),
            head: BranchRef::new("feature/widget", Some(head_repo)),
            base: BranchRef::new(base, Some(base_repo)),
        }
    }

    fn check(pr: &PullRequest) -> Eligibility {
        check_eligibility(pr, 15, "master", now())
    }

    #[test]
    fn recent_same_repo_master_is_eligible() {
        assert_eq!(check(&pr(1, "master", 7, 7)), Eligibility::Eligible);
    }

    #[test]
    fn stale_pull_request_is_rejected() {
        assert_eq!(
            check(&pr(20, "master", 7, 7)),
            Eligibility::Rejected(Rejection::TooOld {
                age_days: 20,
                limit_days: 15
            })
        );
    }

    #[test]
    fn age_limit_is_exclusive() {
        assert!(!check(&pr(15, "master", 7, 7)).is_eligible());
        assert!(check(&pr(14, "master", 7, 7)).is_eligible());
    }

    #[test]
    fn other_base_branch_is_rejected() {
        assert_eq!(
            check(&pr(1, "develop", 7, 7)),
            Eligibility::Rejected(Rejection::WrongBase {
                base: "develop".into(),
                expected: "master".into()
            })
        );
    }

    #[test]
    fn fork_is_rejected() {
        assert_eq!(
            check(&pr(1, "master", 8, 7)),
            Eligibility::Rejected(Rejection::Fork)
        );
    }

    #[test]
    fn deleted_fork_is_rejected() {
        let mut pr = pr(1, "master", 7, 7);
        pr.head.repo_id = None;
        assert_eq!(check(&pr), Eligibility::Rejected(Rejection::Fork));
    }

    #[test]
    fn age_is_reported_before_other_reasons() {
        assert!(matches!(
            check(&pr(30, "develop", 8, 7)),
            Eligibility::Rejected(Rejection::TooOld { .. })
        ));
    }

    #[test]
    fn zero_limit_rejects_everything() {
        assert!(!check_eligibility(&pr(0, "master", 7, 7), 0, "master", now()).is_eligible());
    }

    #[test]
    fn age_uses_instants_not_local_wall_clock() {
        // 08:00 at UTC-8 is 16:00 UTC the previous day: 20 hours before now.
        // Dropping the offset instead would make it 28 hours, a full day.
        let mut pr = pr(0, "master", 7, 7);
        pr.updated_at = DateTime::parse_from_rfc3339("2024-05-19T08:00:00-08:00")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(pr.age_in_days(now()), 0);
        assert!(check_eligibility(&pr, 1, "master", now()).is_eligible());
    }

    #[test]
    fn future_timestamps_are_recent() {
        let pr = pr(-2, "master", 7, 7);
        assert!(check(&pr).is_eligible());
    }

    #[test]
    fn requires_building_uses_spec_settings() {
        let spec = RebuildSpec::new(Repo::new("acme", "widgets").unwrap(), "widgets-ci")
            .with_age_limit(5)
            .with_base_branch("main");

        assert!(requires_building(&pr(4, "main", 7, 7), &spec, now()));
        assert!(!requires_building(&pr(5, "main", 7, 7), &spec, now()));
        assert!(!requires_building(&pr(1, "master", 7, 7), &spec, now()));
    }

    #[test]
    fn rejection_messages() {
        assert_eq!(
            Rejection::TooOld {
                age_days: 20,
                limit_days: 15
            }
            .to_string(),
            "last updated 20 days ago (limit 15 days)"
        );
        assert_eq!(
            Rejection::WrongBase {
                base: "develop".into(),
                expected: "master".into()
            }
            .to_string(),
            "targets 'develop' instead of 'master'"
        );
    }
}

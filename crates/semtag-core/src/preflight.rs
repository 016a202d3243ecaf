//! Preconditions for a bump.
//!
//! A bump only runs inside a repository, on a clean working tree, from the
//! configured default branch. The checks are fail-fast in that order and
//! return a structured report the CLI can print or serialize.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::DEFAULT_BRANCH;
use crate::git::{GitError, VersionControl};

/// Label used for `actual` when `HEAD` is not on a branch.
pub const DETACHED_HEAD: &str = "HEAD (detached)";

/// A failed precondition.
#[derive(Error, Debug)]
pub enum PreflightError {
    /// The working directory is not inside a repository.
    #[error("not inside a git repository")]
    NotARepository,

    /// Uncommitted or untracked changes are present.
    #[error("working tree has uncommitted changes; commit or stash them first")]
    DirtyWorkingTree,

    /// The checked-out branch is not the configured default.
    #[error("on branch '{actual}', but bumps are only allowed from '{expected}'")]
    WrongBranch {
        /// The configured default branch.
        expected: String,
        /// The checked-out branch.
        actual: String,
    },

    /// A repository query failed.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Result alias for precondition checks.
pub type PreflightResult<T> = Result<T, PreflightError>;

/// A single passed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    /// Human-readable name of the check.
    pub name: String,
    /// Confirmation of what was checked.
    pub message: String,
}

/// The checks that passed, in the order they ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// The branch the bump runs from.
    pub branch: String,
}

impl PreflightReport {
    /// One-line summary for stage reporting.
    pub fn summary(&self) -> String {
        format!("clean working tree on '{}'", self.branch)
    }
}

/// Verify the repository is ready for a bump.
///
/// An empty `default_branch` means `main`.
#[instrument(skip(vcs))]
pub fn check_bumpable(
    vcs: &dyn VersionControl,
    default_branch: &str,
) -> PreflightResult<PreflightReport> {
    let expected = if default_branch.trim().is_empty() {
        DEFAULT_BRANCH
    } else {
        default_branch.trim()
    };
    let mut checks = Vec::with_capacity(3);

    if !vcs.is_repository()? {
        return Err(PreflightError::NotARepository);
    }
    checks.push(CheckResult {
        name: "Git repository".into(),
        message: "Inside a git repository".into(),
    });

    if vcs.is_dirty()? {
        return Err(PreflightError::DirtyWorkingTree);
    }
    checks.push(CheckResult {
        name: "Working tree".into(),
        message: "Clean working tree".into(),
    });

    let actual = vcs
        .current_branch()?
        .unwrap_or_else(|| DETACHED_HEAD.to_string());
    if actual != expected {
        return Err(PreflightError::WrongBranch {
            expected: expected.to_string(),
            actual,
        });
    }
    checks.push(CheckResult {
        name: "Default branch".into(),
        message: format!("On default branch '{actual}'"),
    });

    debug!(branch = %actual, "preconditions met");
    Ok(PreflightReport {
        checks,
        branch: actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{GitResult, TagListing};

    struct Repo {
        repository: bool,
        dirty: bool,
        branch: Option<&'static str>,
    }

    impl Default for Repo {
        fn default() -> Self {
            Self {
                repository: true,
                dirty: false,
                branch: Some("main"),
            }
        }
    }

    impl VersionControl for Repo {
        fn is_repository(&self) -> GitResult<bool> {
            Ok(self.repository)
        }
        fn is_dirty(&self) -> GitResult<bool> {
            if !self.repository {
                return Err(GitError::NotARepo);
            }
            Ok(self.dirty)
        }
        fn current_branch(&self) -> GitResult<Option<String>> {
            Ok(self.branch.map(str::to_string))
        }
        fn latest_tag(&self) -> GitResult<String> {
            Err(GitError::NoTags)
        }
        fn list_tags(&self, _limit: usize) -> GitResult<TagListing> {
            Ok(TagListing::default())
        }
        fn stage_all(&self) -> GitResult<()> {
            Ok(())
        }
        fn commit(&self, _message: &str) -> GitResult<String> {
            Ok(String::new())
        }
        fn create_annotated_tag(&self, _name: &str, _message: &str) -> GitResult<String> {
            Ok(String::new())
        }
        fn push(&self, _remote: &str, _tag: &str) -> GitResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn clean_repo_on_default_branch_passes() {
        let report = check_bumpable(&Repo::default(), "main").unwrap();
        assert_eq!(report.branch, "main");
        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.summary(), "clean working tree on 'main'");
    }

    #[test]
    fn outside_repository_fails_first() {
        let repo = Repo {
            repository: false,
            dirty: true,
            ..Repo::default()
        };
        assert!(matches!(
            check_bumpable(&repo, "main"),
            Err(PreflightError::NotARepository)
        ));
    }

    #[test]
    fn dirty_tree_fails_before_branch() {
        let repo = Repo {
            dirty: true,
            branch: Some("feature"),
            ..Repo::default()
        };
        assert!(matches!(
            check_bumpable(&repo, "main"),
            Err(PreflightError::DirtyWorkingTree)
        ));
    }

    #[test]
    fn wrong_branch_names_both() {
        let repo = Repo {
            branch: Some("feature/x"),
            ..Repo::default()
        };
        match check_bumpable(&repo, "trunk") {
            Err(PreflightError::WrongBranch { expected, actual }) => {
                assert_eq!(expected, "trunk");
                assert_eq!(actual, "feature/x");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn detached_head_is_wrong_branch() {
        let repo = Repo {
            branch: None,
            ..Repo::default()
        };
        match check_bumpable(&repo, "main") {
            Err(PreflightError::WrongBranch { actual, .. }) => assert_eq!(actual, DETACHED_HEAD),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_default_branch_means_main() {
        assert!(check_bumpable(&Repo::default(), "").is_ok());
        let repo = Repo {
            branch: Some("master"),
            ..Repo::default()
        };
        assert!(check_bumpable(&repo, "  ").is_err());
    }
}

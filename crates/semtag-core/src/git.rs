//! Version control operations for the bump pipeline.
//!
//! [`VersionControl`] is the narrow surface the orchestrator needs. [`Git`]
//! implements it by shelling out to `git`, which means the user's SSH keys,
//! signing setup and git hooks all apply.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// `git` is not installed or not on `PATH`.
    #[error("git executable not found: {0}")]
    NotInstalled(#[from] which::Error),

    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {output}")]
    Command {
        /// The git subcommand that failed (e.g., "tag").
        command: String,
        /// Captured stdout and stderr.
        output: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,

    /// The repository has no tags reachable from `HEAD`.
    #[error("No tags found")]
    NoTags,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// A page of tag names, newest version first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagListing {
    /// Tag names, at most `limit` of them.
    pub tags: Vec<String>,
    /// Whether more tags exist beyond `limit`.
    pub truncated: bool,
}

/// Repository queries and mutations used by the bump pipeline.
pub trait VersionControl {
    /// Whether the working directory is inside a repository.
    fn is_repository(&self) -> GitResult<bool>;

    /// Whether there are staged, unstaged or untracked changes.
    fn is_dirty(&self) -> GitResult<bool>;

    /// The checked-out branch, or `None` on a detached `HEAD`.
    fn current_branch(&self) -> GitResult<Option<String>>;

    /// The most recent tag reachable from `HEAD`.
    ///
    /// Fails with [`GitError::NoTags`] when there is none.
    fn latest_tag(&self) -> GitResult<String>;

    /// Up to `limit` tags sorted by descending version.
    fn list_tags(&self, limit: usize) -> GitResult<TagListing>;

    /// Stage every change in the working tree.
    fn stage_all(&self) -> GitResult<()>;

    /// Commit staged changes.
    fn commit(&self, message: &str) -> GitResult<String>;

    /// Create an annotated tag at `HEAD`. An empty message uses the name.
    fn create_annotated_tag(&self, name: &str, message: &str) -> GitResult<String>;

    /// Push the current branch and `tag` to `remote`.
    fn push(&self, remote: &str, tag: &str) -> GitResult<String>;
}

/// [`VersionControl`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct Git {
    root: Utf8PathBuf,
}

impl Git {
    /// Operate on the repository containing `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Like [`Git::new`], but fail early if `git` is not on `PATH`.
    #[instrument(skip(root))]
    pub fn discover(root: impl Into<Utf8PathBuf>) -> GitResult<Self> {
        let exe = which::which("git")?;
        debug!(git = %exe.display(), "found git");
        Ok(Self::new(root))
    }

    /// The directory git commands run in.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The top-level directory of the working tree.
    #[instrument(skip(self))]
    pub fn toplevel(&self) -> GitResult<Utf8PathBuf> {
        let output = self.git(&["rev-parse", "--show-toplevel"])?;
        let toplevel = Utf8PathBuf::from(output.trim_end_matches(['\n', '\r']));
        debug!(%toplevel, "working tree root");
        Ok(toplevel)
    }

    /// Run a git command and return its stdout.
    fn git(&self, args: &[&str]) -> GitResult<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root.as_std_path())
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        let combined = [stdout.trim(), stderr.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            output: combined,
        })
    }
}

impl VersionControl for Git {
    #[instrument(skip(self))]
    fn is_repository(&self) -> GitResult<bool> {
        match self.git(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => Ok(output.trim() == "true"),
            Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    fn is_dirty(&self) -> GitResult<bool> {
        let output = self.git(&["status", "--porcelain"])?;
        let dirty = !output.trim().is_empty();
        debug!(dirty, "working tree status");
        Ok(dirty)
    }

    #[instrument(skip(self))]
    fn current_branch(&self) -> GitResult<Option<String>> {
        let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = output.trim().to_string();
        if branch == "HEAD" {
            debug!("detached HEAD");
            Ok(None)
        } else {
            debug!(%branch, "current branch");
            Ok(Some(branch))
        }
    }

    #[instrument(skip(self))]
    fn latest_tag(&self) -> GitResult<String> {
        match self.git(&["describe", "--tags", "--abbrev=0"]) {
            Ok(output) => {
                let tag = output.trim().to_string();
                debug!(%tag, "latest tag");
                Ok(tag)
            }
            Err(GitError::Command { output, .. })
                if output.contains("No names found")
                    || output.contains("No tags can describe")
                    || output.contains("cannot describe anything") =>
            {
                debug!("no tags");
                Err(GitError::NoTags)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    fn list_tags(&self, limit: usize) -> GitResult<TagListing> {
        let output = self.git(&["tag", "--list", "--sort=-version:refname"])?;
        let listing = parse_tag_list(&output, limit);
        debug!(
            count = listing.tags.len(),
            truncated = listing.truncated,
            "listed tags"
        );
        Ok(listing)
    }

    #[instrument(skip(self))]
    fn stage_all(&self) -> GitResult<()> {
        self.git(&["add", "--all"])?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn commit(&self, message: &str) -> GitResult<String> {
        self.git(&["commit", "--message", message])
    }

    #[instrument(skip(self))]
    fn create_annotated_tag(&self, name: &str, message: &str) -> GitResult<String> {
        let message = if message.trim().is_empty() {
            name
        } else {
            message
        };
        self.git(&["tag", "--annotate", name, "--message", message])
    }

    #[instrument(skip(self))]
    fn push(&self, remote: &str, tag: &str) -> GitResult<String> {
        let tag_ref = format!("refs/tags/{tag}");
        self.git(&["push", remote, "HEAD", &tag_ref])
    }
}

/// Split `git tag` output into at most `limit` names.
pub fn parse_tag_list(output: &str, limit: usize) -> TagListing {
    let mut all = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());
    let tags: Vec<String> = all.by_ref().take(limit).map(str::to_string).collect();
    let truncated = all.next().is_some();
    TagListing { tags, truncated }
}

//! Command implementations

pub mod bump;

pub mod init;

pub mod latest;

pub mod list;

use std::fmt;

use anyhow::{Context, bail};
use camino::Utf8Path;
use semtag_core::bump::BumpError;
use semtag_core::git::{Git, VersionControl};

/// The user declined a confirmation prompt.
///
/// Not a failure: `main` reports it without an error banner and exits with
/// status 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aborted;

impl fmt::Display for Aborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Aborted")
    }
}

impl std::error::Error for Aborted {}

/// Whether `err` (or anything it wraps) is a declined prompt.
pub fn is_aborted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<Aborted>()
            || cause
                .downcast_ref::<BumpError>()
                .is_some_and(BumpError::is_aborted)
    })
}

/// The repository containing `cwd`, for read-only commands.
pub fn repository(cwd: &Utf8Path) -> anyhow::Result<Git> {
    let git = Git::discover(cwd).context("git is required")?;
    if !git.is_repository().context("failed to query git")? {
        bail!("not inside a git repository: {cwd}");
    }
    Ok(git)
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Mutating actions of the bump pipeline.
//!
//! The orchestrator never touches the filesystem, the repository or a hook
//! directly. It asks an [`Effects`] implementation to do so. [`Apply`]
//! performs each action; [`Preview`] describes it and changes nothing. The
//! control flow in [`crate::bump`] is the same for both, so a dry run walks
//! exactly the decisions a real run would.

use std::io::Write;

use tracing::{debug, instrument};

use crate::bump::{BumpResult, StageOutcome};
use crate::context::BumpContext;
use crate::git::VersionControl;
use crate::hooks::{self, HookStage};
use crate::replace::{self, PlannedEdit};

/// One method per side effect of a bump.
///
/// Methods return a human-readable description of what was (or would be)
/// done.
pub trait Effects {
    /// Whether actions are only described.
    fn is_preview(&self) -> bool;

    /// Run the hook configured for `stage`.
    fn run_hook(&mut self, stage: HookStage, context: &BumpContext) -> BumpResult<StageOutcome>;

    /// Write checked file edits, the config file's version record included.
    fn write_files(&mut self, edits: &[PlannedEdit]) -> BumpResult<String>;

    /// Whether there is anything to commit.
    fn tree_dirty(&mut self) -> BumpResult<bool>;

    /// Stage everything and commit.
    fn commit(&mut self, message: &str) -> BumpResult<String>;

    /// Create the annotated release tag.
    fn create_tag(&mut self, name: &str, message: &str) -> BumpResult<String>;

    /// Push the branch and tag.
    fn push(&mut self, remote: &str, tag: &str) -> BumpResult<String>;
}

// ──────────────────────────────────────────────
// Apply
// ──────────────────────────────────────────────

/// Performs every action against the real repository and filesystem.
pub struct Apply<'a> {
    vcs: &'a dyn VersionControl,
    stdout: &'a mut dyn Write,
    stderr: &'a mut dyn Write,
}

impl<'a> Apply<'a> {
    /// Act on `vcs`, forwarding hook output to `stdout` and `stderr`.
    pub fn new(
        vcs: &'a dyn VersionControl,
        stdout: &'a mut dyn Write,
        stderr: &'a mut dyn Write,
    ) -> Self {
        Self {
            vcs,
            stdout,
            stderr,
        }
    }
}

impl Effects for Apply<'_> {
    fn is_preview(&self) -> bool {
        false
    }

    #[instrument(skip(self, context))]
    fn run_hook(&mut self, stage: HookStage, context: &BumpContext) -> BumpResult<StageOutcome> {
        let Some(command) = context.hooks.command(stage) else {
            return Ok(StageOutcome::Skipped {
                reason: format!("no {stage} hook configured"),
            });
        };
        hooks::run_stage(
            stage,
            command,
            &context.hook_context(),
            &mut *self.stdout,
            &mut *self.stderr,
        )?;
        Ok(StageOutcome::Success {
            message: format!("ran {command}"),
        })
    }

    fn write_files(&mut self, edits: &[PlannedEdit]) -> BumpResult<String> {
        replace::apply_edits(edits)?;
        let occurrences: usize = edits.iter().map(|edit| edit.occurrences).sum();
        let files = edits.iter().filter(|edit| !edit.rules.is_empty()).count();
        let mut lines = vec![format!(
            "replaced {occurrences} occurrence{} in {files} file{}",
            plural(occurrences),
            plural(files)
        )];
        lines.extend(edits.iter().filter_map(|edit| {
            let version = edit.records_version.as_ref()?;
            Some(format!("recorded version {version} in {}", edit.target))
        }));
        Ok(lines.join("\n"))
    }

    fn tree_dirty(&mut self) -> BumpResult<bool> {
        Ok(self.vcs.is_dirty()?)
    }

    fn commit(&mut self, message: &str) -> BumpResult<String> {
        self.vcs.stage_all()?;
        let output = self.vcs.commit(message)?;
        debug!(output = output.trim(), "committed");
        Ok(format!("committed \"{message}\""))
    }

    fn create_tag(&mut self, name: &str, message: &str) -> BumpResult<String> {
        self.vcs.create_annotated_tag(name, message)?;
        Ok(format!("created tag {name}"))
    }

    fn push(&mut self, remote: &str, tag: &str) -> BumpResult<String> {
        let output = self.vcs.push(remote, tag)?;
        debug!(output = output.trim(), "pushed");
        Ok(format!("pushed {tag} to {remote}"))
    }
}

// ──────────────────────────────────────────────
// Preview
// ──────────────────────────────────────────────

/// Describes every action without performing it.
///
/// Tracks what a real run would have changed so that [`Effects::tree_dirty`]
/// gives the answer the real repository would.
#[derive(Debug, Default)]
pub struct Preview {
    pending_changes: bool,
}

impl Preview {
    /// A preview with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Effects for Preview {
    fn is_preview(&self) -> bool {
        true
    }

    fn run_hook(&mut self, stage: HookStage, context: &BumpContext) -> BumpResult<StageOutcome> {
        let command = context.hooks.command(stage).unwrap_or("(none)");
        Ok(StageOutcome::Success {
            message: format!("Would run hook {stage}: {command}"),
        })
    }

    fn write_files(&mut self, edits: &[PlannedEdit]) -> BumpResult<String> {
        self.pending_changes |= edits.iter().any(PlannedEdit::changes_content);
        let mut lines: Vec<String> = edits
            .iter()
            .flat_map(|edit| &edit.rules)
            .map(|rule| {
                format!(
                    "Would replace {} with {} in {}",
                    rule.search, rule.replace, rule.path
                )
            })
            .collect();
        lines.extend(edits.iter().filter_map(|edit| {
            let version = edit.records_version.as_ref()?;
            Some(format!("Would record version {version} in {}", edit.target))
        }));
        Ok(lines.join("\n"))
    }

    fn tree_dirty(&mut self) -> BumpResult<bool> {
        Ok(self.pending_changes)
    }

    fn commit(&mut self, message: &str) -> BumpResult<String> {
        Ok(format!("Would commit \"{message}\""))
    }

    fn create_tag(&mut self, name: &str, _message: &str) -> BumpResult<String> {
        Ok(format!("Would issue new tag {name}"))
    }

    fn push(&mut self, remote: &str, tag: &str) -> BumpResult<String> {
        Ok(format!("Would push {tag} to {remote}"))
    }
}

const fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

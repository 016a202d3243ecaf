//! Per-invocation bump state.
//!
//! A [`BumpContext`] is built once, after the version is resolved and every
//! template has been rendered. It is never rendered again, so the message,
//! tag and file rules it carries are always plain text for the `current`
//! and `next` pair it was built with.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::hooks::{HookContext, HookSet};
use crate::template::RenderedFile;
use crate::version::{BumpKind, SemanticVersion};

/// Everything one bump needs to know after planning.
#[derive(Debug, Clone, Serialize)]
pub struct BumpContext {
    // ── Version ──
    /// The version being bumped from.
    pub current: SemanticVersion,
    /// The version being bumped to.
    pub next: SemanticVersion,
    /// Which component was bumped.
    pub kind: BumpKind,

    // ── Control ──
    /// Report actions without performing them.
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub force: bool,
    /// Push the commit and tag after tagging.
    pub push: bool,

    // ── Rendered ──
    /// File rules with both templates rendered, in declaration order.
    pub files: Vec<RenderedFile>,
    /// Hook commands per stage.
    pub hooks: HookSet,
    /// Commit message for the version commit.
    pub commit_message: String,
    /// Name (and message) of the annotated tag.
    pub tag_name: String,

    // ── Project ──
    /// Whether files are rewritten and committed.
    pub replace_mode: bool,
    /// Config file the new version is recorded in.
    pub config_path: Option<Utf8PathBuf>,
    /// Directory file paths and hooks are relative to.
    pub project_root: Utf8PathBuf,
    /// Remote used for `push`.
    pub remote: String,
}

impl BumpContext {
    /// The view of this bump handed to hook commands.
    pub fn hook_context(&self) -> HookContext<'_> {
        HookContext {
            project_root: &self.project_root,
            current_version: self.current.to_string(),
            next_version: self.next.to_string(),
            tag: self.tag_name.clone(),
        }
    }

    /// The project root.
    pub fn root(&self) -> &Utf8Path {
        &self.project_root
    }
}

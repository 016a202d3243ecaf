//! Version bump planning and execution.
//!
//! All orchestration logic lives here. The CLI is purely a display layer.
//!
//! # Three-step workflow
//!
//! 1. **Plan** ([`plan_bump`]): check preconditions, resolve the current
//!    version, compute the next one and render every template.
//! 2. **Confirm** ([`ReadyBump::confirm`]): ask the user, unless forced.
//!    Declining yields [`BumpError::Aborted`].
//! 3. **Execute** ([`ConfirmedBump::execute`]): run hooks, rewrite files,
//!    commit, tag and push, reporting each stage through a callback.
//!
//! Only a [`ConfirmedBump`] can execute, so nothing mutating can run before
//! confirmation. Dry runs execute through [`Preview`], real runs through
//! [`Apply`]; the stage sequence is shared.

use std::io::{self, Write};

use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{self, Config, FileRule};
use crate::context::BumpContext;
use crate::effects::{Apply, Effects, Preview};
use crate::error::ConfigError;
use crate::git::{GitError, VersionControl};
use crate::hooks::{HookError, HookSet, HookStage};
use crate::preflight::{self, PreflightError};
use crate::replace::{self, PlannedEdit, ReplaceError};
use crate::template::{self, TemplateError, TemplateVars};
use crate::version::{BumpKind, SemanticVersion, VersionError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from bump operations.
#[derive(Error, Debug)]
pub enum BumpError {
    /// A precondition was not met.
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    /// Version parsing or computation failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A template did not parse.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A file could not be rewritten.
    #[error(transparent)]
    Replace(#[from] ReplaceError),

    /// A hook failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// A git command failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The new version could not be recorded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The confirmation prompt could not be shown.
    #[error("confirmation prompt failed: {0}")]
    Prompt(#[source] io::Error),

    /// The user declined the confirmation prompt.
    #[error("Aborted")]
    Aborted,
}

impl BumpError {
    /// Whether the user declined, as opposed to something failing.
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Result alias for bump operations.
pub type BumpResult<T> = Result<T, BumpError>;

// ──────────────────────────────────────────────
// Inputs
// ──────────────────────────────────────────────

/// Project settings for a bump, fixed for the whole invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpSettings {
    /// Directory containing the project; file rules and hooks are relative to it.
    pub project_root: Utf8PathBuf,
    /// The project config file, where the new version is recorded.
    pub config_path: Option<Utf8PathBuf>,
    /// The version recorded by the previous bump.
    pub recorded_version: Option<String>,
    /// Bumps are refused on any other branch.
    pub default_branch: String,
    /// Raw commit message template.
    pub message_template: String,
    /// Raw tag name template.
    pub tag_template: String,
    /// Remote to push to.
    pub remote: String,
    /// Hook commands.
    pub hooks: HookSet,
    /// Raw file rules, in declaration order.
    pub files: Vec<FileRule>,
}

impl BumpSettings {
    /// Settings from a loaded config.
    pub fn from_config(
        config: &Config,
        project_root: impl Into<Utf8PathBuf>,
        config_path: Option<Utf8PathBuf>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            config_path,
            recorded_version: config.version.clone(),
            default_branch: config.git.default_branch.clone(),
            message_template: config.git.message_template.clone(),
            tag_template: config.git.tag_template.clone(),
            remote: config.git.remote.clone(),
            hooks: config.hooks.clone(),
            files: config.files.clone(),
        }
    }

    /// Whether bumps rewrite files and commit them.
    pub fn replace_mode(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Per-invocation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BumpOptions {
    /// Which component to bump.
    pub kind: BumpKind,
    /// Describe actions instead of performing them.
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub force: bool,
    /// Push after tagging.
    pub push: bool,
}

impl BumpOptions {
    /// Options for a plain interactive bump.
    pub const fn new(kind: BumpKind) -> Self {
        Self {
            kind,
            dry_run: false,
            force: false,
            push: false,
        }
    }
}

// ──────────────────────────────────────────────
// Stages and events
// ──────────────────────────────────────────────

/// Stages of a bump, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpStage {
    /// Repository, working tree and branch checks.
    PreconditionCheck,
    /// Current and next version.
    VersionResolution,
    /// The interactive yes/no.
    Confirmation,
    /// A user hook.
    Hook(HookStage),
    /// Rewrite files and record the version.
    Replace,
    /// Commit the rewritten files.
    Commit,
    /// Create the annotated tag.
    Tag,
    /// Push branch and tag.
    Push,
}

impl std::fmt::Display for BumpStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreconditionCheck => write!(f, "preconditions"),
            Self::VersionResolution => write!(f, "version"),
            Self::Confirmation => write!(f, "confirmation"),
            Self::Hook(stage) => write!(f, "{stage} hook"),
            Self::Replace => write!(f, "replace"),
            Self::Commit => write!(f, "commit"),
            Self::Tag => write!(f, "tag"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StageOutcome {
    /// Stage completed (or, in a dry run, was described).
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Stage did not apply.
    Skipped {
        /// Why the stage was skipped.
        reason: String,
    },
}

/// Events emitted during execution for progress reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpEvent {
    /// A stage has started.
    StageStarted(BumpStage),
    /// A stage has completed.
    StageCompleted(BumpStage, StageOutcome),
}

/// Outcome of a full bump.
#[derive(Debug, Clone, Serialize)]
pub struct BumpOutcome {
    /// The version bumped from.
    pub previous: SemanticVersion,
    /// The version bumped to.
    pub version: SemanticVersion,
    /// The tag created (or that would be created).
    pub tag: String,
    /// Results of each stage.
    pub stages: Vec<(BumpStage, StageOutcome)>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// The full bump context.
    pub context: BumpContext,
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// A planned bump awaiting confirmation.
#[derive(Debug, Clone)]
pub struct ReadyBump {
    context: BumpContext,
    stages: Vec<(BumpStage, StageOutcome)>,
}

/// A confirmed bump, ready to execute.
#[derive(Debug, Clone)]
pub struct ConfirmedBump {
    context: BumpContext,
    stages: Vec<(BumpStage, StageOutcome)>,
}

/// Check preconditions, resolve versions and render templates.
///
/// Nothing is modified. Every template is rendered here, once, so template
/// errors surface before the user is asked to confirm.
#[instrument(skip(vcs, settings), fields(kind = %options.kind, dry_run = options.dry_run))]
pub fn plan_bump(
    vcs: &dyn VersionControl,
    settings: &BumpSettings,
    options: BumpOptions,
) -> BumpResult<ReadyBump> {
    let mut stages = Vec::new();

    let report = preflight::check_bumpable(vcs, &settings.default_branch)?;
    stages.push((
        BumpStage::PreconditionCheck,
        StageOutcome::Success {
            message: report.summary(),
        },
    ));

    let (current, source) = resolve_current(vcs, settings)?;
    let next = current.bump(options.kind)?;
    info!(%current, %next, source, "version resolved");
    stages.push((
        BumpStage::VersionResolution,
        StageOutcome::Success {
            message: format!("{current} → {next} ({} bump, {source})", options.kind),
        },
    ));

    let vars = TemplateVars::new(&current, &next);
    let commit_message =
        template::render_field("git.message-template", &settings.message_template, &vars)?;
    let tag_name = template::render_field("git.tag-template", &settings.tag_template, &vars)?;
    let files = settings
        .files
        .iter()
        .map(|rule| template::render_file_rule(rule, &vars))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(%tag_name, files = files.len(), "templates rendered");

    let context = BumpContext {
        current,
        next,
        kind: options.kind,
        dry_run: options.dry_run,
        force: options.force,
        push: options.push,
        files,
        hooks: settings.hooks.clone(),
        commit_message,
        tag_name,
        replace_mode: settings.replace_mode(),
        config_path: settings.config_path.clone(),
        project_root: settings.project_root.clone(),
        remote: settings.remote.clone(),
    };

    Ok(ReadyBump { context, stages })
}

/// The version to bump from, and where it came from.
///
/// In replace mode a version recorded in the config wins. Otherwise the
/// latest reachable tag is used, and a repository without tags starts at
/// `0.0.0`.
fn resolve_current(
    vcs: &dyn VersionControl,
    settings: &BumpSettings,
) -> BumpResult<(SemanticVersion, &'static str)> {
    if settings.replace_mode()
        && let Some(recorded) = settings
            .recorded_version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    {
        return Ok((SemanticVersion::parse(recorded)?, "recorded in config"));
    }

    match vcs.latest_tag() {
        Ok(tag) => Ok((SemanticVersion::parse(&tag)?, "latest tag")),
        Err(GitError::NoTags) => {
            debug!("no tags, starting from 0.0.0");
            Ok((SemanticVersion::ZERO, "no tags yet"))
        }
        Err(e) => Err(e.into()),
    }
}

impl ReadyBump {
    /// The planned bump.
    pub const fn context(&self) -> &BumpContext {
        &self.context
    }

    /// Stages completed while planning.
    pub fn stages(&self) -> &[(BumpStage, StageOutcome)] {
        &self.stages
    }

    /// The question asked before a bump.
    pub fn prompt(&self) -> String {
        format!(
            "This will bump \"{}\" to \"{}\". Are you sure?",
            self.context.current, self.context.next
        )
    }

    /// Confirm the bump.
    ///
    /// With `force` the prompt is skipped and `ask` is never called.
    /// Otherwise `ask` decides; `false` aborts the bump.
    #[instrument(skip_all, fields(force = self.context.force))]
    pub fn confirm<F>(self, ask: F) -> BumpResult<ConfirmedBump>
    where
        F: FnOnce(&Self) -> io::Result<bool>,
    {
        let outcome = if self.context.force {
            StageOutcome::Skipped {
                reason: "--force".into(),
            }
        } else if ask(&self).map_err(BumpError::Prompt)? {
            StageOutcome::Success {
                message: "confirmed".into(),
            }
        } else {
            info!("bump declined");
            return Err(BumpError::Aborted);
        };

        let Self {
            context,
            mut stages,
        } = self;
        stages.push((BumpStage::Confirmation, outcome));
        Ok(ConfirmedBump { context, stages })
    }
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

impl ConfirmedBump {
    /// The bump about to run.
    pub const fn context(&self) -> &BumpContext {
        &self.context
    }

    /// Run the bump against `vcs`, or describe it in a dry run.
    ///
    /// Hook output goes to `stdout` and `stderr`. `on_event` is called at
    /// every stage boundary.
    pub fn execute(
        self,
        vcs: &dyn VersionControl,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        on_event: impl FnMut(BumpEvent),
    ) -> BumpResult<BumpOutcome> {
        if self.context.dry_run {
            let mut effects = Preview::new();
            self.execute_with(&mut effects, on_event)
        } else {
            let mut effects = Apply::new(vcs, stdout, stderr);
            self.execute_with(&mut effects, on_event)
        }
    }

    /// Walk the remaining stages, performing actions through `effects`.
    #[instrument(skip_all, fields(
        current = %self.context.current,
        next = %self.context.next,
        dry_run = effects.is_preview(),
    ))]
    pub fn execute_with(
        self,
        effects: &mut dyn Effects,
        mut on_event: impl FnMut(BumpEvent),
    ) -> BumpResult<BumpOutcome> {
        let Self { context, stages } = self;
        let mut log = StageLog {
            stages: Vec::new(),
            on_event: &mut on_event,
        };
        for (stage, outcome) in stages {
            log.record(stage, outcome);
        }

        log.run(BumpStage::Hook(HookStage::PreReplace), || {
            effects.run_hook(HookStage::PreReplace, &context)
        })?;

        if context.replace_mode {
            log.run(BumpStage::Replace, || {
                let edits = plan_replace(&context)?;
                let mut lines = vec![effects.write_files(&edits)?];
                if context.config_path.is_none() {
                    warn!("no config file found, version not recorded");
                    lines.push("no config file, version not recorded".into());
                }
                Ok(StageOutcome::Success {
                    message: lines.join("\n"),
                })
            })?;

            log.run(BumpStage::Hook(HookStage::PreCommit), || {
                effects.run_hook(HookStage::PreCommit, &context)
            })?;

            log.run(BumpStage::Commit, || {
                if effects.tree_dirty()? {
                    Ok(StageOutcome::Success {
                        message: effects.commit(&context.commit_message)?,
                    })
                } else {
                    Ok(StageOutcome::Skipped {
                        reason: "nothing changed".into(),
                    })
                }
            })?;
        } else {
            let reason = "no file rules configured";
            log.skip(BumpStage::Replace, reason);
            log.skip(BumpStage::Hook(HookStage::PreCommit), reason);
            log.skip(BumpStage::Commit, reason);
        }

        log.run(BumpStage::Hook(HookStage::PreTag), || {
            effects.run_hook(HookStage::PreTag, &context)
        })?;

        log.run(BumpStage::Tag, || {
            Ok(StageOutcome::Success {
                message: effects.create_tag(&context.tag_name, &context.tag_name)?,
            })
        })?;

        if context.push {
            log.run(BumpStage::Hook(HookStage::PrePush), || {
                effects.run_hook(HookStage::PrePush, &context)
            })?;
            log.run(BumpStage::Push, || {
                Ok(StageOutcome::Success {
                    message: effects.push(&context.remote, &context.tag_name)?,
                })
            })?;
        } else {
            let reason = "--push not given";
            log.skip(BumpStage::Hook(HookStage::PrePush), reason);
            log.skip(BumpStage::Push, reason);
        }

        info!(tag = %context.tag_name, dry_run = context.dry_run, "bump complete");
        Ok(BumpOutcome {
            previous: context.current.clone(),
            version: context.next.clone(),
            tag: context.tag_name.clone(),
            stages: log.stages,
            dry_run: context.dry_run,
            context,
        })
    }
}

/// The checked file edits of the replace stage. The config file's version
/// record is one of them, so a preview fails exactly where a real run would
/// and a failed write rolls the record back with everything else.
fn plan_replace(context: &BumpContext) -> BumpResult<Vec<PlannedEdit>> {
    let mut edits = replace::plan_edits(context.root(), &context.files)?;
    if let Some(path) = &context.config_path {
        let edit = replace::edit_for(&mut edits, path)?;
        edit.updated = config::with_recorded_version(path, &edit.updated, &context.next)?;
        edit.records_version = Some(context.next.clone());
    }
    Ok(edits)
}

/// Runs stages, reporting each to the event callback.
struct StageLog<'a, F: FnMut(BumpEvent)> {
    stages: Vec<(BumpStage, StageOutcome)>,
    on_event: &'a mut F,
}

impl<F: FnMut(BumpEvent)> StageLog<'_, F> {
    fn run(
        &mut self,
        stage: BumpStage,
        action: impl FnOnce() -> BumpResult<StageOutcome>,
    ) -> BumpResult<()> {
        (self.on_event)(BumpEvent::StageStarted(stage));
        let outcome = action().inspect_err(|err| warn!(%stage, error = %err, "stage failed"))?;
        self.complete(stage, outcome);
        Ok(())
    }

    fn skip(&mut self, stage: BumpStage, reason: &str) {
        self.record(
            stage,
            StageOutcome::Skipped {
                reason: reason.to_string(),
            },
        );
    }

    fn record(&mut self, stage: BumpStage, outcome: StageOutcome) {
        (self.on_event)(BumpEvent::StageStarted(stage));
        self.complete(stage, outcome);
    }

    fn complete(&mut self, stage: BumpStage, outcome: StageOutcome) {
        debug!(%stage, ?outcome, "stage completed");
        (self.on_event)(BumpEvent::StageCompleted(stage, outcome.clone()));
        self.stages.push((stage, outcome));
    }
}

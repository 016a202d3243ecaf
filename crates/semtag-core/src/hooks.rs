//! Hook stages for the bump pipeline.
//!
//! A hook is an optional shell snippet attached to one of four fixed
//! stages. It runs with `sh -e -c` in the project root and its output is
//! forwarded to caller-supplied sinks as it is produced. The snippet and any
//! background job it starts are killed once [`HOOK_TIMEOUT`] has passed
//! without both output pipes closing and the shell exiting. A failing hook
//! aborts the bump.
//!
//! # Environment
//!
//! Hooks see the bump through these variables:
//! `SEMTAG_CURRENT_VERSION`, `SEMTAG_NEXT_VERSION`, `SEMTAG_TAG`.

use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// How long a hook may run before it is killed.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(10);

const SHELL: &str = "sh";

/// Errors from hook execution.
#[derive(Error, Debug)]
pub enum HookError {
    /// The hook did not parse or did not succeed.
    #[error("{stage} hook failed ({cause}): {command}")]
    Failed {
        /// The stage the hook belongs to.
        stage: HookStage,
        /// The configured command.
        command: String,
        /// What went wrong.
        cause: HookFailure,
    },

    /// The shell could not be started or waited on.
    #[error("failed to execute {stage} hook: {source}")]
    Exec {
        /// The stage the hook belongs to.
        stage: HookStage,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Result alias for hook operations.
pub type HookResult<T> = Result<T, HookError>;

/// Why a hook failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFailure {
    /// The shell rejected the snippet before running it.
    Syntax {
        /// The shell's diagnostics.
        detail: String,
    },
    /// The snippet exited unsuccessfully. `None` means killed by a signal.
    Exit {
        /// Exit status, if any.
        code: Option<i32>,
    },
    /// The snippet outlived its time budget and was killed.
    TimedOut {
        /// The budget it exceeded.
        after: Duration,
    },
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { detail } => write!(f, "syntax error: {detail}"),
            Self::Exit { code: Some(code) } => write!(f, "exit status {code}"),
            Self::Exit { code: None } => write!(f, "terminated by signal"),
            Self::TimedOut { after } => write!(f, "timed out after {}s", after.as_secs()),
        }
    }
}

/// The fixed extension points of the bump pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookStage {
    /// Before any file is rewritten.
    PreReplace,
    /// After rewriting, before the commit.
    PreCommit,
    /// Before the tag is created.
    PreTag,
    /// Before pushing.
    PrePush,
}

impl HookStage {
    /// All stages, in pipeline order.
    pub const ALL: [Self; 4] = [Self::PreReplace, Self::PreCommit, Self::PreTag, Self::PrePush];

    /// The configuration key for this stage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreReplace => "pre-replace",
            Self::PreCommit => "pre-commit",
            Self::PreTag => "pre-tag",
            Self::PrePush => "pre-push",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One optional command per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HookSet {
    /// Runs before any file is rewritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_replace: Option<String>,
    /// Runs after rewriting, before the commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_commit: Option<String>,
    /// Runs before the tag is created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_tag: Option<String>,
    /// Runs before pushing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_push: Option<String>,
}

impl HookSet {
    /// The command for `stage`, or `None` when unset or blank.
    pub fn command(&self, stage: HookStage) -> Option<&str> {
        let command = match stage {
            HookStage::PreReplace => self.pre_replace.as_deref(),
            HookStage::PreCommit => self.pre_commit.as_deref(),
            HookStage::PreTag => self.pre_tag.as_deref(),
            HookStage::PrePush => self.pre_push.as_deref(),
        };
        command.filter(|c| !c.trim().is_empty())
    }

    /// Set the command for `stage`.
    #[must_use]
    pub fn with(mut self, stage: HookStage, command: impl Into<String>) -> Self {
        let slot = match stage {
            HookStage::PreReplace => &mut self.pre_replace,
            HookStage::PreCommit => &mut self.pre_commit,
            HookStage::PreTag => &mut self.pre_tag,
            HookStage::PrePush => &mut self.pre_push,
        };
        *slot = Some(command.into());
        self
    }

    /// Number of stages with a command.
    pub fn len(&self) -> usize {
        HookStage::ALL
            .iter()
            .filter(|stage| self.command(**stage).is_some())
            .count()
    }

    /// Whether no stage has a command.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a hook runs and what it is told about the bump.
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    /// Working directory for the hook.
    pub project_root: &'a Utf8Path,
    /// The version being bumped from.
    pub current_version: String,
    /// The version being bumped to.
    pub next_version: String,
    /// The tag that will be created.
    pub tag: String,
}

/// Run `command` for `stage` with the default timeout.
///
/// An empty command is a no-op.
pub fn run_stage(
    stage: HookStage,
    command: &str,
    context: &HookContext<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> HookResult<()> {
    run_stage_with_timeout(stage, command, context, stdout, stderr, HOOK_TIMEOUT)
}

/// Run `command` for `stage`, killing it after `timeout`.
#[instrument(skip(context, stdout, stderr), fields(root = %context.project_root))]
pub fn run_stage_with_timeout(
    stage: HookStage,
    command: &str,
    context: &HookContext<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    timeout: Duration,
) -> HookResult<()> {
    if command.trim().is_empty() {
        debug!("no hook configured");
        return Ok(());
    }

    check_syntax(stage, command, context.project_root)?;

    let exec_error = |source: io::Error| HookError::Exec { stage, source };
    let timed_out = || {
        warn!(%stage, ?timeout, "hook timed out");
        HookError::Failed {
            stage,
            command: command.to_string(),
            cause: HookFailure::TimedOut { after: timeout },
        }
    };

    let deadline = Instant::now() + timeout;
    let mut cmd = shell(context.project_root);
    cmd.args(["-e", "-c", command])
        .env("SEMTAG_CURRENT_VERSION", &context.current_version)
        .env("SEMTAG_NEXT_VERSION", &context.next_version)
        .env("SEMTAG_TAG", &context.tag)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Own process group, so background jobs die with the snippet.
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
    let mut child = cmd.spawn().map_err(exec_error)?;

    let (sender, receiver) = mpsc::channel();
    if let Some(pipe) = child.stdout.take() {
        spawn_reader(pipe, Output::Stdout, sender.clone());
    }
    if let Some(pipe) = child.stderr.take() {
        spawn_reader(pipe, Output::Stderr, sender);
    }

    // Forward output as it arrives until both pipes close.
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let forwarded = match receiver.recv_timeout(remaining) {
            Ok(Output::Stdout(chunk)) => forward(stdout, &chunk),
            Ok(Output::Stderr(chunk)) => forward(stderr, &chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                terminate(&mut child);
                return Err(timed_out());
            }
        };
        if let Err(source) = forwarded {
            terminate(&mut child);
            return Err(exec_error(source));
        }
    }

    let status = match child.wait_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(Some(status)) => status,
        Ok(None) => {
            terminate(&mut child);
            return Err(timed_out());
        }
        Err(source) => {
            terminate(&mut child);
            return Err(exec_error(source));
        }
    };

    debug!(%stage, code = ?status.code(), "hook finished");
    if status.success() {
        Ok(())
    } else {
        Err(HookError::Failed {
            stage,
            command: command.to_string(),
            cause: HookFailure::Exit {
                code: status.code(),
            },
        })
    }
}

// ──────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────

fn shell(project_root: &Utf8Path) -> Command {
    let mut cmd = Command::new(SHELL);
    cmd.current_dir(project_root.as_std_path())
        .stdin(Stdio::null());
    cmd
}

/// Ask the shell to parse the snippet without running it.
fn check_syntax(stage: HookStage, command: &str, project_root: &Utf8Path) -> HookResult<()> {
    let output = shell(project_root)
        .args(["-n", "-c", command])
        .output()
        .map_err(|source| HookError::Exec { stage, source })?;

    if output.status.success() {
        return Ok(());
    }
    Err(HookError::Failed {
        stage,
        command: command.to_string(),
        cause: HookFailure::Syntax {
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        },
    })
}

/// A chunk of hook output.
enum Output {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

fn spawn_reader<R: Read + Send + 'static>(
    mut source: R,
    wrap: fn(Vec<u8>) -> Output,
    sender: Sender<Output>,
) {
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    if sender.send(wrap(buffer[..read].to_vec())).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
    });
}

fn forward(sink: &mut dyn Write, chunk: &[u8]) -> io::Result<()> {
    sink.write_all(chunk)?;
    sink.flush()
}

/// Kill the snippet and everything it started.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let _ = Command::new(SHELL)
            .args(["-c", "kill -KILL \"$1\"", SHELL, &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

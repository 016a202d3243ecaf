//! Bump commands: `major`, `minor` and `patch`.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, InquireError};
use owo_colors::OwoColorize;
use tracing::{debug, info, instrument};

use semtag_core::BumpKind;
use semtag_core::bump::{self, BumpEvent, BumpOptions, BumpSettings, BumpStage, StageOutcome};
use semtag_core::config::Config;
use semtag_core::git::Git;

/// Arguments shared by `major`, `minor` and `patch`.
#[derive(Args, Debug, Default)]
pub struct BumpArgs {
    /// Push the release commit and tag to the configured remote
    #[arg(long)]
    pub push: bool,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub force: bool,

    /// Show every action without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Progress spinner shared between the event handler and hook output.
type SpinnerSlot = Rc<RefCell<Option<ProgressBar>>>;

/// Execute a bump command.
#[instrument(name = "cmd_bump", skip_all, fields(%kind, dry_run = args.dry_run))]
pub fn cmd_bump(
    kind: BumpKind,
    args: BumpArgs,
    global_json: bool,
    config: &Config,
    config_path: Option<Utf8PathBuf>,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let git = Git::discover(cwd).context("git is required")?;
    let root = project_root(&git, config_path.as_deref(), cwd);
    debug!(%root, "project root");
    let settings = BumpSettings::from_config(config, root, config_path);
    let options = BumpOptions {
        kind,
        dry_run: args.dry_run,
        force: args.force,
        push: args.push,
    };

    let ready = bump::plan_bump(&git, &settings, options).context("bump planning failed")?;

    if !global_json {
        let ctx = ready.context();
        println!();
        println!(
            "  {} {} → {}",
            "Bump:".bold(),
            ctx.current.to_string().dimmed(),
            ctx.next.to_string().green().bold()
        );
        if args.dry_run {
            println!("  {}", "(Dry Run) no changes will be made".yellow());
        }
        println!();
    }

    let confirmed = ready.confirm(|ready| ask(&ready.prompt()))?;

    let spinner = SpinnerSlot::default();
    let mut stdout = HookOutput::new(global_json, Rc::clone(&spinner));
    let mut stderr = HookOutput::new(true, Rc::clone(&spinner));
    let dry_run = args.dry_run;

    let result = confirmed.execute(&git, &mut stdout, &mut stderr, |event| {
        if !global_json {
            handle_event(event, dry_run, &spinner);
        }
    });
    if let Some(bar) = spinner.borrow_mut().take() {
        bar.finish_and_clear();
    }
    let outcome = result?;

    info!(tag = %outcome.tag, dry_run, "bump finished");

    if global_json {
        return super::print_json(&outcome);
    }

    println!();
    if outcome.dry_run {
        println!(
            "  {} Dry run complete for {}, nothing was changed",
            "○".dimmed(),
            outcome.tag.bold()
        );
    } else if args.push {
        println!(
            "  {} Tagged {} and pushed to {}",
            "✓".green(),
            outcome.tag.bold(),
            outcome.context.remote
        );
    } else {
        println!("  {} Tagged {}", "✓".green(), outcome.tag.bold());
    }

    Ok(())
}

/// Where file rules and hooks resolve: the project config's directory when it
/// lies inside the working tree, else the top of the working tree.
fn project_root(git: &Git, config_path: Option<&Utf8Path>, cwd: &Utf8Path) -> Utf8PathBuf {
    let canonical = |path: Utf8PathBuf| path.canonicalize_utf8().unwrap_or(path);
    let config_dir = config_path
        .map(|path| cwd.join(path))
        .and_then(|path| path.parent().map(Utf8Path::to_path_buf))
        .map(canonical);
    let toplevel = git.toplevel().ok().map(canonical);

    match (config_dir, toplevel) {
        (Some(dir), Some(toplevel)) if dir.starts_with(&toplevel) => dir,
        (_, Some(toplevel)) => toplevel,
        (Some(dir), None) => dir,
        (None, None) => cwd.to_path_buf(),
    }
}

/// Ask the confirmation question. Escape and Ctrl-C count as "no".
fn ask(prompt: &str) -> io::Result<bool> {
    match Confirm::new(prompt).with_default(false).prompt() {
        Ok(answer) => Ok(answer),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
        Err(err) => Err(io::Error::other(err)),
    }
}

// ──────────────────────────────────────────────
// Progress display
// ──────────────────────────────────────────────

fn handle_event(event: BumpEvent, dry_run: bool, spinner: &RefCell<Option<ProgressBar>>) {
    match event {
        BumpEvent::StageStarted(stage @ BumpStage::Hook(_)) if !dry_run => {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]));
            }
            bar.set_message(format!("{stage}..."));
            bar.enable_steady_tick(Duration::from_millis(80));
            *spinner.borrow_mut() = Some(bar);
        }
        BumpEvent::StageStarted(_) => {}
        BumpEvent::StageCompleted(stage, outcome) => {
            if let Some(bar) = spinner.borrow_mut().take() {
                bar.finish_and_clear();
            }
            print_stage(stage, &outcome, dry_run);
        }
    }
}

fn print_stage(stage: BumpStage, outcome: &StageOutcome, dry_run: bool) {
    match outcome {
        StageOutcome::Success { message } => {
            let glyph = if dry_run {
                "○".dimmed().to_string()
            } else {
                "✓".green().to_string()
            };
            let mut lines = message.lines().map(|line| dry_run_label(line, dry_run));
            let first = lines.next().unwrap_or_default();
            println!("  {glyph} {:<14} {first}", stage.to_string());
            for line in lines {
                println!("    {:<14} {line}", "");
            }
        }
        StageOutcome::Skipped { reason } => {
            println!(
                "  {} {:<14} {}",
                "–".dimmed(),
                stage.to_string(),
                format!("skipped ({reason})").dimmed()
            );
        }
    }
}

/// Label descriptions of actions a dry run did not perform.
fn dry_run_label(line: &str, dry_run: bool) -> String {
    if dry_run && line.starts_with("Would ") {
        format!("(Dry Run) {line}")
    } else {
        line.to_string()
    }
}

// ──────────────────────────────────────────────
// Hook output
// ──────────────────────────────────────────────

/// Writes hook output around the spinner instead of through it.
struct HookOutput {
    to_stderr: bool,
    spinner: SpinnerSlot,
}

impl HookOutput {
    const fn new(to_stderr: bool, spinner: SpinnerSlot) -> Self {
        Self { to_stderr, spinner }
    }

    fn write_through(&self, buf: &[u8]) -> io::Result<usize> {
        if self.to_stderr {
            io::stderr().write(buf)
        } else {
            io::stdout().write(buf)
        }
    }
}

impl Write for HookOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.spinner.borrow().as_ref() {
            Some(bar) => bar.suspend(|| self.write_through(buf)),
            None => self.write_through(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.to_stderr {
            io::stderr().flush()
        } else {
            io::stdout().flush()
        }
    }
}

//! Init command: write a starter configuration file.

use anyhow::Context;
use clap::Args;
use inquire::{Confirm, InquireError};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{info, instrument};

use semtag_core::config::{self, CONFIG_FILE_NAME};

use super::Aborted;

/// Arguments for the `init` subcommand.
#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Overwrite an existing configuration file without asking
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Serialize)]
struct Initialized<'a> {
    path: &'a camino::Utf8Path,
    overwritten: bool,
}

/// Execute the init command.
#[instrument(name = "cmd_init", skip_all, fields(force = args.force))]
pub fn cmd_init(args: InitArgs, global_json: bool, cwd: &camino::Utf8Path) -> anyhow::Result<()> {
    let path = cwd.join(CONFIG_FILE_NAME);
    let exists = path.exists();

    if exists && !args.force {
        let overwrite = match Confirm::new(&format!("{CONFIG_FILE_NAME} already exists. Overwrite it?"))
            .with_default(false)
            .prompt()
        {
            Ok(answer) => answer,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => false,
            Err(err) => {
                return Err(err).context("confirmation prompt failed (pass --force to overwrite)");
            }
        };
        if !overwrite {
            return Err(Aborted.into());
        }
    }

    std::fs::write(&path, config::init_template())
        .with_context(|| format!("failed to write {path}"))?;
    info!(%path, overwritten = exists, "configuration written");

    if global_json {
        return super::print_json(&Initialized {
            path: &path,
            overwritten: exists,
        });
    }

    println!("  {} Wrote {}", "✓".green(), path.as_str().bold());
    println!(
        "  {}",
        "Edit the [[file]] rules to match your project, then run `semtag patch --dry-run`."
            .dimmed()
    );
    Ok(())
}

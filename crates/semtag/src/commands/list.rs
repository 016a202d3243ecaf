//! List command: tags, newest version first.

use anyhow::{Context, bail};
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use semtag_core::git::VersionControl;

/// Tags shown when `--limit` is not given.
pub const DEFAULT_LIMIT: usize = 10;

/// Arguments for the `list` subcommand.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of tags to show
    #[arg(long, short = 'n', value_name = "N", default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,
}

impl Default for ListArgs {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Execute the list command.
#[instrument(name = "cmd_list", skip_all, fields(limit = args.limit))]
pub fn cmd_list(args: ListArgs, global_json: bool, cwd: &camino::Utf8Path) -> anyhow::Result<()> {
    if args.limit == 0 {
        bail!("--limit must be a positive integer");
    }

    let git = super::repository(cwd)?;
    let listing = git.list_tags(args.limit).context("failed to list tags")?;
    debug!(
        count = listing.tags.len(),
        truncated = listing.truncated,
        "tags listed"
    );

    if global_json {
        return super::print_json(&listing);
    }

    for tag in &listing.tags {
        println!("{tag}");
    }
    if listing.truncated {
        println!();
        println!("{}", "Truncated, pass --limit to see more".dimmed());
    }

    Ok(())
}

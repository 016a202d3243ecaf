//! Latest command: the most recent tag reachable from `HEAD`.

use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument};

use semtag_core::git::VersionControl;

/// Arguments for the `latest` subcommand.
#[derive(Args, Debug, Default)]
pub struct LatestArgs {}

#[derive(Serialize)]
struct LatestTag {
    tag: String,
}

/// Execute the latest command.
#[instrument(name = "cmd_latest", skip_all)]
pub fn cmd_latest(
    _args: LatestArgs,
    global_json: bool,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    let git = super::repository(cwd)?;
    let tag = git.latest_tag()?;
    debug!(%tag, "latest tag");

    if global_json {
        super::print_json(&LatestTag { tag })
    } else {
        println!("{tag}");
        Ok(())
    }
}

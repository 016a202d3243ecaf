//! semtag CLI
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use semtag::{Cli, Commands, commands};
use semtag_core::BumpKind;
use semtag_core::config::{Config, ConfigLoader};
use tracing::{debug, warn};

mod observability;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let config_path = loader.project_config();

    // `init` replaces the project config, so a broken one must not block it.
    let mut deferred_warning = None;
    let config = match loader.load() {
        Ok(config) => config,
        Err(err) if matches!(cli.command, Commands::Init(_)) => {
            deferred_warning = Some(err.to_string());
            Config::default()
        }
        Err(err) => return Err(err).context("failed to load configuration"),
    };

    let obs_config = observability::ObservabilityConfig::from_env(config.log_dir.clone());
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        config = ?config_path,
        "CLI initialized"
    );
    if let Some(error) = deferred_warning {
        warn!(%error, "ignoring unreadable configuration");
    }

    let result = match cli.command {
        Commands::List(args) => commands::list::cmd_list(args, cli.json, &cwd),
        Commands::Latest(args) => commands::latest::cmd_latest(args, cli.json, &cwd),
        Commands::Init(args) => commands::init::cmd_init(args, cli.json, &cwd),
        Commands::Major(args) => {
            commands::bump::cmd_bump(BumpKind::Major, args, cli.json, &config, config_path, &cwd)
        }
        Commands::Minor(args) => {
            commands::bump::cmd_bump(BumpKind::Minor, args, cli.json, &config, config_path, &cwd)
        }
        Commands::Patch(args) => {
            commands::bump::cmd_bump(BumpKind::Patch, args, cli.json, &config, config_path, &cwd)
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if commands::is_aborted(&err) => {
            debug!("aborted by user");
            eprintln!("{}", "Aborted".yellow());
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            tracing::error!(error = %err, "fatal error");
            Err(err)
        }
    }
}

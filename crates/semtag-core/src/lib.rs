//! Core library for semtag.
//!
//! This crate provides the bump engine behind the `semtag` CLI: resolve the
//! current version, compute the next one, rewrite version strings in project
//! files, then commit, tag and optionally push.
//!
//! # Modules
//!
//! - [`bump`] - Bump orchestration (plan, confirm, execute)
//! - [`config`] - Configuration loading, discovery and version recording
//! - [`context`] - Per-invocation bump state
//! - [`effects`] - Side effects of a bump, applied or previewed
//! - [`error`] - Configuration error types
//! - [`git`] - Version control trait and the `git` backend
//! - [`hooks`] - User hook stages
//! - [`preflight`] - Repository preconditions
//! - [`replace`] - Literal search and replace in files
//! - [`template`] - `{{.Current}}` / `{{.Next}}` templates
//! - [`version`] - Semantic versions and bump rules
//!
//! # Quick Start
//!
//! ```no_run
//! use semtag_core::bump::{self, BumpOptions, BumpSettings};
//! use semtag_core::git::Git;
//! use semtag_core::version::BumpKind;
//! use semtag_core::ConfigLoader;
//!
//! let root = camino::Utf8PathBuf::from(".");
//! let config = ConfigLoader::new()
//!     .with_project_search(&root)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! let git = Git::new(root.clone());
//! let settings = BumpSettings::from_config(&config, root, None);
//! let options = BumpOptions { force: true, dry_run: true, ..BumpOptions::new(BumpKind::Patch) };
//! let outcome = bump::plan_bump(&git, &settings, options)
//!     .and_then(|ready| ready.confirm(|_| Ok(true)))
//!     .and_then(|confirmed| {
//!         confirmed.execute(&git, &mut std::io::stdout(), &mut std::io::stderr(), |_| {})
//!     })
//!     .expect("bump failed");
//! println!("would tag {}", outcome.tag);
//! ```
#![deny(unsafe_code)]

pub mod bump;

pub mod config;

pub mod context;

pub mod effects;

pub mod error;

pub mod git;

pub mod hooks;

pub mod preflight;

pub mod replace;

pub mod template;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use version::{BumpKind, SemanticVersion};

//! Configuration loading, discovery and updates.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Merging with sensible defaults
//!
//! # Supported formats
//!
//! The following configuration file formats are supported:
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.semtag.<ext>` in current directory or any parent
//! - `semtag.<ext>` in current directory or any parent
//! - `~/.config/semtag/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! The walk up stops at the first directory holding a `.git` entry, so a
//! repository never picks up configuration from outside itself.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use semtag_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::hooks::HookSet;
use crate::version::SemanticVersion;

/// Commit message used when none is configured.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "Bump version {{.Current}} -> {{.Next}}";

/// Tag name used when none is configured.
pub const DEFAULT_TAG_TEMPLATE: &str = "v{{.Next}}";

/// Branch bumps are allowed from when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Remote pushed to when none is configured.
pub const DEFAULT_REMOTE: &str = "origin";

/// File name written by `semtag init`.
pub const CONFIG_FILE_NAME: &str = ".semtag.toml";

/// The configuration for semtag.
///
/// Deserialized from config files found during discovery (TOML, YAML, or JSON).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// The version most recently bumped to, when files are being rewritten.
    pub version: Option<String>,
    /// Branch, message and tag settings.
    pub git: GitConfig,
    /// Shell snippets per pipeline stage.
    pub hooks: HookSet,
    /// Files whose version strings are rewritten on every bump.
    #[serde(rename = "file")]
    pub files: Vec<FileRule>,
}

/// The `[git]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct GitConfig {
    /// Bumps are refused on any other branch.
    pub default_branch: String,
    /// Commit message template.
    pub message_template: String,
    /// Tag name template.
    pub tag_template: String,
    /// Remote used by `--push`.
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            default_branch: DEFAULT_BRANCH.to_string(),
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            tag_template: DEFAULT_TAG_TEMPLATE.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

/// A `[[file]]` rule: rewrite `search` in `path` on every bump.
///
/// `search` must contain `{{.Current}}` exactly once. The replacement is the
/// same text with `{{.Next}}` in its place.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileRule {
    /// Path relative to the project root.
    pub path: Utf8PathBuf,
    /// Search template.
    pub search: String,
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "semtag";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Stop searching after a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/semtag/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// The directory containing the marker is still searched; its parents
    /// are not. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// The file a bump should record its version in: the last explicit
    /// file if any, otherwise the discovered project config.
    pub fn project_config(&self) -> Option<Utf8PathBuf> {
        if let Some(explicit) = self.explicit_files.last() {
            return Some(explicit.clone());
        }
        self.project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit files (in order added via `with_file`)
    /// 2. Project config (closest to search root)
    /// 3. User config (`~/.config/semtag/config.<ext>`)
    /// 4. Default values
    #[instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config)?;
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config)?;
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file)?;
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            files = config.files.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self.project_config().is_some();

        if !has_user && !has_project {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start);

        while let Some(dir) = current {
            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }

            current = dir.parent();
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> ConfigResult<Figment> {
        if let Ok(text) = fs::read_to_string(path)
            && text.trim().is_empty()
        {
            return Err(ConfigError::Empty {
                path: path.to_path_buf(),
            });
        }

        Ok(match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        })
    }
}

/// `text`, the content of the config file at `path`, with `version` recorded
/// as its `version` key.
///
/// Every other key is preserved. For TOML, the existing `version = ...`
/// line is rewritten in place so comments, line endings and layout survive.
/// Nothing is written; the caller folds the result into the bump's file
/// edits.
#[instrument(skip(text, version), fields(%version))]
pub fn with_recorded_version(
    path: &Utf8Path,
    text: &str,
    version: &SemanticVersion,
) -> ConfigResult<String> {
    let updated = match path.extension() {
        Some("yaml" | "yml") => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
        Some("json") => set_json_version(path, text, version)?,
        _ => set_toml_version(path, text, version)?,
    };
    debug!(%path, "version record planned");
    Ok(updated)
}

/// The starter configuration written by `semtag init`.
pub const fn init_template() -> &'static str {
    INIT_TEMPLATE
}

const INIT_TEMPLATE: &str = r#"# semtag configuration

# The version semtag last bumped to. Updated on every bump that rewrites files.
version = "0.1.0"

[git]
default-branch = "main"
message-template = "Bump version {{.Current}} -> {{.Next}}"
tag-template = "v{{.Next}}"

# Optional shell snippets, run with `sh -e -c` from the project root.
[hooks]
# pre-replace = "echo about to rewrite files"
# pre-commit = "git diff --stat"
# pre-tag = "echo tagging $SEMTAG_TAG"
# pre-push = "echo pushing $SEMTAG_TAG"

# Every occurrence of `search` in `path` is rewritten, with {{.Current}}
# replaced by the next version.
[[file]]
path = "pyproject.toml"
search = 'version = "{{.Current}}"'

[[file]]
path = "README.md"
search = "My project, version {{.Current}}"
"#;

fn edit_error(path: &Utf8Path, message: impl ToString) -> ConfigError {
    ConfigError::Edit {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn set_toml_version(path: &Utf8Path, text: &str, version: &SemanticVersion) -> ConfigResult<String> {
    let version = version.to_string();
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };

    let mut edited = String::with_capacity(text.len() + version.len());
    let mut in_root = true;
    let mut replaced = false;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            in_root = false;
        }
        if in_root && !replaced && is_version_key(trimmed)
            && let Some(rewritten) = replace_string_value(line, &version)
        {
            edited.push_str(&rewritten);
            replaced = true;
        } else {
            edited.push_str(line);
        }
    }
    if !replaced {
        edited.insert_str(0, &format!("version = \"{version}\"{newline}"));
    }

    // Anything unusual (multi-line strings, dotted keys) falls back to a full
    // re-serialization.
    let reparsed: Option<toml::Table> = edited.parse().ok();
    let recorded = reparsed
        .as_ref()
        .and_then(|table| table.get("version"))
        .and_then(toml::Value::as_str);
    if recorded == Some(version.as_str()) {
        return Ok(edited);
    }

    let mut table: toml::Table = text.parse().map_err(|e| edit_error(path, e))?;
    table.insert("version".to_string(), toml::Value::String(version));
    toml::to_string(&table).map_err(|e| edit_error(path, e))
}

/// `line` with its quoted value swapped for `value`. Whatever follows the
/// closing quote (a comment, the line ending) is kept.
fn replace_string_value(line: &str, value: &str) -> Option<String> {
    let (key, rest) = line.split_once('=')?;
    let value_start = rest.len() - rest.trim_start().len();
    let quoted = &rest[value_start..];
    let quote = quoted.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let close = quoted[1..].find(quote)? + 1;
    Some(format!(
        "{key}={}\"{value}\"{}",
        &rest[..value_start],
        &quoted[close + 1..]
    ))
}

fn is_version_key(line: &str) -> bool {
    line.strip_prefix("version")
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

fn set_json_version(path: &Utf8Path, text: &str, version: &SemanticVersion) -> ConfigResult<String> {
    let mut value: serde_json::Value = serde_json::from_str(text).map_err(|e| edit_error(path, e))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| edit_error(path, "top level is not an object"))?;
    object.insert(
        "version".to_string(),
        serde_json::Value::String(version.to_string()),
    );
    let mut out = serde_json::to_string_pretty(&value).map_err(|e| edit_error(path, e))?;
    out.push('\n');
    Ok(out)
}

/// Get the project directories for XDG-compliant path resolution.
///
/// Returns `None` if the home directory cannot be determined.
fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/semtag/` on Linux, `~/Library/Application Support/semtag/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the local data directory path (machine-specific, not synced).
///
/// Returns `~/.local/share/semtag/` on Linux, `~/Library/Application Support/semtag/`
/// on macOS, and equivalent on other platforms.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::try_from(path).unwrap()
    }

    fn load_file(path: &Utf8Path) -> ConfigResult<Config> {
        ConfigLoader::new()
            .with_user_config(false)
            .with_file(path)
            .load()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert!(config.version.is_none());
        assert!(config.files.is_empty());
        assert!(config.hooks.is_empty());
        assert_eq!(config.git.default_branch, "main");
        assert_eq!(config.git.message_template, DEFAULT_MESSAGE_TEMPLATE);
        assert_eq!(config.git.tag_template, DEFAULT_TAG_TEMPLATE);
        assert_eq!(config.git.remote, "origin");
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_full_schema() {
        let tmp = TempDir::new().unwrap();
        let path = utf8(tmp.path().join("config.toml"));
        fs::write(
            &path,
            r#"
log_level = "debug"
version = "1.4.2"

[git]
default-branch = "trunk"
tag-template = "release-{{.Next}}"

[hooks]
pre-commit = "make check"
pre-push = "echo pushing"

[[file]]
path = "Cargo.toml"
search = 'version = "{{.Current}}"'

[[file]]
path = "docs/index.md"
search = "v{{.Current}}"
"#,
        )
        .unwrap();

        let config = load_file(&path).unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.version.as_deref(), Some("1.4.2"));
        assert_eq!(config.git.default_branch, "trunk");
        assert_eq!(config.git.tag_template, "release-{{.Next}}");
        // Unset keys in a present section keep their defaults
        assert_eq!(config.git.message_template, DEFAULT_MESSAGE_TEMPLATE);
        assert_eq!(
            config.hooks.command(crate::hooks::HookStage::PreCommit),
            Some("make check")
        );
        assert_eq!(config.hooks.command(crate::hooks::HookStage::PreTag), None);
        assert_eq!(config.files.len(), 2);
        assert_eq!(config.files[1].path, "docs/index.md");
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = utf8(tmp.path().join("base.toml"));
        fs::write(&base, r#"log_level = "warn""#).unwrap();
        let over = utf8(tmp.path().join("override.toml"));
        fs::write(&over, r#"log_level = "error""#).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&base)
            .with_file(&over)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn test_yaml_and_json_configs() {
        let tmp = TempDir::new().unwrap();
        let yaml = utf8(tmp.path().join("config.yaml"));
        fs::write(&yaml, "git:\n  default-branch: develop\n").unwrap();
        assert_eq!(load_file(&yaml).unwrap().git.default_branch, "develop");

        let json = utf8(tmp.path().join("config.json"));
        fs::write(&json, r#"{"version": "2.0.0", "file": [{"path": "a", "search": "{{.Current}}"}]}"#)
            .unwrap();
        let config = load_file(&json).unwrap();
        assert_eq!(config.version.as_deref(), Some("2.0.0"));
        assert_eq!(config.files.len(), 1);
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = utf8(tmp.path().join(".semtag.toml"));
        fs::write(&path, "  \n").unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Empty { .. }));
        assert!(err.to_string().contains(".semtag.toml"));
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("project");
        let sub_dir = project_dir.join("src").join("deep");
        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(project_dir.join(".semtag.toml"), r#"log_level = "debug""#).unwrap();

        let loader = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(sub_dir));

        assert_eq!(
            loader.project_config(),
            Some(utf8(project_dir.join(".semtag.toml")))
        );
        assert_eq!(loader.load().unwrap().log_level, LogLevel::Debug);
    }

    #[test]
    fn test_config_next_to_git_dir_is_found() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let work = repo.join("crates").join("core");
        fs::create_dir_all(&work).unwrap();
        fs::create_dir(repo.join(".git")).unwrap();
        fs::write(repo.join("semtag.toml"), r#"version = "0.3.0""#).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(utf8(work))
            .load()
            .unwrap();

        assert_eq!(config.version.as_deref(), Some("0.3.0"));
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(parent.join(".semtag.toml"), r#"log_level = "warn""#).unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let loader = ConfigLoader::new()
            .with_user_config(false)
            .with_boundary_marker(".git")
            .with_project_search(utf8(work));

        assert!(loader.project_config().is_none());
        assert_eq!(loader.load().unwrap().log_level, LogLevel::Info);
    }

    #[test]
    fn test_explicit_file_is_the_project_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".semtag.toml"), r#"log_level = "warn""#).unwrap();
        let explicit = utf8(tmp.path().join("override.toml"));
        fs::write(&explicit, r#"log_level = "error""#).unwrap();

        let loader = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(tmp.path().to_path_buf()))
            .with_file(&explicit);

        assert_eq!(loader.project_config(), Some(explicit));
        assert_eq!(loader.load().unwrap().log_level, LogLevel::Error);
    }

    #[test]
    fn test_load_or_error_fails_when_no_config() {
        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load_or_error();

        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_user_config_dir() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains("semtag"));
        }
    }

    #[test]
    fn test_init_template_loads() {
        let tmp = TempDir::new().unwrap();
        let path = utf8(tmp.path().join(CONFIG_FILE_NAME));
        fs::write(&path, init_template()).unwrap();

        let config = load_file(&path).unwrap();

        assert_eq!(config.version.as_deref(), Some("0.1.0"));
        assert_eq!(config.git, GitConfig::default());
        assert!(config.hooks.is_empty());
        assert_eq!(config.files.len(), 2);
        assert_eq!(config.files[0].path, "pyproject.toml");
        assert_eq!(config.files[0].search, r#"version = "{{.Current}}""#);
    }

    fn record(path: &Utf8Path, text: &str, version: SemanticVersion) -> ConfigResult<String> {
        with_recorded_version(path, text, &version)
    }

    #[test]
    fn test_record_version_keeps_toml_layout() {
        let path = Utf8Path::new(CONFIG_FILE_NAME);

        let text = record(path, init_template(), SemanticVersion::new(0, 2, 0)).unwrap();

        assert!(text.contains("version = \"0.2.0\"\n"));
        assert!(text.contains("# semtag configuration"));
        // `[[file]]` search strings that look like version keys are untouched
        assert!(text.contains(r#"search = 'version = "{{.Current}}"'"#));
        assert_eq!(text.matches("0.2.0").count(), 1);
        assert_eq!(text.len(), init_template().len());
    }

    #[test]
    fn test_record_version_keeps_crlf_and_trailing_comment() {
        let path = Utf8Path::new(CONFIG_FILE_NAME);
        let text = "# managed by semtag\r\nversion = \"0.1.0\" # managed\r\n\r\n[git]\r\nremote = \"origin\"\r\n";

        let updated = record(path, text, SemanticVersion::new(0, 1, 1)).unwrap();

        assert_eq!(
            updated,
            "# managed by semtag\r\nversion = \"0.1.1\" # managed\r\n\r\n[git]\r\nremote = \"origin\"\r\n"
        );
    }

    #[test]
    fn test_record_version_inserts_missing_key() {
        let tmp = TempDir::new().unwrap();
        let path = utf8(tmp.path().join(CONFIG_FILE_NAME));
        let text = "[[file]]\npath = \"a\"\nsearch = \"{{.Current}}\"\n";

        fs::write(&path, record(&path, text, SemanticVersion::new(1, 0, 0)).unwrap()).unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.version.as_deref(), Some("1.0.0"));
        assert_eq!(config.files.len(), 1);
    }

    #[test]
    fn test_record_version_inserts_with_crlf() {
        let path = Utf8Path::new(CONFIG_FILE_NAME);
        let updated = record(path, "log_level = \"warn\"\r\n", SemanticVersion::new(1, 0, 0)).unwrap();
        assert_eq!(updated, "version = \"1.0.0\"\r\nlog_level = \"warn\"\r\n");
    }

    #[test]
    fn test_record_version_json() {
        let tmp = TempDir::new().unwrap();
        let path = utf8(tmp.path().join(".semtag.json"));
        let text = r#"{"version": "0.1.0", "git": {"remote": "upstream"}}"#;

        fs::write(&path, record(&path, text, SemanticVersion::new(0, 1, 1)).unwrap()).unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.version.as_deref(), Some("0.1.1"));
        assert_eq!(config.git.remote, "upstream");
    }

    #[test]
    fn test_record_version_rejects_yaml() {
        let path = Utf8Path::new(".semtag.yaml");
        let err = record(path, "version: 0.1.0\n", SemanticVersion::new(0, 1, 1)).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }
}

//! End-to-end bump tests against real temporary git repositories.

use std::fs;
use std::io;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use semtag_core::bump::{self, BumpError, BumpOptions, BumpOutcome, BumpResult, BumpSettings};
use semtag_core::config::{self, ConfigLoader};
use semtag_core::error::ConfigError;
use semtag_core::git::{Git, VersionControl};
use semtag_core::hooks::{HookSet, HookStage};
use semtag_core::replace::ReplaceError;
use semtag_core::BumpKind;
use tempfile::TempDir;

fn git(root: &Utf8Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(root.as_std_path())
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?}: {output:?}");
    String::from_utf8(output.stdout).unwrap()
}

/// A repository on `main` with one commit containing `files`.
fn repo(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
    git(&root, &["init", "--quiet", "--initial-branch=main"]);
    git(&root, &["config", "user.email", "semtag@example.com"]);
    git(&root, &["config", "user.name", "semtag"]);
    git(&root, &["config", "commit.gpgsign", "false"]);
    git(&root, &["config", "tag.gpgsign", "false"]);
    for (path, content) in files {
        fs::write(root.join(path), content).unwrap();
    }
    git(&root, &["add", "--all"]);
    git(&root, &["commit", "--quiet", "--message", "initial"]);
    (tmp, root)
}

fn commit_count(root: &Utf8Path) -> usize {
    git(root, &["rev-list", "--count", "HEAD"]).trim().parse().unwrap()
}

fn tags(root: &Utf8Path) -> Vec<String> {
    git(root, &["tag", "--list"])
        .lines()
        .map(str::to_string)
        .collect()
}

fn bump(root: &Utf8Path, kind: BumpKind, dry_run: bool) -> BumpResult<BumpOutcome> {
    let config_path = ConfigLoader::new()
        .with_user_config(false)
        .with_project_search(root)
        .project_config();
    let mut loader = ConfigLoader::new().with_user_config(false);
    if let Some(path) = &config_path {
        loader = loader.with_file(path);
    }
    let config = loader.load()?;
    let settings = BumpSettings::from_config(&config, root, config_path);
    let vcs = Git::new(root);
    let options = BumpOptions {
        dry_run,
        force: true,
        ..BumpOptions::new(kind)
    };

    bump::plan_bump(&vcs, &settings, options)?
        .confirm(|_| Ok(true))?
        .execute(&vcs, &mut io::sink(), &mut io::sink(), |_| {})
}

const CONFIG: &str = r#"version = "0.1.0"

[[file]]
path = "README.md"
search = "version {{.Current}}"
"#;

#[test]
fn patch_bump_rewrites_commits_and_tags() {
    let (_tmp, root) = repo(&[
        (".semtag.toml", CONFIG),
        ("README.md", "My project, version 0.1.0\n"),
    ]);
    git(&root, &["tag", "--annotate", "v0.1.0", "--message", "v0.1.0"]);

    let outcome = bump(&root, BumpKind::Patch, false).unwrap();

    assert_eq!(outcome.tag, "v0.1.1");
    assert_eq!(
        fs::read_to_string(root.join("README.md")).unwrap(),
        "My project, version 0.1.1\n"
    );
    assert_eq!(commit_count(&root), 2);
    assert_eq!(
        git(&root, &["log", "-1", "--format=%s"]).trim(),
        "Bump version 0.1.0 -> 0.1.1"
    );
    let vcs = Git::new(&root);
    assert_eq!(vcs.latest_tag().unwrap(), "v0.1.1");
    assert!(!vcs.is_dirty().unwrap());

    let config = ConfigLoader::new()
        .with_user_config(false)
        .with_file(root.join(".semtag.toml"))
        .load()
        .unwrap();
    assert_eq!(config.version.as_deref(), Some("0.1.1"));
}

#[test]
fn without_file_rules_only_tags() {
    let (_tmp, root) = repo(&[("README.md", "hello\n")]);
    git(&root, &["tag", "--annotate", "v0.1.0", "--message", "v0.1.0"]);
    let head = git(&root, &["rev-parse", "HEAD"]);

    let outcome = bump(&root, BumpKind::Patch, false).unwrap();

    assert_eq!(outcome.tag, "v0.1.1");
    assert_eq!(commit_count(&root), 1);
    assert_eq!(git(&root, &["rev-parse", "v0.1.1^{commit}"]), head);
    assert_eq!(Git::new(&root).latest_tag().unwrap(), "v0.1.1");
}

#[test]
fn untagged_repository_starts_at_zero() {
    let (_tmp, root) = repo(&[("README.md", "hello\n")]);

    let outcome = bump(&root, BumpKind::Minor, false).unwrap();

    assert_eq!(outcome.tag, "v0.1.0");
}

#[test]
fn dry_run_leaves_repository_untouched() {
    let (_tmp, root) = repo(&[
        (".semtag.toml", CONFIG),
        ("README.md", "My project, version 0.1.0\n"),
    ]);

    let outcome = bump(&root, BumpKind::Major, true).unwrap();

    assert!(outcome.dry_run);
    assert_eq!(outcome.tag, "v1.0.0");
    assert_eq!(
        fs::read_to_string(root.join("README.md")).unwrap(),
        "My project, version 0.1.0\n"
    );
    assert_eq!(fs::read_to_string(root.join(".semtag.toml")).unwrap(), CONFIG);
    assert_eq!(commit_count(&root), 1);
    assert!(tags(&root).is_empty());
}

#[test]
fn dry_run_reports_the_same_failure() {
    let (_tmp, root) = repo(&[
        (".semtag.toml", CONFIG),
        ("README.md", "My project, version 0.0.9\n"),
    ]);

    let dry = bump(&root, BumpKind::Patch, true).unwrap_err();
    let real = bump(&root, BumpKind::Patch, false).unwrap_err();

    assert_eq!(dry.to_string(), real.to_string());
    assert!(tags(&root).is_empty());
}

#[test]
fn yaml_config_fails_the_dry_run_like_the_real_run() {
    let (_tmp, root) = repo(&[
        (
            ".semtag.yaml",
            "version: 0.1.0\nfile:\n  - path: README.md\n    search: \"version {{.Current}}\"\n",
        ),
        ("README.md", "My project, version 0.1.0\n"),
    ]);

    let dry = bump(&root, BumpKind::Patch, true).unwrap_err();
    let real = bump(&root, BumpKind::Patch, false).unwrap_err();

    assert!(matches!(
        real,
        BumpError::Config(ConfigError::UnsupportedFormat { .. })
    ));
    assert_eq!(dry.to_string(), real.to_string());
    assert_eq!(
        fs::read_to_string(root.join("README.md")).unwrap(),
        "My project, version 0.1.0\n"
    );
    assert!(!Git::new(&root).is_dirty().unwrap());
    assert!(tags(&root).is_empty());
}

#[test]
fn missing_search_in_second_file_leaves_first_untouched() {
    let config = format!(
        "{CONFIG}\n[[file]]\npath = \"CHANGELOG.md\"\nsearch = \"## {{{{.Current}}}}\"\n"
    );
    let (_tmp, root) = repo(&[
        (".semtag.toml", config.as_str()),
        ("README.md", "My project, version 0.1.0\n"),
        ("CHANGELOG.md", "## Unreleased\n"),
    ]);

    let err = bump(&root, BumpKind::Patch, false).unwrap_err();

    match err {
        BumpError::Replace(ReplaceError::SearchTextNotFound { path, search }) => {
            assert!(path.as_str().ends_with("CHANGELOG.md"));
            assert_eq!(search, "## 0.1.0");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        fs::read_to_string(root.join("README.md")).unwrap(),
        "My project, version 0.1.0\n"
    );
    assert!(!Git::new(&root).is_dirty().unwrap());
    assert!(tags(&root).is_empty());
}

#[test]
fn failing_hook_aborts_before_tag() {
    let (_tmp, root) = repo(&[("README.md", "hello\n")]);
    let settings = BumpSettings {
        hooks: HookSet::default().with(HookStage::PreTag, "echo refusing >&2; exit 7"),
        ..BumpSettings::from_config(&config::Config::default(), &root, None)
    };
    let vcs = Git::new(&root);
    let options = BumpOptions {
        force: true,
        ..BumpOptions::new(BumpKind::Patch)
    };
    let mut stderr = Vec::new();

    let err = bump::plan_bump(&vcs, &settings, options)
        .unwrap()
        .confirm(|_| Ok(true))
        .unwrap()
        .execute(&vcs, &mut io::sink(), &mut stderr, |_| {})
        .unwrap_err();

    assert!(matches!(err, BumpError::Hook(_)));
    assert_eq!(String::from_utf8(stderr).unwrap(), "refusing\n");
    assert!(tags(&root).is_empty());
}

#[test]
fn wrong_branch_is_refused() {
    let (_tmp, root) = repo(&[("README.md", "hello\n")]);
    git(&root, &["switch", "--quiet", "--create", "feature"]);

    let err = bump(&root, BumpKind::Patch, false).unwrap_err();

    assert!(err.to_string().contains("'feature'"), "{err}");
    assert!(tags(&root).is_empty());
}

#[test]
fn dirty_tree_is_refused() {
    let (_tmp, root) = repo(&[("README.md", "hello\n")]);
    fs::write(root.join("scratch.txt"), "wip").unwrap();

    let err = bump(&root, BumpKind::Patch, false).unwrap_err();

    assert!(err.to_string().contains("uncommitted changes"), "{err}");
}

//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary. The rendered
//! tag name of a dry-run bump shows which configuration won.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

fn git(root: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?}: {output:?}");
}

/// A committed repository on `main` containing `files`.
fn repo(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    git(root, &["init", "--quiet", "--initial-branch=main"]);
    git(root, &["config", "user.email", "semtag@example.com"]);
    git(root, &["config", "user.name", "semtag"]);
    git(root, &["config", "commit.gpgsign", "false"]);
    git(root, &["config", "tag.gpgsign", "false"]);
    fs::write(root.join("README.md"), "scratch\n").unwrap();
    for (path, content) in files {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    git(root, &["add", "--all"]);
    git(root, &["commit", "--quiet", "--message", "initial"]);
    tmp
}

/// The tag a forced dry-run patch bump would create, run from `dir`.
fn planned_tag(dir: &Path, extra: &[&str]) -> String {
    let logs = TempDir::new().unwrap();
    let output = cmd()
        .env("SEMTAG_LOG_DIR", logs.path())
        .arg("-C")
        .arg(dir)
        .args(extra)
        .args(["patch", "--dry-run", "--force", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    json["tag"].as_str().unwrap().to_string()
}

fn tag_template(prefix: &str) -> String {
    format!("[git]\ntag-template = \"{prefix}{{{{.Next}}}}\"\n")
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = repo(&[]);
    assert_eq!(planned_tag(tmp.path(), &[]), "v0.0.1");
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = repo(&[(".semtag.toml", &tag_template("dot-"))]);
    assert_eq!(planned_tag(tmp.path(), &[]), "dot-0.0.1");
}

#[test]
fn discovers_regular_config_in_current_dir() {
    let tmp = repo(&[("semtag.toml", &tag_template("plain-"))]);
    assert_eq!(planned_tag(tmp.path(), &[]), "plain-0.0.1");
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = repo(&[
        (".semtag.toml", &tag_template("parent-")),
        ("nested/deep/file.txt", "x\n"),
    ]);
    let sub_dir = tmp.path().join("nested").join("deep");
    assert_eq!(planned_tag(&sub_dir, &[]), "parent-0.0.1");
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = repo(&[
        (".semtag.toml", &tag_template("dot-")),
        ("semtag.toml", &tag_template("plain-")),
    ]);
    assert_eq!(planned_tag(tmp.path(), &[]), "dot-0.0.1");
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = repo(&[(".semtag.yaml", "git:\n  tag-template: \"yaml-{{.Next}}\"\n")]);
    assert_eq!(planned_tag(tmp.path(), &[]), "yaml-0.0.1");
}

#[test]
fn parses_yml_config() {
    let tmp = repo(&[(".semtag.yml", "git:\n  tag-template: \"yml-{{.Next}}\"\n")]);
    assert_eq!(planned_tag(tmp.path(), &[]), "yml-0.0.1");
}

#[test]
fn parses_json_config() {
    let tmp = repo(&[(
        ".semtag.json",
        r#"{"git": {"tag-template": "json-{{.Next}}"}}"#,
    )]);
    assert_eq!(planned_tag(tmp.path(), &[]), "json-0.0.1");
}

#[test]
fn empty_config_is_an_error() {
    let tmp = repo(&[(".semtag.toml", "")]);
    cmd()
        .env("SEMTAG_LOG_DIR", tmp.path().join("logs"))
        .arg("-C")
        .arg(tmp.path())
        .arg("latest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("is empty"));
}

#[test]
fn invalid_config_is_an_error() {
    let tmp = repo(&[(".semtag.toml", "log_level = \"loud\"\n")]);
    cmd()
        .env("SEMTAG_LOG_DIR", tmp.path().join("logs"))
        .arg("-C")
        .arg(tmp.path())
        .arg("latest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn bad_template_fails_before_anything_runs() {
    let tmp = repo(&[(".semtag.toml", &tag_template("v{{.Nope}}-"))]);
    cmd()
        .env("SEMTAG_LOG_DIR", tmp.path().join("logs"))
        .arg("-C")
        .arg(tmp.path())
        .args(["patch", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tag-template"));
}

// =============================================================================
// Config Precedence
// =============================================================================

#[test]
fn closer_config_takes_precedence() {
    let tmp = repo(&[
        (".semtag.toml", &tag_template("outer-")),
        ("project/.semtag.toml", &tag_template("inner-")),
    ]);
    assert_eq!(planned_tag(&tmp.path().join("project"), &[]), "inner-0.0.1");
}

#[test]
fn explicit_config_overrides_discovery() {
    let tmp = repo(&[(".semtag.toml", &tag_template("found-"))]);
    let elsewhere = TempDir::new().unwrap();
    let explicit = elsewhere.path().join("release.toml");
    fs::write(&explicit, tag_template("explicit-")).unwrap();

    assert_eq!(
        planned_tag(tmp.path(), &["--config", explicit.to_str().unwrap()]),
        "explicit-0.0.1"
    );
}

#[test]
fn default_branch_comes_from_config() {
    let tmp = repo(&[(".semtag.toml", "[git]\ndefault-branch = \"trunk\"\n")]);
    cmd()
        .env("SEMTAG_LOG_DIR", tmp.path().join("logs"))
        .arg("-C")
        .arg(tmp.path())
        .args(["patch", "--force", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only allowed from 'trunk'"));
}

#[test]
fn message_template_names_the_commit() {
    let config = "version = \"1.0.0\"\n\n[git]\nmessage-template = \"release {{.Next}}\"\n\n[[file]]\npath = \"VERSION\"\nsearch = \"{{.Current}}\"\n";
    let tmp = repo(&[(".semtag.toml", config), ("VERSION", "1.0.0\n")]);
    let logs = TempDir::new().unwrap();

    cmd()
        .env("SEMTAG_LOG_DIR", logs.path())
        .arg("-C")
        .arg(tmp.path())
        .args(["patch", "--force"])
        .assert()
        .success();

    let subject = StdCommand::new("git")
        .args(["log", "-1", "--format=%s"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert_eq!(String::from_utf8(subject.stdout).unwrap(), "release 1.0.1\n");
}

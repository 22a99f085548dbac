//! End-to-end CLI tests for the sharelink binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

mod support;
use support::write_script;

const STATIC_SCRIPT: &str = r#"
// ==UserScript==
// @type        static
// @displayName Static Drive
// @match       https://static\.example/s/(?P<KEY>\w+)
// ==/UserScript==
fn parse(share, http, logger) {
    logger.info("static resolve");
    share.put_param("fileInfo", #{ fileName: "report.pdf" });
    "http://example.com/" + share.share_key
}
"#;

const SPIN_SCRIPT: &str = r#"
// ==UserScript==
// @type        spin
// @displayName Spinner
// @match       https://spin\.example/s/(?P<KEY>\w+)
// ==/UserScript==
fn parse(share, http, logger) {
    let n = 0;
    loop { n += 1; }
}
"#;

/// Binary isolated from the user's config and log settings.
fn sharelink(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sharelink").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home).env_remove("RUST_LOG");
    cmd
}

fn scripts_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "static.rhai", STATIC_SCRIPT);
    write_script(dir.path(), "spin.rhai", SPIN_SCRIPT);
    dir
}

fn write_sharelink_config(config_home: &Path, contents: &str) {
    let config_dir = config_home.join("sharelink");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), contents).unwrap();
}

fn toml_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    sharelink(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve cloud-drive share links"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    sharelink(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sharelink"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    sharelink(home.path())
        .args(["providers", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_providers_lists_builtin_and_script_providers() {
    let home = TempDir::new().unwrap();
    let scripts = scripts_dir();
    sharelink(home.path())
        .args(["-q", "providers", "--scripts-dir"])
        .arg(scripts.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("lz\t"))
        .stdout(predicate::str::contains("cow\t"))
        .stdout(predicate::str::contains("static\tStatic Drive\tscript"))
        .stdout(predicate::str::contains("spin\tSpinner\tscript"));
}

#[test]
fn test_resolve_prints_direct_url() {
    let home = TempDir::new().unwrap();
    let scripts = scripts_dir();
    sharelink(home.path())
        .args(["-q", "resolve", "https://static.example/s/abc", "--scripts-dir"])
        .arg(scripts.path())
        .assert()
        .success()
        .stdout("http://example.com/abc\n");
}

#[test]
fn test_links_single_type() {
    let home = TempDir::new().unwrap();
    let scripts = scripts_dir();
    sharelink(home.path())
        .args(["-q", "links", "https://static.example/s/abc", "--type", "thunder"])
        .arg("--scripts-dir")
        .arg(scripts.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("thunder://"));

    sharelink(home.path())
        .args(["-q", "links", "https://static.example/s/abc", "-t", "curl", "--scripts-dir"])
        .arg(scripts.path())
        .assert()
        .success()
        .stdout("curl -L \\\n  -o \"report.pdf\" \\\n  \"http://example.com/abc\"\n");
}

#[test]
fn test_links_all_types_have_headings() {
    let home = TempDir::new().unwrap();
    let scripts = scripts_dir();
    let assert = sharelink(home.path())
        .args(["-q", "links", "https://static.example/s/abc", "--scripts-dir"])
        .arg(scripts.path())
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.matches("\n# ").count() + usize::from(stdout.starts_with("# ")), 9);
    assert!(stdout.starts_with("# Aria2 (aria2)\naria2c"));
    assert!(stdout.contains("# Thunder (thunder)\nthunder://"));
}

#[test]
fn test_resolve_unknown_url_fails() {
    let home = TempDir::new().unwrap();
    sharelink(home.path())
        .args(["resolve", "https://unknown.example/x"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("no resolver found"));
}

#[test]
fn test_builtin_without_resolver_fails() {
    let home = TempDir::new().unwrap();
    sharelink(home.path())
        .args(["-q", "resolve", "https://cowtransfer.com/s/abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider type 'cow'"));
}

#[test]
fn test_timeout_flag_stops_looping_script() {
    let home = TempDir::new().unwrap();
    let scripts = scripts_dir();
    sharelink(home.path())
        .args(["-q", "resolve", "https://spin.example/s/k", "--timeout", "1", "--scripts-dir"])
        .arg(scripts.path())
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .failure()
        .stderr(predicate::str::contains("time limit"));
}

#[test]
fn test_scripts_dir_from_config_file() {
    let home = TempDir::new().unwrap();
    let scripts = scripts_dir();
    write_sharelink_config(
        home.path(),
        &format!(
            "script_dir = \"{}\" # resolver scripts\nscript_timeout_secs = 5\n",
            toml_path(scripts.path())
        ),
    );
    sharelink(home.path())
        .args(["-q", "resolve", "https://static.example/s/xyz"])
        .assert()
        .success()
        .stdout("http://example.com/xyz\n");
}

#[test]
fn test_explicit_config_flag() {
    let home = TempDir::new().unwrap();
    let scripts = scripts_dir();
    let config = home.path().join("custom.toml");
    std::fs::write(&config, format!("script_dir = \"{}\"\n", toml_path(scripts.path()))).unwrap();
    sharelink(home.path())
        .args(["-q", "providers", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("static\tStatic Drive\tscript"));
}

#[test]
fn test_invalid_config_is_reported() {
    let home = TempDir::new().unwrap();
    write_sharelink_config(home.path(), "script_timeout_secs = 0\n");
    sharelink(home.path())
        .arg("providers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("script_timeout_secs"));
}

#[test]
fn test_missing_scripts_dir_is_reported() {
    let home = TempDir::new().unwrap();
    sharelink(home.path())
        .args(["providers", "--scripts-dir"])
        .arg(home.path().join("absent"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_broken_script_is_reported_once() {
    let home = TempDir::new().unwrap();
    let scripts = scripts_dir();
    write_script(scripts.path(), "broken.rhai", "fn parse(share, http, logger) {");
    let assert = sharelink(home.path())
        .args(["providers", "--scripts-dir"])
        .arg(scripts.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("static\tStatic Drive\tscript"));
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    let mentions = stderr.lines().filter(|line| line.contains("broken.rhai")).count();
    assert_eq!(mentions, 1, "{stderr}");
}

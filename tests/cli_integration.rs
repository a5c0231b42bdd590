//! Integration tests for the CLI
//!
//! Runs the built binary against a throwaway project with its own config.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to create a project with one patchable and one vendored file
fn setup_test_project() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::create_dir_all(dir.path().join("application/controllers")).unwrap();
    fs::create_dir_all(dir.path().join("application/tests")).unwrap();
    fs::create_dir_all(dir.path().join("vendor")).unwrap();

    fs::write(
        dir.path().join("application/controllers/Welcome.php"),
        r#"<?php

class Welcome
{
    public function index()
    {
        // seeded elsewhere
        $token = md5(uniqid());
        return $token;
    }
}
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("application/tests/WelcomeTest.php"),
        "<?php\n$now = time();\n",
    )
    .unwrap();
    fs::write(dir.path().join("vendor/autoload.php"), "<?php\nrand();\n").unwrap();

    fs::write(
        dir.path().join("monkey-patcher.toml"),
        r#"cache_dir = "cache"
include_paths = ["application"]
exclude_paths = ["application/tests"]
patcher_list = ["function"]
"#,
    )
    .unwrap();

    dir
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_monkey-patcher"))
        .current_dir(dir)
        .env_remove("MONKEY_PATCHER_CONFIG")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["patch", "scope", "status", "warm", "clear"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["status"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No config found"));
}

#[test]
fn test_patch_prints_rewritten_source() {
    let dir = setup_test_project();
    let output = run(dir.path(), &["patch", "application/controllers/Welcome.php"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r"$token = \__FuncProxy__::md5(\__FuncProxy__::uniqid());"));
    assert!(stdout.contains("// seeded elsewhere"));
}

#[test]
fn test_patch_diff() {
    let dir = setup_test_project();
    let output = run(
        dir.path(),
        &["patch", "--diff", "application/controllers/Welcome.php"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(original)"));
    assert!(stdout.contains("$token = md5(uniqid());"));
}

#[test]
fn test_patch_leaves_excluded_file_alone() {
    let dir = setup_test_project();
    let output = run(dir.path(), &["patch", "application/tests/WelcomeTest.php"]);

    assert!(output.status.success());
    assert_eq!(output.stdout, b"<?php\n$now = time();\n");
}

#[test]
fn test_scope() {
    let dir = setup_test_project();

    let inside = run(dir.path(), &["scope", "application/controllers/Welcome.php"]);
    assert!(String::from_utf8_lossy(&inside.stdout).contains("in scope"));

    let excluded = run(dir.path(), &["scope", "application/tests/WelcomeTest.php"]);
    assert!(String::from_utf8_lossy(&excluded.stdout).contains("out of scope"));

    let vendored = run(dir.path(), &["scope", "vendor/autoload.php"]);
    assert!(String::from_utf8_lossy(&vendored.stdout).contains("out of scope"));
}

#[test]
fn test_warm_then_status() {
    let dir = setup_test_project();

    let before = run(dir.path(), &["status"]);
    assert!(before.status.success());
    assert!(String::from_utf8_lossy(&before.stdout).contains("changed"));

    let warm = run(dir.path(), &["warm"]);
    assert!(warm.status.success());
    let stdout = String::from_utf8_lossy(&warm.stdout);
    assert!(stdout.contains("Patched: 1"));

    let after = run(dir.path(), &["status"]);
    let stdout = String::from_utf8_lossy(&after.stdout);
    assert!(!stdout.contains("changed"));
    assert!(stdout.contains("Cached rewrites: 1"));

    let again = run(dir.path(), &["warm"]);
    assert!(String::from_utf8_lossy(&again.stdout).contains("Already cached: 1"));
}

#[test]
fn test_clear() {
    let dir = setup_test_project();
    assert!(run(dir.path(), &["warm"]).status.success());

    let output = run(dir.path(), &["clear"]);
    assert!(output.status.success());

    let status = run(dir.path(), &["status"]);
    assert!(String::from_utf8_lossy(&status.stdout).contains("Cached rewrites: 0"));
}

#[test]
fn test_explicit_config_flag() {
    let dir = setup_test_project();
    let elsewhere = TempDir::new().unwrap();
    let config = dir.path().join("monkey-patcher.toml");

    let output = run(
        elsewhere.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "scope",
            dir.path()
                .join("application/controllers/Welcome.php")
                .to_str()
                .unwrap(),
        ],
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("in scope"));
}

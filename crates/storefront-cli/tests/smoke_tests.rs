//! Smoke tests for the storefront CLI
//!
//! None of these start a browser or reach the network.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command for the storefront binary, isolated from the caller's environment
fn storefront(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("storefront").expect("storefront binary should exist");
    cmd.current_dir(dir.path())
        .env_remove("BROWSER")
        .env_remove("LT_USERNAME")
        .env_remove("LT_ACCESS_KEY")
        .env_remove("BUILD_NUMBER")
        .env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("env"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_no_args_fails() {
    let dir = TempDir::new().unwrap();
    storefront(&dir).assert().failure();
}

// ============================================================================
// env
// ============================================================================

#[test]
fn test_env_defaults_to_local_chromium() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["env", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"target\": \"local\""))
        .stdout(predicate::str::contains("\"browser\": \"chromium\""))
        .stdout(predicate::str::contains("\"launchable\": true"))
        .stdout(predicate::str::contains("Local Build"));
}

#[test]
fn test_env_reads_browser_variable() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["env", "--json"])
        .env("BROWSER", "firefox")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"browser\": \"firefox\""))
        .stdout(predicate::str::contains("\"source\": \"override\""))
        .stdout(predicate::str::contains("\"launchable\": false"))
        .stderr(predicate::str::contains("can only launch chromium"));
}

#[test]
fn test_env_cloud_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["env", "--browser", "cloud"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("LT_USERNAME, LT_ACCESS_KEY"));
}

#[test]
fn test_env_cloud_with_credentials() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["env", "--json", "--browser", "cloud"])
        .env("LT_USERNAME", "shopper")
        .env("LT_ACCESS_KEY", "s3cret")
        .env("BUILD_NUMBER", "77")
        .assert()
        .success()
        .stdout(predicate::str::contains("remote-grid"))
        .stdout(predicate::str::contains("CI Build 77"))
        .stdout(predicate::str::contains("s3cret").not());
}

#[test]
fn test_env_invalid_browser_fails() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["env", "--browser", "netscape"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid browser name 'netscape'"));
}

#[test]
fn test_env_uses_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("storefront.yaml"),
        "browser: webkit\nheadless: true\nbase_url: https://staging.shop/\n",
    )
    .unwrap();
    storefront(&dir)
        .args(["env", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"browser\": \"webkit\""))
        .stdout(predicate::str::contains("\"source\": \"config\""))
        .stdout(predicate::str::contains("https://staging.shop/"));
}

// ============================================================================
// run / register argument handling
// ============================================================================

#[test]
fn test_run_list() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["run", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("login_with_api_user"))
        .stdout(predicate::str::contains("home_page_loads"))
        .stdout(predicate::str::contains("cart_total_matches_quantity"));
}

#[test]
fn test_browser_help_names_engine_limit() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["env", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chromium only"));
}

#[test]
fn test_run_unknown_filter_fails() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["run", "--filter", "checkout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no journey matches 'checkout'"));
}

#[test]
fn test_register_rejects_malformed_email() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["register", "--email", "not-an-email"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an email address"));
}

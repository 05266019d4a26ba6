//! Integration tests for the CLI binary.
//!
//! Runs the `tvc` binary against temporary stores and configuration files.
//!
//! This test is registered as a [[test]] in the trustview-cli crate so that
//! CARGO_BIN_EXE_tvc is available.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::json;
use tempfile::TempDir;

/// Get a Command pointing to the `tvc` binary.
fn tvc_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tvc"))
}

fn run(args: &[&str]) -> Output {
    tvc_binary()
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute tvc {args:?}: {e}"))
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn certificate(serial: &str, issuer: &str, subject: &str) -> serde_json::Value {
    json!({
        "serial": serial,
        "issuer": issuer,
        "subject": subject,
        "publicKeyEncoded": format!("{subject}-Key"),
        "notBefore": 0,
        "notAfter": u64::MAX,
    })
}

fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// A workspace with a request for RCA1 → SCA1 → www.example.org and a
/// configuration that lets the override answer for the validation service.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(service_answer: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_json(
            &dir.path().join("config.json"),
            &json!({
                "bootstrapping-mode": true,
                "override-validation-service-result": service_answer,
            }),
        );
        write_json(
            &dir.path().join("request.json"),
            &json!({
                "url": "https://www.example.org/",
                "certificatePath": [
                    certificate("01", "RCA1", "RCA1"),
                    certificate("02", "RCA1", "SCA1"),
                    certificate("21", "SCA1", "www.example.org"),
                ],
                "securityLevel": 0.8,
                "requestedPathValidity": "VALID",
                "spec": "VALIDATE",
            }),
        );
        write_json(
            &dir.path().join("host.json"),
            &certificate("21", "SCA1", "www.example.org"),
        );
        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    fn tvc(&self, args: &[&str]) -> Output {
        let store = self.path("trustview.json");
        let config = self.path("config.json");
        let mut all = vec!["--store", store.as_str(), "--config", config.as_str()];
        all.extend_from_slice(args);
        run(&all)
    }
}

#[test]
fn cli_responds_to_help() {
    let output = run(&["--help"]);

    assert!(
        output.status.success(),
        "tvc --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = stdout(&output);
    assert!(
        stdout.contains("tvc") || stdout.contains("TrustView") || stdout.contains("Usage"),
        "tvc --help output should contain usage information, got: {stdout}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = run(&["--version"]);

    assert!(
        output.status.success(),
        "tvc --version should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = stdout(&output);
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "tvc --version should contain version info, got: {stdout}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = run(&["--nonexistent-flag"]);

    assert!(
        !output.status.success(),
        "tvc with unknown flag should exit with error"
    );
}

#[test]
fn config_prints_file_over_defaults() {
    let ws = Workspace::new("trusted");
    let output = ws.tvc(&["config"]);
    assert!(output.status.success());

    let printed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(printed["bootstrapping-mode"], json!(true));
    assert_eq!(printed["override-validation-service-result"], json!("trusted"));
    assert_eq!(printed["opinion-n"], json!(10));
}

#[test]
fn validate_records_the_verdict_in_the_store() {
    let ws = Workspace::new("trusted");
    let request = ws.path("request.json");

    let output = ws.tvc(&["validate", &request]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let info: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(info["result"], json!("TRUSTED"));
    assert_eq!(info["resultSpec"], json!("VALIDATED_FIRST_SEEN"));

    let certs = stdout(&ws.tvc(&["certs", "--trusted"]));
    assert!(certs.contains("Certificates (1)"), "got: {certs}");
    assert!(certs.contains("www.example.org"), "got: {certs}");

    let assessments = stdout(&ws.tvc(&["assessments"]));
    assert!(assessments.contains("Assessments (2)"), "got: {assessments}");
}

#[test]
fn untrusted_verdict_is_listed() {
    let ws = Workspace::new("untrusted");
    let request = ws.path("request.json");

    let info: serde_json::Value =
        serde_json::from_str(&stdout(&ws.tvc(&["validate", &request]))).unwrap();
    assert_eq!(info["result"], json!("UNTRUSTED"));

    let certs = stdout(&ws.tvc(&["certs", "--untrusted"]));
    assert!(certs.contains("Certificates (1)"), "got: {certs}");
}

#[test]
fn watchlist_add_list_remove() {
    let ws = Workspace::new("trusted");
    let host = ws.path("host.json");

    assert!(ws.tvc(&["watchlist", "add", &host]).status.success());
    let listed = stdout(&ws.tvc(&["watchlist", "list"]));
    assert!(listed.contains("Watchlist (1)"), "got: {listed}");

    assert!(ws.tvc(&["watchlist", "remove", &host]).status.success());
    let listed = stdout(&ws.tvc(&["watchlist", "list"]));
    assert!(listed.contains("Watchlist (0)"), "got: {listed}");

    let again = ws.tvc(&["watchlist", "remove", &host]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("not on the watchlist"));
}

#[test]
fn erase_empties_the_store() {
    let ws = Workspace::new("trusted");
    let request = ws.path("request.json");
    assert!(ws.tvc(&["validate", &request]).status.success());

    assert!(ws.tvc(&["erase"]).status.success());
    let certs = stdout(&ws.tvc(&["certs"]));
    assert!(certs.contains("Certificates (0)"), "got: {certs}");
}

#[test]
fn missing_request_file_fails() {
    let ws = Workspace::new("trusted");
    let missing = ws.path("missing.json");
    let output = ws.tvc(&["validate", &missing]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error:"));
}

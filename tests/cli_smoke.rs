use assert_cmd::prelude::*;
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// A localhost URL nothing is listening on, so every request is refused.
fn closed_gerrit_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/gerrit")
}

fn write_fixtures(dir: &Path, base_url: &str) {
    fs::write(
        dir.join("pulse.toml"),
        format!(
            r#"
[gerrit]
base_url = "{base_url}"
projects = ["alpha", "beta"]
affiliations_file = "company_mapping.json"

[retry]
max_retries = 1
timeout_seconds = 5
base_delay_ms = 0
"#
        ),
    )
    .unwrap();
    fs::write(dir.join("company_mapping.json"), r#"{"alice": "Acme"}"#).unwrap();
}

#[test]
fn help_lists_required_flags() {
    let mut cmd = Command::cargo_bin("commitpulse").unwrap();
    let out = cmd.arg("--help").assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    for flag in ["--platform", "--start-date", "--end-date", "--output-file"] {
        assert!(text.contains(flag), "missing {flag} in help");
    }
}

#[test]
fn bad_date_fails_before_any_fetch() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("commitpulse").unwrap();
    cmd.current_dir(dir.path()).args([
        "--platform",
        "gerrit",
        "--start-date",
        "2024/01/01",
        "--end-date",
        "2024-02-01",
    ]);
    let out = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&out).contains("date"));
    assert!(!dir.path().join("metrics_output.csv").exists());
}

#[test]
fn missing_affiliation_file_aborts_the_run() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("commitpulse").unwrap();
    cmd.current_dir(dir.path())
        .args([
            "--platform",
            "gerrit",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-02-01",
            "--affiliations",
        ])
        .arg(dir.path().join("nope.json"));
    let out = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&out).contains("Failed to load affiliations"));
}

#[test]
fn unreachable_gerrit_writes_error_rows() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path(), &closed_gerrit_url());
    let output = dir.path().join("report.csv");

    let mut cmd = Command::cargo_bin("commitpulse").unwrap();
    cmd.current_dir(dir.path())
        .args([
            "--platform",
            "gerrit",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-02-01",
            "--quiet",
            "--config",
        ])
        .arg(dir.path().join("pulse.toml"))
        .arg("--output-file")
        .arg(&output);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    assert!(String::from_utf8_lossy(&stdout).contains("Metrics have been written to"));

    let csv = fs::read_to_string(&output).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Repository/Project,Total Commits"));
    assert_eq!(lines[1], "alpha,Failed to fetch commits");
    assert_eq!(lines[2], "beta,Failed to fetch commits");
}

#[test]
fn json_flag_prints_report_envelope() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path(), &closed_gerrit_url());

    let mut cmd = Command::cargo_bin("commitpulse").unwrap();
    cmd.current_dir(dir.path())
        .args([
            "--platform",
            "gerrit",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-02-01",
            "--json",
            "--config",
        ])
        .arg(dir.path().join("pulse.toml"));
    let out = cmd.assert().success().get_output().stdout.clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(v["platform"], "gerrit");
    assert_eq!(v["start_date"], "2024-01-01");
    let projects = v["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0]["name"], "alpha");
    assert_eq!(projects[0]["error"], "Failed to fetch commits");
    assert!(dir.path().join("metrics_output.csv").exists());
}

//! JSON logging output of the CLI
//!
//! With `--log-format json` every stderr line must be one JSON object, so
//! log collectors can parse runs without special cases.

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn test_json_log_lines_parse() {
    let work = TempDir::new().unwrap();
    let output = Command::cargo_bin("dockcall")
        .unwrap()
        .env_remove("DOCKCALL_LOG")
        .env_remove("RUST_LOG")
        .env_remove("DOCKCALL_LOG_SPAN_EVENTS")
        .args([
            "--log-format",
            "json",
            "--log-level",
            "debug",
            "--mock",
            "run",
            "--image",
            "ubuntu",
            "--output",
            "result.txt",
            "--work-dir",
        ])
        .arg(work.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut lines = 0;
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        let json: Value = serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("Failed to parse JSON line: {}\nError: {}", line, e));
        assert!(json.get("level").is_some(), "missing level: {}", line);
        assert!(json.get("timestamp").is_some(), "missing timestamp: {}", line);
        lines += 1;
    }
    assert!(lines > 0, "expected debug logs on stderr");
    assert!(output.stdout.is_empty());
}

//! End-to-end tests of the bidstream binary

use std::process::Command;

fn bidstream() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bidstream"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_non_numeric_rate_is_fatal() {
    let output = bidstream().arg("abc").output().expect("Failed to run bidstream");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "Events were emitted despite bad arguments");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("abc"), "{stderr}");
}

#[test]
fn test_non_numeric_workers_is_fatal() {
    let output = bidstream().args(["100", "two"]).output().expect("Failed to run bidstream");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_zero_rate_is_config_error() {
    let output = bidstream().arg("0").output().expect("Failed to run bidstream");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rate must be > 0"), "{stderr}");
}

#[test]
fn test_short_run_emits_json_lines() {
    let output = bidstream()
        .args(["200", "2", "--duration", "500ms", "--seed", "1", "-l", "warn"])
        .output()
        .expect("Failed to run bidstream");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut bids = 0;
    for line in stdout.lines() {
        let value: serde_json::Value = serde_json::from_str(line).expect("Invalid JSON line");
        if value["type"] == "bid" {
            bids += 1;
        }
    }
    // 200/s for 0.5 s
    assert!((80..=120).contains(&bids), "{} bids", bids);
}

#[test]
fn test_logs_stay_off_stdout() {
    let output = bidstream()
        .args(["50", "--duration", "200ms", "-l", "info"])
        .output()
        .expect("Failed to run bidstream");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().all(|line| line.starts_with('{')), "Non-event output on stdout");
    assert!(!output.stderr.is_empty(), "Expected log output on stderr");
}

use std::process::{Command, Output};

fn run_headless(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_crossroads"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute simulation")
}

/// Test that the headless run completes and logs its summary
#[test]
fn test_headless_simulation_runs() {
    let output = run_headless(&["--duration", "30", "--report-every", "10"]);

    assert!(
        output.status.success(),
        "Simulation failed to run. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("=== SIMULATION COMPLETE ==="),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
    for line in [
        "Vehicles generated:",
        "Vehicles crossed:",
        "Average wait:",
        "Queues:",
        "Safety violations: 0",
        "Final control mode: Basic",
    ] {
        assert!(stderr.contains(line), "Missing '{}' in stderr: {}", line, stderr);
    }
}

/// Test that the signal-group plan runs without tripping the fallback
#[test]
fn test_headless_signal_groups() {
    let output = run_headless(&["--duration", "60", "--signal-groups"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("signal-group"));
    assert!(stderr.contains("Safety violations: 0"));
}

/// Test that --json prints the final snapshot on stdout
#[test]
fn test_headless_json_snapshot() {
    let output = run_headless(&["--duration", "20", "--json"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let snapshot: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout is a JSON snapshot");
    assert_eq!(snapshot["running"], false);
    assert!(snapshot["sim_time"].as_f64().unwrap_or(0.0) >= 20.0);
    assert!(snapshot["lights"]["turnWestSouth"].is_string());
}

#[test]
fn test_headless_rejects_bad_time_step() {
    let output = run_headless(&["--time-step", "0"]);
    assert!(!output.status.success());

    let output = run_headless(&["--time-step", "NaN"]);
    assert!(!output.status.success());
}

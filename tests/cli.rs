//! CLI surface checks against the compiled binary.

use std::process::Command;

fn harness() -> Command {
    Command::new(env!("CARGO_BIN_EXE_temporal-mongo-harness"))
}

#[test]
fn unknown_mode_is_a_usage_error() {
    let output = harness().args(["load", "turbo"]).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("possible values") || stderr.contains("Usage"),
        "expected a usage error, got: {stderr}"
    );
}

#[test]
fn help_lists_all_subcommands() {
    let output = harness().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["up", "down", "namespace", "functional", "load", "wait"] {
        assert!(stdout.contains(subcommand), "missing `{subcommand}` in help");
    }
}

#[test]
fn load_help_lists_modes() {
    let output = harness().args(["load", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for mode in ["quick", "standard", "full", "nightly", "weekly"] {
        assert!(stdout.contains(mode), "missing `{mode}` in load help");
    }
}

//! Registration is idempotent by convention: a second run against a
//! server that already has the namespace still exits cleanly.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use temporal_mongo_harness::{Config, NamespaceRegistrar};

/// Stub server CLI. Keeps registration state in a marker file so that a
/// `create` after a `create` answers "already exists", like the server.
fn write_cli_stub(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let log = dir.join("calls.log");
    let state = dir.join("namespace-exists");
    let body = format!(
        r#"#!/bin/sh
echo "$@" >> {log}
case "$*" in
  *"namespace describe"*)
    [ -f {state} ] && exit 0
    echo "namespace not found" >&2
    exit 1
    ;;
  *"namespace create"*)
    if [ -f {state} ]; then
      echo "namespace already exists" >&2
      exit 1
    fi
    touch {state}
    exit 0
    ;;
  *"search-attribute create"*)
    exit 0
    ;;
esac
exit 1
"#,
        log = log.display(),
        state = state.display(),
    );

    let path = dir.join("temporal-stub");
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    (path, log, state)
}

fn recorded_calls(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn ensure_twice_succeeds_both_times() {
    let dir = tempfile::tempdir().unwrap();
    let (stub, log, _state) = write_cli_stub(dir.path());

    let mut config = Config::default();
    config.temporal_cli_bin = stub.display().to_string();

    let registrar = NamespaceRegistrar::new(&config);
    registrar.ensure().await.unwrap();
    registrar.ensure().await.unwrap();

    let calls = recorded_calls(&log);
    let creates = calls.iter().filter(|c| c.contains("namespace create")).count();
    assert_eq!(creates, 1, "second run must not re-register: {calls:?}");

    let attribute_creates = calls
        .iter()
        .filter(|c| c.contains("search-attribute create"))
        .count();
    assert_eq!(attribute_creates, 2);
}

#[tokio::test]
async fn already_exists_from_create_is_success() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("calls.log");
    let seen = dir.path().join("create-attempted");

    // describe answers only after a create was attempted; create always
    // reports prior existence. ensure() must treat that as success.
    let body = format!(
        r#"#!/bin/sh
echo "$@" >> {log}
case "$*" in
  *"namespace describe"*)
    [ -f {seen} ] && exit 0
    exit 1
    ;;
  *"namespace create"*)
    touch {seen}
    echo "rpc error: code = AlreadyExists desc = namespace exists" >&2
    exit 1
    ;;
  *"search-attribute create"*)
    echo "search attribute already exists" >&2
    exit 1
    ;;
esac
exit 1
"#,
        log = log.display(),
        seen = seen.display(),
    );

    let stub = dir.path().join("temporal-stub");
    fs::write(&stub, body).unwrap();
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = Config::default();
    config.temporal_cli_bin = stub.display().to_string();

    NamespaceRegistrar::new(&config).ensure().await.unwrap();

    let calls = recorded_calls(&log);
    assert!(calls.iter().any(|c| c.contains("namespace create")));
    assert!(calls.iter().any(|c| c.contains("search-attribute create")));
}

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use rompipe_core::backends::CommandOracle;
use rompipe_core::oracle::{OracleError, OracleRequest, TranslationOracle};

fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, format!("#!/bin/sh\n{body}")).expect("write script");
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

fn request(source: String) -> OracleRequest {
    OracleRequest {
        function: "f0".into(),
        bank: 0,
        start: 0xC000,
        end: 0xC010,
        source,
        callers: vec![],
        callees: vec![],
        mapper_name: "UxROM".into(),
        symbol: "F_C000".into(),
        reasons: vec![],
    }
}

#[test]
fn candidate_is_read_from_plain_stdout() {
    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("oracle.sh");
    write_script(&script, "cat > /dev/null\nprintf '    RTS\\n'\n");

    let oracle = CommandOracle::new(&script, vec![], Duration::from_secs(5));
    let response = oracle.translate(&request("RTS".into())).expect("translate");
    assert_eq!(response.candidate, "    RTS\n");
}

#[test]
fn candidate_is_read_from_json_stdout() {
    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("oracle.sh");
    write_script(&script, "cat > /dev/null\nprintf '{\"candidate\": \"    RTL\\\\n\"}'\n");

    let oracle = CommandOracle::new(&script, vec![], Duration::from_secs(5));
    let response = oracle.translate(&request("RTS".into())).expect("translate");
    assert_eq!(response.candidate, "    RTL\n");
}

#[test]
fn nonzero_exit_reports_stderr() {
    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("oracle.sh");
    write_script(&script, "cat > /dev/null\necho 'no model' >&2\nexit 3\n");

    let oracle = CommandOracle::new(&script, vec![], Duration::from_secs(5));
    match oracle.translate(&request("RTS".into())) {
        Err(OracleError::Failed(msg)) => assert!(msg.contains("no model"), "{msg}"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn child_that_never_reads_a_large_request_is_killed_at_the_deadline() {
    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("oracle.sh");
    write_script(&script, "exec sleep 5\n");

    // Larger than any pipe buffer, so the write cannot complete on its own.
    let source = "    NOP\n".repeat(32 * 1024);
    let oracle = CommandOracle::new(&script, vec![], Duration::from_millis(300));
    let started = Instant::now();
    let result = oracle.translate(&request(source));

    assert!(matches!(result, Err(OracleError::Timeout(_))), "{result:?}");
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
}

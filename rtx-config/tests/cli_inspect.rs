use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn rtx_config() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rtx-config"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn inspect_prints_tagged_stream() {
    rtx_config()
        .arg("inspect")
        .arg(fixture("fixtures/rtx1210-branch.conf"))
        .assert()
        .success()
        .stdout(predicate::str::contains("[pp anonymous]"))
        .stdout(predicate::str::contains("ipsec sa policy 103 3 esp aes-cbc sha-hmac"))
        .stdout(predicate::str::contains("RTX1210 Rev").not());
}

#[test]
fn inspect_scope_filter_includes_nested_ipsec() {
    rtx_config()
        .arg("inspect")
        .arg(fixture("fixtures/rtx1210-branch.conf"))
        .arg("--scope")
        .arg("tunnel:3")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ipsec tunnel 103]"))
        .stdout(predicate::str::contains("l2tp remote end-id site-b"))
        .stdout(predicate::str::contains("tunnel select 1").not())
        .stdout(predicate::str::contains("tunnel enable 3").not());
}

#[test]
fn inspect_global_only() {
    rtx_config()
        .arg("inspect")
        .arg(fixture("fixtures/rtx1210-branch.conf"))
        .arg("--global")
        .assert()
        .success()
        .stdout(predicate::str::contains("ip route default gateway pp 1"))
        .stdout(predicate::str::contains("pp bind").not());
}

#[test]
fn inspect_scope_tree_and_summary() {
    rtx_config()
        .arg("inspect")
        .arg(fixture("fixtures/rtx1210-branch.conf"))
        .arg("--scopes")
        .assert()
        .success()
        .stdout(predicate::str::contains("  tunnel 3 @60"))
        .stdout(predicate::str::contains("    ipsec tunnel 103 @64 (9 commands)"));

    rtx_config()
        .arg("inspect")
        .arg(fixture("fixtures/rtx1210-branch.conf"))
        .arg("--summary")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "lines=122 commands=117 comments=5 scopes=8 contexts=8",
        ));
}

#[test]
fn inspect_json_reads_stdin() {
    let output = rtx_config()
        .arg("inspect")
        .arg("-")
        .arg("--format")
        .arg("json")
        .write_stdin("pp select 1\n pp bind lan2\n")
        .output()
        .expect("run inspect");
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(rows[1]["scope"], "pp 1");
    assert_eq!(rows[1]["depth"], 1);
    assert_eq!(rows[1]["text"], "pp bind lan2");
}

#[test]
fn inspect_rejects_bad_scope_selector() {
    rtx_config()
        .arg("inspect")
        .arg(fixture("fixtures/rtx1210-branch.conf"))
        .arg("--scope")
        .arg("vlan:1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown scope kind"));
}

#[test]
fn inspect_missing_file_fails_with_context() {
    rtx_config()
        .arg("inspect")
        .arg(fixture("fixtures/does-not-exist.conf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn inspect_accepts_shift_jis_descriptions() {
    let mut raw = b"tunnel select 1\n description ".to_vec();
    raw.extend_from_slice(&[0x8b, 0x92, 0x93, 0x5f]);
    raw.extend_from_slice(b"\n tunnel encapsulation l2tp\n");

    let output = rtx_config()
        .arg("inspect")
        .arg("-")
        .arg("--format")
        .arg("json")
        .write_stdin(raw)
        .output()
        .expect("run inspect");
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(rows.as_array().map(Vec::len), Some(3));
    assert_eq!(rows[2]["scope"], "tunnel 1");
    assert_eq!(rows[2]["text"], "tunnel encapsulation l2tp");
}

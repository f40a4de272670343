use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const KEY: &str = "arn:aws:kms:us-east-1:111122223333:key/1234abcd-12ab-34cd-56ef-1234567890ab";

fn valid_json() -> String {
    format!(
        r#"{{
    "name": "my-data-bucket",
    "environment": "prod",
    "kms_key_id": "{}",
    "trusted_principals": ["arn:aws:iam::111122223333:role/A"]
}}"#,
        KEY
    )
}

fn write_fixture(dir: &TempDir, file_name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(file_name);
    fs::write(&path, contents).expect("failed to write fixture");
    path
}

/// The binary with the caller's strictness and log settings cleared.
fn bin() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bucket-policy-compiler"));
    command
        .env_remove("BPC_STRICT_OBJECT_LOCK")
        .env_remove("RUST_LOG");
    command
}

fn run(args: &[&str], config: &Path) -> Output {
    bin()
        .args(args)
        .arg(config)
        .output()
        .expect("failed to run bucket-policy-compiler")
}

#[test]
fn help_lists_subcommands() {
    let out = bin().arg("--help").output().expect("failed to run --help");
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(s.contains("compile"), "help was: {}", s);
    assert!(s.contains("validate"), "help was: {}", s);
    assert!(s.contains("schema"), "help was: {}", s);
}

#[test]
fn test_compile_prints_artifact() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "bucket.json", &valid_json());

    let output = run(&["compile"], &path);
    assert_eq!(output.status.code(), Some(0));

    let artifact: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(artifact["bucket"], "my-data-bucket");
    let sids: Vec<&str> = artifact["policy_document"]["Statement"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["Sid"].as_str().unwrap())
        .collect();
    assert_eq!(
        sids,
        vec![
            "DenyInsecureTransport",
            "AllowTrustedPrincipals",
            "DenyUnencryptedObjectUploads",
            "DenyIncorrectEncryptionKey"
        ]
    );
}

#[test]
fn test_compile_toml_to_output_file() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "bucket.toml",
        &format!(
            r#"
name = "vault"
environment = "prod"
kms_key_id = "{}"
object_lock_enabled = true

[object_lock]
mode = "COMPLIANCE"
retention_days = 2555
"#,
            KEY
        ),
    );
    let out_path = dir.path().join("artifact.json");

    bin()
        .args(["compile", "--compact", "--output"])
        .arg(&out_path)
        .arg(&path)
        .assert()
        .success();

    let written = fs::read_to_string(&out_path).unwrap();
    assert_eq!(written.lines().count(), 1);
    let artifact: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(
        artifact["object_lock_configuration"]["Rule"]["DefaultRetention"]["Days"],
        2555
    );
}

#[test]
fn test_validate_reports_every_violation() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "bad.json",
        r#"{
    "name": "my-data_bucket",
    "environment": "prod",
    "kms_key_id": "",
    "lifecycle_rules": [
        {"id": "expire", "expiration_after_days": 30},
        {"id": "expire", "expiration_after_days": 60}
    ]
}"#,
    );

    let output = run(&["validate"], &path);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr.contains("3 problem(s)"), "stderr was: {}", stderr);
    assert!(stderr.contains("name:"), "stderr was: {}", stderr);
    assert!(stderr.contains("kms_key_id"), "stderr was: {}", stderr);
    assert!(
        stderr.contains("duplicate lifecycle rule id 'expire'"),
        "stderr was: {}",
        stderr
    );
}

#[test]
fn test_validate_accepts_valid_config() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "bucket.json", &valid_json());

    bin()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("is valid"));
}

#[test]
fn test_strict_object_lock_from_env() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "bucket.json",
        &format!(
            r#"{{
    "name": "vault",
    "environment": "prod",
    "kms_key_id": "{}",
    "object_lock": {{"mode": "GOVERNANCE", "retention_days": 30}}
}}"#,
            KEY
        ),
    );

    // permissive by default
    assert_eq!(run(&["validate"], &path).status.code(), Some(0));

    bin()
        .arg("validate")
        .arg(&path)
        .env("BPC_STRICT_OBJECT_LOCK", "true")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("object_lock_enabled is false"));
}

#[test]
fn test_object_lock_cannot_be_disabled() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "bucket.json", &valid_json());

    let output = run(&["compile", "--object-lock-previously-enabled"], &path);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(stderr.contains("object lock cannot be disabled"), "stderr was: {}", stderr);
}

#[test]
fn test_every_invocation_clears_strict_flag_and_log_filter() {
    let command = bin();
    for key in ["BPC_STRICT_OBJECT_LOCK", "RUST_LOG"] {
        assert!(
            command
                .get_envs()
                .any(|(name, value)| name == key && value.is_none()),
            "{} is not cleared",
            key
        );
    }
}

#[test]
fn test_compile_from_stdin() {
    let mut child = bin()
        .args(["compile", "--compact", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(valid_json().as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    let artifact: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(artifact["baseline"]["versioning"]["Status"], "Enabled");
}

#[test]
fn test_missing_file_is_io_failure() {
    let dir = TempDir::new().unwrap();
    let output = run(&["compile"], &dir.path().join("absent.json"));
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr.contains("failed to read configuration file"),
        "stderr was: {}",
        stderr
    );
}

#[test]
fn test_malformed_json_is_parse_failure() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "bucket.json", "{\"name\": ");

    let output = run(&["validate"], &path);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_schema_describes_config() {
    let output = bin().arg("schema").output().expect("failed to run schema");
    assert_eq!(output.status.code(), Some(0));

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(schema["properties"]["kms_key_id"].is_object());
    assert!(schema["properties"]["lifecycle_rules"].is_object());
}

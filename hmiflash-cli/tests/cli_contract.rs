//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("hmiflash");
    cmd.env_remove("HMIFLASH_PORT")
        .env_remove("HMIFLASH_BAUD")
        .env_remove("HMIFLASH_NON_INTERACTIVE");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hmiflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hmiflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn list_ports_json_returns_valid_json() {
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["ok"], true);
    assert!(parsed["data"]["ports"].is_array());
}

#[test]
fn info_reports_block_layout_and_upload_command() {
    let dir = tempdir().expect("tempdir should be created");
    let image = dir.path().join("nx4827.tft");
    fs::write(&image, vec![0u8; 9000]).expect("write image");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("info")
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("9000 bytes"))
        .stderr(predicate::str::contains("whmi-wri 9000,115200,0"));
}

#[test]
fn info_json_uses_requested_baud() {
    let dir = tempdir().expect("tempdir should be created");
    let image = dir.path().join("ui.tft");
    fs::write(&image, vec![0u8; 8192]).expect("write image");

    let mut cmd = cli_cmd();
    let output = cmd
        .current_dir(dir.path())
        .args(["-b", "921600", "info", "--json"])
        .arg(&image)
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["data"]["size"], 8192);
    assert_eq!(parsed["data"]["blocks"], 2);
    assert_eq!(parsed["data"]["last_block"], 4096);
    assert_eq!(parsed["data"]["upload_command"], "whmi-wri 8192,921600,0");
}

#[test]
fn info_json_error_keeps_stdout_clean() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir.path().join("not_exists.tft");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("info")
        .arg("--json")
        .arg(nonexistent.as_os_str())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn baud_from_local_config_file_is_used() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("hmiflash.toml"), "[upload]\nbaud = 38400\n").expect("write config");
    fs::write(dir.path().join("ui.tft"), vec![1u8; 10]).expect("write image");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["info", "ui.tft"])
        .assert()
        .success()
        .stderr(predicate::str::contains("whmi-wri 10,38400,0"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

/// Exit code 0: successful operations
#[test]
fn exit_code_zero_on_success() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .code(0);

    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .code(0);
}

/// Exit code 1: generic error fallback
#[test]
fn exit_code_one_for_missing_image() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir.path().join("does_not_exist.tft");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("info")
        .arg(nonexistent.as_os_str())
        .assert()
        .failure()
        .code(1);
}

/// Exit code 2: usage error (unknown command, invalid arguments)
#[test]
fn exit_code_two_for_usage_error_unknown_command() {
    let mut cmd = cli_cmd();
    cmd.arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized").or(predicate::str::contains("unknown")));
}

#[test]
fn exit_code_two_for_usage_error_missing_required_arg() {
    let mut cmd = cli_cmd();
    cmd.arg("upload")
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("FILE"));
}

/// Exit code 3: explicitly named config file is missing
#[test]
fn exit_code_three_for_missing_config_file() {
    let dir = tempdir().expect("tempdir should be created");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("list-ports")
        .assert()
        .failure()
        .code(3);
}

#[test]
fn exit_code_three_for_zero_settle_delay() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("ui.tft"), vec![0u8; 10]).expect("write image");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["-p", "INVALID_PORT_NAME_XYZ", "upload", "ui.tft", "--settle-ms", "0"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("settle delay"));
}

#[test]
fn info_rejects_zero_baud() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("ui.tft"), vec![0u8; 10]).expect("write image");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["-b", "0", "info", "ui.tft"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("baud rate must be non-zero"))
        .stderr(predicate::str::contains("whmi-wri").not());
}

#[test]
fn malformed_local_config_only_warns() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("hmiflash.toml"), "invalid toml [[[").expect("write invalid config");

    let mut cmd = cli_cmd();
    let output = cmd
        .current_dir(dir.path())
        .arg("list-ports")
        .output()
        .expect("command should execute");
    assert!(output.status.success(), "command should succeed despite config warning");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOML"), "should warn about invalid TOML");
}

#[test]
fn upload_rejects_empty_image_before_opening_port() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("empty.tft"), b"").expect("write empty image");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["-p", "INVALID_PORT_NAME_XYZ", "upload", "empty.tft"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("empty"))
        .stderr(predicate::str::contains("INVALID_PORT_NAME_XYZ").not());
}

#[test]
fn upload_to_invalid_port_fails() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("ui.tft"), vec![0u8; 100]).expect("write image");

    let mut cmd = cli_cmd();
    let output = cmd
        .current_dir(dir.path())
        .args(["-q", "-p", "INVALID_PORT_NAME_XYZ", "upload", "ui.tft"])
        .output()
        .expect("command should execute");

    assert!(!output.status.success(), "opening a missing port should not succeed");
    assert!(output.stdout.is_empty());
}

// ============================================================================
// Unknown Command/Flag Suggestion Tests
// ============================================================================

#[test]
fn unknown_command_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("uplaod")
        .assert()
        .failure()
        .stderr(predicate::str::contains("upload"));
}

#[test]
fn unknown_flag_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("list-ports")
        .arg("--jason")
        .assert()
        .failure()
        .stderr(predicate::str::contains("json"));
}

#[test]
fn completions_command_writes_to_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty())
        .stdout(predicate::str::contains("_hmiflash()"));
}

#[test]
fn option_terminator_allows_dash_prefixed_operand() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("-ui.tft"), vec![0u8; 5]).expect("write image");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["info", "--", "-ui.tft"])
        .assert()
        .success()
        .stderr(predicate::str::contains("whmi-wri 5,115200,0"));
}

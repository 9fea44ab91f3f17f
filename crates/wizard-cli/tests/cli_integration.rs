use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture(name: &str) -> String {
    fixture_path(name).to_str().unwrap().to_string()
}

/// The binary with a config path that never exists, so a user's saved
/// settings cannot leak into the tests.
fn bain_wizard() -> Command {
    let mut cmd = Command::cargo_bin("bain-wizard").unwrap();
    cmd.env(
        "BAIN_WIZARD_CONFIG",
        std::env::temp_dir().join("bain-wizard-tests-missing-config.json"),
    )
    .env_remove("BAIN_WIZARD_HOST")
    .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_exits_zero() {
    bain_wizard()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bain-wizard"));
}

// =============================================================================
// check
// =============================================================================

#[test]
fn test_check_valid_script() {
    bain_wizard()
        .args(["check", &fixture("texture_wizard.txt")])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK:"))
        .stdout(predicate::str::contains("Script Extender >= 0.2.0.12"));
}

#[test]
fn test_check_reports_parse_error_with_exit_2() {
    bain_wizard()
        .args(["check", &fixture("broken.txt")])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Parse error at line 2"))
        .stderr(predicate::str::contains("EndIf"));
}

#[test]
fn test_check_missing_file_exits_4() {
    bain_wizard()
        .args(["check", "/nonexistent/wizard.txt"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("I/O error"));
}

#[test]
fn test_check_reads_stdin() {
    bain_wizard()
        .args(["check", "-"])
        .write_stdin("Note \"hello\"\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: 1 top-level statements"));
}

// =============================================================================
// requires
// =============================================================================

#[test]
fn test_requires_passing_host() {
    bain_wizard()
        .args(["requires", &fixture("texture_wizard.txt"), "--host", &fixture("host_se.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Need"))
        .stdout(predicate::str::contains("Have"))
        .stdout(predicate::str::contains("0.2.0.17"));
}

#[test]
fn test_requires_old_host_shows_na_and_exits_1() {
    bain_wizard()
        .args(["requires", &fixture("texture_wizard.txt"), "--host", &fixture("host_old.json")])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1.4.9"))
        .stdout(predicate::str::contains("N/A"))
        .stdout(predicate::str::contains("MISSING"))
        .stderr(predicate::str::contains("Requirements not met"));
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_minimal_selection() {
    let assert = bain_wizard()
        .args([
            "run",
            &fixture("install_type.txt"),
            "--host",
            &fixture("host_se.json"),
            "--select",
            "1",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("Options:"));
    assert!(stdout.contains("[0] Full (default)"));
    assert!(stdout.contains("Selected: Minimal"));
    assert!(stdout.contains("Sub-Packages:\n  00 Core\n"));
    assert!(!stdout.contains("01 Extras\n"));
    assert!(stdout.contains("[x] Core.esp"));
    assert!(!stdout.contains("Extras.esp"));
    assert!(stdout.contains("Notes:\n  - Thanks for installing"));
}

#[test]
fn test_run_select_by_label() {
    bain_wizard()
        .args(["run", &fixture("install_type.txt"), "--host", &fixture("host_se.json")])
        .args(["-s", "Full"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  01 Extras\n"))
        .stdout(predicate::str::contains("[x] Extras.esp"));
}

#[test]
fn test_run_defaults_with_json_output() {
    let assert = bain_wizard()
        .args([
            "--format",
            "json",
            "run",
            &fixture("texture_wizard.txt"),
            "--host",
            &fixture("host_se.json"),
            "--defaults",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(
        json["plan"]["subpackages"],
        serde_json::json!(["00 Core", "10 Textures 2K"])
    );
    assert_eq!(
        json["plan"]["renames"][0]["to"],
        serde_json::json!("TexturePack - 2K.esp")
    );
    assert_eq!(
        json["plan"]["notes"],
        serde_json::json!(["No patches selected", "Installed 2K textures"])
    );
    assert_eq!(json["requirements"].as_array().unwrap().len(), 3);
}

#[test]
fn test_run_two_pages_of_selections() {
    bain_wizard()
        .args([
            "run",
            &fixture("texture_wizard.txt"),
            "--host",
            &fixture("host_se.json"),
            "-s",
            "4K",
            "-s",
            "0,1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Page 2 (select any number, or none)"))
        .stdout(predicate::str::contains("Optional patches for 4K textures"))
        .stdout(predicate::str::contains("  20 Patches\n"))
        .stdout(predicate::str::contains("Skyrim.ini [Display] bEnableParallaxOcclusion = 1"))
        .stdout(predicate::str::contains("TexturePack.esp -> TexturePack - 4K.esp"));
}

#[test]
fn test_run_back_to_previous_page() {
    let assert = bain_wizard()
        .args(["run", &fixture("texture_wizard.txt"), "--host", &fixture("host_se.json")])
        .args(["-s", "4K", "-s", "back", "-s", "2K", "-s", ""])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("Optional patches for 4K textures"));
    assert!(stdout.contains("[1] 4K (selected before)"));
    assert!(stdout.contains("Optional patches for 2K textures"));
    assert!(stdout.contains("  10 Textures 2K\n"));
    assert!(!stdout.contains("10 Textures 4K"));
    assert!(stdout.contains("TexturePack.esp -> TexturePack - 2K.esp"));
}

#[test]
fn test_run_back_on_first_page_exits_3() {
    bain_wizard()
        .args(["run", &fixture("install_type.txt"), "--host", &fixture("host_se.json")])
        .args(["-s", "back"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no previous page"));
}

#[test]
fn test_run_invalid_selection_exits_3() {
    bain_wizard()
        .args(["run", &fixture("install_type.txt"), "--host", &fixture("host_se.json")])
        .args(["-s", "0,1"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Exactly one option"));
}

#[test]
fn test_run_without_answers_exits_3() {
    bain_wizard()
        .args(["run", &fixture("install_type.txt"), "--host", &fixture("host_se.json")])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--select or --defaults"));
}

#[test]
fn test_run_unmet_requirements_exits_1() {
    bain_wizard()
        .args(["run", &fixture("install_type.txt"), "--host", &fixture("host_old.json")])
        .arg("--defaults")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1.4.9"))
        .stderr(predicate::str::contains("Game needs 1.5.0 (have 1.4.9)"));
}

#[test]
fn test_run_install_anyway() {
    bain_wizard()
        .args([
            "run",
            &fixture("install_type.txt"),
            "--host",
            &fixture("host_old.json"),
            "--defaults",
            "--install-anyway",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installing despite unmet requirements"))
        .stdout(predicate::str::contains("Sub-Packages:"));
}

#[test]
fn test_run_allow_for_other_component_still_fails() {
    bain_wizard()
        .args([
            "run",
            &fixture("install_type.txt"),
            "--host",
            &fixture("host_old.json"),
            "--defaults",
            "--allow-for",
            "se,wb",
        ])
        .assert()
        .code(1);
}

#[test]
fn test_run_allow_for_covering_component_succeeds() {
    bain_wizard()
        .args(["run", &fixture("install_type.txt"), "--host", &fixture("host_old.json")])
        .args(["--defaults", "--allow-for", "GAME,wb"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installing despite unmet requirements"));
}

#[test]
fn test_run_allow_for_unknown_component_is_usage_error() {
    bain_wizard()
        .args(["run", &fixture("install_type.txt"), "--defaults", "--allow-for", "se,mod"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value 'mod'"))
        .stderr(predicate::str::contains("I/O error").not());
}

#[test]
fn test_run_cancelled_script_exits_5() {
    bain_wizard()
        .args(["run", &fixture("cancel.txt"), "--host", &fixture("host_se.json")])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("This mod needs the Anniversary Edition"));
}

#[test]
fn test_run_cancelled_json() {
    let assert = bain_wizard()
        .args(["-f", "json", "run", &fixture("cancel.txt"), "--host", &fixture("host_se.json")])
        .assert()
        .code(5);
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(json["status"], "cancelled");
    assert_eq!(json["reason"], "This mod needs the Anniversary Edition");
}

#[test]
fn test_run_script_from_stdin() {
    bain_wizard()
        .args(["run", "-", "--defaults"])
        .write_stdin(concat!(
            "SelectMany \"Extras\", \"|A\", \"\", \"\", \"B\", \"\", \"\"\n",
            "  Case \"A\"\n",
            "    SelectSubPackage \"01 A\"\n",
            "EndSelect\n",
        ))
        .assert()
        .success()
        .stdout(predicate::str::contains("Sub-Packages:\n  01 A\n"));
}

#[test]
fn test_run_parse_error_exits_2() {
    bain_wizard()
        .args(["run", &fixture("broken.txt"), "--defaults"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Parse error"));
}

#[test]
fn test_run_missing_host_profile_exits_4() {
    bain_wizard()
        .args(["run", &fixture("install_type.txt"), "--host", "/nonexistent/host.json"])
        .assert()
        .code(4);
}

// =============================================================================
// config
// =============================================================================

#[test]
fn test_config_set_and_show() {
    let path = std::env::temp_dir()
        .join(format!("bain-wizard-cli-config-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);

    Command::cargo_bin("bain-wizard")
        .unwrap()
        .env("BAIN_WIZARD_CONFIG", &path)
        .args(["config", "--policy", "allow"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"override_policy\": \"allow\""));

    // The saved policy now applies to runs
    Command::cargo_bin("bain-wizard")
        .unwrap()
        .env("BAIN_WIZARD_CONFIG", &path)
        .args(["run", &fixture("install_type.txt"), "--host", &fixture("host_old.json")])
        .arg("--defaults")
        .assert()
        .success();

    std::fs::remove_file(&path).ok();
}

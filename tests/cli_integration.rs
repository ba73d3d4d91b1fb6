//! Integration tests for the command-line interface
//!
//! Runs the built binary against units and catalogs in a temporary directory.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const UNIT: &str = "import java.util.Optional;\n\
                    Optional<String> opt = Optional.of(\"a\");\n\
                    boolean b = !opt.isPresent();\n";

const REWRITTEN: &str = "import java.util.Optional;\n\
                         Optional<String> opt = Optional.of(\"a\");\n\
                         boolean b = opt.isEmpty();\n";

/// Helper to create a workspace holding one unit that needs rewriting
fn setup_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/Main.sketch"), UNIT).unwrap();
    fs::write(dir.path().join("src/notes.txt"), "not a unit\n").unwrap();
    dir
}

fn refit(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_refit"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_rules_lists_builtin_catalogs() {
    let dir = TempDir::new().unwrap();
    let output = refit(dir.path(), &["rules"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("optional.OptionalIsEmpty"));
    assert!(stdout.contains("time.EpochInstant"));
    assert!(stdout.contains("reactor.MonoDeferredError"));
    assert!(stdout.contains("41 rule(s)"));
}

#[test]
fn test_validate_builtin_catalogs() {
    let dir = TempDir::new().unwrap();
    let output = refit(dir.path(), &["validate"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("optional: 11 rule(s)"));
    assert!(stdout.contains("time: 14 rule(s)"));
    assert!(stdout.contains("reactor: 16 rule(s)"));
}

#[test]
fn test_validate_reports_broken_rule() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("custom.toml"),
        r#"[meta]
name = "custom"
imports = ["java.util.Optional"]

[[rules]]
name = "Broken"
type_params = ["T"]
holes = [{ name = "optional", type = "Optional<T>" }]
before = "optional.isPresent("
after = "optional.isEmpty()"
"#,
    )
    .unwrap();
    let output = refit(dir.path(), &["validate", "--rules", "custom.toml"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("custom: 0 rule(s), 1 failed"));
    assert!(stdout.contains("custom.Broken"));
}

#[test]
fn test_check_reports_pending_edits() {
    let workspace = setup_workspace();
    let output = refit(workspace.path(), &["check", "src"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("optional.OptionalIsEmpty"));
    assert!(stdout.contains("1 unit(s) scanned"));

    // check never writes
    let content = fs::read_to_string(workspace.path().join("src/Main.sketch")).unwrap();
    assert_eq!(content, UNIT);
}

#[test]
fn test_apply_without_write_leaves_units() {
    let workspace = setup_workspace();
    let output = refit(workspace.path(), &["apply", "--diff", "src"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("-boolean b = !opt.isPresent();"));
    assert!(stdout.contains("+boolean b = opt.isEmpty();"));
    let content = fs::read_to_string(workspace.path().join("src/Main.sketch")).unwrap();
    assert_eq!(content, UNIT);
}

#[test]
fn test_apply_write_then_check_is_clean() {
    let workspace = setup_workspace();
    let output = refit(workspace.path(), &["apply", "--write", "src"]);
    assert!(output.status.success());
    let content = fs::read_to_string(workspace.path().join("src/Main.sketch")).unwrap();
    assert_eq!(content, REWRITTEN);

    let output = refit(workspace.path(), &["check", "src"]);
    assert!(output.status.success());
}

#[test]
fn test_apply_json_lines() {
    let workspace = setup_workspace();
    let output = refit(workspace.path(), &["apply", "--json", "src/Main.sketch"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 1);
    let edit: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(edit["rule"], "optional.OptionalIsEmpty");
    assert_eq!(edit["new_text"], "opt.isEmpty()");
}

#[test]
fn test_exclude_flag_skips_rule() {
    let workspace = setup_workspace();
    let output = refit(
        workspace.path(),
        &["check", "--exclude", "optional.OptionalIsEmpty", "src"],
    );
    assert!(output.status.success());
}

#[test]
fn test_config_file_is_picked_up() {
    let workspace = setup_workspace();
    fs::write(
        workspace.path().join("refit.toml"),
        "[driver]\ninclude = [\"time\"]\n",
    )
    .unwrap();
    let output = refit(workspace.path(), &["check", "src"]);
    assert!(output.status.success());
}

#[test]
fn test_invalid_config_fails() {
    let workspace = setup_workspace();
    fs::write(
        workspace.path().join("custom.toml"),
        "[driver]\nmax_iterations = 0\n",
    )
    .unwrap();
    let output = refit(
        workspace.path(),
        &["check", "--config", "custom.toml", "src"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_iterations"));
}

#[test]
fn test_unparsable_unit_is_counted_as_failure() {
    let workspace = setup_workspace();
    fs::write(workspace.path().join("src/Broken.sketch"), "int x = ;\n").unwrap();
    let output = refit(workspace.path(), &["apply", "src"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 unit(s) scanned"));
    assert!(stdout.contains("1 failed"));
}

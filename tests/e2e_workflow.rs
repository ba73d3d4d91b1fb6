//! End-to-end workflow test
//!
//! Tests the complete workflow through the library:
//! 1. Load engine configuration, including host declarations
//! 2. Load a project catalog next to the built-in ones
//! 3. Rewrite units and write the edits back
//! 4. Check that the result is a fixed point and stale edits are refused

use refit::config;
use refit::rules::{load_builtin, load_from_path};
use refit::{CancelToken, Driver, Edit, EditError, EditResult, RuleRegistry, SketchHost};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONFIG: &str = r#"
[driver]
max_iterations = 5
exclude = ["reactor"]

[[host.types]]
name = "Box"
qualified = "com.example.Box"
params = ["T"]

[[host.signatures]]
owner = "Box"
name = "of"
static = true
type_params = ["T"]
params = ["T"]
returns = "Box<T>"

[[host.signatures]]
owner = "Box"
name = "peek"
returns = "T"

[[host.signatures]]
owner = "Box"
name = "isEmpty"
returns = "boolean"
"#;

const CATALOG: &str = r#"
[meta]
name = "box"
imports = ["com.example.Box"]

[[rules]]
name = "BoxIsEmpty"
description = "Prefer Box#isEmpty over peeking"
type_params = ["T"]
holes = [{ name = "box", type = "Box<T>" }]
before = "box.peek() == null"
after = "box.isEmpty()"
"#;

const UNIT: &str = "import com.example.Box;\n\
                    import java.util.Optional;\n\
                    Box<String> box = Box.of(\"a\");\n\
                    boolean empty = box.peek() == null;\n\
                    Optional<String> opt = Optional.of(\"a\");\n\
                    boolean absent = !opt.isPresent();\n";

const EXPECTED: &str = "import com.example.Box;\n\
                        import java.util.Optional;\n\
                        Box<String> box = Box.of(\"a\");\n\
                        boolean empty = box.isEmpty();\n\
                        Optional<String> opt = Optional.of(\"a\");\n\
                        boolean absent = opt.isEmpty();\n";

/// Create a project with a config, a catalog and one unit
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("rules")).unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join(config::CONFIG_FILE), CONFIG).unwrap();
    fs::write(dir.path().join("rules/box.toml"), CATALOG).unwrap();
    fs::write(dir.path().join("src/Main.sketch"), UNIT).unwrap();
    dir
}

struct Project {
    host: SketchHost,
    driver: Driver,
}

fn open(root: &Path) -> Project {
    let config = config::load_from_path(root.join(config::CONFIG_FILE)).unwrap();
    let host = config.sketch_host().unwrap();

    let mut registry = RuleRegistry::new();
    for report in load_builtin().unwrap() {
        registry.extend(report.rules);
    }
    let project = load_from_path(root.join("rules/box.toml")).unwrap();
    assert!(project.is_clean(), "{:?}", project.errors);
    registry.extend(project.rules);

    let driver = Driver::new(&registry, config.driver_options());
    Project { host, driver }
}

fn edits_for(project: &Project, unit: &PathBuf) -> Vec<Edit> {
    let source = fs::read_to_string(unit).unwrap();
    let tree = project.host.load(unit, &source).unwrap();
    let outcome = project.driver.run(tree, &CancelToken::new()).unwrap();
    assert!(outcome.converged);
    outcome.edits
}

#[test]
fn test_full_workflow() {
    let dir = setup_project();
    let project = open(dir.path());
    assert_eq!(project.driver.options().max_iterations, 5);
    assert!(project.driver.registry().get("reactor.MonoThenReturn").is_none());
    assert!(project.driver.registry().get("box.BoxIsEmpty").is_some());

    let unit = dir.path().join("src/Main.sketch");
    let edits = edits_for(&project, &unit);
    let rules: Vec<&str> = edits.iter().map(|edit| edit.rule.as_str()).collect();
    assert_eq!(rules, vec!["box.BoxIsEmpty", "optional.OptionalIsEmpty"]);

    let results = Edit::apply_batch(edits).unwrap();
    assert_eq!(
        results,
        vec![EditResult::Applied {
            file: unit.clone(),
            edits: 2,
        }]
    );
    assert_eq!(fs::read_to_string(&unit).unwrap(), EXPECTED);

    // The rewritten unit is a fixed point
    assert!(edits_for(&project, &unit).is_empty());
}

#[test]
fn test_stale_edits_are_refused() {
    let dir = setup_project();
    let project = open(dir.path());
    let unit = dir.path().join("src/Main.sketch");
    let edits = edits_for(&project, &unit);

    // Someone else touches the unit before the edits land
    let touched = UNIT.replace("!opt.isPresent()", "!opt.isPresent() ");
    let touched = touched.replace("box.peek() == null", "box.peek() != null");
    fs::write(&unit, &touched).unwrap();

    let err = Edit::apply_batch(edits).unwrap_err();
    assert!(matches!(err, EditError::BeforeTextMismatch { .. }));
    assert_eq!(fs::read_to_string(&unit).unwrap(), touched);
}

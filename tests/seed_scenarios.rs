//! End-to-end rewrites of small units with the built-in catalogs.

use refit::rules::load_builtin;
use refit::{
    CancelToken, DiagnosticKind, Driver, DriverOptions, RuleRegistry, SketchHost, UnitOutcome,
};

fn registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    for report in load_builtin().unwrap() {
        assert!(report.is_clean(), "{:?}", report.errors);
        registry.extend(report.rules);
    }
    registry
}

fn run(source: &str) -> UnitOutcome {
    let tree = SketchHost::builtin()
        .unwrap()
        .load("Scenario.sketch", source)
        .unwrap();
    Driver::new(&registry(), DriverOptions::default())
        .run(tree, &CancelToken::new())
        .unwrap()
}

fn rewrite(source: &str) -> String {
    let outcome = run(source);
    assert!(outcome.converged);
    outcome.render(source).unwrap()
}

#[test]
fn null_guard_collapses_to_of_nullable() {
    let source = "import java.util.Optional;\n\
                  String x = \"a\";\n\
                  Optional<String> o = x == null ? Optional.empty() : Optional.of(x);\n";
    let outcome = run(source);
    assert_eq!(outcome.edits.len(), 1);
    assert_eq!(outcome.edits[0].rule, "optional.OptionalOfNullable");
    assert!(outcome.edits[0].imports.is_empty());
    assert_eq!(
        outcome.render(source).unwrap(),
        "import java.util.Optional;\n\
         String x = \"a\";\n\
         Optional<String> o = Optional.ofNullable(x);\n"
    );
}

#[test]
fn negated_presence_check_becomes_is_empty() {
    let source = "import java.util.Optional;\n\
                  Optional<String> opt = Optional.of(\"a\");\n\
                  boolean b = !opt.isPresent();\n";
    let rewritten = rewrite(source);
    assert_eq!(
        rewritten,
        "import java.util.Optional;\n\
         Optional<String> opt = Optional.of(\"a\");\n\
         boolean b = opt.isEmpty();\n"
    );
    assert!(run(&rewritten).is_unchanged());
}

#[test]
fn first_collection_element_uses_stream() {
    let source = "import java.util.Collection;\n\
                  import java.util.List;\n\
                  import java.util.Optional;\n\
                  Collection<String> coll = List.of(\"a\");\n\
                  List<String> list = List.of(\"b\");\n\
                  Optional<String> first = coll.isEmpty() ? Optional.empty() : Optional.of(coll.iterator().next());\n\
                  Optional<String> head = list.isEmpty() ? Optional.empty() : Optional.of(list.get(0));\n";
    let outcome = run(source);
    assert_eq!(outcome.edits.len(), 2);
    assert!(outcome
        .edits
        .iter()
        .all(|edit| edit.rule == "optional.OptionalFirstCollectionElement"));
    let rewritten = outcome.render(source).unwrap();
    assert!(rewritten.contains("Optional<String> first = coll.stream().findFirst();\n"));
    assert!(rewritten.contains("Optional<String> head = list.stream().findFirst();\n"));
}

#[test]
fn instant_comparison_and_its_negation() {
    let source = "import java.time.Instant;\n\
                  Instant a = Instant.now();\n\
                  Instant b = Instant.now();\n\
                  boolean before = a.compareTo(b) < 0;\n\
                  boolean notBefore = !(a.compareTo(b) < 0);\n\
                  boolean atOrAfter = a.compareTo(b) >= 0;\n";
    assert_eq!(
        rewrite(source),
        "import java.time.Instant;\n\
         Instant a = Instant.now();\n\
         Instant b = Instant.now();\n\
         boolean before = a.isBefore(b);\n\
         boolean notBefore = !a.isBefore(b);\n\
         boolean atOrAfter = !a.isBefore(b);\n"
    );
}

#[test]
fn epoch_alternatives_share_one_constant() {
    let source = "import java.time.Instant;\n\
                  Instant a = Instant.ofEpochMilli(0);\n\
                  Instant b = Instant.ofEpochSecond(0);\n\
                  Instant c = Instant.ofEpochSecond(0, 0);\n\
                  Instant d = Instant.ofEpochSecond(1);\n";
    let outcome = run(source);
    assert_eq!(outcome.edits.len(), 3);
    assert!(outcome.edits.iter().all(|edit| edit.rule == "time.EpochInstant"));
    assert_eq!(
        outcome.render(source).unwrap(),
        "import java.time.Instant;\n\
         Instant a = Instant.EPOCH;\n\
         Instant b = Instant.EPOCH;\n\
         Instant c = Instant.EPOCH;\n\
         Instant d = Instant.ofEpochSecond(1);\n"
    );
}

#[test]
fn placeholder_filter_renames_capture_to_lambda_parameter() {
    let source = "import java.util.Optional;\n\
                  int x = 1;\n\
                  Optional<Integer> o = x > 0 ? Optional.of(x) : Optional.empty();\n";
    let outcome = run(source);
    assert_eq!(outcome.edits.len(), 1);
    assert_eq!(
        outcome.edits[0].rule,
        "optional.TernaryOperatorOptionalPositiveFiltering"
    );
    assert_eq!(outcome.edits[0].new_text, "Optional.of(x).filter(v -> v > 0)");
    assert_eq!(
        outcome.render(source).unwrap(),
        "import java.util.Optional;\n\
         int x = 1;\n\
         // Or Optional.ofNullable (can't auto-infer).\n\
         Optional<Integer> o = Optional.of(x).filter(v -> v > 0);\n"
    );
}

#[test]
fn placeholder_over_effectively_final_variable_is_rewritten() {
    let source = "import java.util.Optional;\n\
                  import java.util.function.Predicate;\n\
                  Predicate<Integer> outer = v -> true;\n\
                  int x = 1;\n\
                  Optional<Integer> o = outer.test(x) ? Optional.of(x) : Optional.empty();\n";
    let outcome = run(source);
    assert_eq!(outcome.edits.len(), 1);
    assert_eq!(
        outcome.edits[0].new_text,
        "Optional.of(x).filter(v -> outer.test(v))"
    );
}

#[test]
fn placeholder_over_reassigned_variable_is_suspect() {
    let source = "import java.util.Optional;\n\
                  import java.util.function.Predicate;\n\
                  Predicate<Integer> outer = v -> true;\n\
                  outer = v -> false;\n\
                  int x = 1;\n\
                  Optional<Integer> o = outer.test(x) ? Optional.of(x) : Optional.empty();\n";
    let outcome = run(source);
    assert!(outcome.is_unchanged());
    let suspect: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::SuspectMatch)
        .collect();
    assert_eq!(suspect.len(), 1);
    assert_eq!(
        suspect[0].rule.as_deref(),
        Some("optional.TernaryOperatorOptionalPositiveFiltering")
    );
    assert!(suspect[0].message.contains("'outer'"));
}

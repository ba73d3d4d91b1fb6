//! Property tests: parser robustness, determinism and idempotence of rewriting.

use proptest::prelude::*;
use refit::rules::load_builtin;
use refit::syntax::{parse_expression, parse_unit};
use refit::ast::NodeKind;
use refit::{
    AstView, CancelToken, Driver, DriverOptions, RuleRegistry, SketchHost, SyntaxTree, Type,
    UnitOutcome,
};
use std::collections::BTreeMap;

fn registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    for report in load_builtin().unwrap() {
        registry.extend(report.rules);
    }
    registry
}

fn run(registry: &RuleRegistry, source: &str) -> UnitOutcome {
    let tree = SketchHost::builtin()
        .unwrap()
        .load("Prop.sketch", source)
        .unwrap();
    Driver::new(registry, DriverOptions::default())
        .run(tree, &CancelToken::new())
        .unwrap()
}

#[derive(Debug, Clone, Copy)]
enum Check {
    NotPresent,
    NotEmpty,
    Present,
    Empty,
    /// A null-guarded ternary, rewritten into `Optional.ofNullable`.
    Nullable,
    /// The ternary under a negated presence check: two rules in sequence.
    NullableNotPresent,
    /// The ternary as the receiver of a check no rule touches.
    NullablePresent,
}

const TERNARY: &str = "{s} == null ? Optional.empty() : Optional.of({s})";

impl Check {
    fn declared(self) -> &'static str {
        match self {
            Check::Nullable => "Optional<String>",
            _ => "boolean",
        }
    }

    fn source(self, idx: usize) -> String {
        let (o, s) = (format!("o{idx}"), format!("s{idx}"));
        let ternary = TERNARY.replace("{s}", &s);
        match self {
            Check::NotPresent => format!("!{o}.isPresent()"),
            Check::NotEmpty => format!("!{o}.isEmpty()"),
            Check::Present => format!("{o}.isPresent()"),
            Check::Empty => format!("{o}.isEmpty()"),
            Check::Nullable => ternary,
            Check::NullableNotPresent => format!("!({ternary}).isPresent()"),
            Check::NullablePresent => format!("({ternary}).isPresent()"),
        }
    }

    fn rewritten(self, idx: usize, parens: usize) -> String {
        let (o, s) = (format!("o{idx}"), format!("s{idx}"));
        match self {
            Check::NotPresent => format!("{o}.isEmpty()"),
            Check::NotEmpty => format!("{o}.isPresent()"),
            Check::Present | Check::Empty => wrap(&self.source(idx), parens),
            Check::Nullable => format!("Optional.ofNullable({s})"),
            Check::NullableNotPresent => format!("Optional.ofNullable({s}).isEmpty()"),
            Check::NullablePresent => {
                wrap(&format!("Optional.ofNullable({s}).isPresent()"), parens)
            }
        }
    }
}

fn wrap(expr: &str, parens: usize) -> String {
    format!("{}{}{}", "(".repeat(parens), expr, ")".repeat(parens))
}

fn check() -> impl Strategy<Value = Check> {
    prop_oneof![
        Just(Check::NotPresent),
        Just(Check::NotEmpty),
        Just(Check::Present),
        Just(Check::Empty),
        Just(Check::Nullable),
        Just(Check::NullableNotPresent),
        Just(Check::NullablePresent),
    ]
}

/// A unit with `vars` optionals and strings and one declaration per generated
/// check.
fn unit(vars: usize, checks: &[(usize, Check, usize)]) -> (String, String) {
    let mut source = String::from("import java.util.Optional;\n");
    for idx in 0..vars {
        source.push_str(&format!("Optional<String> o{idx} = Optional.of(\"v\");\n"));
        source.push_str(&format!("String s{idx} = \"v\";\n"));
    }
    let mut expected = source.clone();
    for (n, (var, check, parens)) in checks.iter().enumerate() {
        let idx = var % vars;
        let declared = check.declared();
        source.push_str(&format!(
            "{declared} c{n} = {};\n",
            wrap(&check.source(idx), *parens)
        ));
        expected.push_str(&format!(
            "{declared} c{n} = {};\n",
            check.rewritten(idx, *parens)
        ));
    }
    (source, expected)
}

/// Declared and initializer types of every top-level declaration, by name.
fn initializers(tree: &SyntaxTree) -> BTreeMap<String, (Type, Option<Type>)> {
    tree.children(tree.root())
        .iter()
        .filter_map(|&decl| match tree.kind(decl) {
            NodeKind::LocalDecl { name, ty } => {
                let init = tree.children(decl).first()?;
                Some((name.clone(), (ty.clone(), tree.type_of(*init).cloned())))
            }
            _ => None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Arbitrary ASCII must never panic the parser.
    #[test]
    fn parser_handles_random_input(input in "[ -~\n]{0,120}") {
        let _ = parse_unit(&input);
        let _ = parse_expression(&input);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Redundant parentheses around a rewritten site disappear; others stay.
    #[test]
    fn rewrites_normalise_parentheses(
        vars in 1usize..4,
        checks in prop::collection::vec((0usize..4, check(), 0usize..4), 1..6),
    ) {
        let registry = registry();
        let (source, expected) = unit(vars, &checks);
        let outcome = run(&registry, &source);
        prop_assert!(outcome.converged);
        prop_assert_eq!(outcome.render(&source).unwrap(), expected);
    }

    /// The same input always yields the same edits, and rewritten output is a
    /// fixed point.
    #[test]
    fn rewriting_is_deterministic_and_idempotent(
        vars in 1usize..4,
        checks in prop::collection::vec((0usize..4, check(), 0usize..3), 1..6),
    ) {
        let registry = registry();
        let (source, _) = unit(vars, &checks);
        let first = run(&registry, &source);
        let second = run(&registry, &source);
        prop_assert_eq!(&first.edits, &second.edits);

        let rendered = first.render(&source).unwrap();
        let again = run(&registry, &rendered);
        prop_assert!(again.is_unchanged(), "{:?}", again.edits);
        prop_assert!(again.diagnostics.is_empty(), "{:?}", again.diagnostics);
    }

    /// Every rewritten initializer is typed, and its type still fits both the
    /// declaration and the expression it replaced.
    #[test]
    fn rewritten_sites_keep_their_types(
        vars in 1usize..4,
        checks in prop::collection::vec((0usize..4, check(), 0usize..3), 1..6),
    ) {
        let registry = registry();
        let (source, _) = unit(vars, &checks);
        let rendered = run(&registry, &source).render(&source).unwrap();
        let host = SketchHost::builtin().unwrap();
        let before = initializers(&host.load("Prop.sketch", &source).unwrap());
        let after_tree = host.load("Prop.sketch", &rendered).unwrap();
        let h = after_tree.hierarchy();
        let after = initializers(&after_tree);
        prop_assert_eq!(before.len(), after.len());
        for (name, (declared, original)) in &before {
            let (_, rewritten) = &after[name];
            let Some(rewritten) = rewritten else {
                prop_assert!(original.is_none(), "{} lost its type", name);
                continue;
            };
            prop_assert!(h.is_subtype(rewritten, declared), "{}: {} vs {}", name, rewritten, declared);
            if let Some(original) = original {
                prop_assert!(h.is_subtype(rewritten, original), "{}: {} vs {}", name, rewritten, original);
            }
        }
    }
}

#[test]
fn chained_rewrites_reach_the_fixed_point_in_one_run() {
    let registry = registry();
    let source = "import java.util.Optional;\n\
                  String x = \"v\";\n\
                  boolean b = !(x == null ? Optional.empty() : Optional.of(x)).isPresent();\n";
    let outcome = run(&registry, source);
    assert!(outcome.converged);
    assert_eq!(outcome.passes, 3);
    let rendered = outcome.render(source).unwrap();
    assert_eq!(
        rendered,
        source.replace(
            "!(x == null ? Optional.empty() : Optional.of(x)).isPresent()",
            "Optional.ofNullable(x).isEmpty()"
        )
    );
    assert!(run(&registry, &rendered).is_unchanged());
}

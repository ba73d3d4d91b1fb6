use crate::ast::KindTag;
use crate::rules::filter::RuleFilter;
use crate::template::Rule;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable-after-construction rule collection, shared across units.
///
/// Iteration follows registration order. Each rule is also indexed by the
/// outermost node kinds its before-templates can match; rules whose
/// before-template is a bare hole or placeholder are candidates everywhere.
#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    rules: Vec<Arc<Rule>>,
    by_name: BTreeMap<String, usize>,
    by_kind: BTreeMap<KindTag, Vec<usize>>,
    wildcard: Vec<usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `rule`. A rule whose name is already registered is replaced
    /// in place and keeps its original position.
    pub fn register(&mut self, rule: Rule) {
        if let Some(&idx) = self.by_name.get(&rule.name) {
            tracing::debug!(rule = %rule.name, "replacing registered rule");
            self.rules[idx] = Arc::new(rule);
            self.reindex();
            return;
        }
        let idx = self.rules.len();
        self.by_name.insert(rule.name.clone(), idx);
        self.index(idx, &rule);
        self.rules.push(Arc::new(rule));
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = Rule>) {
        for rule in rules {
            self.register(rule);
        }
    }

    fn index(&mut self, idx: usize, rule: &Rule) {
        match rule.root_tags() {
            Some(tags) => {
                for tag in tags {
                    self.by_kind.entry(tag).or_default().push(idx);
                }
            }
            None => self.wildcard.push(idx),
        }
    }

    fn reindex(&mut self) {
        self.by_kind.clear();
        self.wildcard.clear();
        let rules = self.rules.clone();
        for (idx, rule) in rules.iter().enumerate() {
            self.index(idx, rule);
        }
    }

    /// A registry holding only the rules `filter` allows, order preserved.
    pub fn filtered(&self, filter: &RuleFilter) -> RuleRegistry {
        let mut registry = RuleRegistry::new();
        for rule in self.rules.iter().filter(|rule| filter.allows(&rule.name)) {
            let idx = registry.rules.len();
            registry.by_name.insert(rule.name.clone(), idx);
            registry.index(idx, rule);
            registry.rules.push(Arc::clone(rule));
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.by_name.get(name).map(|&idx| self.rules[idx].as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose before-templates may match a node of kind `tag`, in
    /// registration order.
    pub fn rules_applicable_to(&self, tag: KindTag) -> Vec<&Rule> {
        let mut indices: Vec<usize> = self
            .by_kind
            .get(&tag)
            .map(|indices| indices.to_vec())
            .unwrap_or_default();
        indices.extend(self.wildcard.iter().copied());
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|idx| self.rules[idx].as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::loader::load_from_str;
    use crate::rules::RulePattern;

    fn registry() -> RuleRegistry {
        let report = load_from_str(
            r#"
[meta]
name = "optional"
imports = ["java.util.Optional"]

[[rules]]
name = "OptionalIsEmpty"
type_params = ["T"]
holes = [{ name = "optional", type = "Optional<T>" }]
before = "!optional.isPresent()"
after = "optional.isEmpty()"

[[rules]]
name = "OptionalOfNullable"
type_params = ["T"]
returns = "Optional<T>"
holes = [{ name = "object", type = "T" }]
before = "object == null ? Optional.empty() : Optional.of(object)"
after = "Optional.ofNullable(object)"

[[rules]]
name = "OptionalIsPresent"
type_params = ["T"]
holes = [{ name = "optional", type = "Optional<T>" }]
before = "!optional.isEmpty()"
after = "optional.isPresent()"
"#,
        )
        .unwrap();
        let mut registry = RuleRegistry::new();
        registry.extend(report.rules);
        registry
    }

    #[test]
    fn prefilter_by_outermost_kind() {
        let registry = registry();
        let unary: Vec<_> = registry
            .rules_applicable_to(KindTag::Unary)
            .into_iter()
            .map(|rule| rule.name.as_str())
            .collect();
        assert_eq!(
            unary,
            vec!["optional.OptionalIsEmpty", "optional.OptionalIsPresent"]
        );
        assert_eq!(registry.rules_applicable_to(KindTag::Conditional).len(), 1);
        assert!(registry.rules_applicable_to(KindTag::Literal).is_empty());
    }

    #[test]
    fn filtered_keeps_order() {
        let registry = registry();
        let filter = RuleFilter::new(
            Vec::new(),
            vec![RulePattern::new("optional.OptionalOfNullable")],
        );
        let filtered = registry.filtered(&filter);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.get("optional.OptionalOfNullable").is_none());
        assert_eq!(
            filtered.iter().map(|rule| rule.short_name()).collect::<Vec<_>>(),
            vec!["OptionalIsEmpty", "OptionalIsPresent"]
        );
    }

    #[test]
    fn registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleRegistry>();
    }
}

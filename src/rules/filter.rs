//! Include/exclude selection of rules by name.

use serde::Deserialize;

/// A rule name pattern: `catalog.Rule`, a bare catalog name, or a prefix
/// ending in `*`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct RulePattern(String);

impl RulePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, rule: &str) -> bool {
        let pattern = self.0.as_str();
        if let Some(prefix) = pattern.strip_suffix('*') {
            return rule.starts_with(prefix);
        }
        if rule == pattern {
            return true;
        }
        // A bare catalog name selects every rule in it.
        !pattern.contains('.')
            && rule
                .split_once('.')
                .is_some_and(|(catalog, _)| catalog == pattern)
    }
}

impl From<String> for RulePattern {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Empty `include` admits every rule; `exclude` always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub include: Vec<RulePattern>,
    pub exclude: Vec<RulePattern>,
}

impl RuleFilter {
    pub fn new(include: Vec<RulePattern>, exclude: Vec<RulePattern>) -> Self {
        Self { include, exclude }
    }

    pub fn allows(&self, rule: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|pattern| pattern.matches(rule));
        included && !self.exclude.iter().any(|pattern| pattern.matches(rule))
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(items: &[&str]) -> Vec<RulePattern> {
        items.iter().map(|item| RulePattern::new(*item)).collect()
    }

    #[test]
    fn pattern_forms() {
        assert!(RulePattern::new("time.EpochInstant").matches("time.EpochInstant"));
        assert!(RulePattern::new("time").matches("time.EpochInstant"));
        assert!(!RulePattern::new("tim").matches("time.EpochInstant"));
        assert!(RulePattern::new("time.Instant*").matches("time.InstantIsBefore"));
        assert!(!RulePattern::new("time.Instant*").matches("time.EpochInstant"));
    }

    #[test]
    fn exclude_beats_include() {
        let filter = RuleFilter::new(patterns(&["time"]), patterns(&["time.EpochInstant"]));
        assert!(filter.allows("time.InstantIsBefore"));
        assert!(!filter.allows("time.EpochInstant"));
        assert!(!filter.allows("optional.OptionalIsEmpty"));
        assert!(RuleFilter::default().allows("anything.At.All"));
    }
}

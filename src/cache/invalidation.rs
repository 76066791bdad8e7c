//! Invalidation Module
//!
//! Wildcard pattern matching and the `{source -> targets}` rule tables used
//! for dependency tracking and predictive warming.

/// Trailing marker that turns a pattern into a prefix match.
pub const WILDCARD: char = '*';

// == Matches ==
/// Returns true when `value` matches `pattern`.
///
/// A pattern ending in `*` matches any value starting with the literal part
/// before the marker; any other pattern requires exact equality. This is a
/// plain prefix test: `company:*` does not match `deals:company:42`.
pub fn matches(value: &str, pattern: &str) -> bool {
    match pattern.strip_suffix(WILDCARD) {
        Some(prefix) => value.starts_with(prefix),
        None => value == pattern,
    }
}

// == Rule ==
/// When a pattern matching `source` changes, every pattern in `targets` is
/// affected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub source: String,
    pub targets: Vec<String>,
}

impl Rule {
    pub fn new(source: &str, targets: &[&str]) -> Self {
        Self {
            source: source.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }
    }
}

// == Rule Table ==
/// Ordered list of rules, loaded once and consulted per write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Default dependency table for the CRM entities.
    pub fn default_dependencies() -> Self {
        Self::new(vec![
            Rule::new(
                "deals:*",
                &["company:*", "clients:deal:*", "payments:*", "mrr:*"],
            ),
            Rule::new("company:*", &["deals:company:*", "contacts:company:*"]),
            Rule::new("contacts:*", &["company:*"]),
            Rule::new("payments:*", &["mrr:*"]),
            Rule::new("clients:*", &["deals:*"]),
            Rule::new("user:*", &["*"]),
        ])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    // == Targets For ==
    /// Union of the targets of every rule whose source matches `pattern`,
    /// in first-seen order without duplicates.
    pub fn targets_for(&self, pattern: &str) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for rule in self.rules.iter().filter(|r| matches(pattern, &r.source)) {
            for target in &rule.targets {
                if !targets.contains(target) {
                    targets.push(target.clone());
                }
            }
        }
        targets
    }
}

// == Invalidation Report ==
/// What an invalidation actually removed, tier by tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct InvalidationReport {
    /// Patterns that were applied
    pub patterns: Vec<String>,
    /// Entries removed from the fast tier
    pub memory_removed: usize,
    /// Entries removed from the persistent backends
    pub persistent_removed: usize,
    /// Backend failures encountered; other tiers still ran
    pub failures: Vec<String>,
}

impl InvalidationReport {
    pub fn total(&self) -> usize {
        self.memory_removed + self.persistent_removed
    }

    pub fn merge(&mut self, other: InvalidationReport) {
        self.patterns.extend(other.patterns);
        self.memory_removed += other.memory_removed;
        self.persistent_removed += other.persistent_removed;
        self.failures.extend(other.failures);
    }
}

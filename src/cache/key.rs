//! Cache Key Module
//!
//! Derives the canonical cache key and the coarser query pattern from a
//! request descriptor (query type plus parameters).

use std::collections::HashMap;

use serde_json::Value;

/// Request parameters as supplied by the caller, in any order.
pub type QueryParams = HashMap<String, Value>;

/// Separator between the query type and each `name:value` pair.
pub const KEY_SEPARATOR: char = '|';

const NAME_SEPARATOR: char = ':';
const ESCAPE: char = '\\';

// == Pattern Rule ==
/// One row of the pattern table.
///
/// A rule applies when the query type equals `query_prefix` or starts with
/// `query_prefix:`, and, if `scope_param` is set, that parameter is present
/// and non-null. `{id}` in the template is replaced by the scope value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRule {
    pub query_prefix: String,
    pub scope_param: Option<String>,
    pub template: String,
}

impl PatternRule {
    pub fn new(query_prefix: &str, scope_param: Option<&str>, template: &str) -> Self {
        Self {
            query_prefix: query_prefix.to_string(),
            scope_param: scope_param.map(str::to_string),
            template: template.to_string(),
        }
    }

    fn applies_to(&self, query_type: &str) -> bool {
        match query_type.strip_prefix(self.query_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(':'),
            None => false,
        }
    }

    fn render(&self, query_type: &str, params: &QueryParams) -> Option<String> {
        if !self.applies_to(query_type) {
            return None;
        }
        match &self.scope_param {
            None => Some(self.template.clone()),
            Some(name) => match params.get(name) {
                None | Some(Value::Null) => None,
                Some(value) => Some(self.template.replace("{id}", &render_scalar(value))),
            },
        }
    }
}

/// Default pattern table, most specific rules first.
pub fn default_pattern_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new("deals", Some("companyId"), "deals:company:{id}"),
        PatternRule::new("deals", Some("dealId"), "deals:{id}"),
        PatternRule::new("deals", None, "deals:*"),
        PatternRule::new("company", Some("companyId"), "company:{id}"),
        PatternRule::new("company", None, "company:*"),
        PatternRule::new("contacts", Some("companyId"), "contacts:company:{id}"),
        PatternRule::new("contacts", None, "contacts:*"),
        PatternRule::new("clients", Some("dealId"), "clients:deal:{id}"),
        PatternRule::new("clients", None, "clients:*"),
        PatternRule::new("payments", Some("dealId"), "payments:deal:{id}"),
        PatternRule::new("payments", None, "payments:*"),
        PatternRule::new("mrr", None, "mrr:*"),
        PatternRule::new("user", Some("userId"), "user:{id}"),
    ]
}

// == Cache Key Engine ==
/// Builds cache keys and query patterns.
#[derive(Debug, Clone)]
pub struct CacheKeyEngine {
    rules: Vec<PatternRule>,
}

impl Default for CacheKeyEngine {
    fn default() -> Self {
        Self::new(default_pattern_rules())
    }
}

impl CacheKeyEngine {
    /// Creates an engine over an explicit pattern table.
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    // == Build Key ==
    /// Renders `query_type|name:value|...` with parameter names sorted.
    ///
    /// Values are rendered as compact JSON so that `"1"` and `1` differ.
    /// Separators inside the query type or a name are backslash-escaped, so
    /// distinct requests never share a key.
    pub fn build_key(&self, query_type: &str, params: &QueryParams) -> String {
        let mut names: Vec<&String> = params.keys().collect();
        names.sort();

        let mut key = String::with_capacity(query_type.len());
        push_escaped(&mut key, query_type, &[KEY_SEPARATOR]);
        for name in names {
            key.push(KEY_SEPARATOR);
            push_escaped(&mut key, name, &[KEY_SEPARATOR, NAME_SEPARATOR]);
            key.push(NAME_SEPARATOR);
            key.push_str(&params[name].to_string());
        }
        key
    }

    // == Derive Pattern ==
    /// Maps a request to its query pattern; first matching rule wins and the
    /// raw query type is the fallback.
    pub fn derive_pattern(&self, query_type: &str, params: &QueryParams) -> String {
        self.rules
            .iter()
            .find_map(|rule| rule.render(query_type, params))
            .unwrap_or_else(|| query_type.to_string())
    }
}

fn push_escaped(key: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if c == ESCAPE || special.contains(&c) {
            key.push(ESCAPE);
        }
        key.push(c);
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

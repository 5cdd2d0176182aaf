//! Parameter-id resolution: short names and `table.param` tokens resolve
//! against per-rule matcher-gated alias tables, falling back to a merged
//! default table built from every rule's values.
//!
//! Grounded in the original's `TypeParam`/`Rule`/internal `Matcher`: a rule
//! applies when every one of its matchers holds against the request (a
//! matcher checks only the *first* value of its own keyword, and is
//! satisfied vacuously when that keyword is absent); within the winning
//! rule a token resolves via its alias table, falling back to the global
//! default table merged from every rule (first-definition-wins, with a
//! logged, discarded redefinition on conflict).

use std::collections::{HashMap, HashSet};

use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::{as_scalar_string, as_string_list, Value};

struct Matcher {
    key: String,
    values: HashSet<String>,
}

impl Matcher {
    /// Checks only the request's *first* value for `key`. When `key` is
    /// absent, `partial` decides the outcome: `false` (strict, used for
    /// primary rule selection) means absence never matches; `true` (used by
    /// the `first_rule` fallback scan) means absence vacuously matches.
    fn is_match(&self, request: &Request, partial: bool) -> bool {
        match request.values(&self.key, true) {
            Ok([]) => partial,
            Ok(vals) => self.values.contains(&vals[0]),
            Err(_) => partial,
        }
    }
}

fn parse_matchers(value: &Value) -> Vec<Matcher> {
    let Value::Object(map) = value else {
        return Vec::new();
    };
    map.iter()
        .map(|(k, v)| Matcher {
            key: k.clone(),
            values: as_string_list(v).into_iter().collect(),
        })
        .collect()
}

struct Rule {
    matchers: Vec<Matcher>,
    values: HashSet<String>,
    mapping: HashMap<String, String>,
}

impl Rule {
    fn build(matchers: Vec<Matcher>, entries: &[Value], keyword: &str) -> Self {
        let mut values = HashSet::new();
        let mut mapping = HashMap::new();

        for entry in entries {
            let names = as_string_list(entry);
            let Some(canonical) = names.last() else {
                continue;
            };
            values.insert(canonical.clone());
            for alias in &names {
                let key = alias.to_ascii_lowercase();
                match mapping.get(&key) {
                    Some(existing) if existing != canonical => {
                        tracing::warn!(
                            keyword,
                            alias = %key,
                            kept = %existing,
                            discarded = %canonical,
                            "redefined param alias, keeping first definition"
                        );
                    }
                    Some(_) => {}
                    None => {
                        mapping.insert(key, canonical.clone());
                    }
                }
            }
        }

        Rule {
            matchers,
            values,
            mapping,
        }
    }

    /// `partial=false` (strict) requires every matcher's key to be present
    /// in `request`; `partial=true` treats an absent key as matching, used
    /// only by the `first_rule` fallback scan.
    fn matches(&self, request: &Request, partial: bool) -> bool {
        self.matchers.iter().all(|m| m.is_match(request, partial))
    }
}

/// `table.param` or bare `param` numeric form: table `128` folds to `0`,
/// resulting canonical id is `table*1000 + param`.
fn numeric_id(token: &str) -> Option<i64> {
    if !token.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let dots = token.chars().filter(|&c| c == '.').count();
    if dots > 1 {
        return None;
    }

    let (table, param) = match token.split_once('.') {
        Some((t, p)) => (t.parse::<i64>().ok()?, p.parse::<i64>().ok()?),
        None => (0, token.parse::<i64>().ok()?),
    };
    let table = if table == 128 { 0 } else { table };
    Some(table * 1000 + param)
}

/// Resolve `token` against `mapping`/`values`, falling back to
/// `default_mapping`/`default_values`. Numeric tokens are checked directly
/// against the id sets and never fall back to alias lookup.
fn resolve(
    token: &str,
    mapping: &HashMap<String, String>,
    values: &HashSet<String>,
    default_mapping: &HashMap<String, String>,
    default_values: &HashSet<String>,
) -> Option<String> {
    if let Some(id) = numeric_id(token) {
        let id = id.to_string();
        return if values.contains(&id) || default_values.contains(&id) {
            Some(id)
        } else {
            None
        };
    }

    let key = token.to_ascii_lowercase();
    mapping
        .get(&key)
        .or_else(|| default_mapping.get(&key))
        .cloned()
}

/// Resolves `param` tokens to canonical parameter ids.
pub struct TypeParam {
    base: TypeBase,
    rules: Vec<Rule>,
    default_mapping: HashMap<String, String>,
    default_values: HashSet<String>,
    allow_all: bool,
    /// `first_rule`: when no rule strictly matches, rescan every rule under
    /// a partial-match policy (absent matcher keys count as matching) and
    /// take the first whose lookup succeeds for at least one token.
    first_rule: bool,
    /// `expand_with`: fallback key/value pairs merged into a cloned trial
    /// request (only for keys not already present) for one more strict
    /// rule-matching attempt, tried only when `first_rule` is unset.
    expand_with: Vec<(String, String)>,
}

impl TypeParam {
    pub fn new(name: &str, settings: &Value) -> Self {
        let base = TypeBase::new(name, settings);
        let allow_all = settings
            .get("allow_all")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let first_rule = settings
            .get("first_rule")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut expand_with = Vec::new();
        if let Some(Value::Object(map)) = settings.get("expand_with") {
            for (k, v) in map {
                if let Some(s) = as_scalar_string(v) {
                    expand_with.push((k.clone(), s));
                }
            }
        }

        let mut rules = Vec::new();
        let mut default_mapping: HashMap<String, String> = HashMap::new();
        let mut default_values: HashSet<String> = HashSet::new();

        if let Some(Value::Array(rule_defs)) = settings.get("rules") {
            for rd in rule_defs {
                let matchers = rd
                    .get("matchers")
                    .map(parse_matchers)
                    .unwrap_or_default();
                let entries: Vec<Value> = rd
                    .get("values")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let rule = Rule::build(matchers, &entries, name);

                for v in &rule.values {
                    default_values.insert(v.clone());
                }
                for (k, v) in &rule.mapping {
                    default_mapping.entry(k.clone()).or_insert_with(|| v.clone());
                }
                rules.push(rule);
            }
        }

        TypeParam {
            base,
            rules,
            default_mapping,
            default_values,
            allow_all,
            first_rule,
            expand_with,
        }
    }

    fn resolve_default(&self, token: &str) -> Option<String> {
        resolve(
            token,
            &HashMap::new(),
            &HashSet::new(),
            &self.default_mapping,
            &self.default_values,
        )
    }

    /// Select the rule to resolve every token against: the first strict
    /// match, else (depending on configuration) the `first_rule` rescan or
    /// the `expand_with` trial-context rematch, else a hard failure.
    fn select_rule(&self, request: &Request, values: &[String]) -> Result<&Rule, MarsError> {
        if let Some(r) = self.rules.iter().find(|r| r.matches(request, false)) {
            return Ok(r);
        }

        tracing::warn!(
            keyword = self.name(),
            %request,
            "cannot find a context to expand 'param' in this request"
        );

        if self.first_rule {
            for r in &self.rules {
                if !r.matches(request, true) {
                    continue;
                }
                let any_resolves = values.iter().any(|token| {
                    resolve(token, &r.mapping, &r.values, &self.default_mapping, &self.default_values).is_some()
                });
                if any_resolves {
                    tracing::warn!(keyword = self.name(), "using 'first matching rule' option");
                    return Ok(r);
                }
            }
        } else if !self.expand_with.is_empty() {
            let mut trial = request.clone();
            for (k, v) in &self.expand_with {
                if !trial.has(k) {
                    trial.set_value(k, v.clone());
                }
            }
            if let Some(r) = self.rules.iter().find(|r| r.matches(&trial, false)) {
                tracing::warn!(keyword = self.name(), "using 'expand with' option");
                return Ok(r);
            }
        }

        Err(MarsError::ResolverFailure {
            token: values.join("/"),
            reason: "cannot find a context to expand 'param' in this request".to_string(),
        })
    }
}

impl Type for TypeParam {
    fn base(&self) -> &TypeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TypeBase {
        &mut self.base
    }

    fn expand_value(
        &self,
        _ctx: &ExpandContext,
        value: &mut String,
        _request: &Request,
    ) -> Result<bool, MarsError> {
        if value == "all" {
            return Ok(true);
        }
        match self.resolve_default(value) {
            Some(v) => {
                *value = v;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Cross-keyword rewrite: select the rule to resolve against (the first
    /// strict match, else the `first_rule`/`expand_with` fallback, else a
    /// hard error) and resolve every token against it, rewriting the
    /// request's `param` values to canonical ids.
    fn pass2(&self, _ctx: &ExpandContext, request: &mut Request) -> Result<(), MarsError> {
        let values = request.values(self.name(), true)?.to_vec();
        if values.is_empty() {
            return Ok(());
        }
        if values.len() == 1 && values[0] == "all" {
            return if self.allow_all {
                Ok(())
            } else {
                Err(MarsError::ResolverFailure {
                    token: "all".to_string(),
                    reason: "'all' is not permitted for this keyword".to_string(),
                })
            };
        }

        let rule = self.select_rule(request, &values)?;

        let mut resolved = Vec::with_capacity(values.len());
        for token in &values {
            match resolve(token, &rule.mapping, &rule.values, &self.default_mapping, &self.default_values) {
                Some(v) => resolved.push(v),
                None => {
                    return Err(MarsError::ResolverFailure {
                        token: token.clone(),
                        reason: "no rule matches this parameter".to_string(),
                    })
                }
            }
        }

        request.set_values(self.name(), resolved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    fn rules_settings() -> Value {
        serde_json::json!({
            "rules": [
                {
                    "matchers": { "stream": ["oper", "scda"] },
                    "values": [["2t", "167"], ["msl", "151"]]
                },
                {
                    "matchers": {},
                    "values": [["2t", "167"], ["10u", "165"]]
                }
            ]
        })
    }

    #[test]
    fn all_is_passed_through_when_allowed() {
        let t = TypeParam::new("param", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "all".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "all");
    }

    #[test]
    fn all_is_rejected_when_disallowed() {
        let settings = serde_json::json!({ "allow_all": false });
        let t = TypeParam::new("param", &settings);
        let mut req = Request::new("retrieve");
        req.set_values("param", vec!["all".to_string()]);
        assert!(t.pass2(&ctx(), &mut req).is_err());
    }

    #[test]
    fn no_matching_rule_without_fallback_modes_is_an_error() {
        let settings = serde_json::json!({
            "rules": [
                { "matchers": { "stream": ["enfo"] }, "values": [["mucin", "228236"]] }
            ]
        });
        let t = TypeParam::new("param", &settings);
        let mut req = Request::new("retrieve");
        req.set_values("param", vec!["mucin".to_string()]);
        assert!(t.pass2(&ctx(), &mut req).is_err());
    }

    #[test]
    fn first_rule_rescans_under_a_partial_match_when_nothing_strictly_matches() {
        let settings = serde_json::json!({
            "first_rule": true,
            "rules": [
                { "matchers": { "stream": ["enfo"] }, "values": [["mucin", "228236"]] }
            ]
        });
        let t = TypeParam::new("param", &settings);
        let mut req = Request::new("retrieve");
        req.set_values("param", vec!["mucin".to_string()]);
        t.pass2(&ctx(), &mut req).unwrap();
        assert_eq!(req.values("param", false).unwrap(), &["228236"]);
    }

    #[test]
    fn expand_with_merges_fallback_context_and_rematches_strictly() {
        let settings = serde_json::json!({
            "expand_with": { "stream": "enfo" },
            "rules": [
                { "matchers": { "stream": ["enfo"] }, "values": [["mucin", "228236"]] }
            ]
        });
        let t = TypeParam::new("param", &settings);
        let mut req = Request::new("retrieve");
        req.set_values("param", vec!["mucin".to_string()]);
        t.pass2(&ctx(), &mut req).unwrap();
        assert_eq!(req.values("param", false).unwrap(), &["228236"]);
        // the trial merge must not leak into the caller's request
        assert!(!req.has("stream"));
    }

    #[test]
    fn alias_resolves_via_matching_rule() {
        let t = TypeParam::new("param", &rules_settings());
        let mut req = Request::new("retrieve");
        req.set_value("stream", "oper");
        req.set_values("param", vec!["2t".to_string(), "msl".to_string()]);
        t.pass2(&ctx(), &mut req).unwrap();
        assert_eq!(req.values("param", false).unwrap(), &["167", "151"]);
    }

    #[test]
    fn numeric_table_dot_param_folds_table_128() {
        let t = TypeParam::new("param", &rules_settings());
        let mut req = Request::new("retrieve");
        req.set_values("param", vec!["128.167".to_string()]);
        t.pass2(&ctx(), &mut req).unwrap();
        assert_eq!(req.values("param", false).unwrap(), &["167"]);
    }

    #[test]
    fn unresolvable_token_is_an_error() {
        let t = TypeParam::new("param", &rules_settings());
        let mut req = Request::new("retrieve");
        req.set_values("param", vec!["bogus".to_string()]);
        assert!(t.pass2(&ctx(), &mut req).is_err());
    }
}

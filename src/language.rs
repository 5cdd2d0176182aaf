//! The per-verb keyword driver: prefix-matches request keywords against the
//! verb's grammar, then runs the two-pass expansion pipeline.
//!
//! Grounded in `MarsLanguage::expand`/`bestMatch`: (1) prefix-match every
//! request keyword against the verb's known keywords, rejecting unknown or
//! ambiguous ones; (2) run each keyword's `expand_range` over its values;
//! (3) push configured defaults for keywords absent from the request; (4)
//! run every keyword's `pass2` (only `param` does real work here); (5) run
//! `finalise` (the `only`/`never`/`unset` constraint pass); (6) run the
//! soft `check` diagnostic pass.

use std::collections::HashMap;

use crate::error::MarsError;
use crate::grammar::{Grammar, VerbDef};
use crate::request::Request;
use crate::types::{self, ExpandContext, Type};
use crate::value::{as_string_list, Value};

/// The resolved keyword set and `Type` objects for one verb.
pub struct Language {
    verb: String,
    order: Vec<String>,
    types: HashMap<String, Box<dyn Type>>,
    /// Lower-cased keyword alias → canonical keyword, merged from every
    /// keyword's own `aliases` setting.
    aliases: HashMap<String, String>,
}

/// Merge `_options[keyword]`'s override map over `settings`, the way the
/// original patches each matching top-level key into the keyword's settings
/// before building its `Type`.
fn apply_options(settings: &Value, overrides: Option<&Value>) -> Value {
    let Some(Value::Object(over)) = overrides else {
        return settings.clone();
    };
    let mut merged = settings.clone();
    if let Value::Object(map) = &mut merged {
        for (k, v) in over {
            map.insert(k.clone(), v.clone());
        }
    }
    merged
}

impl Language {
    pub fn new(grammar: &Grammar, verb: &str) -> Result<Self, MarsError> {
        let canonical = verb.to_ascii_lowercase();
        let def: &VerbDef = grammar.verbs.get(&canonical).ok_or_else(|| MarsError::UnknownVerb {
            verb: verb.to_string(),
            known: grammar.verbs.keys().cloned().collect(),
        })?;

        let mut types = HashMap::with_capacity(def.order.len());
        let mut aliases = HashMap::new();
        for keyword in &def.order {
            let settings = apply_options(&def.settings[keyword], def.options.get(keyword));

            if let Some(list) = settings.get("aliases") {
                for alias in as_string_list(list) {
                    aliases.insert(alias.to_ascii_lowercase(), keyword.clone());
                }
            }

            types.insert(keyword.clone(), types::build(keyword, &settings)?);
        }

        for keyword in &def.clear_defaults {
            if let Some(t) = types.get_mut(keyword) {
                t.clear_defaults();
            }
        }

        Ok(Language {
            verb: canonical,
            order: def.order.clone(),
            types,
            aliases,
        })
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn known_keywords(&self) -> &[String] {
        &self.order
    }

    /// Resolve `token` (a possibly-abbreviated keyword, or a keyword alias)
    /// to its canonical name. Exact (case-insensitive) matches — against
    /// either a canonical name or an alias — win outright; otherwise prefix
    /// matching runs over canonical names and aliases together, then
    /// collapses through alias resolution before checking for a unique
    /// surviving canonical candidate.
    pub fn best_match(&self, token: &str) -> Result<String, MarsError> {
        let lower = token.to_ascii_lowercase();
        if let Some(exact) = self.order.iter().find(|k| k.eq_ignore_ascii_case(&lower)) {
            return Ok(exact.clone());
        }
        if let Some(canonical) = self.aliases.get(&lower) {
            return Ok(canonical.clone());
        }

        let prefixed = self
            .order
            .iter()
            .map(String::as_str)
            .chain(self.aliases.keys().map(String::as_str))
            .filter(|k| k.to_ascii_lowercase().starts_with(&lower));

        let canonical: std::collections::BTreeSet<String> = prefixed
            .map(|k| self.aliases.get(k).cloned().unwrap_or_else(|| k.to_string()))
            .collect();

        match canonical.len() {
            1 => Ok(canonical.into_iter().next().unwrap()),
            0 => Err(MarsError::UnknownKeyword {
                verb: self.verb.clone(),
                keyword: token.to_string(),
                known: self.order.clone(),
            }),
            _ => Err(MarsError::Ambiguous {
                what: "keyword",
                input: token.to_string(),
                candidates: canonical.into_iter().collect(),
            }),
        }
    }

    /// Run the full expansion pipeline over `request` in place.
    pub fn expand(&self, ctx: &ExpandContext, request: &mut Request, strict: bool) -> Result<(), MarsError> {
        self.canonicalise_keys(request)?;

        for keyword in request.params().to_vec() {
            let Some(t) = self.types.get(&keyword) else { continue };
            let mut values = request.values(&keyword, true)?.to_vec();
            t.expand_range(ctx, &mut values, request)?;
            request.set_values(&keyword, values);
        }

        for keyword in &self.order {
            if !request.has(keyword) {
                self.types[keyword].set_defaults(request);
            }
        }

        for keyword in &self.order {
            self.types[keyword].pass2(ctx, request)?;
        }

        for keyword in &self.order {
            if request.has(keyword) {
                self.types[keyword].finalise(ctx, request, strict)?;
            }
        }

        for keyword in &self.order {
            if let Ok(values) = request.values(keyword, true) {
                self.types[keyword].check(values);
            }
        }

        Ok(())
    }

    /// Rewrite every request keyword to its canonical, best-matched name.
    fn canonicalise_keys(&self, request: &mut Request) -> Result<(), MarsError> {
        for raw in request.params().to_vec() {
            if self.types.contains_key(&raw) {
                continue;
            }
            let canonical = self.best_match(&raw)?;
            let values = request.values(&raw, true)?.to_vec();
            request.unset_values(&raw);
            request.set_values(&canonical, values);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    fn grammar() -> Grammar {
        let doc = serde_json::json!({
            "retrieve": {
                "class": { "type": "enum", "values": [["od", "operational"]], "default": "od" },
                "stream": { "type": "enum", "values": ["oper"], "default": "oper" },
                "levelist": { "type": "to-by-list" },
            }
        });
        Grammar::from_value(&doc).unwrap()
    }

    #[test]
    fn unique_prefix_resolves_to_canonical_keyword() {
        let lang = Language::new(&grammar(), "retrieve").unwrap();
        assert_eq!(lang.best_match("lev").unwrap(), "levelist");
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        let doc = serde_json::json!({
            "retrieve": {
                "stream": { "type": "any" },
                "step": { "type": "any" },
            }
        });
        let lang = Language::new(&Grammar::from_value(&doc).unwrap(), "retrieve").unwrap();
        assert!(lang.best_match("st").is_err());
    }

    #[test]
    fn missing_keywords_are_filled_from_defaults() {
        let lang = Language::new(&grammar(), "retrieve").unwrap();
        let mut req = Request::new("retrieve");
        req.set_values("lev", vec!["1".into(), "to".into(), "3".into()]);
        lang.expand(&ctx(), &mut req, true).unwrap();
        assert_eq!(req.values("class", false).unwrap(), &["od"]);
        assert_eq!(req.values("stream", false).unwrap(), &["oper"]);
        assert_eq!(req.values("levelist", false).unwrap(), &["1", "2", "3"]);
    }

    #[test]
    fn unknown_keyword_is_an_error() {
        let lang = Language::new(&grammar(), "retrieve").unwrap();
        let mut req = Request::new("retrieve");
        req.set_value("bogus", "x");
        assert!(lang.expand(&ctx(), &mut req, true).is_err());
    }

    #[test]
    fn keyword_alias_resolves_to_its_canonical_name() {
        let doc = serde_json::json!({
            "retrieve": {
                "levelist": { "type": "to-by-list", "aliases": ["levels"] },
            }
        });
        let lang = Language::new(&Grammar::from_value(&doc).unwrap(), "retrieve").unwrap();
        assert_eq!(lang.best_match("levels").unwrap(), "levelist");
        assert_eq!(lang.best_match("LEVELS").unwrap(), "levelist");
    }

    #[test]
    fn per_keyword_options_override_settings_before_the_type_is_built() {
        let doc = serde_json::json!({
            "retrieve": {
                "_options": { "class": { "default": "rd" } },
                "class": { "type": "enum", "values": [["od", "operational"], ["rd", "research"]], "default": "od" },
            }
        });
        let lang = Language::new(&Grammar::from_value(&doc).unwrap(), "retrieve").unwrap();
        let mut req = Request::new("retrieve");
        lang.expand(&ctx(), &mut req, true).unwrap();
        assert_eq!(req.values("class", false).unwrap(), &["rd"]);
    }

    #[test]
    fn clear_defaults_drops_a_keywords_configured_default() {
        let doc = serde_json::json!({
            "retrieve": {
                "_clear_defaults": ["class"],
                "class": { "type": "enum", "values": ["od"], "default": "od" },
            }
        });
        let lang = Language::new(&Grammar::from_value(&doc).unwrap(), "retrieve").unwrap();
        let mut req = Request::new("retrieve");
        lang.expand(&ctx(), &mut req, true).unwrap();
        assert!(!req.has("class"));
    }
}

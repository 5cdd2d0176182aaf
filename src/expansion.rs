//! The public expansion facade: builds and caches one [`Language`] per verb,
//! and drives the full `parse -> expand` path for callers.
//!
//! Grounded in the original's per-verb `MarsLanguage` instance cache (each
//! verb's keyword/type set is expensive enough to build that it's kept
//! alive for the process lifetime once constructed).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::MarsError;
use crate::grammar::Grammar;
use crate::language::Language;
use crate::parser::{self, ParsedRequest};
use crate::request::Request;
use crate::types::ExpandContext;

/// Owns a [`Grammar`] and lazily builds/caches a [`Language`] per verb.
pub struct Expansion {
    grammar: Grammar,
    clock: Arc<dyn Clock>,
    config: Config,
    cache: Mutex<HashMap<String, Arc<Language>>>,
}

impl Expansion {
    pub fn new(grammar: Grammar) -> Self {
        Expansion::with_clock(grammar, Arc::new(SystemClock))
    }

    pub fn with_clock(grammar: Grammar, clock: Arc<dyn Clock>) -> Self {
        Expansion {
            grammar,
            clock,
            config: Config::from_env(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Resolve `verb` (lower-casing, then falling back to the grammar's
    /// verb-alias map) and return its cached [`Language`], building and
    /// caching one on first use.
    fn language_for(&self, verb: &str) -> Result<Arc<Language>, MarsError> {
        let canonical = self.grammar.resolve_verb(verb).ok_or_else(|| MarsError::UnknownVerb {
            verb: verb.to_string(),
            known: self.grammar.verbs.keys().cloned().collect(),
        })?;

        if let Some(lang) = self.cache.lock().unwrap().get(&canonical) {
            return Ok(lang.clone());
        }
        let lang = Arc::new(Language::new(&self.grammar, &canonical)?);
        self.cache.lock().unwrap().insert(canonical, lang.clone());
        Ok(lang)
    }

    fn ctx(&self) -> ExpandContext {
        ExpandContext::new(self.clock.clone(), self.config)
    }

    /// Expand a single already-parsed [`Request`] in place.
    pub fn expand_request(&self, request: &mut Request) -> Result<(), MarsError> {
        let lang = self.language_for(request.verb())?;
        request.set_verb(lang.verb());
        lang.expand(&self.ctx(), request, self.config.strict_mode)
    }

    /// Parse `text` and expand every request it contains.
    pub fn expand_text(&self, text: &str) -> Result<Vec<Request>, MarsError> {
        let mut out = Vec::new();
        for ParsedRequest { mut request, .. } in parser::parse(text)? {
            self.expand_request(&mut request)?;
            out.push(request);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    fn expansion() -> Expansion {
        let doc = serde_json::json!({
            "retrieve": {
                "class": { "type": "enum", "values": [["od", "operational"]], "default": "od" },
                "date": { "type": "date" },
            }
        });
        let grammar = Grammar::from_value(&doc).unwrap();
        let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()));
        Expansion::with_clock(grammar, clock)
    }

    #[test]
    fn caches_language_instances_per_verb() {
        let exp = expansion();
        let a = exp.language_for("retrieve").unwrap();
        let b = exp.language_for("RETRIEVE").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn expand_text_resolves_defaults_and_dates() {
        let exp = expansion();
        let requests = exp.expand_text("retrieve,date=-5/to/-1").unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].values("class", false).unwrap(), &["od"]);
        assert_eq!(requests[0].count_values("date"), 5);
    }

    #[test]
    fn verb_alias_resolves_to_the_same_cached_language_and_canonicalises_the_request() {
        let doc = serde_json::json!({
            "retrieve": {
                "_aliases": ["ret"],
                "class": { "type": "enum", "values": [["od", "operational"]], "default": "od" },
            }
        });
        let exp = Expansion::new(Grammar::from_value(&doc).unwrap());

        let full = exp.language_for("retrieve").unwrap();
        let aliased = exp.language_for("ret").unwrap();
        assert!(Arc::ptr_eq(&full, &aliased));

        let requests = exp.expand_text("ret,class=od").unwrap();
        assert_eq!(requests[0].verb(), "retrieve");
    }
}

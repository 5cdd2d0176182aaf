//! Loads the grammar document describing every verb's keyword order and
//! per-keyword type settings.
//!
//! The original merges six separate YAML documents (`language.yaml`,
//! `paramIDs.yaml`, `param-rules.yaml`, `param-static-rules.yaml`,
//! `shortnameContext.yaml`, `axisOrder.yaml`) behind a `std::call_once`
//! guard. Here that collapses to one YAML document (axis order and
//! per-keyword `type:`/`rules:` settings inline, matching how `TypeParam`
//! already expects a `rules` list in its own settings) loaded once behind a
//! process-wide [`once_cell::sync::OnceCell`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::error::MarsError;
use crate::value::{as_string_list, from_yaml_str, Value};

/// One verb's keyword axis order and per-keyword settings.
#[derive(Debug, Clone, Default)]
pub struct VerbDef {
    /// Keyword names in declaration order — this is also prefix-match and
    /// axis order for the hypercube. Never contains a `_`-prefixed meta key.
    pub order: Vec<String>,
    pub settings: HashMap<String, Value>,
    /// `_aliases`: alternate spellings of this verb itself.
    pub aliases: Vec<String>,
    /// `_clear_defaults`: keywords whose configured defaults are dropped
    /// once their `Type` is built.
    pub clear_defaults: Vec<String>,
    /// `_options`: per-keyword settings overrides, merged into that
    /// keyword's settings before its `Type` is built.
    pub options: HashMap<String, Value>,
}

/// The parsed grammar: one [`VerbDef`] per known verb.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub verbs: HashMap<String, VerbDef>,
    /// Lower-cased verb alias → canonical (lower-cased) verb name, merged
    /// from every verb's `_aliases` list.
    pub verb_aliases: HashMap<String, String>,
}

impl Grammar {
    /// Parse a grammar document shaped as `{verb: {keyword: {type: ..., ...}}}`.
    ///
    /// Keys starting with `_` are grammar-document meta fields, not
    /// keywords: `_aliases`, `_clear_defaults`, and `_options` are parsed
    /// into their own `VerbDef` fields and never reach `order`/`settings`
    /// (and so never get built into a bogus `Type`).
    pub fn from_value(doc: &Value) -> Result<Self, MarsError> {
        let bad = |detail: &str| MarsError::GrammarLoadError {
            path: PathBuf::from("language.yaml"),
            detail: detail.to_string(),
        };

        let Value::Object(verbs) = doc else {
            return Err(bad("grammar document root must be an object of verbs"));
        };

        let mut grammar = Grammar::default();
        for (verb, keywords) in verbs {
            let Value::Object(kw_map) = keywords else {
                return Err(bad(&format!("verb '{verb}' must map to an object of keywords")));
            };
            let canonical_verb = verb.to_ascii_lowercase();

            let mut order = Vec::with_capacity(kw_map.len());
            let mut settings = HashMap::with_capacity(kw_map.len());
            let mut aliases = Vec::new();
            let mut clear_defaults = Vec::new();
            let mut options = HashMap::new();

            for (keyword, cfg) in kw_map {
                match keyword.as_str() {
                    "_aliases" => aliases = as_string_list(cfg),
                    "_clear_defaults" => clear_defaults = as_string_list(cfg),
                    "_options" => {
                        if let Value::Object(opt_map) = cfg {
                            for (kw, overrides) in opt_map {
                                options.insert(kw.clone(), overrides.clone());
                            }
                        }
                    }
                    _ if keyword.starts_with('_') => {}
                    _ => {
                        order.push(keyword.clone());
                        settings.insert(keyword.clone(), cfg.clone());
                    }
                }
            }

            for alias in &aliases {
                grammar
                    .verb_aliases
                    .insert(alias.to_ascii_lowercase(), canonical_verb.clone());
            }

            grammar.verbs.insert(
                canonical_verb,
                VerbDef {
                    order,
                    settings,
                    aliases,
                    clear_defaults,
                    options,
                },
            );
        }

        Ok(grammar)
    }

    /// Resolve a possibly-aliased verb name to its canonical (lower-cased)
    /// form: lower-case, look up the verb set, else the verb-alias map.
    pub fn resolve_verb(&self, name: &str) -> Option<String> {
        let lower = name.to_ascii_lowercase();
        if self.verbs.contains_key(&lower) {
            return Some(lower);
        }
        self.verb_aliases.get(&lower).cloned()
    }

    pub fn load_str(text: &str) -> Result<Self, MarsError> {
        let value = from_yaml_str(Path::new("language.yaml"), text)?;
        Grammar::from_value(&value)
    }

    pub fn load_file(path: &Path) -> Result<Self, MarsError> {
        let text = std::fs::read_to_string(path).map_err(|e| MarsError::GrammarLoadError {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let value = from_yaml_str(path, &text)?;
        Grammar::from_value(&value)
    }
}

static GLOBAL: OnceCell<Grammar> = OnceCell::new();

/// The process-wide grammar, loaded once from `MARS_LANGUAGE_YAML` (or the
/// bundled default path) on first use.
pub fn global() -> Result<&'static Grammar, MarsError> {
    GLOBAL.get_or_try_init(|| {
        let path = std::env::var("MARS_LANGUAGE_YAML").unwrap_or_else(|_| "language.yaml".to_string());
        Grammar::load_file(Path::new(&path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verb_keyword_order_and_settings() {
        let doc = serde_json::json!({
            "retrieve": {
                "class": { "type": "enum", "values": ["od"] },
                "stream": { "type": "enum", "values": ["oper"] },
            }
        });
        let g = Grammar::from_value(&doc).unwrap();
        let verb = &g.verbs["retrieve"];
        assert_eq!(verb.order, vec!["class".to_string(), "stream".to_string()]);
        assert!(verb.settings.contains_key("class"));
    }

    #[test]
    fn non_object_verb_body_is_rejected() {
        let doc = serde_json::json!({ "retrieve": "nope" });
        assert!(Grammar::from_value(&doc).is_err());
    }

    #[test]
    fn underscore_meta_keys_never_become_keywords() {
        let doc = serde_json::json!({
            "retrieve": {
                "_aliases": ["ret"],
                "_clear_defaults": ["class"],
                "_options": { "class": { "default": "rd" } },
                "class": { "type": "enum", "values": ["od"], "default": "od" },
            }
        });
        let g = Grammar::from_value(&doc).unwrap();
        let verb = &g.verbs["retrieve"];
        assert_eq!(verb.order, vec!["class".to_string()]);
        assert_eq!(verb.aliases, vec!["ret".to_string()]);
        assert_eq!(verb.clear_defaults, vec!["class".to_string()]);
        assert!(verb.options.contains_key("class"));
    }

    #[test]
    fn verb_alias_resolves_to_canonical_verb() {
        let doc = serde_json::json!({
            "retrieve": {
                "_aliases": ["ret"],
                "class": { "type": "any" },
            }
        });
        let g = Grammar::from_value(&doc).unwrap();
        assert_eq!(g.resolve_verb("ret").as_deref(), Some("retrieve"));
        assert_eq!(g.resolve_verb("RETRIEVE").as_deref(), Some("retrieve"));
        assert_eq!(g.resolve_verb("bogus"), None);
    }
}

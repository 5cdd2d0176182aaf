//! The per-keyword value-semantics type hierarchy.
//!
//! Every keyword in the grammar is backed by one [`Type`] trait object.
//! Common settings (`multiple`, `flatten`, `duplicates`, `category`,
//! `default`, `only`, `never`, `unset`) are parsed once into [`TypeBase`];
//! each concrete type embeds a `TypeBase` and implements [`Type`], getting
//! the shared `expand_range`/`finalise`/`check`/default-lifecycle behavior
//! for free via the trait's default methods — the idiomatic-Rust
//! replacement for the original's single-inheritance `Type` base class.

mod any;
mod date;
mod enum_type;
mod expver;
mod float;
mod integer;
mod lowercase;
mod mixed;
mod param;
mod quantile;
mod range;
mod regex_type;
mod time;
mod to_by_list;

pub use any::TypeAny;
pub use date::TypeDate;
pub use enum_type::TypeEnum;
pub use expver::TypeExpver;
pub use float::TypeFloat;
pub use integer::TypeInteger;
pub use lowercase::TypeLowercase;
pub use mixed::TypeMixed;
pub use param::TypeParam;
pub use quantile::TypeQuantile;
pub use range::TypeRange;
pub use regex_type::TypeRegex;
pub use time::TypeTime;
pub use to_by_list::{ByListElement, TypeToByList};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::MarsError;
use crate::request::Request;
use crate::value::{as_scalar_string, as_string_list, Value};

/// Ambient state passed through every expansion call: the clock used for
/// relative dates and the resolved strict/legacy/raw-param flags.
#[derive(Clone)]
pub struct ExpandContext {
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    pub line: Option<usize>,
}

impl ExpandContext {
    pub fn new(clock: Arc<dyn Clock>, config: Config) -> Self {
        ExpandContext {
            clock,
            config,
            line: None,
        }
    }
}

/// Settings shared by every `Type` variant, parsed once at construction.
#[derive(Debug, Clone, Default)]
pub struct TypeBase {
    pub name: String,
    pub flatten: bool,
    pub multiple: bool,
    pub duplicates: bool,
    pub category: Option<String>,
    pub defaults: Vec<String>,
    pub original_defaults: Vec<String>,
    pub only: BTreeMap<String, HashSet<String>>,
    pub never: BTreeMap<String, HashSet<String>>,
    pub unset: BTreeMap<String, HashSet<String>>,
}

impl TypeBase {
    pub fn new(name: &str, settings: &Value) -> Self {
        let mut base = TypeBase {
            name: name.to_string(),
            flatten: true,
            multiple: false,
            duplicates: true,
            category: None,
            defaults: Vec::new(),
            original_defaults: Vec::new(),
            only: BTreeMap::new(),
            never: BTreeMap::new(),
            unset: BTreeMap::new(),
        };

        if let Some(v) = settings.get("multiple").and_then(Value::as_bool) {
            base.multiple = v;
        }
        if let Some(v) = settings.get("flatten").and_then(Value::as_bool) {
            base.flatten = v;
        }
        if let Some(v) = settings.get("duplicates").and_then(Value::as_bool) {
            base.duplicates = v;
        }
        if let Some(v) = settings.get("category").and_then(Value::as_str) {
            base.category = Some(v.to_string());
        }
        if let Some(d) = settings.get("default") {
            if !d.is_null() {
                base.defaults = as_string_list(d);
            }
        }
        base.original_defaults = base.defaults.clone();

        base.only = parse_constraint_list(settings.get("only"));
        base.never = parse_constraint_list(settings.get("never"));
        base.unset = parse_constraint_list(settings.get("unset"));

        base
    }
}

/// Parse the `only`/`never`/`unset` shape: a list of `{other_key: value |
/// [values]}` maps, union-merged across list entries into one map per
/// other-key (later entries for the same other-key add to the set rather
/// than starting a fresh alternative group).
fn parse_constraint_list(value: Option<&Value>) -> BTreeMap<String, HashSet<String>> {
    let mut out: BTreeMap<String, HashSet<String>> = BTreeMap::new();
    let Some(Value::Array(entries)) = value else {
        return out;
    };
    for entry in entries {
        let Value::Object(map) = entry else { continue };
        for (key, v) in map {
            out.entry(key.clone())
                .or_default()
                .extend(as_string_list(v));
        }
    }
    out
}

/// Every keyword type implements this trait. Default methods implement the
/// shared `Type` base-class behavior from the original source; concrete
/// types override only what differs.
pub trait Type: Send + Sync {
    fn base(&self) -> &TypeBase;
    fn base_mut(&mut self) -> &mut TypeBase;

    fn name(&self) -> &str {
        &self.base().name
    }

    fn flatten(&self) -> bool {
        self.base().flatten
    }

    fn multiple(&self) -> bool {
        self.base().multiple
    }

    /// Canonicalise a single value in place. Returns `Ok(false)` when the
    /// value is rejected for reasons the caller should turn into a soft
    /// failure (unknown enum value, non-matching regex); returns `Err` for
    /// hard failures (malformed range tokens, etc.).
    fn expand_value(
        &self,
        ctx: &ExpandContext,
        value: &mut String,
        request: &Request,
    ) -> Result<bool, MarsError>;

    /// Rewrite a whole value list: implements `to`/`by`, enum group
    /// expansion, and duplicate/multiple checks. The default iterates
    /// `expand_value` per element; `to-by-list`/`range` types override this
    /// to implement range-token expansion first.
    fn expand_range(
        &self,
        ctx: &ExpandContext,
        values: &mut Vec<String>,
        request: &Request,
    ) -> Result<(), MarsError> {
        let mut newvals = Vec::with_capacity(values.len());

        for raw in values.iter() {
            let mut value = raw.clone();
            let ok = self.expand_value(ctx, &mut value, request)?;
            if !ok {
                return Err(MarsError::InvalidValue {
                    keyword: self.name().to_string(),
                    value: raw.clone(),
                    reason: "value rejected by type".to_string(),
                });
            }
            newvals.push(value);
        }

        *values = newvals;
        enforce_cardinality(self, values)
    }

    /// Push configured defaults as-if the user had specified them.
    fn set_defaults(&self, request: &mut Request) {
        if !self.base().defaults.is_empty() {
            request.set_values(self.name(), self.base().defaults.clone());
        }
    }

    /// Hook to adjust already-present values after defaulting. No-op by
    /// default; overridden by types with post-default normalisation needs.
    fn set_inheritance(&self, _values: &mut [String]) {}

    /// Cross-keyword rewrite, run after defaulting. Only `param` overrides
    /// this (see [`TypeParam::pass2`]).
    fn pass2(&self, _ctx: &ExpandContext, _request: &mut Request) -> Result<(), MarsError> {
        Ok(())
    }

    /// Enforce `only`/`never`/`unset`. `off` is treated as "not present".
    fn finalise(
        &self,
        _ctx: &ExpandContext,
        request: &mut Request,
        strict: bool,
    ) -> Result<(), MarsError> {
        let base = self.base();
        let mut ok = true;

        if let Ok(values) = request.values(self.name(), true)
            && values.len() == 1
            && values[0].eq_ignore_ascii_case("off")
        {
            ok = false;
        }

        for (other_key, unset_vals) in &base.unset {
            if let Ok(vals) = request.values(other_key, true) {
                let mut found = false;
                for v in vals {
                    if unset_vals.contains(v) {
                        request.unset_values(self.name());
                        found = true;
                        break;
                    }
                }
                if found {
                    break;
                }
            }
        }

        for (other_key, only_vals) in &base.only {
            if !ok {
                break;
            }
            if let Ok(vals) = request.values(other_key, true) {
                for v in vals {
                    if !only_vals.contains(v) {
                        let msg = format!(
                            "key [{}] not acceptable since {other_key}={v} not listed in {}->only->{other_key}",
                            self.name(),
                            self.name()
                        );
                        if strict {
                            return Err(MarsError::ConstraintViolation {
                                keyword: self.name().to_string(),
                                reason: msg,
                            });
                        }
                        tracing::warn!("{msg}");
                        ok = false;
                        break;
                    }
                }
            }
        }

        for (other_key, never_vals) in &base.never {
            if !ok {
                break;
            }
            if let Ok(vals) = request.values(other_key, true) {
                for v in vals {
                    if never_vals.contains(v) {
                        let msg = format!(
                            "key [{}] not acceptable since {other_key}={v} listed in {}->never->{other_key}",
                            self.name(),
                            self.name()
                        );
                        if strict {
                            return Err(MarsError::ConstraintViolation {
                                keyword: self.name().to_string(),
                                reason: msg,
                            });
                        }
                        tracing::warn!("{msg}");
                        ok = false;
                        break;
                    }
                }
            }
        }

        if !ok {
            request.unset_values(self.name());
        }

        Ok(())
    }

    /// Soft, logging-only duplicate diagnostic — distinct from the hard
    /// `duplicates=false` enforcement inside `expand_range`.
    fn check(&self, values: &[String]) {
        if !self.flatten() {
            return;
        }
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for v in values {
            if !seen.insert(v.clone()) {
                dups.push(v.clone());
            }
        }
        if !dups.is_empty() {
            tracing::warn!(keyword = self.name(), ?dups, "duplicate values in request");
        }
    }

    /// Idempotent single-value canonicalisation, used by tests and by
    /// range-token expansion to normalise segment endpoints.
    fn tidy(&self, ctx: &ExpandContext, value: &str) -> Result<String, MarsError> {
        let mut v = value.to_string();
        let dummy = Request::new("retrieve");
        self.expand_value(ctx, &mut v, &dummy)?;
        Ok(v)
    }

    /// Revert any stateful defaults to those loaded from the grammar.
    fn reset(&mut self) {
        let original = self.base().original_defaults.clone();
        self.base_mut().defaults = original;
    }

    fn clear_defaults(&mut self) {
        self.base_mut().defaults.clear();
    }
}

/// Shared tail of `expand_range`: reject duplicate values when
/// `duplicates=false`, then reject more than one value when
/// `multiple=false`. Factored out so overrides (`to-by-list` types expand
/// range tokens first, then share this same check) don't have to duplicate
/// the logic — Rust has no way to call a trait's default method body once a
/// concrete type has overridden it.
pub(crate) fn enforce_cardinality(t: &dyn Type, values: &mut Vec<String>) -> Result<(), MarsError> {
    if !t.base().duplicates {
        let mut seen = HashSet::new();
        for v in values.iter() {
            if !seen.insert(v.clone()) {
                return Err(MarsError::InvalidValue {
                    keyword: t.name().to_string(),
                    value: v.clone(),
                    reason: "duplicated value".to_string(),
                });
            }
        }
    }

    if !t.base().multiple && values.len() > 1 {
        return Err(MarsError::InvalidValue {
            keyword: t.name().to_string(),
            value: values.join("/"),
            reason: "only one value permitted".to_string(),
        });
    }

    Ok(())
}

/// Build a concrete `Type` trait object from a type-tag string and its
/// settings `Value`. The idiomatic-Rust replacement for the original's
/// self-registering static `TypeBuilder<T>` instances (Rust has no
/// equivalent to C++ static-init-time self-registration that's safe to rely
/// on ordering-wise).
pub fn build(keyword: &str, settings: &Value) -> Result<Box<dyn Type>, MarsError> {
    let tag = settings
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("any");

    build_tagged(tag, keyword, settings)
}

fn build_tagged(tag: &str, keyword: &str, settings: &Value) -> Result<Box<dyn Type>, MarsError> {
    Ok(match tag {
        "any" => Box::new(TypeAny::new(keyword, settings)),
        "lowercase" => Box::new(TypeLowercase::new(keyword, settings)),
        "enum" => Box::new(TypeEnum::new(keyword, settings)?),
        "regex" => Box::new(TypeRegex::new(keyword, settings)?),
        "expver" => Box::new(TypeExpver::new(keyword, settings)),
        "integer" => Box::new(TypeInteger::new(keyword, settings)),
        "to-by-list" => Box::new(TypeInteger::new_to_by_list(keyword, settings)),
        "float" => Box::new(TypeFloat::new(keyword, settings)),
        "to-by-list-float" => Box::new(TypeFloat::new_to_by_list(keyword, settings)),
        "quantile" => Box::new(TypeQuantile::new(keyword, settings)?),
        "to-by-list-quantile" => Box::new(TypeQuantile::new_to_by_list(keyword, settings)?),
        "date" => Box::new(TypeDate::new(keyword, settings)),
        "time" => Box::new(TypeTime::new(keyword, settings)),
        "range" => Box::new(TypeRange::new(keyword, settings)),
        "param" => Box::new(TypeParam::new(keyword, settings)),
        "mixed" => Box::new(TypeMixed::new(keyword, settings)?),
        other => {
            return Err(MarsError::GrammarLoadError {
                path: std::path::PathBuf::from("language.yaml"),
                detail: format!("unknown type tag '{other}' for keyword '{keyword}'"),
            });
        }
    })
}

/// An implicit fallback type for unregistered `_`-prefixed keywords (e.g.
/// internal diagnostic tags). Accepts any string unchanged, matching the
/// original's `TypeHidden` escape hatch.
pub fn hidden(keyword: &str) -> Box<dyn Type> {
    Box::new(TypeAny::new(keyword, &Value::Null))
}

pub(crate) fn scalar_or_default(settings: &Value, key: &str, default: &str) -> String {
    settings
        .get(key)
        .and_then(as_scalar_string)
        .unwrap_or_else(|| default.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_constraint_list_unions_same_key_across_entries() {
        let settings = serde_json::json!([
            { "stream": "oper" },
            { "stream": ["enfo", "waef"] },
        ]);
        let parsed = parse_constraint_list(Some(&settings));
        let set = &parsed["stream"];
        assert_eq!(set.len(), 3);
        assert!(set.contains("oper"));
        assert!(set.contains("enfo"));
        assert!(set.contains("waef"));
    }

    #[test]
    fn base_defaults_survive_clear_and_reset() {
        let settings = serde_json::json!({ "default": "od" });
        let mut base = TypeBase::new("class", &settings);
        assert_eq!(base.defaults, vec!["od".to_string()]);
        base.defaults.clear();
        assert!(base.defaults.is_empty());
        assert_eq!(base.original_defaults, vec!["od".to_string()]);
    }
}

use std::collections::HashMap;

use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::{as_scalar_string, Value};

/// Closed domain, case-insensitive; alias→canonical mapping; supports
/// hierarchical groups `{name, group:[...]}` where a name is also an alias
/// for the union of its group's values.
pub struct TypeEnum {
    base: TypeBase,
    uppercase: bool,
    /// lowercased alias/value -> group index
    values: HashMap<String, usize>,
    /// group index -> (canonical display name, flattened member list)
    groups: Vec<(String, Vec<String>)>,
}

impl TypeEnum {
    pub fn new(name: &str, settings: &Value) -> Result<Self, MarsError> {
        let base = TypeBase::new(name, settings);
        let uppercase = settings.get("uppercase").and_then(Value::as_bool).unwrap_or(false);

        let mut t = TypeEnum {
            base,
            uppercase,
            values: HashMap::new(),
            groups: Vec::new(),
        };

        if let Some(values) = settings.get("values") {
            match values {
                Value::Array(items) => {
                    for item in items {
                        t.parse_enum_value(item, false)?;
                    }
                }
                Value::String(_) => {
                    // path to an external values document — not resolved
                    // from a bare settings Value; callers load via
                    // `TypeEnum::new_with_values` once the document is read.
                }
                _ => {}
            }
        }

        Ok(t)
    }

    /// Register one `values[i]` entry: a scalar, a list (aliases of one
    /// canonical group), or a `{name, group:[...]}` hierarchical group.
    fn parse_enum_value(&mut self, val: &Value, allow_duplicates: bool) -> Result<Vec<String>, MarsError> {
        if let Value::Object(map) = val {
            let name = map.get("name").ok_or_else(|| MarsError::GrammarLoadError {
                path: std::path::PathBuf::from("language.yaml"),
                detail: format!("enum group for '{}' missing 'name'", self.base.name),
            })?;
            let idx = self.parse_value_names(name, allow_duplicates)?;

            let group = map.get("group").and_then(Value::as_array).ok_or_else(|| {
                MarsError::GrammarLoadError {
                    path: std::path::PathBuf::from("language.yaml"),
                    detail: format!("enum group for '{}' missing 'group' list", self.base.name),
                }
            })?;

            let mut out: Vec<String> = Vec::new();
            let mut seen = std::collections::HashSet::new();
            for g in group {
                let sub = self.parse_enum_value(g, true)?;
                for v in sub {
                    if seen.insert(v.clone()) {
                        out.push(v);
                    }
                }
            }
            self.groups[idx].1 = out.clone();
            return Ok(out);
        }

        let idx = self.parse_value_names(val, allow_duplicates)?;
        let canonical = self.groups[idx].0.clone();
        self.groups[idx].1.push(canonical.clone());
        Ok(vec![canonical])
    }

    /// Register a scalar or list-of-aliases under a freshly allocated group
    /// index, returning that index.
    fn parse_value_names(&mut self, names: &Value, allow_duplicates: bool) -> Result<usize, MarsError> {
        let idx = self.groups.len();

        let (mut first, rest): (String, Vec<String>) = match names {
            Value::Array(items) => {
                let first = as_scalar_string(&items[0]).unwrap_or_default();
                let rest = items[1..]
                    .iter()
                    .filter_map(as_scalar_string)
                    .collect();
                (first, rest)
            }
            other => (as_scalar_string(other).unwrap_or_default(), Vec::new()),
        };

        self.add_value(&first, idx, allow_duplicates)?;
        for alias in &rest {
            self.add_value(alias, idx, allow_duplicates)?;
        }

        if self.uppercase {
            first = first.to_ascii_uppercase();
        }
        self.groups.push((first, Vec::new()));
        Ok(idx)
    }

    fn add_value(&mut self, raw: &str, idx: usize, allow_duplicates: bool) -> Result<(), MarsError> {
        let value = raw.to_ascii_lowercase();
        if !allow_duplicates && self.values.contains_key(&value) {
            return Err(MarsError::GrammarLoadError {
                path: std::path::PathBuf::from("language.yaml"),
                detail: format!("redefined enum value '{value}' for keyword '{}'", self.base.name),
            });
        }
        self.values.insert(value, idx);
        Ok(())
    }

    fn find(&self, value: &str) -> Option<usize> {
        self.values.get(&value.to_ascii_lowercase()).copied()
    }

    /// The flattened member list of `value`'s group, if this enum has
    /// hierarchical groups.
    pub fn group(&self, value: &str) -> Option<Vec<String>> {
        let idx = self.find(value)?;
        Some(self.groups[idx].1.clone())
    }
}

impl Type for TypeEnum {
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
        match self.find(value) {
            Some(idx) => {
                *value = self.groups[idx].0.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A hierarchical group name expands into its flattened member list;
    /// an ordinary value expands to itself, as usual.
    fn expand_range(
        &self,
        _ctx: &ExpandContext,
        values: &mut Vec<String>,
        request: &Request,
    ) -> Result<(), MarsError> {
        let _ = request;
        let mut expanded = Vec::with_capacity(values.len());
        for raw in values.iter() {
            let Some(idx) = self.find(raw) else {
                return Err(MarsError::InvalidValue {
                    keyword: self.name().to_string(),
                    value: raw.clone(),
                    reason: "value rejected by type".to_string(),
                });
            };
            let (canonical, members) = &self.groups[idx];
            if members.is_empty() {
                expanded.push(canonical.clone());
            } else {
                expanded.extend(members.iter().cloned());
            }
        }
        *values = expanded;
        super::enforce_cardinality(self, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    #[test]
    fn resolves_alias_to_canonical() {
        let settings = serde_json::json!({ "values": [["od", "operational"]] });
        let t = TypeEnum::new("class", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut v = "operational".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "od");
    }

    #[test]
    fn hierarchical_group_expands_to_its_members() {
        let settings = serde_json::json!({
            "values": [
                { "name": "qscat", "group": ["129", "130", "137", "138"] }
            ]
        });
        let t = TypeEnum::new("obstype", &settings).unwrap();
        let members = t.group("qscat").unwrap();
        assert_eq!(members, vec!["129", "130", "137", "138"]);
    }

    #[test]
    fn unknown_value_is_rejected_not_erroring() {
        let settings = serde_json::json!({ "values": ["od"] });
        let t = TypeEnum::new("class", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut v = "nope".to_string();
        assert!(!t.expand_value(&ctx(), &mut v, &req).unwrap());
    }

    #[test]
    fn group_name_expands_to_its_flattened_members() {
        let settings = serde_json::json!({
            "multiple": true,
            "values": [
                { "name": "qscat", "group": ["129", "130", "137", "138"] }
            ]
        });
        let t = TypeEnum::new("obstype", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut values = vec!["qscat".to_string()];
        t.expand_range(&ctx(), &mut values, &req).unwrap();
        assert_eq!(values, vec!["129", "130", "137", "138"]);
    }

    #[test]
    fn redefined_value_without_duplicates_is_an_error() {
        let settings = serde_json::json!({ "values": ["od", "od"] });
        assert!(TypeEnum::new("class", &settings).is_err());
    }
}

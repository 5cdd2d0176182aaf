use std::collections::{BTreeMap, HashSet};

use super::{build, ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::{as_string_list, Value};

/// A `{other_key: value | [values]}` guard deciding whether one alternative
/// of a [`TypeMixed`] applies to a given request.
#[derive(Debug, Clone, Default)]
struct Context {
    constraints: BTreeMap<String, HashSet<String>>,
}

impl Context {
    fn parse(value: &Value) -> Self {
        let mut constraints = BTreeMap::new();
        if let Value::Object(map) = value {
            for (k, v) in map {
                constraints.insert(k.clone(), as_string_list(v).into_iter().collect());
            }
        }
        Context { constraints }
    }

    fn matches(&self, request: &Request) -> bool {
        self.constraints.iter().all(|(key, allowed)| {
            request
                .values(key, true)
                .map(|vals| vals.iter().any(|v| allowed.contains(v)))
                .unwrap_or(false)
        })
    }
}

/// Tries each alternative `Type` in declaration order; the first whose
/// (optional) context matches the request and whose `expand_value` accepts
/// the literal wins. An alternative with no context always applies.
pub struct TypeMixed {
    base: TypeBase,
    alternatives: Vec<(Option<Context>, Box<dyn Type>)>,
}

impl TypeMixed {
    pub fn new(name: &str, settings: &Value) -> Result<Self, MarsError> {
        let base = TypeBase::new(name, settings);
        let mut alternatives = Vec::new();

        let types = settings.get("type").cloned().unwrap_or(Value::Null);
        let Value::Array(items) = types else {
            return Ok(TypeMixed { base, alternatives });
        };

        for (i, item) in items.iter().enumerate() {
            match item {
                Value::String(tag) => {
                    let mut cfg = settings.clone();
                    if let Value::Object(map) = &mut cfg {
                        map.insert("type".to_string(), Value::String(tag.clone()));
                    }
                    let sub_name = format!("{name}.{tag}");
                    alternatives.push((None, build(&sub_name, &cfg)?));
                }
                Value::Object(cfg) => {
                    let tag = cfg
                        .get("type")
                        .and_then(Value::as_str)
                        .ok_or_else(|| MarsError::GrammarLoadError {
                            path: std::path::PathBuf::from("language.yaml"),
                            detail: format!("mixed alternative {i} for '{name}' missing 'type'"),
                        })?;
                    let context = cfg.get("context").map(Context::parse);
                    let sub_name = format!("{name}.{i}.{tag}");
                    let sub = build(&sub_name, &Value::Object(cfg.clone()))?;
                    alternatives.push((context, sub));
                }
                _ => {}
            }
        }

        Ok(TypeMixed { base, alternatives })
    }
}

impl Type for TypeMixed {
    fn base(&self) -> &TypeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TypeBase {
        &mut self.base
    }

    fn expand_value(
        &self,
        ctx: &ExpandContext,
        value: &mut String,
        request: &Request,
    ) -> Result<bool, MarsError> {
        for (context, alt) in &self.alternatives {
            if context.as_ref().is_none_or(|c| c.matches(request)) {
                let mut tmp = value.clone();
                if alt.expand_value(ctx, &mut tmp, request)? {
                    *value = tmp;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    #[test]
    fn first_context_matching_alternative_wins() {
        let settings = serde_json::json!({
            "type": [
                { "type": "integer", "context": { "class": "od" } },
                { "type": "any" },
            ]
        });
        let t = TypeMixed::new("ident", &settings).unwrap();
        let mut req = Request::new("retrieve");
        req.set_value("class", "od");
        let mut v = "42".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "42");
    }

    #[test]
    fn falls_through_to_contextless_alternative() {
        let settings = serde_json::json!({
            "type": [
                { "type": "integer", "context": { "class": "od" } },
                { "type": "any" },
            ]
        });
        let t = TypeMixed::new("ident", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut v = "abc".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "abc");
    }
}

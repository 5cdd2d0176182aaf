use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::{as_string_list, Value};

/// Must match at least one of N patterns; optional uppercase output.
pub struct TypeRegex {
    base: TypeBase,
    uppercase: bool,
    patterns: Vec<regex::Regex>,
}

impl TypeRegex {
    pub fn new(name: &str, settings: &Value) -> Result<Self, MarsError> {
        let base = TypeBase::new(name, settings);
        let uppercase = settings
            .get("uppercase")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let raw = settings.get("regex").cloned().unwrap_or(Value::Null);
        let mut patterns = Vec::new();
        for pattern in as_string_list(&raw) {
            let anchored = format!("^(?:{pattern})$");
            let re = regex::Regex::new(&anchored).map_err(|e| MarsError::GrammarLoadError {
                path: std::path::PathBuf::from("language.yaml"),
                detail: format!("invalid regex '{pattern}' for keyword '{name}': {e}"),
            })?;
            patterns.push(re);
        }

        Ok(TypeRegex {
            base,
            uppercase,
            patterns,
        })
    }
}

impl Type for TypeRegex {
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
        for re in &self.patterns {
            if re.is_match(value) {
                if self.uppercase {
                    *value = value.to_ascii_uppercase();
                }
                return Ok(true);
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
    fn matching_pattern_is_uppercased_when_configured() {
        let settings = serde_json::json!({ "regex": "o[0-9]+", "uppercase": true });
        let t = TypeRegex::new("grid", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut v = "o640".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "O640");
    }

    #[test]
    fn non_matching_value_is_rejected() {
        let settings = serde_json::json!({ "regex": "[0-9]+" });
        let t = TypeRegex::new("number", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut v = "abc".to_string();
        assert!(!t.expand_value(&ctx(), &mut v, &req).unwrap());
    }

    #[test]
    fn any_of_multiple_patterns_may_match() {
        let settings = serde_json::json!({ "regex": ["a+", "b+"] });
        let t = TypeRegex::new("k", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut v = "bbb".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
    }
}

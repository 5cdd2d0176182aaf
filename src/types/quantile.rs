use std::collections::HashSet;

use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::{as_scalar_string, as_string_list, Value};

/// A `num:den` quantile, `0 <= num <= den`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantile {
    num: i64,
    den: i64,
}

impl Quantile {
    pub fn parse(value: &str) -> Result<Self, MarsError> {
        let bad = |reason: &str| MarsError::InvalidValue {
            keyword: "quantile".to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let (num_s, den_s) = value
            .split_once(':')
            .ok_or_else(|| bad("must be in the form <integer>:<integer>"))?;
        let num: i64 = num_s.parse().map_err(|_| bad("must be in the form <integer>:<integer>"))?;
        let den: i64 = den_s.parse().map_err(|_| bad("must be in the form <integer>:<integer>"))?;
        Quantile::new(num, den)
    }

    pub fn new(num: i64, den: i64) -> Result<Self, MarsError> {
        if num < 0 {
            return Err(MarsError::InvalidValue {
                keyword: "quantile".to_string(),
                value: format!("{num}:{den}"),
                reason: "numerator must be non negative".to_string(),
            });
        }
        if den < 0 {
            return Err(MarsError::InvalidValue {
                keyword: "quantile".to_string(),
                value: format!("{num}:{den}"),
                reason: "denominator must be non negative".to_string(),
            });
        }
        if den < num {
            return Err(MarsError::InvalidValue {
                keyword: "quantile".to_string(),
                value: format!("{num}:{den}"),
                reason: "numerator must be <= denominator".to_string(),
            });
        }
        Ok(Quantile { num, den })
    }

    pub fn num(&self) -> i64 {
        self.num
    }

    pub fn den(&self) -> i64 {
        self.den
    }

    pub fn render(&self) -> String {
        format!("{}:{}", self.num, self.den)
    }
}

/// A single `num:den` quantile value.
pub struct TypeQuantile {
    base: TypeBase,
    /// Permitted denominators; empty means unrestricted (scalar form).
    denominators: HashSet<i64>,
    by: i64,
    is_list: bool,
}

impl TypeQuantile {
    pub fn new(name: &str, settings: &Value) -> Result<Self, MarsError> {
        Ok(TypeQuantile {
            base: TypeBase::new(name, settings),
            denominators: HashSet::new(),
            by: 1,
            is_list: false,
        })
    }

    pub fn new_to_by_list(name: &str, settings: &Value) -> Result<Self, MarsError> {
        let mut base = TypeBase::new(name, settings);
        base.multiple = true;

        let mut denominators = HashSet::new();
        for d in as_string_list(settings.get("denominators").unwrap_or(&Value::Null)) {
            let v: i64 = d.parse().map_err(|_| MarsError::GrammarLoadError {
                path: std::path::PathBuf::from("language.yaml"),
                detail: format!("non-integer quantile denominator '{d}' for keyword '{name}'"),
            })?;
            if !denominators.insert(v) {
                return Err(MarsError::GrammarLoadError {
                    path: std::path::PathBuf::from("language.yaml"),
                    detail: format!("redefined {v}-quantile for keyword '{name}'"),
                });
            }
        }

        let by = settings
            .get("by")
            .and_then(as_scalar_string)
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Ok(TypeQuantile {
            base,
            denominators,
            by,
            is_list: true,
        })
    }
}

impl Type for TypeQuantile {
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
        let q = Quantile::parse(value)?;
        if self.is_list && !self.denominators.is_empty() && !self.denominators.contains(&q.den()) {
            return Err(MarsError::InvalidValue {
                keyword: self.name().to_string(),
                value: value.clone(),
                reason: format!("{}-quantile not supported", q.den()),
            });
        }
        *value = q.render();
        Ok(true)
    }

    fn expand_range(
        &self,
        ctx: &ExpandContext,
        values: &mut Vec<String>,
        request: &Request,
    ) -> Result<(), MarsError> {
        if !self.is_list {
            let mut expanded = Vec::with_capacity(values.len());
            for raw in values.iter() {
                let mut v = raw.clone();
                if !self.expand_value(ctx, &mut v, request)? {
                    return Err(MarsError::InvalidValue {
                        keyword: self.name().to_string(),
                        value: raw.clone(),
                        reason: "value rejected by type".to_string(),
                    });
                }
                expanded.push(v);
            }
            *values = expanded;
            return super::enforce_cardinality(self, values);
        }

        let mut newval = Vec::with_capacity(values.len());
        let mut i = 0;
        while i < values.len() {
            let s = &values[i];
            if s.eq_ignore_ascii_case("to") || s.eq_ignore_ascii_case("t0") {
                if newval.is_empty() {
                    return Err(MarsError::RangeInconsistency {
                        keyword: self.name().to_string(),
                        reason: "'to' must be preceded by a starting value".to_string(),
                    });
                }
                if i + 1 >= values.len() {
                    return Err(MarsError::RangeInconsistency {
                        keyword: self.name().to_string(),
                        reason: "'to' must be followed by an ending value".to_string(),
                    });
                }
                let from = Quantile::parse(&self.tidy(ctx, newval.last().unwrap())?)?;
                let to = Quantile::parse(&self.tidy(ctx, &values[i + 1])?)?;

                let mut by = self.by;
                let has_by = i + 2 < values.len() && values[i + 2].eq_ignore_ascii_case("by");
                if has_by {
                    if i + 3 >= values.len() {
                        return Err(MarsError::RangeInconsistency {
                            keyword: self.name().to_string(),
                            reason: "'by' must be followed by a step size".to_string(),
                        });
                    }
                    by = values[i + 3].parse().map_err(|_| MarsError::RangeInconsistency {
                        keyword: self.name().to_string(),
                        reason: "'by' must be a single integer number".to_string(),
                    })?;
                }

                if from.den() != to.den() {
                    return Err(MarsError::RangeInconsistency {
                        keyword: self.name().to_string(),
                        reason: "'from' and 'to' value must belong to the same quantile group".to_string(),
                    });
                }
                if from.num() > to.num() {
                    return Err(MarsError::RangeInconsistency {
                        keyword: self.name().to_string(),
                        reason: "'from' value cannot be greater than 'to' value".to_string(),
                    });
                }
                if by <= 0 {
                    return Err(MarsError::RangeInconsistency {
                        keyword: self.name().to_string(),
                        reason: "'by' value must be a positive number".to_string(),
                    });
                }

                let mut j = from.num() + by;
                while j <= to.num() {
                    newval.push(Quantile::new(j, from.den())?.render());
                    j += by;
                }

                i += if has_by { 4 } else { 2 };
            } else {
                newval.push(self.tidy(ctx, s)?);
                i += 1;
            }
        }

        *values = newval;
        super::enforce_cardinality(self, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    #[test]
    fn parses_num_den() {
        let t = TypeQuantile::new("quantile", &Value::Null).unwrap();
        let req = Request::new("retrieve");
        let mut v = "5:10".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "5:10");
    }

    #[test]
    fn numerator_above_denominator_is_rejected() {
        let t = TypeQuantile::new("quantile", &Value::Null).unwrap();
        let req = Request::new("retrieve");
        let mut v = "11:10".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).is_err());
    }

    #[test]
    fn list_rejects_unsupported_denominator() {
        let settings = serde_json::json!({ "denominators": [10] });
        let t = TypeQuantile::new_to_by_list("quantile", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut v = "1:4".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).is_err());
    }

    #[test]
    fn expands_to_by_range() {
        let settings = serde_json::json!({ "denominators": [10] });
        let t = TypeQuantile::new_to_by_list("quantile", &settings).unwrap();
        let req = Request::new("retrieve");
        let mut values = vec!["2:10".to_string(), "to".to_string(), "5:10".to_string()];
        Type::expand_range(&t, &ctx(), &mut values, &req).unwrap();
        assert_eq!(values, vec!["2:10", "3:10", "4:10", "5:10"]);
    }
}

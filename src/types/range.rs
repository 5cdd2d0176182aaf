use super::to_by_list::{ByListElement, TypeToByList};
use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::Value;

/// A `from[-to]` step range, e.g. `0-6`, `132`, or `0-360` (hours may exceed
/// 24 — unlike [`super::time::TypeTime`] this is an unbounded duration, not
/// a wall-clock time of day).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct StepRange {
    from: i64,
    to: i64,
}

impl StepRange {
    fn single(n: i64) -> Self {
        StepRange { from: n, to: n }
    }

    fn parse_str(value: &str, keyword: &str) -> Result<Self, MarsError> {
        let parts: Vec<&str> = value.split('-').collect();
        let bad = |reason: &str| MarsError::InvalidValue {
            keyword: keyword.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        match parts.as_slice() {
            [one] => {
                let n: i64 = one.parse().map_err(|_| bad("not a valid step"))?;
                Ok(StepRange::single(n))
            }
            [from, to] => {
                let from: i64 = from.parse().map_err(|_| bad("not a valid step"))?;
                let to: i64 = to.parse().map_err(|_| bad("not a valid step"))?;
                if from > to {
                    return Err(bad("initial value cannot be greater than final value"));
                }
                Ok(StepRange { from, to })
            }
            _ => Err(bad("invalid step range")),
        }
    }

    fn render(&self) -> String {
        if self.from == self.to {
            self.from.to_string()
        } else {
            format!("{}-{}", self.from, self.to)
        }
    }
}

impl ByListElement for StepRange {
    fn parse(s: &str) -> Result<Self, MarsError> {
        StepRange::parse_str(s, "step")
    }
    fn format(&self) -> String {
        self.render()
    }
    /// `by` is a single step duration (a one-sided `StepRange`); shifts the
    /// whole window forward by that amount.
    fn add(&self, step: Self) -> Option<Self> {
        Some(StepRange {
            from: self.from + step.from,
            to: self.to + step.from,
        })
    }
    fn is_zero(&self) -> bool {
        self.from == 0
    }
    fn is_positive(&self) -> bool {
        self.from > 0
    }
}

/// Parses `from[-to]` into its canonical `StepRange` text form.
pub struct TypeRange {
    base: TypeBase,
    to_by_list: TypeToByList<StepRange>,
}

impl TypeRange {
    pub fn new(name: &str, settings: &Value) -> Self {
        let mut base = TypeBase::new(name, settings);
        base.multiple = true;
        TypeRange {
            base,
            to_by_list: TypeToByList::new(settings),
        }
    }
}

impl Type for TypeRange {
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
        let r = StepRange::parse_str(value, self.name())?;
        *value = r.render();
        Ok(true)
    }

    fn expand_range(
        &self,
        ctx: &ExpandContext,
        values: &mut Vec<String>,
        _request: &Request,
    ) -> Result<(), MarsError> {
        self.to_by_list.expand_ranges(self, ctx, values)?;
        super::enforce_cardinality(self, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    #[test]
    fn single_step_passes_through() {
        let t = TypeRange::new("step", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "132".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "132");
    }

    #[test]
    fn from_to_range_is_canonicalised() {
        let t = TypeRange::new("step", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "0-6".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "0-6");
    }

    #[test]
    fn reversed_bounds_are_rejected() {
        let t = TypeRange::new("step", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "6-0".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).is_err());
    }
}

use super::to_by_list::{ByListElement, TypeToByList};
use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::Value;

/// Minutes since midnight; the shared element/step type for `time`'s
/// `to [by N]` ranges (`time=0000 to 2300 by 0100`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeOfDay(i32);

fn parse_hhmm(value: &str) -> Result<TimeOfDay, MarsError> {
    let bad = || MarsError::InvalidValue {
        keyword: "time".to_string(),
        value: value.to_string(),
        reason: "not a valid time of day".to_string(),
    };

    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > 6 {
        return Err(bad());
    }

    let (hh, mm, ss) = match digits.len() {
        1 | 2 => (digits.as_str(), "0", "0"),
        3 => (&digits[0..1], &digits[1..3], "0"),
        4 => (&digits[0..2], &digits[2..4], "0"),
        5 => (&digits[0..1], &digits[1..3], &digits[3..5]),
        6 => (&digits[0..2], &digits[2..4], &digits[4..6]),
        _ => return Err(bad()),
    };

    let hours: i32 = hh.parse().map_err(|_| bad())?;
    let minutes: i32 = mm.parse().map_err(|_| bad())?;
    let seconds: i32 = ss.parse().map_err(|_| bad())?;

    if seconds != 0 {
        return Err(MarsError::InvalidValue {
            keyword: "time".to_string(),
            value: value.to_string(),
            reason: "seconds are not supported".to_string(),
        });
    }
    if hours >= 24 {
        return Err(MarsError::InvalidValue {
            keyword: "time".to_string(),
            value: value.to_string(),
            reason: format!("{hours} hours > 24 not supported"),
        });
    }

    Ok(TimeOfDay(hours * 60 + minutes))
}

impl ByListElement for TimeOfDay {
    fn parse(s: &str) -> Result<Self, MarsError> {
        parse_hhmm(s)
    }
    fn format(&self) -> String {
        format!("{:02}{:02}", self.0 / 60, self.0 % 60)
    }
    fn add(&self, step: Self) -> Option<Self> {
        Some(TimeOfDay(self.0 + step.0))
    }
    fn is_zero(&self) -> bool {
        self.0 == 0
    }
    fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

/// `HHMM` canonical form; rejects non-zero seconds and hours >= 24.
pub struct TypeTime {
    base: TypeBase,
    to_by_list: TypeToByList<TimeOfDay>,
}

impl TypeTime {
    pub fn new(name: &str, settings: &Value) -> Self {
        let mut base = TypeBase::new(name, settings);
        base.multiple = true;
        TypeTime {
            base,
            to_by_list: TypeToByList::new(settings),
        }
    }
}

impl Type for TypeTime {
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
        *value = parse_hhmm(value)?.format();
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
    fn normalises_to_four_digit_hhmm() {
        let t = TypeTime::new("time", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "0".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "0000");
    }

    #[test]
    fn rejects_hours_at_or_above_24() {
        let t = TypeTime::new("time", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "2400".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).is_err());
    }

    #[test]
    fn rejects_nonzero_seconds() {
        let t = TypeTime::new("time", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "120030".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).is_err());
    }

    #[test]
    fn expands_to_by_range() {
        let t = TypeTime::new("time", &serde_json::json!({ "by": "0600" }));
        let req = Request::new("retrieve");
        let mut values = vec!["0000".to_string(), "to".to_string(), "1800".to_string()];
        Type::expand_range(&t, &ctx(), &mut values, &req).unwrap();
        assert_eq!(values, vec!["0000", "0600", "1200", "1800"]);
    }
}

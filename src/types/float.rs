use super::to_by_list::TypeToByList;
use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::Value;

/// Digits, `-`, and at most the decimal-point canonicalisation the original
/// performs: strip leading zeros, strip trailing fractional zeros (and a
/// bare trailing dot), empty becomes `"0"`.
pub struct TypeFloat {
    base: TypeBase,
    to_by_list: Option<TypeToByList<f64>>,
}

impl TypeFloat {
    pub fn new(name: &str, settings: &Value) -> Self {
        TypeFloat {
            base: TypeBase::new(name, settings),
            to_by_list: None,
        }
    }

    pub fn new_to_by_list(name: &str, settings: &Value) -> Self {
        let mut t = TypeFloat::new(name, settings);
        t.base.multiple = true;
        t.to_by_list = Some(TypeToByList::new(settings));
        t
    }

    fn canonicalise(value: &str) -> Option<String> {
        let mut has_dot = false;
        for c in value.chars() {
            match c {
                '0'..='9' | '-' => {}
                '.' => has_dot = true,
                _ => return None,
            }
        }

        let mut s = value.trim_start_matches('0').to_string();
        if has_dot {
            while s.ends_with('0') {
                s.pop();
            }
            if s.ends_with('.') {
                s.pop();
            }
        }
        if s.is_empty() {
            s.push('0');
        }
        Some(s)
    }
}

impl Type for TypeFloat {
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
        match Self::canonicalise(value) {
            Some(v) => {
                *value = v;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn expand_range(
        &self,
        ctx: &ExpandContext,
        values: &mut Vec<String>,
        request: &Request,
    ) -> Result<(), MarsError> {
        match &self.to_by_list {
            Some(to_by_list) => to_by_list.expand_ranges(self, ctx, values)?,
            None => {
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
            }
        }
        super::enforce_cardinality(self, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    #[test]
    fn strips_leading_and_trailing_zeros() {
        let t = TypeFloat::new("resol", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "0042.500".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "42.5");
    }

    #[test]
    fn bare_trailing_dot_is_dropped() {
        let t = TypeFloat::new("resol", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "3.".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "3");
    }

    #[test]
    fn all_zero_collapses_to_single_zero() {
        let t = TypeFloat::new("resol", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "0.000".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "0");
    }

    #[test]
    fn non_numeric_literal_is_rejected() {
        let t = TypeFloat::new("resol", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "av".to_string();
        assert!(!t.expand_value(&ctx(), &mut v, &req).unwrap());
    }
}

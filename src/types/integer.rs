use super::to_by_list::TypeToByList;
use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::Value;

/// Parse signed decimal; optional `[lo,hi]` range check; reject non-integers.
pub struct TypeInteger {
    base: TypeBase,
    range: Option<(i64, i64)>,
    to_by_list: Option<TypeToByList<i64>>,
}

impl TypeInteger {
    pub fn new(name: &str, settings: &Value) -> Self {
        let base = TypeBase::new(name, settings);
        let range = settings
            .get("range")
            .and_then(Value::as_array)
            .filter(|r| r.len() == 2)
            .and_then(|r| Some((r[0].as_i64()?, r[1].as_i64()?)));

        TypeInteger {
            base,
            range,
            to_by_list: None,
        }
    }

    pub fn new_to_by_list(name: &str, settings: &Value) -> Self {
        let mut t = TypeInteger::new(name, settings);
        t.base.multiple = true;
        t.to_by_list = Some(TypeToByList::new(settings));
        t
    }

    fn ok(&self, value: &str) -> Option<i64> {
        let n: i64 = value.parse().ok()?;
        match self.range {
            Some((lo, hi)) if !(lo..=hi).contains(&n) => None,
            _ => Some(n),
        }
    }
}

impl Type for TypeInteger {
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
        match self.ok(value) {
            Some(n) => {
                *value = n.to_string();
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

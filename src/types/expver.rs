use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::Value;

/// Zero-pad to width 4 with leading zeros; trim whitespace.
pub struct TypeExpver {
    base: TypeBase,
}

impl TypeExpver {
    pub fn new(name: &str, settings: &Value) -> Self {
        TypeExpver {
            base: TypeBase::new(name, settings),
        }
    }
}

impl Type for TypeExpver {
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
        let trimmed = value.trim();
        *value = format!("{trimmed:0>4}");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    #[test]
    fn zero_pads_to_width_four() {
        let t = TypeExpver::new("expver", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "1".to_string();
        t.expand_value(&ctx(), &mut v, &req).unwrap();
        assert_eq!(v, "0001");
    }

    #[test]
    fn trims_whitespace_before_padding() {
        let t = TypeExpver::new("expver", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = " 42 ".to_string();
        t.expand_value(&ctx(), &mut v, &req).unwrap();
        assert_eq!(v, "0042");
    }
}

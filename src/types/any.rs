use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::Value;

/// Accepts any string unchanged.
pub struct TypeAny {
    base: TypeBase,
}

impl TypeAny {
    pub fn new(name: &str, settings: &Value) -> Self {
        TypeAny {
            base: TypeBase::new(name, settings),
        }
    }
}

impl Type for TypeAny {
    fn base(&self) -> &TypeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TypeBase {
        &mut self.base
    }

    fn expand_value(
        &self,
        _ctx: &ExpandContext,
        _value: &mut String,
        _request: &Request,
    ) -> Result<bool, MarsError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_accepts_everything_unchanged() {
        let t = TypeAny::new("expver", &Value::Null);
        let ctx = crate::types::tests_support::ctx();
        let req = Request::new("retrieve");
        let mut v = "whatever-literal".to_string();
        assert!(t.expand_value(&ctx, &mut v, &req).unwrap());
        assert_eq!(v, "whatever-literal");
    }
}

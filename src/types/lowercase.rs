use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::Value;

/// Canonicalises via case fold.
pub struct TypeLowercase {
    base: TypeBase,
}

impl TypeLowercase {
    pub fn new(name: &str, settings: &Value) -> Self {
        TypeLowercase {
            base: TypeBase::new(name, settings),
        }
    }
}

impl Type for TypeLowercase {
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
        *value = value.to_ascii_lowercase();
        Ok(true)
    }
}

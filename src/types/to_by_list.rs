//! Range-token expansion: `a to b [by c]` → `a, a+c, a+2c, ..., <=b`.
//!
//! Grounded directly in the original `TypeToByList<EL,BY>::expandRanges`:
//! the starting value is already present in the output (pushed as an
//! ordinary pass-through token before `to` is seen); the loop computes
//! `j = from` then repeatedly `j += by` *before* testing and pushing, so the
//! starting value is never re-emitted by the range itself; `by == 0` is a
//! hard error; the sign of `by` must agree with the direction of `to - from`
//! or it's a hard error; any failure while incrementing or formatting a step
//! silently stops generation instead of failing the whole expansion.

use super::{ExpandContext, Type};
use crate::error::MarsError;
use crate::value::{as_scalar_string, Value};

/// An element/step type usable as the endpoints of a `to [by N]` range.
pub trait ByListElement: Copy + PartialOrd {
    fn parse(s: &str) -> Result<Self, MarsError>;
    fn format(&self) -> String;
    /// `self + step`, or `None` on overflow/out-of-domain.
    fn add(&self, step: Self) -> Option<Self>;
    fn is_zero(&self) -> bool;
    fn is_positive(&self) -> bool;
}

impl ByListElement for i64 {
    fn parse(s: &str) -> Result<Self, MarsError> {
        s.parse().map_err(|_| MarsError::RangeInconsistency {
            keyword: "to-by-list".to_string(),
            reason: format!("'{s}' is not an integer"),
        })
    }
    fn format(&self) -> String {
        self.to_string()
    }
    fn add(&self, step: Self) -> Option<Self> {
        self.checked_add(step)
    }
    fn is_zero(&self) -> bool {
        *self == 0
    }
    fn is_positive(&self) -> bool {
        *self > 0
    }
}

impl ByListElement for f64 {
    fn parse(s: &str) -> Result<Self, MarsError> {
        s.parse().map_err(|_| MarsError::RangeInconsistency {
            keyword: "to-by-list".to_string(),
            reason: format!("'{s}' is not a number"),
        })
    }
    fn format(&self) -> String {
        let mut s = format!("{self}");
        if !s.contains('.') && s.parse::<f64>().map(|v| v.fract() == 0.0).unwrap_or(false) {
            // keep integral floats plain, matching TypeFloat's own tidy form
        }
        if s.ends_with(".0") {
            s.truncate(s.len() - 2);
        }
        s
    }
    fn add(&self, step: Self) -> Option<Self> {
        let r = self + step;
        r.is_finite().then_some(r)
    }
    fn is_zero(&self) -> bool {
        *self == 0.0
    }
    fn is_positive(&self) -> bool {
        *self > 0.0
    }
}

fn is_to_token(s: &str) -> bool {
    s.eq_ignore_ascii_case("to") || s.eq_ignore_ascii_case("t0")
}

/// Holds the configured step size string (`by`, default `"1"`) and expands
/// `to`/`by` tokens using the owning [`Type`]'s `tidy` for canonicalising
/// every endpoint and generated value.
pub struct TypeToByList<T: ByListElement> {
    by: String,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ByListElement> TypeToByList<T> {
    pub fn new(settings: &Value) -> Self {
        let by = settings
            .get("by")
            .and_then(as_scalar_string)
            .unwrap_or_else(|| "1".to_string());
        TypeToByList {
            by,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn expand_ranges(
        &self,
        owner: &dyn Type,
        ctx: &ExpandContext,
        values: &mut Vec<String>,
    ) -> Result<(), MarsError> {
        let mut newval = Vec::with_capacity(values.len());
        let mut i = 0usize;

        while i < values.len() {
            if is_to_token(&values[i]) {
                if newval.is_empty() {
                    return Err(MarsError::RangeInconsistency {
                        keyword: owner.name().to_string(),
                        reason: "'to' must be preceded by a starting value".to_string(),
                    });
                }
                if i + 1 >= values.len() {
                    return Err(MarsError::RangeInconsistency {
                        keyword: owner.name().to_string(),
                        reason: "'to' must be followed by an ending value".to_string(),
                    });
                }

                let from_s = owner.tidy(ctx, &values[i - 1])?;
                let to_s = owner.tidy(ctx, &values[i + 1])?;
                let from = T::parse(&from_s)?;
                let to = T::parse(&to_s)?;

                let has_by = i + 2 < values.len() && values[i + 2].eq_ignore_ascii_case("by");
                let by_str = if has_by {
                    if i + 3 >= values.len() {
                        return Err(MarsError::RangeInconsistency {
                            keyword: owner.name().to_string(),
                            reason: "'by' must be followed by a step size".to_string(),
                        });
                    }
                    values[i + 3].clone()
                } else {
                    self.by.clone()
                };
                let by = T::parse(&by_str)?;

                if by.is_zero() {
                    return Err(MarsError::RangeInconsistency {
                        keyword: owner.name().to_string(),
                        reason: "'by' value cannot be zero".to_string(),
                    });
                }

                if by.is_positive() {
                    if to < from {
                        return Err(MarsError::RangeInconsistency {
                            keyword: owner.name().to_string(),
                            reason: "'from' value cannot be greater than 'to' value".to_string(),
                        });
                    }
                } else if from < to {
                    return Err(MarsError::RangeInconsistency {
                        keyword: owner.name().to_string(),
                        reason: "'from' value cannot be lower than 'to' value".to_string(),
                    });
                }

                let mut j = from;
                loop {
                    let Some(next) = j.add(by) else { break };
                    j = next;
                    if by.is_positive() {
                        if to < j {
                            break;
                        }
                    } else if j < to {
                        break;
                    }
                    match owner.tidy(ctx, &j.format()) {
                        Ok(s) => newval.push(s),
                        Err(_) => break,
                    }
                }

                i += if has_by { 4 } else { 2 };
            } else {
                newval.push(owner.tidy(ctx, &values[i])?);
                i += 1;
            }
        }

        *values = newval;
        Ok(())
    }
}

use chrono::{Datelike, Duration, NaiveDate};

use super::to_by_list::{ByListElement, TypeToByList};
use super::{ExpandContext, Type, TypeBase};
use crate::error::MarsError;
use crate::request::Request;
use crate::value::Value;

/// A canonical `YYYYMMDD` date, steppable by whole days — the element/step
/// type backing `date`'s `to [by N]` ranges (e.g. `date=-5/to/-1`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct DateDay(i64);

impl ByListElement for DateDay {
    /// Endpoints arrive already tidied to full `YYYYMMDD`; the `by` step is
    /// a plain day count (e.g. `"1"`) and is stored as a raw delta — adding
    /// it to an endpoint's days-from-epoch count naturally steps by that
    /// many days, matching the original's `TypeToByList<Date, long>` split
    /// between the element and step types.
    fn parse(s: &str) -> Result<Self, MarsError> {
        if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
            let date = NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| MarsError::InvalidValue {
                keyword: "date".to_string(),
                value: s.to_string(),
                reason: "not a canonical date".to_string(),
            })?;
            return Ok(DateDay(date.num_days_from_ce() as i64));
        }
        let n: i64 = s.parse().map_err(|_| MarsError::InvalidValue {
            keyword: "date".to_string(),
            value: s.to_string(),
            reason: "not a valid day-count step".to_string(),
        })?;
        Ok(DateDay(n))
    }
    fn format(&self) -> String {
        chrono::NaiveDate::from_num_days_from_ce_opt(self.0 as i32)
            .expect("in-range day count")
            .format("%Y%m%d")
            .to_string()
    }
    fn add(&self, step: Self) -> Option<Self> {
        Some(DateDay(self.0 + step.0))
    }
    fn is_zero(&self) -> bool {
        self.0 == 0
    }
    fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_name(token: &str, keyword: &str) -> Result<&'static str, MarsError> {
    if token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let m: usize = token.parse().map_err(|_| MarsError::InvalidValue {
            keyword: keyword.to_string(),
            value: token.to_string(),
            reason: "not a valid month".to_string(),
        })?;
        return MONTHS.get(m.wrapping_sub(1)).copied().ok_or_else(|| {
            MarsError::InvalidValue {
                keyword: keyword.to_string(),
                value: token.to_string(),
                reason: "not a valid month".to_string(),
            }
        });
    }

    let lower = token.to_ascii_lowercase();
    let prefix = lower.get(0..3).unwrap_or(&lower);
    MONTHS
        .iter()
        .find(|m| **m == prefix)
        .copied()
        .ok_or_else(|| MarsError::InvalidValue {
            keyword: keyword.to_string(),
            value: token.to_string(),
            reason: "not a valid month name".to_string(),
        })
}

fn parse_full_date(token: &str, keyword: &str) -> Result<NaiveDate, MarsError> {
    for fmt in ["%Y%m%d", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(token, fmt) {
            return Ok(d);
        }
    }
    Err(MarsError::InvalidValue {
        keyword: keyword.to_string(),
        value: token.to_string(),
        reason: "not a valid date".to_string(),
    })
}

/// Canonicalises relative offsets (`-5`, `0`), `year-dayOfYear` (`2018-23`),
/// climate `month-day`/`month` forms, and full dates to `YYYYMMDD`.
pub struct TypeDate {
    base: TypeBase,
    to_by_list: TypeToByList<DateDay>,
}

impl TypeDate {
    pub fn new(name: &str, settings: &Value) -> Self {
        let mut base = TypeBase::new(name, settings);
        base.multiple = true;
        TypeDate {
            base,
            to_by_list: TypeToByList::new(settings),
        }
    }
}

impl Type for TypeDate {
    fn base(&self) -> &TypeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TypeBase {
        &mut self.base
    }

    fn expand_value(
        &self,
        ctx: &ExpandContext,
        value: &mut String,
        _request: &Request,
    ) -> Result<bool, MarsError> {
        if value.is_empty() {
            return Ok(true);
        }

        let first = value.as_bytes()[0];
        if first == b'0' || first == b'-' {
            let n: i64 = match value.parse() {
                Ok(n) => n,
                Err(_) => {
                    return Err(MarsError::InvalidValue {
                        keyword: self.name().to_string(),
                        value: value.clone(),
                        reason: "not a valid relative date offset".to_string(),
                    })
                }
            };
            if n <= 0 {
                let today = ctx.clock.today();
                let date = today + Duration::days(n);
                *value = date.format("%Y%m%d").to_string();
            }
            return Ok(true);
        }

        let tokens: Vec<&str> = value.splitn(2, '-').collect();
        if tokens.len() == 2 {
            let head = tokens[0];
            if head.chars().next().is_some_and(|c| c.is_ascii_digit()) && head.len() > 2 {
                let year: i32 = head.parse().map_err(|_| MarsError::InvalidValue {
                    keyword: self.name().to_string(),
                    value: value.clone(),
                    reason: "invalid year".to_string(),
                })?;
                let doy: u32 = tokens[1].parse().map_err(|_| MarsError::InvalidValue {
                    keyword: self.name().to_string(),
                    value: value.clone(),
                    reason: "invalid day-of-year".to_string(),
                })?;
                let date = NaiveDate::from_yo_opt(year, doy).ok_or_else(|| MarsError::InvalidValue {
                    keyword: self.name().to_string(),
                    value: value.clone(),
                    reason: "day-of-year out of range".to_string(),
                })?;
                *value = date.format("%Y%m%d").to_string();
            } else {
                let m = month_name(head, self.name())?;
                let d: u32 = tokens[1].parse().map_err(|_| MarsError::InvalidValue {
                    keyword: self.name().to_string(),
                    value: value.clone(),
                    reason: "invalid day".to_string(),
                })?;
                *value = format!("{m}-{d}");
            }
            return Ok(true);
        }

        if !value.chars().next().is_some_and(|c| c.is_ascii_digit()) || value.len() <= 2 {
            *value = month_name(value, self.name())?.to_string();
            return Ok(true);
        }

        let date = parse_full_date(value, self.name())?;
        *value = date.format("%Y%m%d").to_string();
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

    fn pass2(&self, ctx: &ExpandContext, request: &mut Request) -> Result<(), MarsError> {
        if let Ok(values) = request.values(self.name(), true)
            && values.len() == 1
            && values[0] == "-1"
        {
            let mut v = values[0].clone();
            self.expand_value(ctx, &mut v, request)?;
            request.set_value(self.name(), v);
        }
        Ok(())
    }
}

/// Keep only values whose day-of-month is in `filter`; climate-daily
/// filtering, mirroring the original's `filters_["day"]` hook.
pub fn filter_by_day(filter: &[i64], values: &mut Vec<String>) -> bool {
    values.retain(|v| {
        day_of(v)
            .map(|d| filter.contains(&d))
            .unwrap_or(true)
    });
    !values.is_empty()
}

fn day_of(value: &str) -> Option<i64> {
    if let Some((month, day)) = value.split_once('-') {
        if !month.chars().next()?.is_ascii_digit() {
            return day.parse().ok();
        }
    }
    if value.len() == 8 {
        return value[6..8].parse().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests_support::ctx;

    #[test]
    fn negative_offset_resolves_against_the_clock() {
        let t = TypeDate::new("date", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "-5".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "20240101");
    }

    #[test]
    fn zero_offset_is_today() {
        let t = TypeDate::new("date", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "0".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "20240106");
    }

    #[test]
    fn year_day_of_year_expands_to_full_date() {
        let t = TypeDate::new("date", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "2018-23".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "20180123");
    }

    #[test]
    fn month_day_climate_form() {
        let t = TypeDate::new("date", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "jan-15".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "jan-15");
    }

    #[test]
    fn bare_month_number_is_a_climate_monthly_form() {
        let t = TypeDate::new("date", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "5".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "may");
    }

    #[test]
    fn full_date_is_canonicalised() {
        let t = TypeDate::new("date", &Value::Null);
        let req = Request::new("retrieve");
        let mut v = "2024-01-06".to_string();
        assert!(t.expand_value(&ctx(), &mut v, &req).unwrap());
        assert_eq!(v, "20240106");
    }
}

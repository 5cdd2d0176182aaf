//! Top-level `key=regex` predicate evaluator, used to build select/exclude
//! filters over requests.
//!
//! Grounded in `Matcher.cc`/`Matcher.h`: parse a comma-separated
//! `key=regex,key=regex` expression into a key→regex map, then match a
//! request against every condition (`All` — every condition must hold) with
//! a configurable policy for how a multi-valued keyword is judged (`Any` —
//! one matching value suffices, or `All` — every value must match) and for
//! keywords the matcher mentions but the request doesn't have
//! (`match_on_missing`).

use std::collections::HashMap;

use regex::Regex;

use crate::error::MarsError;
use crate::request::Request;

/// How a multi-valued keyword is judged against its regex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Every value for the keyword must match.
    All,
    /// At least one value for the keyword must match.
    Any,
}

fn parse_key_regex_list(expr: &str) -> Result<HashMap<String, Regex>, MarsError> {
    let mut out = HashMap::new();
    if expr.is_empty() {
        return Ok(out);
    }

    for item in expr.split(',') {
        let mut kv = item.splitn(2, '=');
        let (Some(key), Some(val)) = (kv.next(), kv.next()) else {
            return Err(MarsError::ParseError {
                line: 0,
                detail: format!("invalid condition '{item}' in expression '{expr}'"),
            });
        };
        if out.contains_key(key) {
            return Err(MarsError::ParseError {
                line: 0,
                detail: format!("duplicate key '{key}' in expression '{expr}'"),
            });
        }
        let re = Regex::new(val).map_err(|e| MarsError::ParseError {
            line: 0,
            detail: format!("invalid regex for '{key}': {e}"),
        })?;
        out.insert(key.to_string(), re);
    }
    Ok(out)
}

/// Matches requests against a set of `key=regex` conditions.
pub struct Matcher {
    regex_map: HashMap<String, Regex>,
    policy: Policy,
}

impl Matcher {
    /// Build a matcher from a `key=regex,key=regex` expression, e.g.
    /// `"expver=(0001|o[0-9a-z]{3}),dataset=^climate-dt$"`.
    pub fn new(expr: &str, policy: Policy) -> Result<Self, MarsError> {
        Ok(Matcher {
            regex_map: parse_key_regex_list(expr)?,
            policy,
        })
    }

    pub fn from_map(regex_map: HashMap<String, Regex>, policy: Policy) -> Self {
        Matcher { regex_map, policy }
    }

    /// `request` matches iff every condition holds. A keyword the matcher
    /// mentions but `request` lacks is judged by `match_on_missing`.
    pub fn matches(&self, request: &Request, match_on_missing: bool) -> bool {
        self.regex_map.iter().all(|(keyword, re)| {
            let Ok(values) = request.values(keyword, false) else { return match_on_missing };
            let pred = |s: &String| re.is_match(s);
            match self.policy {
                Policy::Any => values.iter().any(pred),
                Policy::All => values.iter().all(pred),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        let mut r = Request::new("retrieve");
        r.set_values("expver", vec!["0001".into()]);
        r.set_values("param", vec!["129".into(), "130".into()]);
        r
    }

    #[test]
    fn matches_when_every_condition_holds() {
        let m = Matcher::new("expver=^000[0-9]$", Policy::Any).unwrap();
        assert!(m.matches(&request(), false));
    }

    #[test]
    fn any_policy_needs_only_one_matching_value() {
        let m = Matcher::new("param=^129$", Policy::Any).unwrap();
        assert!(m.matches(&request(), false));
    }

    #[test]
    fn all_policy_needs_every_value_to_match() {
        let m = Matcher::new("param=^1(29|30)$", Policy::All).unwrap();
        assert!(m.matches(&request(), false));

        let m = Matcher::new("param=^129$", Policy::All).unwrap();
        assert!(!m.matches(&request(), false));
    }

    #[test]
    fn missing_keyword_follows_match_on_missing_flag() {
        let m = Matcher::new("stream=^oper$", Policy::Any).unwrap();
        assert!(m.matches(&request(), true));
        assert!(!m.matches(&request(), false));
    }

    #[test]
    fn duplicate_key_in_expression_is_rejected() {
        assert!(Matcher::new("expver=a,expver=b", Policy::Any).is_err());
    }
}

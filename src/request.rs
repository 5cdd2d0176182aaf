//! The `Request` data model: an ordered keyword → values mapping.
//!
//! Keys are stored in insertion order; all introspection preserves that
//! order. A `Request` never owns a pointer back to the `Type` that produced
//! it — the original's "weak reference into the owning `Language`" becomes,
//! in this crate, a plain keyword-name lookup performed by the `Language`
//! that owns the types (see `DESIGN.md`).

use crate::error::MarsError;

/// A single parsed or expanded MARS request: a verb plus ordered keyword
/// values.
#[derive(Debug, Clone)]
pub struct Request {
    verb: String,
    keys: Vec<String>,
    values: std::collections::HashMap<String, Vec<String>>,
}

/// Two requests are equal iff same verb, same keyword set (order-independent),
/// and same value order per keyword.
impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.verb == other.verb
            && self.keys.len() == other.keys.len()
            && self.values == other.values
    }
}

impl Eq for Request {}

impl Request {
    pub fn new(verb: impl Into<String>) -> Self {
        Request {
            verb: verb.into(),
            keys: Vec::new(),
            values: std::collections::HashMap::new(),
        }
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Rewrite the verb in place, e.g. once it's been resolved from an
    /// alias (`ret` → `retrieve`) to its canonical form.
    pub fn set_verb(&mut self, verb: impl Into<String>) {
        self.verb = verb.into();
    }

    /// Ordered list of keywords currently present.
    pub fn params(&self) -> &[String] {
        &self.keys
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn count_values(&self, key: &str) -> usize {
        self.values.get(key).map(|v| v.len()).unwrap_or(0)
    }

    /// Return the ordered values for `key`. If `allow_missing` is false and
    /// the keyword is absent, this is an error; otherwise an absent keyword
    /// yields an empty slice.
    pub fn values(&self, key: &str, allow_missing: bool) -> Result<&[String], MarsError> {
        match self.values.get(key) {
            Some(v) => Ok(v.as_slice()),
            None if allow_missing => Ok(&[]),
            None => Err(MarsError::InvalidValue {
                keyword: key.to_string(),
                value: String::new(),
                reason: "keyword not present in request".to_string(),
            }),
        }
    }

    /// Install `values` under `key`, replacing any prior values. Records the
    /// keyword in insertion order the first time it's set.
    pub fn set_values(&mut self, key: &str, values: Vec<String>) {
        if !self.values.contains_key(key) {
            self.keys.push(key.to_string());
        }
        self.values.insert(key.to_string(), values);
    }

    pub fn set_value(&mut self, key: &str, value: impl Into<String>) {
        self.set_values(key, vec![value.into()]);
    }

    pub fn unset_values(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.keys.retain(|k| k != key);
        }
    }

    /// Set-union of values per keyword, following `self`'s axis-sort; keys
    /// present only in `other` are appended after `self`'s keys in `other`'s
    /// order.
    pub fn merge(&mut self, other: &Request) {
        for key in &other.keys {
            let incoming = other.values.get(key).cloned().unwrap_or_default();
            match self.values.get_mut(key) {
                Some(existing) => {
                    for v in incoming {
                        if !existing.contains(&v) {
                            existing.push(v);
                        }
                    }
                }
                None => {
                    self.keys.push(key.clone());
                    self.values.insert(key.clone(), incoming);
                }
            }
        }
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.verb)?;
        for key in &self.keys {
            let vals = &self.values[key];
            write!(f, ",{key}={}", vals.join("/"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_preserved() {
        let mut r = Request::new("retrieve");
        r.set_value("class", "od");
        r.set_value("stream", "oper");
        assert_eq!(r.params(), &["class".to_string(), "stream".to_string()]);
    }

    #[test]
    fn unset_removes_key_and_order_entry() {
        let mut r = Request::new("retrieve");
        r.set_value("class", "od");
        r.unset_values("class");
        assert!(!r.has("class"));
        assert!(r.params().is_empty());
    }

    #[test]
    fn merge_unions_values_without_duplicating() {
        let mut a = Request::new("retrieve");
        a.set_values("param", vec!["129".into()]);
        let mut b = Request::new("retrieve");
        b.set_values("param", vec!["129".into(), "130".into()]);
        a.merge(&b);
        assert_eq!(a.values("param", false).unwrap(), &["129", "130"]);
    }

    #[test]
    fn equality_requires_same_verb_keys_and_order() {
        let mut a = Request::new("retrieve");
        a.set_value("class", "od");
        let mut b = Request::new("retrieve");
        b.set_value("class", "od");
        assert_eq!(a, b);
    }
}

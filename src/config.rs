//! Environment knobs recognised by the request language engine.
//!
//! Mirrors the original resource defaults: `strict_mode` defaults to `true`
//! (the historical `eckit::Resource<bool>` default for the language strict
//! flag), the other two default to `false`.

/// Resolved configuration for a [`crate::language::Language`] / the param
/// resolver's initialisation mode.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// `METKIT_LANGUAGE_STRICT_MODE`: reject non-exact `best_match` results.
    pub strict_mode: bool,
    /// `METKIT_LEGACY_PARAM_CHECK`: skip short-name filtering of param rules.
    pub legacy_param_check: bool,
    /// `METKIT_RAW_PARAM`: install only the empty fallback param rule.
    pub raw_param: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strict_mode: true,
            legacy_param_check: false,
            raw_param: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            strict_mode: env_bool("METKIT_LANGUAGE_STRICT_MODE", true),
            legacy_param_check: env_bool("METKIT_LEGACY_PARAM_CHECK", false),
            raw_param: env_bool("METKIT_RAW_PARAM", false),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

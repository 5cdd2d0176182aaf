//! Actionable typed errors for the MARS request language engine.
//!
//! Each variant includes enough context for the caller to understand what
//! went wrong: the failing keyword, the offending literal, the candidate
//! set, and (for parsed input) the source line. Internal propagation always
//! uses [`MarsError`] — this crate never surfaces `anyhow`.

/// Errors raised while parsing, expanding, or inspecting a MARS request.
#[derive(Debug, thiserror::Error)]
pub enum MarsError {
    /// Malformed request text.
    #[error("parse error at line {line}: {detail}")]
    ParseError { line: usize, detail: String },

    /// The verb (first token) is not known to the grammar.
    #[error("unknown verb '{verb}'. Known verbs: {}", known.join(", "))]
    UnknownVerb { verb: String, known: Vec<String> },

    /// A keyword did not prefix-match any candidate in the active grammar.
    #[error("unknown keyword '{keyword}' for verb '{verb}'. Known keywords: {}", known.join(", "))]
    UnknownKeyword {
        verb: String,
        keyword: String,
        known: Vec<String>,
    },

    /// Prefix matching found more than one surviving candidate.
    #[error("ambiguous {what} '{input}': candidates are {}", candidates.join(", "))]
    Ambiguous {
        what: &'static str,
        input: String,
        candidates: Vec<String>,
    },

    /// A type rejected a literal value outright.
    #[error("invalid value '{value}' for keyword '{keyword}': {reason}")]
    InvalidValue {
        keyword: String,
        value: String,
        reason: String,
    },

    /// A `to [by N]` range token was inconsistent (bad direction, zero step, ...).
    #[error("range inconsistency in keyword '{keyword}': {reason}")]
    RangeInconsistency { keyword: String, reason: String },

    /// An `only`/`never` constraint was violated under strict mode.
    #[error("constraint violation on keyword '{keyword}': {reason}")]
    ConstraintViolation { keyword: String, reason: String },

    /// The parameter resolver could not find a matching rule or id.
    #[error("cannot resolve parameter '{token}': {reason}")]
    ResolverFailure { token: String, reason: String },

    /// A grammar document could not be read or did not have the expected shape.
    #[error("failed to load grammar document {}: {detail}", path.display())]
    GrammarLoadError {
        path: std::path::PathBuf,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, MarsError>;

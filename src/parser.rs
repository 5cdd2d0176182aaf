//! Tokeniser for the textual MARS request syntax.
//!
//! Grammar (informative EBNF):
//! ```text
//! request := verb ( ',' pair )* ( '.' | NL )
//! pair    := key '=' value ( '/' value )*
//! value   := quoted | token
//! ```
//!
//! The parser performs no semantic validation — it only produces the raw
//! key→values skeleton plus a source line number for diagnostics. Keyword
//! resolution and value typing happen later, in [`crate::language::Language`].

use crate::error::MarsError;
use crate::request::Request;

/// A request as produced by the parser: untyped values plus source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub request: Request,
    pub line: usize,
}

/// Parse one or more requests from MARS request text.
///
/// `#` starts a line comment. Requests are separated by newlines and/or a
/// trailing `.` terminator on the last token of a request (accepted for
/// tolerance with hand-written request files).
pub fn parse(text: &str) -> Result<Vec<ParsedRequest>, MarsError> {
    let mut out = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line = line.strip_suffix('.').unwrap_or(line).trim();
        if line.is_empty() {
            continue;
        }
        out.push(parse_line(line, line_no)?);
    }
    Ok(out)
}

fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_line(line: &str, line_no: usize) -> Result<ParsedRequest, MarsError> {
    let groups = split_top_level(line, ',');
    let (verb, rest) = groups.split_first().ok_or_else(|| MarsError::ParseError {
        line: line_no,
        detail: "empty request".to_string(),
    })?;
    let verb = verb.trim();
    if verb.is_empty() {
        return Err(MarsError::ParseError {
            line: line_no,
            detail: "missing verb".to_string(),
        });
    }

    let mut request = Request::new(verb.to_ascii_lowercase());
    for pair in rest {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let eq = pair.find('=').ok_or_else(|| MarsError::ParseError {
            line: line_no,
            detail: format!("expected 'key=value' in '{pair}'"),
        })?;
        let key = pair[..eq].trim();
        let value_part = &pair[eq + 1..];
        if key.is_empty() {
            return Err(MarsError::ParseError {
                line: line_no,
                detail: format!("empty keyword in '{pair}'"),
            });
        }
        let values = split_top_level(value_part, '/')
            .into_iter()
            .map(unquote)
            .collect::<Vec<_>>();
        request.set_values(key, values);
    }

    Ok(ParsedRequest {
        request,
        line: line_no,
    })
}

/// Split `text` on `sep` at top level, respecting double-quoted spans so a
/// separator inside quotes is not treated as a delimiter.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                out.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    out.push(current);
    out
}

/// Strip one layer of surrounding double quotes; no escape processing beyond
/// opening/closing quotes.
fn unquote(token: String) -> String {
    let trimmed = token.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verb_and_keyword_value_pairs() {
        let parsed = parse("retrieve,class=od,stream=oper").unwrap();
        assert_eq!(parsed.len(), 1);
        let req = &parsed[0].request;
        assert_eq!(req.verb(), "retrieve");
        assert_eq!(req.values("class", false).unwrap(), &["od"]);
        assert_eq!(req.values("stream", false).unwrap(), &["oper"]);
    }

    #[test]
    fn parses_slash_separated_value_lists() {
        let parsed = parse("retrieve,param=t/u/v").unwrap();
        assert_eq!(
            parsed[0].request.values("param", false).unwrap(),
            &["t", "u", "v"]
        );
    }

    #[test]
    fn strips_comments_and_blank_lines() {
        let parsed = parse("# comment\n\nretrieve,class=od # trailing\n").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].line, 3);
    }

    #[test]
    fn accepts_trailing_dot_terminator() {
        let parsed = parse("retrieve,class=od.").unwrap();
        assert_eq!(parsed[0].request.values("class", false).unwrap(), &["od"]);
    }

    #[test]
    fn quoted_values_preserve_internal_separators() {
        let parsed = parse(r#"retrieve,target="a,b/c""#).unwrap();
        assert_eq!(
            parsed[0].request.values("target", false).unwrap(),
            &["a,b/c"]
        );
    }

    #[test]
    fn missing_verb_is_a_parse_error() {
        let err = parse(",class=od").unwrap_err();
        assert!(matches!(err, MarsError::ParseError { .. }));
    }

    #[test]
    fn malformed_pair_without_equals_is_a_parse_error() {
        let err = parse("retrieve,classod").unwrap_err();
        assert!(matches!(err, MarsError::ParseError { .. }));
    }
}

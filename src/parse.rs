use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("pattern `{pattern}` not found in output: {text:?}")]
    NoMatch { pattern: String, text: String },
    #[error("value `{value}` matched by `{pattern}` is not a number")]
    NotANumber { pattern: String, value: String },
    #[error("malformed {tool} output: {message}")]
    Malformed { tool: &'static str, message: String },
}

/// Compiles `pattern` on first use and hands out the same regex afterwards.
pub fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static probe pattern must compile"))
}

/// Extracts capture group 1 of the first match of `regex` in `text` as a float.
pub fn parse_number(text: &str, regex: &Regex) -> Result<f64, ParseError> {
    let captured = regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ParseError::NoMatch {
            pattern: regex.as_str().to_string(),
            text: text.to_string(),
        })?;

    captured
        .as_str()
        .trim()
        .parse::<f64>()
        .map_err(|_| ParseError::NotANumber {
            pattern: regex.as_str().to_string(),
            value: captured.as_str().to_string(),
        })
}

/// Parses a single integer such as the contents of a sysctl pseudo-file.
pub fn parse_integer(tool: &'static str, text: &str) -> Result<u64, ParseError> {
    let trimmed = text.trim();
    trimmed.parse::<u64>().map_err(|_| ParseError::Malformed {
        tool,
        message: format!("expected an integer, got {trimmed:?}"),
    })
}

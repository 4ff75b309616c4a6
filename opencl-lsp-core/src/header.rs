//! LSP header-line parsing.

use once_cell::sync::Lazy;
use regex::Regex;

pub static HEADER_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]+):\s*(.+?)\s*$").expect("static header regex is valid"));

/// Parse one already-CRLF-stripped header line into `(name, value)`.
///
/// Returns `None` for a line that doesn't match `Name: Value` at all — the caller
/// treats that as a malformed header block (`InvalidRequest`).
pub fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let captures = HEADER_LINE_RE.captures(line)?;
    let name = captures.get(1)?.as_str();
    let value = captures.get(2)?.as_str();
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_length() {
        assert_eq!(
            parse_header_line("Content-Length: 42"),
            Some(("Content-Length", "42"))
        );
    }

    #[test]
    fn trims_surrounding_whitespace_in_value() {
        assert_eq!(
            parse_header_line("Content-Type:   application/json  "),
            Some(("Content-Type", "application/json"))
        );
    }

    #[test]
    fn rejects_line_with_no_colon() {
        assert_eq!(parse_header_line("garbage"), None);
    }
}

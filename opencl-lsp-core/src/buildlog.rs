//! OpenCL build-log → LSP `Diagnostic` translation.

use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};
use once_cell::sync::Lazy;
use regex::Regex;

pub static BUILD_LOG_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*):(\d+):(\d+): ((?:fatal )?error|warning): (.*)$")
        .expect("static build log regex is valid")
});

/// Parse one non-empty build-log line into a diagnostic, per the regex pinned above.
///
/// Returns `None` for lines that don't match the pattern at all, and also for lines
/// that match but carry a severity phrase other than `error`/`fatal error`/`warning`
/// (the regex only ever captures those three, so in practice this only happens if the
/// capture group 4 is empty, which the pattern prevents — kept as an explicit match
/// arm so a future loosening of the regex fails closed rather than panicking).
///
/// Column handling is deliberately a pass-through: the compiler's column (1-based in
/// the common OpenCL ICDs) is copied into `character` unchanged. This is an open
/// question this module documents rather than resolves — an implementer
/// should confirm against the driver actually in use before "fixing" it.
///
/// `source_override` is the file's basename when `Source.file_path` was provided; when
/// it's `None`, each diagnostic's `source` field falls back to that line's own captured
/// source token (typically `<program source>` for a build from an in-memory string).
pub fn parse_build_log_line(line: &str, source_override: Option<&str>) -> Option<Diagnostic> {
    let captures = BUILD_LOG_LINE_RE.captures(line)?;

    let source_token = captures.get(1)?.as_str();
    let file_line: u32 = captures.get(2)?.as_str().parse().ok()?;
    let character: u32 = captures.get(3)?.as_str().parse().ok()?;
    let severity_phrase = captures.get(4)?.as_str();
    let message = captures.get(5)?.as_str().to_string();

    let severity = match severity_phrase {
        "error" | "fatal error" => DiagnosticSeverity::ERROR,
        "warning" => DiagnosticSeverity::WARNING,
        _ => return None,
    };

    let line = file_line.saturating_sub(1);
    let position = Position { line, character };
    let source = source_override.unwrap_or(source_token).to_string();

    Some(Diagnostic {
        range: Range {
            start: position,
            end: position,
        },
        severity: Some(severity),
        source: Some(source),
        message,
        ..Diagnostic::default()
    })
}

/// Split a raw build log into diagnostics, capping at `max_problems` and stripping a
/// trailing NUL byte some ICDs append to the log string.
pub fn parse_build_log(raw: &str, source_override: Option<&str>, max_problems: usize) -> Vec<Diagnostic> {
    let trimmed = raw.trim_end_matches('\0');

    let mut diagnostics = Vec::new();
    for line in trimmed.split('\n') {
        if line.is_empty() {
            continue;
        }
        if diagnostics.len() >= max_problems {
            break;
        }
        if let Some(diagnostic) = parse_build_log_line(line, source_override) {
            diagnostics.push(diagnostic);
        }
    }
    diagnostics
}

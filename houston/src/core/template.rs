//! Expansion of `${command}` markers in context templates.
//!
//! Markers are expanded left to right. Each distinct command runs once per line
//! and its stdout (trailing newlines trimmed) replaces every identical marker.
//! Substituted output is never re-scanned, so it may itself contain `${`.

use std::collections::HashMap;

use thiserror::Error;

const MARKER_OPEN: &str = "${";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated `${{` marker starting at column {column}")]
    Unterminated { column: usize },

    #[error("command '{command}' failed with exit code {exit_code} ({stderr})")]
    CommandFailed {
        command: String,
        exit_code: i32,
        /// First line of the command's stderr.
        stderr: String,
    },

    #[error("command '{command}' could not be started: {reason}")]
    Launch { command: String, reason: String },
}

/// Expand every `${...}` marker in `line` using `run` to execute commands.
///
/// `run` receives the text between `${` and its matching `}` and returns the
/// command's stdout. Repeated markers reuse the first output. The first error
/// aborts expansion; no partial result is returned.
pub fn expand_line<F>(line: &str, mut run: F) -> Result<String, TemplateError>
where
    F: FnMut(&str) -> Result<String, TemplateError>,
{
    let mut out = String::with_capacity(line.len());
    let mut outputs: HashMap<&str, String> = HashMap::new();
    let mut rest = line;
    let mut consumed = 0;

    while let Some(start) = rest.find(MARKER_OPEN) {
        let end = find_closing_brace(rest, start + 1).ok_or(TemplateError::Unterminated {
            column: consumed + start + 1,
        })?;
        let command = &rest[start + MARKER_OPEN.len()..end];
        if !outputs.contains_key(command) {
            let output = run(command)?;
            outputs.insert(command, output.trim_end_matches(['\n', '\r']).to_string());
        }

        out.push_str(&rest[..start]);
        out.push_str(&outputs[command]);
        consumed += end + 1;
        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Index of the `}` balancing the `{` at `open`, counting nested braces.
fn find_closing_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, byte) in text.bytes().enumerate().skip(open) {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

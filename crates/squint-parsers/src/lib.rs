//! Shared parsing utilities for scheduler command output.
//!
//! Nothing in here knows about SLURM field semantics; squint-slurm builds
//! on these helpers and squint-core uses the command wrappers for local
//! execution.

pub mod command;
pub mod time;

pub use command::{CommandError, output_lines, probe, run_command, run_shell};
pub use time::format_duration;

/// Filter helper for optional string fields.
/// Returns None if the string is empty or a placeholder value.
pub fn non_empty_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "N/A" || trimmed == "(null)" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a delimited line and require an exact field count.
///
/// Scheduler queries ask for a fixed field set, so a line with any other
/// count is structurally malformed and must not be guessed at.
pub fn split_delimited(line: &str, delimiter: char, expected: usize) -> Result<Vec<&str>, String> {
    let fields: Vec<&str> = line.split(delimiter).collect();
    if fields.len() != expected {
        return Err(format!(
            "Expected {} fields, got {}: {}",
            expected,
            fields.len(),
            line
        ));
    }
    Ok(fields)
}

/// Split on commas that are not inside `[...]` ranges.
///
/// `node[01-03,07],gpu1` yields `["node[01-03,07]", "gpu1"]`.
pub fn split_outside_brackets(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in s.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Remove one pair of surrounding double quotes, if present.
pub fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

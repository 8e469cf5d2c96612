//! Manifest format for backup runs.
//!
//! A manifest is UTF-8 text with one reference per line and no header. The
//! reader accepts a final line with or without a newline and ignores blank
//! lines; line order carries no meaning.

use std::collections::BTreeSet;

/// Parse manifest text into a reference set.
pub fn parse_manifest(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a reference set, one reference per line.
pub fn render_manifest(references: &BTreeSet<String>) -> String {
    let mut out = String::with_capacity(references.iter().map(|r| r.len() + 1).sum());
    for reference in references {
        out.push_str(reference);
        out.push('\n');
    }
    out
}

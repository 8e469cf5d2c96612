//! Archive file naming for exported references.

/// Encode a reference into a file-name-safe stem.
///
/// `/` becomes `_`, `@` becomes `__` and `:` becomes `___`, applied in that order.
pub fn encode_reference(reference: &str) -> String {
    reference
        .replace('/', "_")
        .replace('@', "__")
        .replace(':', "___")
}

/// File name of the exported archive for `reference`.
pub fn export_file_name(reference: &str) -> String {
    format!("{}.tar", encode_reference(reference))
}

//! Dialect-level column-identifier escaping.
//!
//! The downstream PostgREST-equivalent dialect treats a bare
//! `[A-Za-z0-9_]+` token as an identifier, but anything else — spaces,
//! punctuation, accented characters, an embedded `"` — must be quoted the
//! way PostgreSQL quotes identifiers: wrapped in double quotes with any
//! internal `"` doubled. Every column name the compiler emits MUST be routed
//! through `escape_identifier`; this is the single choke point so a future
//! change in downstream dialect only touches one function.

/// Quote `name` as a downstream identifier if it contains any character
/// outside `[A-Za-z0-9_]`. Bare names are returned unchanged so common
/// columns don't carry needless quoting.
pub fn escape_identifier(name: &str) -> String {
    if is_bare_identifier(name) {
        name.to_string()
    } else {
        let mut out = String::with_capacity(name.len() + 2);
        out.push('"');
        for c in name.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
        out
    }
}

fn is_bare_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Inverse of `escape_identifier`, for tests that assert the round trip.
/// Unwraps a (possibly) quoted identifier back to its raw column name.
pub fn unescape_identifier(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        let inner = &encoded[1..encoded.len() - 1];
        inner.replace("\"\"", "\"")
    } else {
        encoded.to_string()
    }
}

//! # Error Simplifier
//!
//! Extracts a human-readable sentence from deeply nested upstream error
//! chains so status reporting can show operators the actual problem instead
//! of the wrapping layers.

use regex::Regex;
use std::sync::OnceLock;

/// Marker emitted by the template collaborator when a template calls its
/// `fail` function with a user-supplied message.
const RENDER_FAIL_MARKER: &str = "invalid call to function 'fail': ";

/// Wrapper prefix the semantic validator puts in front of haproxy output.
const SEMANTIC_WRAPPER: &str = "haproxy validation failed:";

fn schema_error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"Error at "/(?P<field>[^"]+)":\s*(?P<constraint>[^\n]+)"#)
            .expect("schema error pattern is valid")
    })
}

fn schema_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"Value:\s*"(?P<value>[^"]*)""#).expect("schema value pattern is valid")
    })
}

/// Reduce a validation error message to one sentence
///
/// Handles the two validator phases:
/// - schema errors of the form `Error at "/field": constraint` with an
///   optional `Value: "x"` block become `field constraint (got x)`;
/// - semantic errors lose their `haproxy validation failed:` wrappers while
///   the alert-with-context block is preserved.
///
/// Unrecognized messages pass through unchanged.
#[must_use]
pub fn simplify_validation_error(message: &str) -> String {
    if let Some(caps) = schema_error_re().captures(message) {
        let field = caps.name("field").map_or("", |m| m.as_str());
        let constraint = caps
            .name("constraint")
            .map_or("", |m| m.as_str())
            .trim_end_matches('.');
        let simplified = match schema_value_re().captures(message) {
            Some(value_caps) => {
                let value = value_caps.name("value").map_or("", |m| m.as_str());
                format!("{field} {constraint} (got {value})")
            }
            None => format!("{field} {constraint}"),
        };
        return simplified;
    }

    let mut stripped = message.trim();
    while let Some(rest) = stripped.strip_prefix(SEMANTIC_WRAPPER) {
        stripped = rest.trim_start();
    }
    stripped.to_string()
}

/// Extract the user message from a template rendering error chain
///
/// Template authors signal expected failures by calling `fail` with a
/// message; everything before the marker is machinery. Messages without the
/// marker pass through unchanged.
#[must_use]
pub fn simplify_rendering_error(message: &str) -> String {
    match message.rfind(RENDER_FAIL_MARKER) {
        Some(pos) => message[pos + RENDER_FAIL_MARKER.len()..]
            .trim()
            .to_string(),
        None => message.to_string(),
    }
}

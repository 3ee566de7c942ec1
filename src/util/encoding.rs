//! Text encoding helpers shared by the renderer and the diagram hydrator.
//!
//! Diagram sources travel inside an HTML attribute, so the renderer percent-encodes
//! them with the same character set browsers leave untouched in
//! `encodeURIComponent`, and the hydrator reverses that strictly.

use std::borrow::Cow;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

/// Characters escaped by `encodeURIComponent`: everything except ASCII
/// alphanumerics and `- _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Entity replacements applied to decoded diagram sources, in order.
const ENTITY_REPLACEMENTS: [(&str, &str); 7] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&#x27;", "'"),
    ("&#x2F;", "/"),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PercentDecodeError {
    #[error("malformed percent escape at byte {offset}")]
    MalformedEscape { offset: usize },
    #[error("decoded bytes are not valid UTF-8: {message}")]
    InvalidUtf8 { message: String },
}

pub fn encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Strict inverse of [`encode_uri_component`]. Unlike a lenient decoder, a `%`
/// that is not followed by two hex digits is an error rather than a literal.
pub fn decode_uri_component(value: &str) -> Result<String, PercentDecodeError> {
    let bytes = value.as_bytes();
    let mut offset = 0;
    while offset < bytes.len() {
        if bytes[offset] == b'%' {
            let valid = bytes
                .get(offset + 1..offset + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(PercentDecodeError::MalformedEscape { offset });
            }
            offset += 3;
        } else {
            offset += 1;
        }
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|err| PercentDecodeError::InvalidUtf8 {
            message: err.to_string(),
        })
}

/// Reverse the handful of entities an upstream escaper may have left in a
/// diagram source.
pub fn unescape_entities(value: &str) -> String {
    ENTITY_REPLACEMENTS
        .iter()
        .fold(value.to_string(), |acc, (entity, replacement)| {
            acc.replace(entity, replacement)
        })
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

//! Best-effort extraction of a JSON object from free-text model output.
//!
//! Multimodal models asked for "strictly JSON" still wrap the object in
//! prose, code fences, or trailing commentary. The extractor takes the
//! substring between the first `{` and the last `}` and attempts to parse it
//! as a JSON object. The two failure shapes are distinct so callers can store
//! the raw text under different fallback fields and retry later.

use serde_json::{Map, Value};

/// Outcome of a best-effort extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A JSON object was found and parsed.
    Object(Map<String, Value>),
    /// The text contains no brace-delimited region at all.
    NoBraces,
    /// A brace-delimited region exists but is not a valid JSON object.
    Malformed,
}

/// Extract the object between the first `{` and the last `}` of `text`.
///
/// A parsed value that is valid JSON but not an object (e.g. a bare string)
/// counts as [`Extraction::Malformed`]: the caller asked for keyed variants.
#[must_use]
pub fn extract_braced_object(text: &str) -> Extraction {
    let Some(start) = text.find('{') else {
        return Extraction::NoBraces;
    };
    let Some(end) = text.rfind('}') else {
        return Extraction::NoBraces;
    };
    if end < start {
        // A lone `}` before the first `{` is no usable region either.
        return Extraction::NoBraces;
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Extraction::Object(map),
        Ok(_) | Err(_) => Extraction::Malformed,
    }
}

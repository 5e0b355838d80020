//! Wire guard: the single checkpoint between binary and text.
//!
//! The outbound response is serialized to a JSON value and walked in full.
//! Any of the following is a [`PipelineError::SerializationViolation`]:
//!
//! - an object key naming raw binary (`bytes`, `binary`, `raw_bytes`,
//!   `img_static`), compared case-insensitively
//! - an `img_static_b64` value carrying a `data:` URI prefix instead of bare
//!   base64
//! - inside `export_bundle` only, an array of at least
//!   [`MIN_BYTE_ARRAY_LEN`] integers that all fit in a byte, which is how
//!   serde renders a `Vec<u8>`
//!
//! Caller metadata is passed through untouched, so integer arrays there are
//! legitimate. [`check_metadata`] applies the key and data-URI rules to it
//! up front, before any artifact is fetched.

use chartwire_types::{PipelineError, WireResponse};
use serde_json::{Map, Value};

/// Keys that must never appear in a wire payload.
pub const FORBIDDEN_KEYS: &[&str] = &["bytes", "binary", "raw_bytes", "img_static"];

/// Shortest integer array treated as serialized bytes.
pub const MIN_BYTE_ARRAY_LEN: usize = 16;

/// The subtree in which integer arrays are inspected.
const EXPORT_KEY: &str = "export_bundle";

/// Serialize `response` and verify it carries no raw binary.
///
/// Returns the checked JSON value so callers can emit exactly what was
/// inspected.
pub fn check_response(response: &WireResponse) -> Result<Value, PipelineError> {
    let value = serde_json::to_value(response)?;
    check_value(&value)?;
    Ok(value)
}

/// Verify a wire-shaped JSON value carries no raw binary.
pub fn check_value(value: &Value) -> Result<(), PipelineError> {
    let mut path = String::from("$");
    match value {
        Value::Object(map) => walk_object(map, &mut path, Scope::Root),
        other => walk(other, &mut path, Scope::Passthrough),
    }
}

/// Verify caller metadata carries no binary-named keys or data URIs.
///
/// Violations are reported under `$.metadata`.
pub fn check_metadata(metadata: &Map<String, Value>) -> Result<(), PipelineError> {
    walk_object(metadata, &mut String::from("$.metadata"), Scope::Passthrough)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Root,
    Passthrough,
    Export,
}

fn walk(value: &Value, path: &mut String, scope: Scope) -> Result<(), PipelineError> {
    match value {
        Value::Object(map) => walk_object(map, path, scope),
        Value::Array(items) => {
            if scope == Scope::Export && looks_like_bytes(items) {
                return Err(violation(
                    path,
                    format!("array of {} byte values", items.len()),
                ));
            }
            for (i, child) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{i}]"));
                walk(child, path, scope)?;
                path.truncate(len);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn walk_object(
    map: &Map<String, Value>,
    path: &mut String,
    scope: Scope,
) -> Result<(), PipelineError> {
    for (key, child) in map {
        let len = path.len();
        push_key(path, key);

        if FORBIDDEN_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
            return Err(violation(path, format!("binary field `{key}`")));
        }
        if key == "img_static_b64"
            && let Value::String(s) = child
            && s.trim_start().to_ascii_lowercase().starts_with("data:")
        {
            return Err(violation(path, "data URI in img_static_b64".into()));
        }

        let child_scope = match scope {
            Scope::Root if key == EXPORT_KEY => Scope::Export,
            Scope::Root => Scope::Passthrough,
            other => other,
        };
        walk(child, path, child_scope)?;
        path.truncate(len);
    }
    Ok(())
}

fn looks_like_bytes(items: &[Value]) -> bool {
    items.len() >= MIN_BYTE_ARRAY_LEN
        && items
            .iter()
            .all(|v| v.as_u64().is_some_and(|n| n <= u64::from(u8::MAX)))
}

fn push_key(path: &mut String, key: &str) {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        path.push('.');
        path.push_str(key);
    } else {
        path.push_str(&format!("[{key:?}]"));
    }
}

fn violation(path: &str, reason: String) -> PipelineError {
    PipelineError::SerializationViolation {
        path: path.to_string(),
        reason,
    }
}

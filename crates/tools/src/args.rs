//! Lenient coercion over dynamically typed tool arguments.
//!
//! Agents serialise numbers however their JSON stack likes; an integer
//! parameter may arrive as `3` or `3.0`. Coercion happens here, at the tool
//! boundary, and nowhere else.

use serde_json::Value;

use crate::ToolArgs;

pub fn get_str<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub fn get_bool(args: &ToolArgs, key: &str) -> Option<bool> {
    args.get(key).and_then(Value::as_bool)
}

/// Accepts integer and floating-point encodings of a non-negative integer.
pub fn get_u64(args: &ToolArgs, key: &str) -> Option<u64> {
    let value = args.get(key)?;
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f as u64)
}

pub fn get_f64(args: &ToolArgs, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

pub fn get_array<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a Vec<Value>> {
    args.get(key).and_then(Value::as_array)
}

/// Required-string accessor with a user-facing error message.
pub fn require_str<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, String> {
    get_str(args, key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| format!("missing required parameter: {key}"))
}

//! Typed extraction of `tools/call` arguments, mapping absence/type
//! mismatches onto `InvalidInput` so the dispatcher can turn them into
//! `-32602`.

use kbforge_core::error::KbError;
use serde_json::Value;

pub fn require_str(args: &Value, field: &str) -> Result<String, KbError> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| KbError::invalid_input(format!("missing or empty required string argument '{field}'")))
}

pub fn opt_str(args: &Value, field: &str) -> Option<String> {
    args.get(field).and_then(Value::as_str).map(str::to_string)
}

pub fn opt_usize(args: &Value, field: &str) -> Option<usize> {
    args.get(field).and_then(Value::as_u64).map(|v| v as usize)
}

pub fn opt_bool(args: &Value, field: &str) -> Option<bool> {
    args.get(field).and_then(Value::as_bool)
}

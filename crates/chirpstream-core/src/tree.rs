//! The generic attribute tree every stream line decodes into.
//!
//! A tree is a `serde_json::Value` built with `preserve_order`, so objects
//! keep wire order. Classification and model projection only ever go
//! through [`TreeExt`], which treats `null` the same as an absent key.

use serde_json::Value;

use crate::error::DecodeError;

/// Ordered mapping of string keys to scalars, nested trees or lists.
pub type AttributeTree = Value;

/// Decode one line of stream text into an attribute tree.
pub fn decode_line(line: &str) -> Result<AttributeTree, DecodeError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Lenient field access over an attribute tree.
pub trait TreeExt {
    /// The child under `key`, unless absent or `null`.
    fn child(&self, key: &str) -> Option<&Value>;

    /// Returns `true` if `key` holds a non-null value.
    fn has(&self, key: &str) -> bool {
        self.child(key).is_some()
    }

    fn str_at(&self, key: &str) -> Option<&str> {
        self.child(key).and_then(Value::as_str)
    }

    /// Non-blank string under `key`.
    fn text_at(&self, key: &str) -> Option<&str> {
        self.str_at(key).filter(|s| !s.trim().is_empty())
    }

    /// Integer under `key`; numeric strings are accepted.
    fn i64_at(&self, key: &str) -> Option<i64> {
        self.child(key).and_then(value_as_i64)
    }

    fn u64_at(&self, key: &str) -> Option<u64> {
        self.i64_at(key).and_then(|n| u64::try_from(n).ok())
    }

    /// Boolean under `key`; `"true"`/`"false"` strings are accepted.
    fn bool_at(&self, key: &str) -> Option<bool> {
        match self.child(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl TreeExt for Value {
    fn child(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !v.is_null())
    }
}

/// Integer value, accepting numeric strings such as `id_str`.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

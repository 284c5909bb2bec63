//! Stored values - the closed set of shapes a store can hold

use crate::context::Context;
use crate::Result;
use serde::{Deserialize, Serialize};

/// A value persisted under a store key.
///
/// Variant order is part of the durable wire format: append new variants at
/// the end and never reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Context(Context),
    Text(String),
    Integer(i64),
    /// Stored bit-exact. `NaN` survives a round trip but, as with any `f64`,
    /// never compares equal to itself.
    Float(f64),
    Boolean(bool),
}

/// Discriminant of a `StoredValue`, used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Context,
    Text,
    Integer,
    Float,
    Boolean,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Context => "context",
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
        }
    }
}

impl StoredValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            StoredValue::Context(_) => ValueKind::Context,
            StoredValue::Text(_) => ValueKind::Text,
            StoredValue::Integer(_) => ValueKind::Integer,
            StoredValue::Float(_) => ValueKind::Float,
            StoredValue::Boolean(_) => ValueKind::Boolean,
        }
    }

    pub fn as_context(&self) -> Option<&Context> {
        match self {
            StoredValue::Context(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn into_context(self) -> Option<Context> {
        match self {
            StoredValue::Context(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            StoredValue::Context(ctx) => ctx.validate(),
            _ => Ok(()),
        }
    }
}

impl From<Context> for StoredValue {
    fn from(ctx: Context) -> Self {
        StoredValue::Context(ctx)
    }
}

impl From<String> for StoredValue {
    fn from(s: String) -> Self {
        StoredValue::Text(s)
    }
}

impl From<&str> for StoredValue {
    fn from(s: &str) -> Self {
        StoredValue::Text(s.to_string())
    }
}

impl From<i64> for StoredValue {
    fn from(n: i64) -> Self {
        StoredValue::Integer(n)
    }
}

impl From<f64> for StoredValue {
    fn from(n: f64) -> Self {
        StoredValue::Float(n)
    }
}

impl From<bool> for StoredValue {
    fn from(b: bool) -> Self {
        StoredValue::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_accessors() {
        let value = StoredValue::from(Context::new("a").unwrap());
        assert_eq!(value.kind(), ValueKind::Context);
        assert_eq!(value.as_context().map(Context::name), Some("a"));

        let text = StoredValue::from("plain");
        assert_eq!(text.kind(), ValueKind::Text);
        assert!(text.into_context().is_none());
    }
}

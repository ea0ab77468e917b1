//! Application settings with merge-on-set semantics and assignment hooks.
//!
//! # Responsibility
//! - Hold key -> value configuration for one application context.
//! - Merge mapping-valued settings instead of overwriting them.
//! - Keep the typed hook lists the owner dispatches once per assignment.
//!
//! # Invariants
//! - Keys are canonical: trimmed and non-empty.
//! - A rejected assignment never mutates the store and never fires hooks.
//! - Deferred values are never merged; they are evaluated on every read.

use serde_json::Value;
use std::borrow::Borrow;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub mod hooks;
pub mod store;

pub use hooks::{AnySetHook, HookRegistry, KeySetHook};
pub use store::{ConfigurationStore, SettingsView};

/// Canonical setting identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SettingKey(String);

impl SettingKey {
    /// Normalizes `raw` into canonical key form.
    pub fn parse(raw: &str) -> Result<Self, SettingsError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SettingsError::EmptyKey);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SettingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SettingKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SettingKey {
    type Error = SettingsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Lazily computed setting value, evaluated against the store on each read.
pub type Producer = Arc<dyn Fn(&SettingsView<'_>) -> Value>;

/// Stored representation of one setting.
#[derive(Clone)]
pub enum SettingValue {
    Literal(Value),
    Deferred(Producer),
}

impl SettingValue {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl Debug for SettingValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Merges `incoming` over `existing` when both are mappings.
///
/// Keys of `incoming` win on collision; keys only present in `existing` are
/// kept. Returns `None` when either side is not a mapping.
pub fn merge_mappings(existing: &Value, incoming: &Value) -> Option<Value> {
    let (Value::Object(old), Value::Object(new)) = (existing, incoming) else {
        return None;
    };
    let mut merged = old.clone();
    for (key, value) in new {
        merged.insert(key.clone(), value.clone());
    }
    Some(Value::Object(merged))
}

/// Invalid-argument errors raised by the settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    EmptyKey,
    /// Both a literal value and a deferred producer were supplied.
    ValueAndProducer(String),
    /// Neither a literal value nor a deferred producer was supplied.
    MissingValue(String),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "setting key must not be empty"),
            Self::ValueAndProducer(key) => {
                write!(f, "both a value and a producer given for setting `{key}`")
            }
            Self::MissingValue(key) => {
                write!(f, "neither a value nor a producer given for setting `{key}`")
            }
        }
    }
}

impl Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::{merge_mappings, SettingKey, SettingsError};
    use serde_json::json;

    #[test]
    fn setting_key_trims_and_rejects_blank_input() {
        let key = SettingKey::parse("  haml ").expect("key should parse");
        assert_eq!(key.as_str(), "haml");
        assert_eq!(SettingKey::parse("   "), Err(SettingsError::EmptyKey));
    }

    #[test]
    fn merge_prefers_incoming_keys_and_keeps_the_rest() {
        let merged = merge_mappings(
            &json!({"format": "html5", "escape_html": true}),
            &json!({"escape_html": false, "ugly": true}),
        )
        .expect("two mappings merge");
        assert_eq!(
            merged,
            json!({"format": "html5", "escape_html": false, "ugly": true})
        );
    }

    #[test]
    fn merge_is_skipped_unless_both_sides_are_mappings() {
        assert!(merge_mappings(&json!(1), &json!({"a": 1})).is_none());
        assert!(merge_mappings(&json!({"a": 1}), &json!([1, 2])).is_none());
    }
}

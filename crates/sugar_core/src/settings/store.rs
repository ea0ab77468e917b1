//! Configuration store with merge-on-set semantics.

use crate::settings::{merge_mappings, Producer, SettingKey, SettingValue, SettingsError};
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only view of the store, handed to deferred producers.
#[derive(Clone, Copy)]
pub struct SettingsView<'a> {
    values: &'a BTreeMap<SettingKey, SettingValue>,
}

impl<'a> SettingsView<'a> {
    /// Returns the current value, evaluating deferred producers.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.values.get(key.trim())? {
            SettingValue::Literal(value) => Some(value.clone()),
            SettingValue::Deferred(producer) => Some(producer(self)),
        }
    }

    pub fn raw(&self, key: &str) -> Option<&'a SettingValue> {
        self.values.get(key.trim())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key.trim())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a SettingKey> + 'a {
        self.values.keys()
    }

    /// `true` only for a literal `true`; anything else counts as disabled.
    pub fn is_enabled(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }
}

/// Key -> value settings owned by one application context.
#[derive(Clone, Default)]
pub struct ConfigurationStore {
    values: BTreeMap<SettingKey, SettingValue>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SettingsView<'_> {
        SettingsView {
            values: &self.values,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.view().get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.view().contains(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Assigns a literal value, merging it into an existing mapping value.
    pub fn set(&mut self, key: &str, value: Value) -> Result<&mut Self, SettingsError> {
        self.assign(key, Some(value), None)
    }

    /// Assigns a value computed on every read.
    pub fn set_deferred(
        &mut self,
        key: &str,
        producer: impl Fn(&SettingsView<'_>) -> Value + 'static,
    ) -> Result<&mut Self, SettingsError> {
        let producer: Producer = Arc::new(producer);
        self.assign(key, None, Some(producer))
    }

    /// General assignment entry point.
    ///
    /// Exactly one of `value` and `producer` must be given.
    ///
    /// # Errors
    /// - `EmptyKey` when `key` is blank.
    /// - `ValueAndProducer` when both are given; the store is left untouched.
    /// - `MissingValue` when neither is given.
    pub fn assign(
        &mut self,
        key: &str,
        value: Option<Value>,
        producer: Option<Producer>,
    ) -> Result<&mut Self, SettingsError> {
        let key = SettingKey::parse(key)?;
        let next = match (value, producer) {
            (Some(_), Some(_)) => return Err(SettingsError::ValueAndProducer(key.to_string())),
            (None, None) => return Err(SettingsError::MissingValue(key.to_string())),
            (None, Some(producer)) => SettingValue::Deferred(producer),
            (Some(value), None) => {
                let merged = self
                    .get(key.as_str())
                    .and_then(|existing| merge_mappings(&existing, &value));
                SettingValue::Literal(merged.unwrap_or(value))
            }
        };
        self.write(key, next);
        Ok(self)
    }

    /// Assigns every pair of `pairs` in iteration order.
    pub fn set_many(&mut self, pairs: Map<String, Value>) -> Result<&mut Self, SettingsError> {
        for key in pairs.keys() {
            SettingKey::parse(key)?;
        }
        for (key, value) in pairs {
            self.set(&key, value)?;
        }
        Ok(self)
    }

    pub fn enable(&mut self, key: &str) -> Result<&mut Self, SettingsError> {
        self.set(key, Value::Bool(true))
    }

    pub fn disable(&mut self, key: &str) -> Result<&mut Self, SettingsError> {
        self.set(key, Value::Bool(false))
    }

    // Single terminal write path: every accepted assignment passes here once.
    fn write(&mut self, key: SettingKey, value: SettingValue) {
        debug!(
            "event=setting_assigned module=settings key={} deferred={}",
            key,
            value.is_deferred()
        );
        self.values.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigurationStore, SettingsView};
    use crate::settings::{Producer, SettingsError};
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[test]
    fn mapping_values_are_merged() {
        let mut store = ConfigurationStore::new();
        store
            .set("opts", json!({"format": "html5", "escape": true}))
            .expect("first set")
            .set("opts", json!({"escape": false}))
            .expect("second set");
        assert_eq!(
            store.get("opts"),
            Some(json!({"format": "html5", "escape": false}))
        );
    }

    #[test]
    fn non_mapping_values_are_replaced() {
        let mut store = ConfigurationStore::new();
        store.set("port", json!(4567)).expect("set port");
        store.set("port", json!({"tls": 443})).expect("replace port");
        assert_eq!(store.get("port"), Some(json!({"tls": 443})));
        store.set("port", json!(80)).expect("replace again");
        assert_eq!(store.get("port"), Some(json!(80)));
    }

    #[test]
    fn value_and_producer_together_are_rejected_without_mutation() {
        let mut store = ConfigurationStore::new();
        store.set("port", json!(80)).expect("set port");

        let producer: Producer = Arc::new(|_: &SettingsView<'_>| json!(82));
        let err = store
            .assign("port", Some(json!(81)), Some(producer))
            .err()
            .expect("both value and producer must fail");
        assert_eq!(err, SettingsError::ValueAndProducer("port".to_string()));
        assert_eq!(store.get("port"), Some(json!(80)));
    }

    #[test]
    fn missing_value_is_rejected() {
        let mut store = ConfigurationStore::new();
        let err = store
            .assign("port", None, None)
            .err()
            .expect("missing value must fail");
        assert_eq!(err, SettingsError::MissingValue("port".to_string()));
    }

    #[test]
    fn deferred_values_read_other_settings() {
        let mut store = ConfigurationStore::new();
        store.set("host", json!("localhost")).expect("set host");
        store
            .set_deferred("bind", |view| {
                let host = view.get("host").unwrap_or(Value::Null);
                json!(format!("{}:80", host.as_str().unwrap_or("")))
            })
            .expect("deferred set");
        assert_eq!(store.get("bind"), Some(json!("localhost:80")));
        store.set("host", json!("0.0.0.0")).expect("set host");
        assert_eq!(store.get("bind"), Some(json!("0.0.0.0:80")));
    }

    #[test]
    fn literal_mapping_merges_over_deferred_mapping() {
        let mut store = ConfigurationStore::new();
        store
            .set_deferred("haml", |_| json!({"format": "html5"}))
            .expect("deferred set");
        store
            .set("haml", json!({"escape_html": true}))
            .expect("literal set");
        assert_eq!(
            store.get("haml"),
            Some(json!({"format": "html5", "escape_html": true}))
        );
        assert!(!store.view().raw("haml").expect("stored").is_deferred());
    }

    #[test]
    fn set_many_assigns_every_pair() {
        let mut store = ConfigurationStore::new();
        let Value::Object(pairs) = json!({"port": 80, "server": "thin"}) else {
            unreachable!("literal object");
        };
        store.set_many(pairs).expect("set many");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("server"), Some(json!("thin")));
    }

    #[test]
    fn set_many_rejects_a_blank_key_before_writing() {
        let mut store = ConfigurationStore::new();
        let Value::Object(pairs) = json!({"port": 80, " ": 1}) else {
            unreachable!("literal object");
        };
        let err = store.set_many(pairs).err().expect("blank key must fail");
        assert_eq!(err, SettingsError::EmptyKey);
        assert!(store.is_empty());
    }

    #[test]
    fn enable_and_disable_store_booleans() {
        let mut store = ConfigurationStore::new();
        store.enable("sessions").expect("enable");
        assert!(store.view().is_enabled("sessions"));
        store.disable("sessions").expect("disable");
        assert!(!store.view().is_enabled("sessions"));
        assert!(!store.view().is_enabled("missing"));
    }

    #[test]
    fn blank_keys_are_rejected() {
        let mut store = ConfigurationStore::new();
        let err = store.set("  ", json!(1)).err().expect("blank key must fail");
        assert_eq!(err, SettingsError::EmptyKey);
        assert!(store.is_empty());
    }
}

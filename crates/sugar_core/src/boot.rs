//! Boot-time extension.
//!
//! Registering [`SugarExtension`] installs the `app_file` hook that drops the
//! cached root guess, records the application file (when unset) and applies
//! the boot defaults list.

use crate::app::{Application, APP_FILE};
use crate::error::SugarResult;
use crate::extension::Extension;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SUGAR_EXTENSION_ID: &str = "sugar";

/// One default setting applied at boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultSetting {
    pub key: String,
    pub value: Value,
}

/// Ordered list of settings applied when the extension is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootDefaults {
    #[serde(default)]
    pub settings: Vec<DefaultSetting>,
}

impl BootDefaults {
    pub fn empty() -> Self {
        Self {
            settings: Vec::new(),
        }
    }

    /// Decodes a defaults list such as
    /// `{"settings": [{"key": "sessions", "value": true}]}`.
    pub fn from_json(raw: &str) -> SugarResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn apply(&self, app: &mut Application) -> SugarResult<()> {
        for setting in &self.settings {
            app.set(&setting.key, setting.value.clone())?;
        }
        Ok(())
    }
}

impl Default for BootDefaults {
    fn default() -> Self {
        Self {
            settings: vec![
                DefaultSetting {
                    key: "haml".to_string(),
                    value: json!({"format": "html5", "escape_html": true}),
                },
                DefaultSetting {
                    key: "sessions".to_string(),
                    value: Value::Bool(true),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SugarExtension {
    defaults: BootDefaults,
}

impl SugarExtension {
    pub fn with_defaults(defaults: BootDefaults) -> Self {
        Self { defaults }
    }
}

impl Extension for SugarExtension {
    fn id(&self) -> &str {
        SUGAR_EXTENSION_ID
    }

    fn registered(&self, app: &mut Application) -> SugarResult<()> {
        app.on_set(APP_FILE, |app: &mut Application| {
            app.invalidate_root_guess();
        })?;
        if !app.settings().contains(APP_FILE) {
            let detected = app
                .caller_files()
                .first()
                .map(|frame| frame.resolve(app.source_root()));
            match detected {
                Some(app_file) => {
                    info!(
                        "event=app_file_detected module=boot app={} app_file={}",
                        app.name(),
                        app_file.display()
                    );
                    app.set(APP_FILE, json!(app_file))?;
                }
                None => warn!(
                    "event=app_file_detected module=boot status=missing app={}",
                    app.name()
                ),
            }
        }
        self.defaults.apply(app)
    }
}

#[cfg(test)]
mod tests {
    use super::BootDefaults;
    use crate::error::SugarError;

    #[test]
    fn decodes_defaults_list() {
        let defaults =
            BootDefaults::from_json(r#"{"settings": [{"key": "sessions", "value": false}]}"#)
                .expect("valid defaults");
        assert_eq!(defaults.settings.len(), 1);
        assert_eq!(defaults.settings[0].key, "sessions");
    }

    #[test]
    fn rejects_malformed_defaults() {
        let err = BootDefaults::from_json(r#"{"settings": [{"key": 1}]}"#)
            .expect_err("malformed defaults must fail");
        assert!(matches!(err, SugarError::Defaults(_)));
    }

    #[test]
    fn built_in_defaults_cover_templates_and_sessions() {
        let keys: Vec<String> = BootDefaults::default()
            .settings
            .into_iter()
            .map(|setting| setting.key)
            .collect();
        assert_eq!(keys, vec!["haml", "sessions"]);
    }
}

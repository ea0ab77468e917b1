//! Application-context sugar for micro web frameworks.
//! Settings merge and hooks, idempotent extensions, caller filtering and
//! root-relative paths, all owned by an explicit `Application` value.

pub mod app;
pub mod boot;
pub mod caller;
pub mod error;
pub mod extension;
pub mod logging;
pub mod root;
pub mod run;
pub mod settings;

pub use app::{AppId, Application, Instance, APP_FILE};
pub use boot::{BootDefaults, DefaultSetting, SugarExtension, SUGAR_EXTENSION_ID};
pub use caller::{CallerError, CallerFilter, CallerLocation, CallerPattern, CallerPatterns};
pub use error::{GlobError, SugarError, SugarResult};
pub use extension::{Extension, ExtensionError, ExtensionRecord, ExtensionRegistry, FnExtension};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use root::{RootAccess, RootResolver};
pub use run::{LaunchConfig, RunOptions};
pub use settings::{
    merge_mappings, ConfigurationStore, HookRegistry, Producer, SettingKey, SettingValue,
    SettingsError, SettingsView,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

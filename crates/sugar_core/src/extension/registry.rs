//! Idempotent extension registration ledger.

use crate::app::{AppId, Application};
use crate::error::SugarResult;
use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Unit of setup logic applied to an application.
///
/// Identity is the `id()` string: two values with the same id are the same
/// extension as far as the ledger is concerned.
pub trait Extension {
    fn id(&self) -> &str;

    /// Setup callback, run at most once per application lineage.
    fn registered(&self, app: &mut Application) -> SugarResult<()>;
}

/// Closure-backed extension wrapper.
pub struct FnExtension<F> {
    id: String,
    setup: F,
}

impl<F> FnExtension<F>
where
    F: Fn(&mut Application) -> SugarResult<()>,
{
    pub fn new(id: impl Into<String>, setup: F) -> Self {
        Self {
            id: id.into(),
            setup,
        }
    }
}

impl<F> Extension for FnExtension<F>
where
    F: Fn(&mut Application) -> SugarResult<()>,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn registered(&self, app: &mut Application) -> SugarResult<()> {
        (self.setup)(app)
    }
}

/// Ledger entry for one applied extension.
#[derive(Clone)]
pub struct ExtensionRecord {
    pub extension: Arc<dyn Extension>,
    /// Application whose registration ran the setup callback.
    pub applied_to: AppId,
}

/// Per-application extension ledger, inherited by derived applications.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    entries: BTreeMap<String, ExtensionRecord>,
    order: Vec<String>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a batch containing a blank id before anything is recorded.
    pub(crate) fn validate(batch: &[Arc<dyn Extension>]) -> Result<(), ExtensionError> {
        if batch.iter().any(|extension| extension.id().trim().is_empty()) {
            return Err(ExtensionError::EmptyId);
        }
        Ok(())
    }

    /// Records `extension` unless its id is already known.
    ///
    /// Returns `true` when the caller must now run its setup. The entry is
    /// written before setup runs, so registering the same extension again
    /// from inside its own setup is a no-op.
    pub(crate) fn record(&mut self, app: AppId, extension: &Arc<dyn Extension>) -> bool {
        let id = extension.id().trim().to_string();
        if self.entries.contains_key(id.as_str()) {
            debug!("event=extension_skip module=extension id={id} reason=already_registered");
            return false;
        }
        info!("event=extension_register module=extension id={id} app={app}");
        self.entries.insert(
            id.clone(),
            ExtensionRecord {
                extension: Arc::clone(extension),
                applied_to: app,
            },
        );
        self.order.push(id);
        true
    }

    pub fn contains(&self, extension_id: &str) -> bool {
        self.entries.contains_key(extension_id.trim())
    }

    pub fn get(&self, extension_id: &str) -> Option<&ExtensionRecord> {
        self.entries.get(extension_id.trim())
    }

    /// Recorded extension ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    EmptyId,
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "extension id must not be empty"),
        }
    }
}

impl Error for ExtensionError {}

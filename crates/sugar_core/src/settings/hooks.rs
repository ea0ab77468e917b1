//! Typed assignment hooks.
//!
//! Hooks are looked up by `SettingKey` directly. There is one list per key
//! plus a single wildcard list that sees every assignment. Hooks receive the
//! store's owner mutably, so they can act on it (change the root cache,
//! assign further settings).

use crate::settings::SettingKey;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Hook fired after one specific key was assigned.
pub type KeySetHook<O> = Arc<dyn Fn(&mut O)>;
/// Hook fired after any key was assigned.
pub type AnySetHook<O> = Arc<dyn Fn(&mut O, &SettingKey)>;

pub struct HookRegistry<O> {
    by_key: BTreeMap<SettingKey, Vec<KeySetHook<O>>>,
    any: Vec<AnySetHook<O>>,
}

impl<O> HookRegistry<O> {
    pub fn new() -> Self {
        Self {
            by_key: BTreeMap::new(),
            any: Vec::new(),
        }
    }

    pub fn on_set(&mut self, key: SettingKey, hook: KeySetHook<O>) {
        self.by_key.entry(key).or_default().push(hook);
    }

    pub fn on_any_set(&mut self, hook: AnySetHook<O>) {
        self.any.push(hook);
    }

    pub fn has_hooks_for(&self, key: &SettingKey) -> bool {
        self.by_key.get(key).is_some_and(|hooks| !hooks.is_empty())
    }

    /// Snapshot of the hooks to run for `key`.
    ///
    /// The registry usually lives inside the owner, so dispatch happens on a
    /// detached copy; hooks registered while dispatching apply from the next
    /// assignment on.
    pub(crate) fn dispatch_for(&self, key: &SettingKey) -> HookDispatch<O> {
        HookDispatch {
            key: key.clone(),
            keyed: self.by_key.get(key).cloned().unwrap_or_default(),
            any: self.any.clone(),
        }
    }
}

impl<O> Default for HookRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Clone for HookRegistry<O> {
    fn clone(&self) -> Self {
        Self {
            by_key: self.by_key.clone(),
            any: self.any.clone(),
        }
    }
}

/// Hooks selected for one assignment.
pub(crate) struct HookDispatch<O> {
    key: SettingKey,
    keyed: Vec<KeySetHook<O>>,
    any: Vec<AnySetHook<O>>,
}

impl<O> HookDispatch<O> {
    /// Runs key-specific hooks, then wildcard hooks. Missing hooks are a no-op.
    pub(crate) fn run(self, owner: &mut O) {
        debug!(
            "event=hooks_fire module=settings key={} keyed={} wildcard={}",
            self.key,
            self.keyed.len(),
            self.any.len()
        );
        for hook in &self.keyed {
            hook(owner);
        }
        for hook in &self.any {
            hook(owner, &self.key);
        }
    }
}

//! Extension contracts.
//!
//! This module defines the setup-callback contract for extensions and the
//! per-application ledger that keeps each extension's setup at most once.

pub mod registry;

pub use registry::{Extension, ExtensionError, ExtensionRecord, ExtensionRegistry, FnExtension};

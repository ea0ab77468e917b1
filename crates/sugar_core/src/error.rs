//! Crate-level error type.

use crate::caller::CallerError;
use crate::extension::ExtensionError;
use crate::settings::SettingsError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub type SugarResult<T> = Result<T, SugarError>;

/// Glob pattern rejected by the `glob` crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobError {
    pub pattern: String,
    pub message: String,
}

impl GlobError {
    pub fn new(pattern: &str, err: &glob::PatternError) -> Self {
        Self {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

impl Display for GlobError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "glob `{}`: {}", self.pattern, self.message)
    }
}

impl Error for GlobError {}

/// Umbrella error for application-level operations.
#[derive(Debug)]
pub enum SugarError {
    Settings(SettingsError),
    Caller(CallerError),
    Extension(ExtensionError),
    /// Run-option parsing failed; carries the parser's own error.
    Options(clap::Error),
    /// Boot defaults could not be decoded.
    Defaults(serde_json::Error),
    /// Working directory lookup failed while resolving the root.
    CurrentDir(io::Error),
    InvalidGlob(GlobError),
    /// An extension setup callback failed.
    Setup { extension: String, message: String },
}

impl Display for SugarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Settings(err) => write!(f, "{err}"),
            Self::Caller(err) => write!(f, "{err}"),
            Self::Extension(err) => write!(f, "{err}"),
            Self::Options(err) => write!(f, "invalid run options: {err}"),
            Self::Defaults(err) => write!(f, "invalid boot defaults: {err}"),
            Self::CurrentDir(err) => write!(f, "cannot read current directory: {err}"),
            Self::InvalidGlob(err) => write!(f, "{err}"),
            Self::Setup { extension, message } => {
                write!(f, "extension `{extension}` setup failed: {message}")
            }
        }
    }
}

impl Error for SugarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Settings(err) => Some(err),
            Self::Caller(err) => Some(err),
            Self::Extension(err) => Some(err),
            Self::Options(err) => Some(err),
            Self::Defaults(err) => Some(err),
            Self::CurrentDir(err) => Some(err),
            Self::InvalidGlob(err) => Some(err),
            Self::Setup { .. } => None,
        }
    }
}

impl From<GlobError> for SugarError {
    fn from(value: GlobError) -> Self {
        Self::InvalidGlob(value)
    }
}

impl From<SettingsError> for SugarError {
    fn from(value: SettingsError) -> Self {
        Self::Settings(value)
    }
}

impl From<CallerError> for SugarError {
    fn from(value: CallerError) -> Self {
        Self::Caller(value)
    }
}

impl From<ExtensionError> for SugarError {
    fn from(value: ExtensionError) -> Self {
        Self::Extension(value)
    }
}

impl From<clap::Error> for SugarError {
    fn from(value: clap::Error) -> Self {
        Self::Options(value)
    }
}

impl From<serde_json::Error> for SugarError {
    fn from(value: serde_json::Error) -> Self {
        Self::Defaults(value)
    }
}

//! Caller-file filtering.
//!
//! # Responsibility
//! - Keep the ordered set of patterns describing frames that are never the
//!   application file (framework and library sources).
//! - Pick the first recorded frame that matches none of them.
//!
//! # Invariants
//! - Patterns are append-only; there is no removal primitive.
//! - A rejected `ignore_caller` call appends nothing.
//!
//! Frames are explicit `CallerLocation` values captured with
//! `#[track_caller]`, never runtime backtraces.

use crate::error::GlobError;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::Location;
use std::path::{Path, PathBuf};

// Workspace checkout (`crates/sugar_core/src/`) or registry unpack
// (`sugar_core-0.1.0/src/`), matched on whole path components only.
static CRATE_SOURCES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[/\\])sugar_core(-[^/\\]+)?[/\\]src[/\\]").expect("valid crate source regex")
});

/// Source location of one recorded call frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerLocation {
    path: PathBuf,
}

impl CallerLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the code calling this function.
    #[track_caller]
    pub fn here() -> Self {
        Self::new(Location::caller().file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute path of the recorded file.
    ///
    /// `#[track_caller]` paths are relative to the directory the compiler ran
    /// in (the workspace root for workspace members), not to the process's
    /// working directory. Relative paths are therefore looked up under every
    /// ancestor of `base` (usually the caller's `CARGO_MANIFEST_DIR`), then
    /// under every ancestor of the working directory. The first existing file
    /// wins; without one the path is made absolute against the working
    /// directory.
    pub fn resolve(&self, base: Option<&Path>) -> PathBuf {
        if self.path.is_absolute() {
            return self.path.clone();
        }
        let cwd = std::env::current_dir().ok();
        let anchors = base
            .into_iter()
            .flat_map(Path::ancestors)
            .chain(cwd.iter().flat_map(|dir| dir.ancestors()));
        for anchor in anchors {
            let candidate = anchor.join(&self.path);
            if candidate.is_file() {
                debug!(
                    "event=caller_resolved module=caller path={} anchor={}",
                    self.path.display(),
                    anchor.display()
                );
                return candidate;
            }
        }
        std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone())
    }
}

/// Input accepted by [`CallerFilter::ignore_caller`].
#[derive(Debug, Clone)]
pub enum CallerPattern {
    /// The file of the given frame, matched literally.
    Here(CallerLocation),
    /// Filesystem glob; every match is ignored by its absolute path.
    Glob(String),
    /// Literal text, escaped before compiling.
    Literal(String),
    Regex(Regex),
    Many(Vec<CallerPattern>),
}

impl CallerPattern {
    #[track_caller]
    pub fn here() -> Self {
        Self::Here(CallerLocation::here())
    }

    /// Decodes a pattern from JSON.
    ///
    /// `null` means the calling file, a string is a glob, an array holds
    /// nested patterns, `{"regex": ..}` and `{"literal": ..}` select the
    /// other shapes.
    ///
    /// # Errors
    /// - `UnsupportedPattern` for any other shape.
    /// - `InvalidRegex` when a `regex` entry does not compile.
    #[track_caller]
    pub fn from_value(value: &Value) -> Result<Self, CallerError> {
        match value {
            Value::Null => Ok(Self::here()),
            Value::String(glob) => Ok(Self::Glob(glob.clone())),
            Value::Array(items) => {
                let mut patterns = Vec::with_capacity(items.len());
                for item in items {
                    patterns.push(Self::from_value(item)?);
                }
                Ok(Self::Many(patterns))
            }
            Value::Object(map) if map.len() == 1 => match map.iter().next() {
                Some((kind, Value::String(raw))) if kind == "regex" => {
                    Ok(Self::Regex(compile(raw)?))
                }
                Some((kind, Value::String(raw))) if kind == "literal" => {
                    Ok(Self::Literal(raw.clone()))
                }
                _ => Err(CallerError::UnsupportedPattern(value.to_string())),
            },
            other => Err(CallerError::UnsupportedPattern(other.to_string())),
        }
    }
}

impl From<Regex> for CallerPattern {
    fn from(value: Regex) -> Self {
        Self::Regex(value)
    }
}

/// Ordered, de-duplicated, append-only set of frame patterns.
#[derive(Debug, Clone, Default)]
pub struct CallerPatterns {
    patterns: Vec<Regex>,
}

impl CallerPatterns {
    /// Appends `pattern` unless an identical pattern is already present.
    pub fn push(&mut self, pattern: Regex) {
        if self
            .patterns
            .iter()
            .any(|known| known.as_str() == pattern.as_str())
        {
            return;
        }
        self.patterns.push(pattern);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Regex> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_match(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.patterns.iter().any(|pattern| pattern.is_match(&path))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallerFilter {
    patterns: CallerPatterns,
}

impl CallerFilter {
    /// Empty filter; nothing is ignored.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter that ignores this crate's own source files.
    pub fn with_defaults() -> Self {
        let mut filter = Self::new();
        filter.patterns.push(CRATE_SOURCES_RE.clone());
        filter
    }

    /// Adds the frames described by `pattern` to the ignore set.
    ///
    /// # Errors
    /// - `InvalidRegex` / `InvalidGlob` when a pattern cannot be compiled.
    ///   Nothing is appended in that case, even for a partly valid `Many`.
    pub fn ignore_caller(&mut self, pattern: CallerPattern) -> Result<&mut Self, CallerError> {
        let mut resolved = Vec::new();
        resolve(pattern, &mut resolved)?;
        for regex in resolved {
            debug!(
                "event=caller_ignored module=caller pattern={}",
                regex.as_str()
            );
            self.patterns.push(regex);
        }
        Ok(self)
    }

    /// Live pattern set; pushes go straight into the filter.
    pub fn callers_to_ignore(&mut self) -> &mut CallerPatterns {
        &mut self.patterns
    }

    pub fn patterns(&self) -> &CallerPatterns {
        &self.patterns
    }

    /// Frames not matching any ignore pattern, in recorded order.
    pub fn caller_files<'a>(&self, frames: &'a [CallerLocation]) -> Vec<&'a CallerLocation> {
        frames
            .iter()
            .filter(|frame| !self.patterns.is_match(frame.path()))
            .collect()
    }

    pub fn first_caller_file<'a>(&self, frames: &'a [CallerLocation]) -> Option<&'a Path> {
        frames
            .iter()
            .find(|frame| !self.patterns.is_match(frame.path()))
            .map(CallerLocation::path)
    }
}

fn resolve(pattern: CallerPattern, out: &mut Vec<Regex>) -> Result<(), CallerError> {
    match pattern {
        CallerPattern::Here(location) => {
            out.push(literal(&location.path().to_string_lossy())?);
        }
        CallerPattern::Glob(text) => {
            let entries = glob::glob(&text)
                .map_err(|err| CallerError::InvalidGlob(GlobError::new(&text, &err)))?;
            for entry in entries.flatten() {
                let absolute = std::path::absolute(&entry).unwrap_or(entry);
                out.push(literal(&absolute.to_string_lossy())?);
            }
        }
        CallerPattern::Literal(text) => out.push(literal(&text)?),
        CallerPattern::Regex(regex) => out.push(regex),
        CallerPattern::Many(patterns) => {
            for pattern in patterns {
                resolve(pattern, out)?;
            }
        }
    }
    Ok(())
}

fn literal(text: &str) -> Result<Regex, CallerError> {
    compile(&regex::escape(text))
}

fn compile(raw: &str) -> Result<Regex, CallerError> {
    Regex::new(raw).map_err(|err| CallerError::InvalidRegex {
        pattern: raw.to_string(),
        message: err.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerError {
    /// Input shape the filter cannot handle; carries the offending value.
    UnsupportedPattern(String),
    InvalidRegex { pattern: String, message: String },
    InvalidGlob(GlobError),
}

impl Display for CallerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedPattern(value) => write!(f, "cannot handle {value}"),
            Self::InvalidRegex { pattern, message } => {
                write!(f, "invalid caller regex `{pattern}`: {message}")
            }
            Self::InvalidGlob(err) => write!(f, "invalid caller {err}"),
        }
    }
}

impl Error for CallerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidGlob(err) => Some(err),
            Self::UnsupportedPattern(_) | Self::InvalidRegex { .. } => None,
        }
    }
}

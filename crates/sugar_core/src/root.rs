//! Application root directory resolution.
//!
//! # Responsibility
//! - Resolve the directory relative application paths are anchored to.
//! - Expand root-relative globs.
//!
//! # Invariants
//! - Without a known application file the root is the working directory and
//!   nothing is cached.
//! - An explicit root always wins over the guess.
//! - The guess is computed once and kept until `invalidate_guess`.

use crate::error::{GlobError, SugarError, SugarResult};
use log::debug;
use once_cell::unsync::OnceCell;
use std::path::{Path, PathBuf};

const LIB_DIR: &str = "lib";

#[derive(Debug, Clone, Default)]
pub struct RootResolver {
    explicit: Option<PathBuf>,
    guessed: OnceCell<PathBuf>,
}

impl RootResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.explicit = Some(root.into());
    }

    pub fn clear_root(&mut self) {
        self.explicit = None;
    }

    pub fn explicit_root(&self) -> Option<&Path> {
        self.explicit.as_deref()
    }

    /// Drops the cached guess; the next `root` call recomputes it.
    pub fn invalidate_guess(&mut self) {
        if self.guessed.take().is_some() {
            debug!("event=root_guess_invalidated module=root");
        }
    }

    /// Whether a root can be derived without falling back to the working
    /// directory.
    pub fn is_known(&self, app_file: Option<&Path>) -> bool {
        self.explicit.is_some() || app_file.is_some()
    }

    pub fn root(&self, app_file: Option<&Path>) -> SugarResult<PathBuf> {
        let Some(app_file) = app_file else {
            return std::env::current_dir().map_err(SugarError::CurrentDir);
        };
        if let Some(explicit) = &self.explicit {
            return Ok(explicit.clone());
        }
        self.guessed
            .get_or_try_init(|| guess_root(app_file))
            .cloned()
    }

    /// Joins `segments`; absolute results are returned unchanged, relative
    /// ones are anchored at `root`.
    pub fn root_path(&self, app_file: Option<&Path>, segments: &[&str]) -> SugarResult<PathBuf> {
        let relative: PathBuf = segments.iter().collect();
        if relative.is_absolute() {
            return Ok(relative);
        }
        Ok(self.root(app_file)?.join(relative))
    }

    /// Expands `root_path(segments)` as a glob, calling `visit` once per match.
    pub fn root_glob_each(
        &self,
        app_file: Option<&Path>,
        segments: &[&str],
        mut visit: impl FnMut(&Path),
    ) -> SugarResult<Vec<PathBuf>> {
        let pattern = self.root_path(app_file, segments)?;
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern).map_err(|err| GlobError::new(&pattern, &err))?;
        let mut matches = Vec::new();
        for entry in entries.flatten() {
            visit(&entry);
            matches.push(entry);
        }
        Ok(matches)
    }
}

fn guess_root(app_file: &Path) -> SugarResult<PathBuf> {
    let app_file = std::path::absolute(app_file).map_err(SugarError::CurrentDir)?;
    let dir = app_file.parent().unwrap_or(&app_file);
    let guessed = if dir.file_name().is_some_and(|name| name == LIB_DIR)
        && !dir.join(LIB_DIR).is_dir()
    {
        dir.parent().unwrap_or(dir)
    } else {
        dir
    };
    debug!(
        "event=root_guessed module=root app_file={} root={}",
        app_file.display(),
        guessed.display()
    );
    Ok(guessed.to_path_buf())
}

/// Root-relative helpers shared by applications and their instances.
pub trait RootAccess {
    fn root_resolver(&self) -> &RootResolver;

    fn app_file(&self) -> Option<PathBuf>;

    fn root(&self) -> SugarResult<PathBuf> {
        self.root_resolver().root(self.app_file().as_deref())
    }

    fn is_root_known(&self) -> bool {
        self.root_resolver().is_known(self.app_file().as_deref())
    }

    fn root_path(&self, segments: &[&str]) -> SugarResult<PathBuf> {
        self.root_resolver()
            .root_path(self.app_file().as_deref(), segments)
    }

    fn root_glob(&self, segments: &[&str]) -> SugarResult<Vec<PathBuf>> {
        self.root_glob_each(segments, |_| {})
    }

    fn root_glob_each(
        &self,
        segments: &[&str],
        visit: impl FnMut(&Path),
    ) -> SugarResult<Vec<PathBuf>> {
        self.root_resolver()
            .root_glob_each(self.app_file().as_deref(), segments, visit)
    }
}

//! Run options and launch configuration.
//!
//! # Responsibility
//! - Parse the standard `-x/-e/-s/-p` run flags.
//! - Project the run-related settings into a launch snapshot.
//!
//! # Invariants
//! - Options are parsed only for a non-empty argument list.
//! - Parser failures surface unchanged as the parser's own error.

use crate::app::Application;
use crate::error::SugarResult;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::ffi::OsString;

pub const LOCK: &str = "lock";
pub const ENVIRONMENT: &str = "environment";
pub const SERVER: &str = "server";
pub const PORT: &str = "port";

/// Standard run flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Parser)]
#[command(name = "sugar", about = "Run a sugar application")]
pub struct RunOptions {
    /// Enable the lock setting.
    #[arg(short = 'x')]
    pub lock: bool,
    /// Environment to run in.
    #[arg(short = 'e', value_name = "env")]
    pub environment: Option<String>,
    /// Server adapter name.
    #[arg(short = 's', value_name = "server")]
    pub server: Option<String>,
    /// Port to listen on.
    #[arg(short = 'p', value_name = "port")]
    pub port: Option<u16>,
}

impl RunOptions {
    /// Parses `args` (program name excluded).
    ///
    /// Returns `Ok(None)` for an empty argument list.
    pub fn from_args<I, T>(args: I) -> SugarResult<Option<Self>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut args = args.into_iter().map(Into::<OsString>::into).peekable();
        if args.peek().is_none() {
            return Ok(None);
        }
        let argv = std::iter::once(OsString::from("sugar")).chain(args);
        Ok(Some(Self::try_parse_from(argv)?))
    }

    /// Writes every given flag into `app`'s settings.
    pub fn apply_to(&self, app: &mut Application) -> SugarResult<()> {
        if self.lock {
            app.set(LOCK, Value::Bool(true))?;
        }
        if let Some(environment) = &self.environment {
            app.set(ENVIRONMENT, json!(environment))?;
        }
        if let Some(server) = &self.server {
            app.set(SERVER, json!(server))?;
        }
        if let Some(port) = self.port {
            app.set(PORT, json!(port))?;
        }
        Ok(())
    }
}

/// Launch parameters a host server would start with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub environment: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub lock: bool,
}

impl LaunchConfig {
    pub fn from_app(app: &Application) -> Self {
        let settings = app.settings();
        let text = |key: &str| {
            settings
                .get(key)
                .and_then(|value| value.as_str().map(str::to_string))
        };
        Self {
            environment: text(ENVIRONMENT),
            server: text(SERVER),
            port: settings
                .get(PORT)
                .and_then(|value| value.as_u64())
                .and_then(|port| u16::try_from(port).ok()),
            lock: settings.view().is_enabled(LOCK),
        }
    }
}

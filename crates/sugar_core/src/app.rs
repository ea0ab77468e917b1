//! Application context.
//!
//! # Responsibility
//! - Own the settings, extension ledger, caller filter and root cache of one
//!   application.
//! - Keep derived applications consistent with their parent.
//!
//! # Invariants
//! - Every accepted assignment fires its hooks exactly once, right after the
//!   write and before the next assignment.
//! - Deriving a child never re-runs extensions recorded on the parent.

use crate::boot::SugarExtension;
use crate::caller::{CallerFilter, CallerLocation, CallerPattern, CallerPatterns};
use crate::error::SugarResult;
use crate::extension::{Extension, ExtensionRegistry};
use crate::root::{RootAccess, RootResolver};
use crate::run::{LaunchConfig, RunOptions};
use crate::settings::{ConfigurationStore, HookRegistry, Producer, SettingKey, SettingsView};
use log::info;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Setting holding the absolute path of the file defining the application.
pub const APP_FILE: &str = "app_file";

/// Stable identity of one application context.
pub type AppId = Uuid;

pub struct Application {
    id: AppId,
    name: String,
    parent: Option<AppId>,
    settings: ConfigurationStore,
    hooks: HookRegistry<Application>,
    extensions: ExtensionRegistry,
    callers: CallerFilter,
    root: RootResolver,
    frames: Vec<CallerLocation>,
    source_root: Option<PathBuf>,
    run_enabled: bool,
    running: bool,
}

impl Application {
    /// Creates an empty application, recording the calling file as its first
    /// candidate frame.
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent: None,
            settings: ConfigurationStore::new(),
            hooks: HookRegistry::new(),
            extensions: ExtensionRegistry::new(),
            callers: CallerFilter::with_defaults(),
            root: RootResolver::new(),
            frames: vec![CallerLocation::here()],
            source_root: None,
            run_enabled: true,
            running: false,
        }
    }

    /// Creates an application with the sugar extension registered.
    #[track_caller]
    pub fn boot(name: impl Into<String>) -> SugarResult<Self> {
        let mut app = Self::new(name);
        let sugar: Arc<dyn Extension> = Arc::new(SugarExtension::default());
        app.register(&[sugar])?;
        Ok(app)
    }

    /// Like [`Application::boot`], resolving relative caller paths under
    /// `source_root` first. Pass the calling crate's
    /// `env!("CARGO_MANIFEST_DIR")` so detection does not depend on the
    /// working directory.
    #[track_caller]
    pub fn boot_in(
        name: impl Into<String>,
        source_root: impl Into<PathBuf>,
    ) -> SugarResult<Self> {
        let mut app = Self::new(name);
        app.source_root = Some(source_root.into());
        let sugar: Arc<dyn Extension> = Arc::new(SugarExtension::default());
        app.register(&[sugar])?;
        Ok(app)
    }

    /// Creates a child application inheriting settings, hooks, extensions and
    /// caller patterns. The parent stops auto-running.
    #[track_caller]
    pub fn derive(&mut self, name: impl Into<String>) -> Self {
        self.run_enabled = false;
        let mut root = self.root.clone();
        root.invalidate_guess();
        let child = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent: Some(self.id),
            settings: self.settings.clone(),
            hooks: self.hooks.clone(),
            extensions: self.extensions.clone(),
            callers: self.callers.clone(),
            root,
            frames: vec![CallerLocation::here()],
            source_root: self.source_root.clone(),
            run_enabled: true,
            running: false,
        };
        info!(
            "event=app_derived module=app parent={} child={}",
            self.id, child.id
        );
        child
    }

    pub fn id(&self) -> AppId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<AppId> {
        self.parent
    }

    pub fn settings(&self) -> &ConfigurationStore {
        &self.settings
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.settings.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) -> SugarResult<&mut Self> {
        self.assign(key, Some(value), None)
    }

    pub fn set_deferred(
        &mut self,
        key: &str,
        producer: impl Fn(&SettingsView<'_>) -> Value + 'static,
    ) -> SugarResult<&mut Self> {
        let producer: Producer = Arc::new(producer);
        self.assign(key, None, Some(producer))
    }

    /// General assignment entry point; hooks fire once after the write.
    ///
    /// A rejected assignment leaves the store untouched and fires nothing.
    pub fn assign(
        &mut self,
        key: &str,
        value: Option<Value>,
        producer: Option<Producer>,
    ) -> SugarResult<&mut Self> {
        let key = SettingKey::parse(key)?;
        self.settings.assign(key.as_str(), value, producer)?;
        self.hooks.dispatch_for(&key).run(self);
        Ok(self)
    }

    /// Assigns every pair in iteration order, firing each pair's hooks before
    /// the next pair is written. All keys are validated first.
    pub fn set_many(&mut self, pairs: Map<String, Value>) -> SugarResult<&mut Self> {
        for key in pairs.keys() {
            SettingKey::parse(key)?;
        }
        for (key, value) in pairs {
            self.set(&key, value)?;
        }
        Ok(self)
    }

    pub fn enable(&mut self, key: &str) -> SugarResult<&mut Self> {
        self.set(key, Value::Bool(true))
    }

    pub fn disable(&mut self, key: &str) -> SugarResult<&mut Self> {
        self.set(key, Value::Bool(false))
    }

    /// Registers a hook fired with this application after every assignment
    /// of `key`.
    pub fn on_set(
        &mut self,
        key: &str,
        hook: impl Fn(&mut Application) + 'static,
    ) -> SugarResult<&mut Self> {
        self.hooks.on_set(SettingKey::parse(key)?, Arc::new(hook));
        Ok(self)
    }

    /// Registers a hook fired with this application and the assigned key
    /// after every assignment.
    pub fn on_any_set(
        &mut self,
        hook: impl Fn(&mut Application, &SettingKey) + 'static,
    ) -> &mut Self {
        self.hooks.on_any_set(Arc::new(hook));
        self
    }

    pub fn hooks(&self) -> &HookRegistry<Application> {
        &self.hooks
    }

    /// Registers extensions, running each one's setup at most once.
    ///
    /// Each extension is recorded and set up before the next one is looked
    /// at. The first failing setup aborts the rest of the batch; the failed
    /// extension stays recorded, later ones stay unrecorded.
    pub fn register(&mut self, extensions: &[Arc<dyn Extension>]) -> SugarResult<&mut Self> {
        ExtensionRegistry::validate(extensions)?;
        for extension in extensions {
            if self.extensions.record(self.id, extension) {
                extension.registered(self)?;
            }
        }
        Ok(self)
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Records the calling file as the next candidate frame.
    #[track_caller]
    pub fn record_caller(&mut self) -> &mut Self {
        self.frames.push(CallerLocation::here());
        self
    }

    pub fn record_frame(&mut self, frame: CallerLocation) -> &mut Self {
        self.frames.push(frame);
        self
    }

    pub fn frames(&self) -> &[CallerLocation] {
        &self.frames
    }

    /// Recorded frames that pass the caller filter.
    pub fn caller_files(&self) -> Vec<&CallerLocation> {
        self.callers.caller_files(&self.frames)
    }

    pub fn ignore_caller(&mut self, pattern: CallerPattern) -> SugarResult<&mut Self> {
        self.callers.ignore_caller(pattern)?;
        Ok(self)
    }

    pub fn callers_to_ignore(&mut self) -> &mut CallerPatterns {
        self.callers.callers_to_ignore()
    }

    /// Directory relative caller paths are resolved under first.
    pub fn source_root(&self) -> Option<&Path> {
        self.source_root.as_deref()
    }

    pub fn set_source_root(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.source_root = Some(dir.into());
        self
    }

    pub fn set_root(&mut self, root: impl Into<PathBuf>) -> &mut Self {
        self.root.set_root(root);
        self
    }

    /// Drops the cached root guess; the next `root()` recomputes it.
    pub fn invalidate_root_guess(&mut self) -> &mut Self {
        self.root.invalidate_guess();
        self
    }

    /// Whether this process should start serving the application: it is the
    /// program being executed and was neither derived from nor started yet.
    pub fn should_run(&self, program: &Path) -> bool {
        if !self.run_enabled || self.running {
            return false;
        }
        let Some(app_file) = RootAccess::app_file(self) else {
            return false;
        };
        match (std::path::absolute(program), std::path::absolute(app_file)) {
            (Ok(program), Ok(app_file)) => program == app_file,
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Applies run flags from `args` (program name excluded) and marks the
    /// application as running.
    pub fn run<I, T>(&mut self, args: I) -> SugarResult<LaunchConfig>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        if let Some(options) = RunOptions::from_args(args)? {
            options.apply_to(self)?;
        }
        self.running = true;
        let launch = LaunchConfig::from_app(self);
        info!(
            "event=app_run module=app name={} server={} port={}",
            self.name,
            launch.server.as_deref().unwrap_or("default"),
            launch
                .port
                .map(|port| port.to_string())
                .unwrap_or_else(|| "default".to_string())
        );
        Ok(launch)
    }

    /// Per-request view with the root accessors.
    pub fn instance(&self) -> Instance<'_> {
        Instance { app: self }
    }
}

impl RootAccess for Application {
    fn root_resolver(&self) -> &RootResolver {
        &self.root
    }

    fn app_file(&self) -> Option<PathBuf> {
        app_file_of(&self.settings)
    }
}

/// Request-time handle borrowing its application.
#[derive(Clone, Copy)]
pub struct Instance<'a> {
    app: &'a Application,
}

impl<'a> Instance<'a> {
    pub fn application(&self) -> &'a Application {
        self.app
    }

    pub fn settings(&self) -> SettingsView<'a> {
        self.app.settings.view()
    }
}

impl RootAccess for Instance<'_> {
    fn root_resolver(&self) -> &RootResolver {
        &self.app.root
    }

    fn app_file(&self) -> Option<PathBuf> {
        app_file_of(&self.app.settings)
    }
}

fn app_file_of(settings: &ConfigurationStore) -> Option<PathBuf> {
    settings
        .get(APP_FILE)
        .and_then(|value| value.as_str().map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::{Application, APP_FILE};
    use crate::boot::{BootDefaults, SugarExtension};
    use crate::caller::CallerLocation;
    use crate::extension::Extension;
    use crate::root::RootAccess;
    use crate::settings::SettingKey;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;
    use std::sync::Arc;

    fn booted(name: &str) -> Application {
        let mut app = Application::new(name);
        let sugar: Arc<dyn Extension> =
            Arc::new(SugarExtension::with_defaults(BootDefaults::empty()));
        app.register(&[sugar]).expect("register sugar");
        app
    }

    #[test]
    fn frames_recorded_inside_the_crate_are_filtered() {
        let mut app = Application::new("demo");
        assert!(app.caller_files().is_empty());

        app.record_frame(CallerLocation::new("/srv/demo/app.rs"));
        let files = app.caller_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path(), Path::new("/srv/demo/app.rs"));
    }

    #[test]
    fn assigning_app_file_drops_cached_root() {
        let first = tempfile::tempdir().expect("temp dir");
        let second = tempfile::tempdir().expect("temp dir");
        let mut app = booted("demo");

        app.set(APP_FILE, json!(first.path().join("app.rs")))
            .expect("set app file");
        assert_eq!(app.root().expect("root"), first.path());

        app.set(APP_FILE, json!(second.path().join("app.rs")))
            .expect("reset app file");
        assert_eq!(app.root().expect("root"), second.path());
    }

    #[test]
    fn hooks_see_fresh_root_inside_a_batch() {
        let first = tempfile::tempdir().expect("temp dir");
        let second = tempfile::tempdir().expect("temp dir");
        let mut app = booted("demo");
        app.set(APP_FILE, json!(first.path().join("app.rs")))
            .expect("set app file");
        assert_eq!(app.root().expect("root"), first.path());

        let roots: Rc<RefCell<Vec<PathBuf>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&roots);
        app.on_set("port", move |app: &mut Application| {
            sink.borrow_mut().push(app.root().expect("root"));
        })
        .expect("hook key");

        let Value::Object(pairs) = json!({
            "app_file": second.path().join("app.rs"),
            "port": 80
        }) else {
            unreachable!("literal object");
        };
        app.set_many(pairs).expect("set many");

        assert_eq!(*roots.borrow(), vec![second.path().to_path_buf()]);
    }

    #[test]
    fn hooks_receive_the_owner_and_may_assign() {
        let mut app = Application::new("demo");
        app.on_set("environment", |app: &mut Application| {
            let production = app.get("environment") == Some(json!("production"));
            app.set("lock", Value::Bool(production))
                .expect("nested assignment");
        })
        .expect("hook key");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        app.on_any_set(move |_: &mut Application, key: &SettingKey| {
            sink.borrow_mut().push(key.to_string());
        });

        app.set("environment", json!("production"))
            .expect("set environment");
        assert_eq!(app.get("lock"), Some(json!(true)));
        assert_eq!(*seen.borrow(), vec!["lock", "environment"]);
    }

    #[test]
    fn should_run_only_for_the_executed_file() {
        let mut app = Application::new("demo");
        assert!(!app.should_run(Path::new("/srv/demo/app.rs")));

        app.set(APP_FILE, json!("/srv/demo/app.rs")).expect("set app file");
        assert!(app.should_run(Path::new("/srv/demo/app.rs")));
        assert!(!app.should_run(Path::new("/srv/demo/other.rs")));

        app.run(Vec::<String>::new()).expect("run");
        assert!(!app.should_run(Path::new("/srv/demo/app.rs")));
    }

    #[test]
    fn deriving_disables_parent_auto_run() {
        let mut parent = Application::new("parent");
        parent
            .set(APP_FILE, json!("/srv/demo/app.rs"))
            .expect("set app file");
        let child = parent.derive("child");

        assert!(!parent.should_run(Path::new("/srv/demo/app.rs")));
        assert!(child.should_run(Path::new("/srv/demo/app.rs")));
        assert_eq!(child.parent(), Some(parent.id()));
    }
}

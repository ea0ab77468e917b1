use regex::Regex;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sugar_core::{
    Application, BootDefaults, CallerLocation, CallerPattern, Extension, RootAccess,
    SugarExtension, APP_FILE, SUGAR_EXTENSION_ID,
};

fn sugar(defaults: BootDefaults) -> Arc<dyn Extension> {
    Arc::new(SugarExtension::with_defaults(defaults))
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().expect("path should exist")
}

fn tests_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests")
}

#[test]
fn boot_detects_the_defining_file() {
    let app = Application::boot("demo").expect("boot");

    let app_file = app.app_file().expect("app file detected");
    assert!(app_file.is_absolute());
    assert!(app_file.is_file());
    assert_eq!(
        canonical(&app_file),
        canonical(&tests_dir().join("boot_sequence.rs"))
    );
    assert_eq!(canonical(&app.root().expect("root")), canonical(&tests_dir()));
    assert!(app.extensions().contains(SUGAR_EXTENSION_ID));
}

#[test]
fn boot_in_resolves_against_the_given_source_root() {
    let app = Application::boot_in("demo", env!("CARGO_MANIFEST_DIR")).expect("boot");

    let app_file = app.app_file().expect("app file detected");
    assert!(app_file.is_file());
    assert_eq!(
        canonical(&app_file),
        canonical(&tests_dir().join("boot_sequence.rs"))
    );
    assert_eq!(
        app.source_root(),
        Some(Path::new(env!("CARGO_MANIFEST_DIR")))
    );
}

#[test]
fn boot_installs_the_root_invalidating_hook() {
    let project = tempfile::tempdir().expect("temp dir");
    let mut app = Application::boot("demo").expect("boot");
    assert_eq!(canonical(&app.root().expect("root")), canonical(&tests_dir()));

    app.set(APP_FILE, json!(project.path().join("app.rs")))
        .expect("move app file");
    assert_eq!(app.root().expect("root"), project.path());
}

#[test]
fn boot_applies_default_settings() {
    let mut app = Application::boot("demo").expect("boot");

    assert_eq!(
        app.get("haml"),
        Some(json!({"format": "html5", "escape_html": true}))
    );
    assert!(app.settings().view().is_enabled("sessions"));

    app.set("haml", json!({"escape_html": false}))
        .expect("override haml");
    assert_eq!(
        app.get("haml"),
        Some(json!({"format": "html5", "escape_html": false}))
    );
}

#[test]
fn boot_keeps_an_explicit_app_file() {
    let mut app = Application::new("demo");
    app.set(APP_FILE, json!("/srv/explicit/app.rs"))
        .expect("set app file");
    app.register(&[sugar(BootDefaults::empty())])
        .expect("register sugar");

    assert_eq!(
        app.app_file().as_deref(),
        Some(Path::new("/srv/explicit/app.rs"))
    );
}

#[test]
fn ignored_frames_are_skipped_when_detecting_the_app_file() {
    let mut app = Application::new("demo");
    app.ignore_caller(CallerPattern::here())
        .expect("ignore this file")
        .ignore_caller(Regex::new(r"^/vendor/").expect("regex").into())
        .expect("ignore vendor");
    app.record_frame(CallerLocation::new("/vendor/rack/builder.rs"))
        .record_frame(CallerLocation::new("/srv/shop/app.rs"));

    app.register(&[sugar(BootDefaults::empty())])
        .expect("register sugar");

    assert_eq!(
        app.app_file().as_deref(),
        Some(Path::new("/srv/shop/app.rs"))
    );
}

#[test]
fn missing_caller_file_leaves_app_file_unset() {
    let mut app = Application::new("demo");
    app.ignore_caller(CallerPattern::here())
        .expect("ignore this file");
    app.register(&[sugar(BootDefaults::empty())])
        .expect("register sugar");

    assert!(app.app_file().is_none());
    assert!(!app.is_root_known());
}

#[test]
fn custom_defaults_are_applied_in_order() {
    let defaults = BootDefaults::from_json(
        r#"{"settings": [
            {"key": "views", "value": {"engine": "haml"}},
            {"key": "views", "value": {"layout": true}}
        ]}"#,
    )
    .expect("defaults");
    let mut app = Application::new("demo");
    app.register(&[sugar(defaults)]).expect("register sugar");

    assert_eq!(
        app.get("views"),
        Some(json!({"engine": "haml", "layout": true}))
    );
}

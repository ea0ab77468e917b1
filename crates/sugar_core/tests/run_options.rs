use serde_json::json;
use sugar_core::{Application, LaunchConfig, SugarError};

#[test]
fn run_applies_flags_to_settings() {
    let mut app = Application::new("runner");
    let launch = app
        .run(["-x", "-e", "production", "-s", "puma", "-p", "9292"])
        .expect("run");

    assert_eq!(
        launch,
        LaunchConfig {
            environment: Some("production".to_string()),
            server: Some("puma".to_string()),
            port: Some(9292),
            lock: true,
        }
    );
    assert_eq!(app.get("port"), Some(json!(9292)));
    assert_eq!(app.get("environment"), Some(json!("production")));
    assert!(app.is_running());
}

#[test]
fn run_without_arguments_keeps_settings() {
    let mut app = Application::new("runner");
    app.set("port", json!(4567)).expect("set port");
    let launch = app.run(Vec::<String>::new()).expect("run");

    assert_eq!(launch.port, Some(4567));
    assert!(!launch.lock);
    assert!(app.is_running());
}

#[test]
fn run_rejects_unknown_flags_before_starting() {
    let mut app = Application::new("runner");
    let err = app.run(["-z"]).expect_err("unknown flag");
    assert!(matches!(err, SugarError::Options(_)));
    assert!(!app.is_running());
}

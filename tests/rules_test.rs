//! Rule set tests
//!
//! Tests for environment-scoped activation of override/bypass sets,
//! batch atomicity, full-replace bypass semantics, and JSON loading.
//!
//! Tests here mutate the process-wide deployment environment and run
//! serially.

use std::fs;
use std::sync::{Arc, Mutex};

use serial_test::serial;

use layerfig::{
    set_deployment_env, BypassSet, ChangeEvent, Env, FigEngine, FigError, FigValue, MemorySource,
    OptionKind, OverrideSet, PropertySource, Schema,
};

fn engine() -> (Arc<FigEngine>, Arc<Mutex<Vec<ChangeEvent>>>) {
    let source = Arc::new(MemorySource::new());
    source.set("svc.port", FigValue::Int(8345));
    source.set("svc.maxConn", FigValue::Int(64));

    let schema = Schema::builder()
        .option("svc.port", "getPort", OptionKind::Int64, Some("8080"))
        .option("svc.maxConn", "getMaxConn", OptionKind::Int64, Some("32"))
        .build();

    let engine = FigEngine::new(&schema, source as Arc<dyn PropertySource>)
        .expect("schema defaults are valid");

    let events: Arc<Mutex<Vec<ChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    engine.add_listener(move |event| {
        events_clone.lock().unwrap().push(event.clone());
    });

    (engine, events)
}

/// A PROD-scoped override set does not apply in UNIT: returns false,
/// mutates nothing.
#[test]
#[serial]
fn test_env_mismatch_is_silent_false() {
    set_deployment_env(Env::Unit);
    let (engine, events) = engine();

    let set = OverrideSet::new("prod-tuning")
        .environment(Env::Prod)
        .option("svc.port", "9999");

    assert!(!engine.apply_override_set(&set).unwrap());
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(8345)));
    assert!(events.lock().unwrap().is_empty());
    assert!(engine.active_override_set().is_none());
}

/// A set scoped to ALL applies regardless of the current environment.
#[test]
#[serial]
fn test_all_env_always_applies() {
    set_deployment_env(Env::Prod);
    let (engine, _) = engine();

    let set = OverrideSet::new("global")
        .environment(Env::All)
        .option("svc.port", "9999");

    assert!(engine.apply_override_set(&set).unwrap());
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(9999)));
    assert_eq!(engine.active_override_set().unwrap().name, "global");
}

/// When the deployment environment is ALL, every set is in force.
#[test]
#[serial]
fn test_all_deployment_env_accepts_everything() {
    set_deployment_env(Env::All);
    let (engine, _) = engine();

    let set = OverrideSet::new("prod-only")
        .environment(Env::Prod)
        .option("svc.port", "9999");

    assert!(engine.apply_override_set(&set).unwrap());
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(9999)));
}

/// Applying and clearing an override set fires one notification per
/// actually-changed key.
#[test]
#[serial]
fn test_apply_and_clear_notifications() {
    set_deployment_env(Env::Unit);
    let (engine, events) = engine();

    let set = OverrideSet::new("tuning")
        .environment(Env::Unit)
        .option("svc.port", "9999")
        .option("svc.maxConn", "64"); // equal to live, invisible

    assert!(engine.apply_override_set(&set).unwrap());
    assert_eq!(events.lock().unwrap().len(), 1);

    engine.clear_override_set().unwrap();
    assert_eq!(events.lock().unwrap().len(), 2);
    assert!(engine.active_override_set().is_none());
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(8345)));
}

/// One bad pair aborts the whole batch; nothing is applied.
#[test]
#[serial]
fn test_batch_atomicity() {
    set_deployment_env(Env::Unit);
    let (engine, events) = engine();

    let set = OverrideSet::new("broken")
        .environment(Env::Unit)
        .option("svc.port", "9999")
        .option("svc.unknown", "1");

    let err = engine.apply_override_set(&set).unwrap_err();
    match err {
        FigError::Batch { set, source } => {
            assert_eq!(set, "broken");
            assert!(matches!(*source, FigError::UnknownKey(_)));
        }
        other => panic!("expected batch error, got {:?}", other),
    }

    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(8345)));
    assert!(events.lock().unwrap().is_empty());
}

/// A new bypass set fully replaces the previous one, clearing entries no
/// longer present.
#[test]
#[serial]
fn test_bypass_full_replace() {
    set_deployment_env(Env::Unit);
    let (engine, _) = engine();

    let first = BypassSet::new()
        .environment(Env::Unit)
        .option("svc.port", "100")
        .option("svc.maxConn", "5");
    assert!(engine.apply_bypass_set(&first).unwrap());
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(100)));
    assert_eq!(engine.get("svc.maxConn").unwrap(), Some(FigValue::Int(5)));

    let second = BypassSet::new()
        .environment(Env::Unit)
        .option("svc.port", "200");
    assert!(engine.apply_bypass_set(&second).unwrap());

    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(200)));
    // svc.maxConn's bypass was cleared by the replacement.
    assert_eq!(engine.get("svc.maxConn").unwrap(), Some(FigValue::Int(64)));

    engine.clear_bypass_set().unwrap();
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(8345)));
    assert!(engine.active_bypass_set().is_none());
}

/// A bypass masks an override without disturbing it.
#[test]
#[serial]
fn test_bypass_masks_override() {
    set_deployment_env(Env::Unit);
    let (engine, _) = engine();

    let overrides = OverrideSet::new("tuning")
        .environment(Env::All)
        .option("svc.port", "9999");
    engine.apply_override_set(&overrides).unwrap();

    let bypass = BypassSet::new()
        .environment(Env::All)
        .option("svc.port", "100");
    engine.apply_bypass_set(&bypass).unwrap();
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(100)));

    engine.clear_bypass_set().unwrap();
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(9999)));
}

/// Rule sets load from JSON files.
#[test]
#[serial]
fn test_load_override_set_from_file() {
    set_deployment_env(Env::Unit);
    let (engine, _) = engine();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overrides.json");
    fs::write(
        &path,
        r#"{
            "name": "canary",
            "environments": ["UNIT", "DEV"],
            "options": [{"key": "svc.port", "value": "9999"}]
        }"#,
    )
    .unwrap();

    let set = OverrideSet::from_file(&path).unwrap();
    assert_eq!(set.name, "canary");
    assert!(set.environments.contains(&Env::Unit));

    assert!(engine.apply_override_set(&set).unwrap());
    assert_eq!(engine.get("svc.port").unwrap(), Some(FigValue::Int(9999)));
}

/// Loading a missing or malformed rule set file is a typed error.
#[test]
fn test_load_rule_set_errors() {
    let err = OverrideSet::from_file("no/such/file.json").unwrap_err();
    assert!(matches!(err, FigError::FileRead(_, _)));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{not json").unwrap();
    let err = BypassSet::from_file(&path).unwrap_err();
    assert!(matches!(err, FigError::Parse(_)));
}

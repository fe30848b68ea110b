//! Integration tests for named-event dispatch.
//!
//! Covers ordering across registration modes, reentrancy, the unhandled
//! `error` contract, max-listener warnings, rejection capture and disposal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use herald_core::{EventKey, EventsError, ListenerError, MaxListeners};
use herald_events::{EmitterOptions, EventEmitter, Listener, ListenerMode};
use herald_test::{CallLog, ManualScheduler, RecordingDiagnostics, init_test_logging};
use serde_json::json;

#[test]
fn test_prepend_runs_before_append() {
    init_test_logging();
    let log = CallLog::new();
    let emitter = EventEmitter::new();

    emitter.on("x", &log.listener("L1")).unwrap();
    emitter.prepend_listener("x", &log.listener("L2")).unwrap();
    assert!(emitter.emit("x", &[json!(7)]).unwrap());

    assert_eq!(log.entries(), ["L2(7)", "L1(7)"]);
}

#[test]
fn test_mixed_modes_keep_list_order() {
    let log = CallLog::new();
    let emitter = EventEmitter::new();

    emitter.on("x", &log.listener("on")).unwrap();
    emitter.once("x", &log.listener("once")).unwrap();
    emitter
        .prepend_once_listener("x", &log.listener("prepend-once"))
        .unwrap();

    emitter.emit("x", &[json!(1)]).unwrap();
    emitter.emit("x", &[json!(2)]).unwrap();

    assert_eq!(
        log.entries(),
        ["prepend-once(1)", "on(1)", "once(1)", "on(2)"]
    );
}

#[test]
fn test_once_fires_once_under_reentrant_emit() {
    let log = CallLog::new();
    let emitter = EventEmitter::new();
    let inner = log.clone();
    emitter
        .once(
            "x",
            &Listener::fallible(move |emitter, args| {
                inner.record(format!("once({})", herald_test::render_args(args)));
                emitter.emit("x", &[json!("again")])?;
                Ok(())
            }),
        )
        .unwrap();

    emitter.emit("x", &[json!("first")]).unwrap();
    emitter.emit("x", &[json!("second")]).unwrap();

    assert_eq!(log.entries(), ["once(first)"]);
    assert_eq!(emitter.listener_count("x"), 0);
}

#[test]
fn test_removal_during_emit_takes_effect_next_emit() {
    let log = CallLog::new();
    let emitter = EventEmitter::new();
    let victim = log.listener("L2");

    let target = victim.clone();
    let remover_log = log.clone();
    emitter
        .on(
            "x",
            &Listener::fallible(move |emitter, _| {
                remover_log.record("L1");
                emitter.off("x", &target)?;
                Ok(())
            }),
        )
        .unwrap();
    emitter.on("x", &victim).unwrap();

    emitter.emit("x", &[json!(1)]).unwrap();
    emitter.emit("x", &[json!(2)]).unwrap();

    assert_eq!(log.entries(), ["L1", "L2(1)", "L1"]);
}

#[test]
fn test_listener_added_during_emit_waits_for_next_emit() {
    let log = CallLog::new();
    let emitter = EventEmitter::new();
    let late = log.listener("late");
    let adder_log = log.clone();
    emitter
        .once(
            "x",
            &Listener::fallible(move |emitter, _| {
                adder_log.record("adder");
                emitter.on("x", &late)?;
                Ok(())
            }),
        )
        .unwrap();

    emitter.emit("x", &[json!(1)]).unwrap();
    assert_eq!(log.entries(), ["adder"]);
    emitter.emit("x", &[json!(2)]).unwrap();
    assert_eq!(log.entries(), ["adder", "late(2)"]);
}

#[test]
fn test_listener_count_tracks_every_mutation() {
    let emitter = EventEmitter::new();
    let a = Listener::new(|_, _| {});
    let b = Listener::new(|_, _| {});

    emitter.on("x", &a).unwrap();
    emitter.on("x", &a).unwrap();
    emitter.once("x", &b).unwrap();
    emitter.prepend_listener("y", &b).unwrap();
    assert_eq!(emitter.listener_count("x"), 3);
    assert_eq!(emitter.event_names(), [EventKey::from("x"), EventKey::from("y")]);

    assert!(emitter.off("x", &a).unwrap());
    assert_eq!(emitter.listener_count("x"), 2);
    assert!(!emitter.off("x", &Listener::new(|_, _| {})).unwrap());

    emitter.emit("x", &[]).unwrap();
    assert_eq!(emitter.listener_count("x"), 1);

    emitter.remove_all_listeners_for("x").unwrap();
    assert_eq!(emitter.listener_count("x"), 0);
    assert_eq!(emitter.event_names(), [EventKey::from("y")]);
}

#[test]
fn test_raw_listeners_expose_originals_and_modes() {
    let emitter = EventEmitter::new();
    let persistent = Listener::new(|_, _| {});
    let one_shot = Listener::new(|_, _| {});
    emitter.on("x", &persistent).unwrap();
    emitter.once("x", &one_shot).unwrap();

    let raw = emitter.raw_listeners("x");
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0].listener, persistent);
    assert_eq!(raw[0].mode, ListenerMode::Persistent);
    assert_eq!(raw[1].listener, one_shot);
    assert_eq!(raw[1].mode, ListenerMode::Once);

    // Removing by the original identity works for once registrations too.
    assert!(emitter.off("x", &one_shot).unwrap());
    assert_eq!(emitter.listeners("x"), [persistent]);
}

#[test]
fn test_new_and_remove_listener_notifications() {
    let log = CallLog::new();
    let emitter = EventEmitter::new();
    emitter.on(EventKey::NEW_LISTENER, &log.listener("new")).unwrap();
    emitter
        .on(EventKey::REMOVE_LISTENER, &log.listener("removed"))
        .unwrap();

    let listener = Listener::new(|_, _| {});
    emitter.on("x", &listener).unwrap();
    emitter.off("x", &listener).unwrap();

    let id = listener.id().to_string();
    let entries = log.entries();
    assert_eq!(entries.len(), 3);
    assert!(entries[0].starts_with("new(removeListener,"));
    assert_eq!(entries[1], format!("new(x,{id})"));
    assert_eq!(entries[2], format!("removed(x,{id})"));
}

#[test]
fn test_error_without_listener_escalates_after_monitors() {
    let diagnostics = RecordingDiagnostics::new();
    let log = CallLog::new();
    let emitter =
        EventEmitter::with_options(EmitterOptions::new().with_diagnostics(diagnostics.shared()));
    emitter
        .on(EventKey::ErrorMonitor, &log.listener("monitor"))
        .unwrap();

    let err = emitter.emit("error", &[json!("bad")]).unwrap_err();
    assert!(matches!(
        err,
        EventsError::UnhandledError { payload: Some(ref p), .. } if *p == json!("bad")
    ));
    assert_eq!(log.entries(), ["monitor(bad)"]);
    assert_eq!(
        diagnostics.unhandled_errors(),
        vec![(EventKey::error(), Some(json!("bad")))]
    );

    emitter.on("error", &log.listener("handler")).unwrap();
    assert!(emitter.emit("error", &[json!("bad")]).unwrap());
    assert_eq!(diagnostics.unhandled_errors().len(), 1);
}

#[test]
fn test_listener_failure_propagates_and_stops_dispatch() {
    let log = CallLog::new();
    let emitter = EventEmitter::new();
    emitter
        .on(
            "x",
            &Listener::fallible(|_, _| Err::<(), ListenerError>("listener broke".into())),
        )
        .unwrap();
    emitter.on("x", &log.listener("after")).unwrap();

    let err = emitter.emit("x", &[]).unwrap_err();
    assert!(matches!(err, EventsError::Listener { ref key, .. } if *key == "x"));
    assert!(log.is_empty());
}

#[test]
fn test_max_listener_warning_once_per_key() {
    let diagnostics = RecordingDiagnostics::new();
    let emitter = EventEmitter::with_options(
        EmitterOptions::new()
            .with_diagnostics(diagnostics.shared())
            .with_max_listeners(MaxListeners::Limited(2)),
    );

    for _ in 0..4 {
        emitter.on("x", &Listener::new(|_, _| {})).unwrap();
    }
    emitter.on("y", &Listener::new(|_, _| {})).unwrap();

    let warnings = diagnostics.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].key, "x");
    assert_eq!(warnings[0].count, 3);
    assert_eq!(warnings[0].max, 2);
    assert_eq!(warnings[0].dispatcher, "EventEmitter");
}

#[test]
fn test_unbounded_never_warns() {
    let diagnostics = RecordingDiagnostics::new();
    let emitter =
        EventEmitter::with_options(EmitterOptions::new().with_diagnostics(diagnostics.shared()));
    emitter.set_max_listeners(MaxListeners::Unbounded);
    for _ in 0..50 {
        emitter.on("x", &Listener::new(|_, _| {})).unwrap();
    }
    assert!(diagnostics.warnings().is_empty());
}

#[test]
fn test_captured_rejection_is_emitted_as_error() {
    let scheduler = ManualScheduler::new();
    let log = CallLog::new();
    let emitter = EventEmitter::with_options(
        EmitterOptions::new()
            .with_capture_rejections(true)
            .with_scheduler(scheduler.shared()),
    );
    emitter
        .on(
            "x",
            &Listener::future(|_, _| async { Err::<(), ListenerError>("async boom".into()) }),
        )
        .unwrap();
    emitter.on("error", &log.listener("E")).unwrap();

    assert!(emitter.emit("x", &[]).unwrap());
    assert!(log.is_empty());
    assert_eq!(scheduler.run_pending(), 1);
    assert_eq!(log.entries(), [r#"E({"message":"async boom"})"#]);
}

#[test]
fn test_custom_rejection_handler_receives_context() {
    let scheduler = ManualScheduler::new();
    let log = CallLog::new();
    let handler_log = log.clone();
    let emitter = EventEmitter::with_options(
        EmitterOptions::new()
            .with_capture_rejections(true)
            .with_scheduler(scheduler.shared())
            .with_rejection_handler(move |_, error, key, args| {
                handler_log.record(format!(
                    "{key}:{error}:{}",
                    herald_test::render_args(args)
                ));
            }),
    );
    emitter
        .on(
            "job",
            &Listener::future(|_, _| async { Err::<(), ListenerError>("failed".into()) }),
        )
        .unwrap();

    emitter.emit("job", &[json!(3)]).unwrap();
    scheduler.run_pending();
    assert_eq!(log.entries(), ["job:failed:3"]);
}

#[test]
fn test_uncaptured_rejection_goes_to_diagnostics() {
    let scheduler = ManualScheduler::new();
    let diagnostics = RecordingDiagnostics::new();
    let emitter = EventEmitter::with_options(
        EmitterOptions::new()
            .with_capture_rejections(false)
            .with_scheduler(scheduler.shared())
            .with_diagnostics(diagnostics.shared()),
    );
    emitter
        .on(
            "x",
            &Listener::future(|_, _| async { Err::<(), ListenerError>("lost".into()) }),
        )
        .unwrap();

    emitter.emit("x", &[]).unwrap();
    scheduler.run_pending();
    assert_eq!(
        diagnostics.rejections(),
        vec![(EventKey::from("x"), "lost".to_owned())]
    );
}

#[test]
fn test_rejection_without_runtime_still_reported() {
    let diagnostics = RecordingDiagnostics::new();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let emitter =
        EventEmitter::with_options(EmitterOptions::new().with_diagnostics(diagnostics.shared()));
    emitter
        .on(
            "job",
            &Listener::future(move |_, _| {
                let flag = Arc::clone(&flag);
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Err::<(), ListenerError>("no runtime".into())
                }
            }),
        )
        .unwrap();

    assert!(emitter.emit("job", &[]).unwrap());

    let started = Instant::now();
    while diagnostics.rejections().is_empty() && started.elapsed() < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(
        diagnostics.rejections(),
        vec![(EventKey::from("job"), "no runtime".to_owned())]
    );
}

#[test]
fn test_remove_all_sweeps_keys_snapshot_when_observer_removes() {
    let log = CallLog::new();
    let emitter = EventEmitter::new();
    let b = log.listener("b");
    emitter.on("a", &log.listener("a")).unwrap();
    emitter.on("b", &b).unwrap();
    emitter.on("c", &log.listener("c")).unwrap();

    let swept = log.clone();
    emitter
        .on(
            EventKey::REMOVE_LISTENER,
            &Listener::fallible(move |emitter, args| {
                let key = args.first().and_then(|k| k.as_str()).unwrap_or_default();
                swept.record(format!("swept:{key}"));
                if key == "a" {
                    emitter.off("b", &b)?;
                }
                Ok(())
            }),
        )
        .unwrap();

    emitter.remove_all_listeners().unwrap();

    assert!(emitter.event_names().is_empty());
    assert_eq!(emitter.listener_count("c"), 0);
    assert_eq!(log.entries(), ["swept:a", "swept:b", "swept:c"]);
}

#[test]
fn test_limited_zero_never_warns() {
    let diagnostics = RecordingDiagnostics::new();
    let emitter = EventEmitter::with_options(
        EmitterOptions::new()
            .with_diagnostics(diagnostics.shared())
            .with_max_listeners(MaxListeners::Limited(0)),
    );
    for _ in 0..20 {
        emitter.on("x", &Listener::new(|_, _| {})).unwrap();
    }
    assert!(diagnostics.warnings().is_empty());
}

#[test]
fn test_dispose_releases_everything_once() {
    let log = CallLog::new();
    let emitter = EventEmitter::new();
    emitter.on("a", &log.listener("a")).unwrap();
    emitter.once("b", &log.listener("b")).unwrap();
    emitter
        .on(EventKey::REMOVE_LISTENER, &log.listener("removed"))
        .unwrap();
    log.clear();

    emitter.dispose().unwrap();
    emitter.dispose().unwrap();

    // The observer is removed last and is no longer registered to hear its
    // own removal.
    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].starts_with("removed(a,"));
    assert!(entries[1].starts_with("removed(b,"));

    assert!(emitter.is_disposed());
    assert!(emitter.event_names().is_empty());
    assert!(!emitter.emit("a", &[]).unwrap());
    assert!(!emitter.emit("error", &[json!("ignored")]).unwrap());
    assert!(matches!(
        emitter.on("a", &log.listener("late")),
        Err(EventsError::Disposed)
    ));
    assert!(!emitter.off("a", &log.listener("late")).unwrap());
    assert_eq!(emitter.listener_count("a"), 0);
}

//! End-to-end tests of the fetch → reconcile → spawn → relayout pipeline.
//!
//! Run:
//!   cargo test -p mutexmon-runtime --test monitor_pipeline

use mutexmon_core::{MutexState, Rect, Snapshot, SnapshotFormatError};
use mutexmon_runtime::{
    FetchError, ManualClock, Monitor, MonitorConfig, Msg, Program, ProgramConfig,
    RecordingRenderer, RenderCall, ScriptedSource, ScriptedSubscription, Subscription, TickOutcome,
    Viewport,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn owned(name: &str, pid: i64, message: &str) -> MutexState {
    MutexState::new(name).with_owner(pid).with_message(message)
}

#[test]
fn client_nodes_follow_owners_one_to_one() {
    init_tracing();
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();

    let ticks = [
        vec![owned("a", 1, ""), owned("b", 2, "")],
        vec![owned("a", 1, ""), owned("b", 2, ""), owned("c", 2, "")],
        vec![owned("a", 3, ""), MutexState::new("b")],
        vec![],
        vec![owned("a", 1, "")],
    ];

    for (i, entries) in ticks.into_iter().enumerate() {
        let snapshot = Snapshot::new(entries);
        let expected: Vec<i64> = snapshot.active_pids().into_iter().collect();
        monitor.on_tick(Ok(snapshot), i as u64 * 1000, &mut renderer);

        let live: Vec<i64> = renderer.live_clients().into_iter().map(|(pid, _)| pid).collect();
        assert_eq!(live, expected, "tick {i}");
        assert_eq!(
            monitor.active_pids().iter().copied().collect::<Vec<_>>(),
            expected
        );
    }

    let creates = renderer
        .calls
        .iter()
        .filter(|c| matches!(c, RenderCall::CreateClient { pid: 1, .. }))
        .count();
    let removes = renderer
        .calls
        .iter()
        .filter(|c| matches!(c, RenderCall::RemoveClient { .. }))
        .count();
    // pid 1 comes back after going away; pids 1, 2, 3 each leave once.
    assert_eq!(creates, 2);
    assert_eq!(removes, 3);
}

#[test]
fn lock_state_reaches_renderer() {
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();
    monitor.on_tick(
        Ok(Snapshot::new(vec![
            MutexState::new("a").with_owner(5),
            MutexState::new("b").with_owner(5).with_locked(true),
            MutexState::new("c").with_owner(6),
        ])),
        0,
        &mut renderer,
    );
    assert_eq!(renderer.live_clients(), vec![(5, true), (6, false)]);

    monitor.on_tick(
        Ok(Snapshot::new(vec![
            MutexState::new("a").with_owner(5),
            MutexState::new("c").with_owner(6).with_locked(true),
        ])),
        1000,
        &mut renderer,
    );
    assert_eq!(renderer.live_clients(), vec![(5, false), (6, true)]);
}

#[test]
fn repeated_message_animates_once() {
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();
    for (i, msg) in ["", "A", "A", "B"].into_iter().enumerate() {
        monitor.on_tick(
            Ok(Snapshot::new(vec![owned("m", 9, msg)])),
            i as u64 * 1000,
            &mut renderer,
        );
    }
    let labels: Vec<&str> = renderer
        .calls
        .iter()
        .filter_map(|c| match c {
            RenderCall::CreateAnchor { label, .. } => Some(label.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(labels, vec!["➔ A", "➔ B"]);
}

#[test]
fn long_message_label_is_truncated() {
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();
    monitor.on_tick(
        Ok(Snapshot::new(vec![owned(
            "m",
            9,
            "a status line that goes on and on",
        )])),
        0,
        &mut renderer,
    );
    let anchor = monitor.live_indicators()[0].anchor;
    assert_eq!(renderer.anchor_label(anchor), Some("➔ a status line that g..."));
}

#[test]
fn indicator_lives_for_ttl_then_goes() {
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();
    let t = 5_000;
    monitor.on_tick(Ok(Snapshot::new(vec![owned("m", 1, "go")])), t, &mut renderer);

    let steady = Snapshot::new(vec![owned("m", 1, "go")]);
    monitor.on_tick(Ok(steady.clone()), t + 2999, &mut renderer);
    assert_eq!(monitor.live_indicators().len(), 1);

    monitor.on_tick(Ok(steady), t + 3001, &mut renderer);
    assert!(monitor.live_indicators().is_empty());
    assert!(renderer.live_anchors().is_empty());
}

#[test]
fn fetch_error_leaves_state_identical() {
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();
    monitor.on_tick(
        Ok(Snapshot::new(vec![owned("a", 1, "x"), owned("b", 2, "")])),
        0,
        &mut renderer,
    );

    let reconciler = monitor.reconciler().clone();
    let indicators = monitor.live_indicators().to_vec();
    renderer.clear_calls();

    let outcome = monitor.on_tick(Err(FetchError::Status { status: 502 }), 1000, &mut renderer);
    assert_eq!(outcome, TickOutcome::FetchFailed);
    assert_eq!(monitor.reconciler(), &reconciler);
    assert_eq!(monitor.live_indicators(), indicators.as_slice());
    assert!(renderer.calls.is_empty(), "failed tick must not touch the renderer");

    let rejected = monitor.on_tick(
        Err(FetchError::Format(SnapshotFormatError::EmptyName { index: 0 })),
        1000,
        &mut renderer,
    );
    assert_eq!(rejected, TickOutcome::Rejected);
    assert_eq!(monitor.reconciler(), &reconciler);
    assert_eq!(monitor.stats().fetch_failures, 1);
    assert_eq!(monitor.stats().rejected, 1);
}

#[test]
fn duplicate_names_reject_whole_snapshot() {
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();
    monitor.on_tick(Ok(Snapshot::new(vec![owned("a", 1, "")])), 0, &mut renderer);
    renderer.clear_calls();

    let outcome = monitor.on_tick(
        Ok(Snapshot::new(vec![owned("z", 2, "hi"), owned("z", 3, "")])),
        1000,
        &mut renderer,
    );
    assert_eq!(outcome, TickOutcome::Rejected);
    assert_eq!(monitor.active_pids().iter().copied().collect::<Vec<_>>(), vec![1]);
    assert!(renderer.calls.is_empty());
}

#[test]
fn indicator_anchors_on_circle_edges() {
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();
    renderer.set_server_rect(Some(Rect::new(100.0, 100.0, 40.0, 40.0)));
    renderer.set_client_rect(4, Rect::new(0.0, 0.0, 20.0, 20.0));

    monitor.on_tick(Ok(Snapshot::new(vec![owned("m", 4, "hi")])), 0, &mut renderer);

    let indicator = &monitor.live_indicators()[0];
    let layout = renderer.anchor_layout(indicator.anchor).expect("placed");
    let client_center = Rect::new(0.0, 0.0, 20.0, 20.0).center();
    let server_center = Rect::new(100.0, 100.0, 40.0, 40.0).center();
    assert!((layout.anchor_start.distance(client_center) - 10.0).abs() < 1e-9);
    assert!((layout.length - (client_center.distance(server_center) - 30.0)).abs() < 1e-9);
}

#[test]
fn indicator_freezes_when_client_vanishes_mid_flight() {
    let mut monitor = Monitor::new(&MonitorConfig::default());
    let mut renderer = RecordingRenderer::new();
    renderer.set_client_rect(4, Rect::new(0.0, 0.0, 20.0, 20.0));

    monitor.on_tick(Ok(Snapshot::new(vec![owned("m", 4, "bye")])), 0, &mut renderer);
    let anchor = monitor.live_indicators()[0].anchor;
    let frozen = renderer.anchor_layout(anchor).expect("placed");

    // Owner releases the mutex; its node goes away but the indicator stays.
    monitor.on_tick(
        Ok(Snapshot::new(vec![MutexState::new("m").with_message("bye")])),
        1000,
        &mut renderer,
    );
    assert!(monitor.node(4).is_none());
    assert_eq!(monitor.live_indicators().len(), 1);
    assert_eq!(monitor.live_indicators()[0].layout, Some(frozen));

    // A resize reflows nodes; the orphaned indicator does not move.
    renderer.clear_calls();
    monitor.on_resize(Viewport::new(200, 60), 1500, &mut renderer);
    assert!(
        !renderer
            .calls
            .iter()
            .any(|c| matches!(c, RenderCall::PlaceAnchor { anchor: a, .. } if *a == anchor))
    );
    assert_eq!(renderer.anchor_layout(anchor), Some(frozen));

    // It still expires on its normal deadline, not earlier.
    monitor.on_deadline(2999, &mut renderer);
    assert_eq!(monitor.live_indicators().len(), 1);
    monitor.on_deadline(3000, &mut renderer);
    assert!(monitor.live_indicators().is_empty());
    assert!(renderer.live_anchors().is_empty());
}

#[test]
fn program_runs_scripted_ticks_until_quit() {
    init_tracing();
    let config = MonitorConfig::default();
    let source = ScriptedSource::new([
        Ok(Snapshot::new(vec![owned("a", 1, "hello")])),
        Err(FetchError::Status { status: 500 }),
    ]);
    let clock = ManualClock::new(0);
    let mut program = Program::new(
        Monitor::new(&config),
        source,
        RecordingRenderer::new(),
        clock,
        ProgramConfig {
            tick_on_start: true,
            max_ticks: None,
        },
    );

    let subs: Vec<Box<dyn Subscription>> = vec![Box::new(ScriptedSubscription::new(
        1,
        vec![Msg::Resize(Viewport::new(80, 24)), Msg::Tick, Msg::Quit],
    ))];
    let stats = program.run(subs);

    assert!(stats.ticks >= 1);
    assert_eq!(stats.applied, 1);
    assert_eq!(program.renderer().live_clients(), vec![(1, false)]);
    assert_eq!(program.monitor().live_indicators().len(), 1);
}

#[test]
fn program_returns_once_every_subscription_has_finished() {
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let config = MonitorConfig::default();
        let mut program = Program::new(
            Monitor::new(&config),
            ScriptedSource::new([Ok(Snapshot::new(vec![owned("a", 1, "")]))]),
            RecordingRenderer::new(),
            ManualClock::new(0),
            ProgramConfig::default(),
        );
        let subs: Vec<Box<dyn Subscription>> =
            vec![Box::new(ScriptedSubscription::new(1, vec![Msg::Tick]))];
        let _ = done_tx.send(program.run(subs));
    });

    let stats = done_rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("run returns after its only script ends");
    assert_eq!(stats.ticks, 1);
    assert_eq!(stats.applied, 1);
}

#[test]
fn program_stops_after_max_ticks() {
    let config = MonitorConfig::default();
    let mut program = Program::new(
        Monitor::new(&config),
        ScriptedSource::new([Ok(Snapshot::new(vec![owned("a", 1, "")]))]),
        RecordingRenderer::new(),
        ManualClock::new(0),
        ProgramConfig {
            tick_on_start: false,
            max_ticks: Some(2),
        },
    );
    assert!(program.handle(Msg::Tick));
    assert!(!program.handle(Msg::Tick));
    assert_eq!(program.source().fetches(), 2);
    assert!(!program.handle(Msg::Quit));
}

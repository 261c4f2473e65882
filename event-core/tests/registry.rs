mod support;

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use event_core::event::EventSnapshot;
use event_core::{
    EventConfig, EventId, EventKind, EventRegistry, ExecutionContext, IrqPriority, LogLevel,
    RegistryError, TriggerMode,
};
use support::{MockCountdown, MockLine, MockPlatform};

fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn count(counter: &AtomicU32) -> u32 {
    counter.load(Ordering::Relaxed)
}

#[test]
fn identifiers_follow_registration_order() {
    let noop = || {};
    let mut registry: EventRegistry<'_, MockPlatform, 4> = EventRegistry::new(MockPlatform::new(1));

    let ids = [
        registry.register_event(EventConfig::main("a", &noop)),
        registry.register_timer(EventConfig::main("b", &noop), 10, MockCountdown::default()),
        registry.register_interrupt(
            EventConfig::main("c", &noop),
            MockLine::new(3),
            TriggerMode::Falling,
            IrqPriority::Medium,
        ),
        registry.register_timer_with_jitter(
            EventConfig::immediate("d", &noop),
            10,
            5,
            MockCountdown::default(),
        ),
    ];

    assert_eq!(ids.map(EventId::raw), [0, 1, 2, 3]);
    assert!(registry.ids().eq(ids));
    assert_eq!(registry.kind(ids[0]), EventKind::General);
    assert_eq!(registry.kind(ids[1]), EventKind::Timer);
    assert_eq!(registry.kind(ids[2]), EventKind::Interrupt);
    assert_eq!(registry.jitter_max(ids[3]), 5);

    assert_eq!(
        registry.try_register_event(EventConfig::main("e", &noop)),
        Err(RegistryError::CapacityExhausted { capacity: 4 })
    );
    assert_eq!(registry.len(), 4);
}

#[test]
#[should_panic(expected = "event registration failed: event table full (1 slots)")]
fn registering_past_capacity_panics() {
    let noop = || {};
    let mut registry: EventRegistry<'_, MockPlatform, 1> = EventRegistry::new(MockPlatform::new(1));
    registry.register_event(EventConfig::main("a", &noop));
    registry.register_event(EventConfig::main("b", &noop));
}

#[test]
fn timer_without_jitter_arms_exact_timeout_on_every_cycle() {
    let hits = AtomicU32::new(0);
    let on_tick = || bump(&hits);
    let countdown = MockCountdown::default();
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(7));
    let id = registry.register_timer(EventConfig::main("tick", &on_tick), 250, countdown.clone());

    registry.start(id, false);
    for _ in 0..5 {
        registry.on_timer_expired(id);
    }

    assert_eq!(countdown.arms(), vec![250; 6]);
    assert!(registry.is_running(id));
    assert_eq!(registry.time_remaining(id), 250);
}

#[test]
fn jittered_timer_arms_within_inclusive_window() {
    let noop = || {};
    let countdown = MockCountdown::default();
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(42));
    let id = registry.register_timer_with_jitter(
        EventConfig::main("blink", &noop),
        100,
        20,
        countdown.clone(),
    );

    registry.start(id, false);
    for _ in 0..500 {
        registry.on_timer_expired(id);
        registry.process_main_events();
    }

    let arms = countdown.arms();
    assert_eq!(arms.len(), 501);
    assert!(arms.iter().all(|ms| (100..=120).contains(ms)), "{arms:?}");
    assert!(
        arms.iter().any(|&ms| ms != arms[0]),
        "jitter should be redrawn on every re-arm"
    );
}

#[test]
fn single_shot_timer_does_not_rearm() {
    let hits = AtomicU32::new(0);
    let on_fire = || bump(&hits);
    let countdown = MockCountdown::default();
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_timer(EventConfig::main("once", &on_fire), 30, countdown.clone());

    registry.start(id, true);
    countdown.expire();
    registry.on_timer_expired(id);

    assert_eq!(countdown.arms(), vec![30]);
    assert!(!registry.is_running(id));
    // Single-shot events are dispatched even though the timer has stopped.
    assert_eq!(registry.process_main_events(), 1);
    assert_eq!(count(&hits), 1);
}

#[test]
fn dispatch_without_new_trigger_is_idempotent() {
    let hits = AtomicU32::new(0);
    let on_fire = || bump(&hits);
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_event(EventConfig::main("manual", &on_fire));

    registry.trigger(id);
    assert!(!registry.is_idle());
    assert_eq!(registry.process_main_events(), 1);
    let after_first = registry.snapshot(id);

    for _ in 0..3 {
        assert_eq!(registry.process_main_events(), 0);
    }

    assert_eq!(count(&hits), 1);
    assert_eq!(registry.snapshot(id), after_first);
    assert_eq!(after_first.trigger_count, 1);
    assert_eq!(after_first.process_count, 1);
    assert!(registry.is_idle());
}

#[test]
fn pause_suppresses_dispatch_but_not_triggering() {
    let hits = AtomicU32::new(0);
    let on_fire = || bump(&hits);
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_event(EventConfig::main("paused", &on_fire));

    registry.pause(id);
    registry.trigger(id);
    assert_eq!(registry.process_main_events(), 0);

    let snapshot = registry.snapshot(id);
    assert!(snapshot.paused);
    assert!(snapshot.triggered);
    assert_eq!(snapshot.trigger_count, 1);
    assert_eq!(snapshot.process_count, 0);
    assert!(!registry.is_idle());

    registry.resume(id);
    assert_eq!(registry.process_main_events(), 1);
    assert_eq!(registry.snapshot(id).process_count, 1);
    assert_eq!(count(&hits), 1);
}

#[test]
#[should_panic(expected = "is not a main-context event")]
fn pausing_an_immediate_event_panics() {
    let noop = || {};
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_event(EventConfig::immediate("now", &noop));
    registry.pause(id);
}

#[test]
fn immediate_events_run_at_trigger_time() {
    let hits = AtomicU32::new(0);
    let on_fire = || bump(&hits);
    let countdown = MockCountdown::default();
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_timer(
        EventConfig::new(&on_fire, ExecutionContext::Immediate),
        40,
        countdown,
    );

    registry.start(id, false);
    registry.on_timer_expired(id);
    registry.trigger(id);

    assert_eq!(count(&hits), 2);
    assert!(registry.is_idle());
    assert_eq!(registry.process_main_events(), 0);

    let snapshot = registry.snapshot(id);
    assert_eq!(snapshot.trigger_count, 2);
    assert_eq!(snapshot.process_count, 2);
    assert_eq!(format!("{}", snapshot.name), "EVENT0");
}

#[test]
fn stopped_continuous_timer_is_not_dispatched() {
    let hits = AtomicU32::new(0);
    let on_fire = || bump(&hits);
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_timer(
        EventConfig::main("poll", &on_fire),
        100,
        MockCountdown::default(),
    );

    registry.start(id, false);
    registry.on_timer_expired(id);
    registry.stop(id);

    assert_eq!(registry.process_main_events(), 0);
    assert_eq!(count(&hits), 0);
    assert!(registry.is_idle(), "the stale trigger is consumed");
    assert_eq!(registry.snapshot(id).process_count, 0);
}

#[test]
fn stop_leaves_latched_trigger_until_cleared() {
    let noop = || {};
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_event(EventConfig::main("manual", &noop));

    registry.start(id, false);
    registry.trigger(id);
    registry.stop(id);
    assert!(registry.is_triggered(id));

    registry.clear_trigger(id);
    assert!(registry.is_idle());
    assert_eq!(registry.process_main_events(), 0);
}

#[test]
fn set_timeout_clears_trigger_and_cancels_countdown() {
    let noop = || {};
    let countdown = MockCountdown::default();
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_timer(EventConfig::main("slow", &noop), 500, countdown.clone());

    registry.start(id, false);
    registry.on_timer_expired(id);
    assert!(registry.is_triggered(id));

    registry.set_timeout(id, 80);
    assert_eq!(registry.timeout(id), 80);
    assert!(!registry.is_triggered(id));
    assert!(!registry.is_running(id));
    assert_eq!(countdown.cancels(), 1);

    registry.start(id, false);
    assert_eq!(countdown.last_arm(), Some(80));
}

#[test]
#[should_panic(expected = "is not a timer event")]
fn timer_queries_on_interrupt_event_panic() {
    let noop = || {};
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_interrupt(
        EventConfig::main("button", &noop),
        MockLine::new(0),
        TriggerMode::Both,
        IrqPriority::Low,
    );
    let _ = registry.time_remaining(id);
}

#[test]
fn interrupts_route_by_line_and_single_shot_disables() {
    let first = AtomicU32::new(0);
    let second = AtomicU32::new(0);
    let on_first = || bump(&first);
    let on_second = || bump(&second);
    let line_a = MockLine::new(4);
    let line_b = MockLine::new(9);
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let a = registry.register_interrupt(
        EventConfig::main("a", &on_first),
        line_a.clone(),
        TriggerMode::Falling,
        IrqPriority::High,
    );
    let b = registry.register_interrupt(
        EventConfig::main("b", &on_second),
        line_b.clone(),
        TriggerMode::Rising,
        IrqPriority::Low,
    );

    registry.start(a, true);
    registry.start(b, false);
    assert_eq!(
        line_a.enabled(),
        Some((TriggerMode::Falling, IrqPriority::High))
    );

    assert_eq!(registry.on_interrupt(4), Some(a));
    assert_eq!(line_a.enabled(), None);
    assert_eq!(line_a.disables(), 1);
    assert!(!registry.is_triggered(b));

    assert_eq!(registry.on_interrupt(9), Some(b));
    assert_eq!(registry.on_interrupt(9), Some(b));
    assert!(line_b.enabled().is_some());
    assert_eq!(registry.on_interrupt(12), None);

    assert_eq!(registry.process_main_events(), 2);
    assert_eq!(count(&first), 1);
    assert_eq!(count(&second), 1);
    assert_eq!(registry.snapshot(b).trigger_count, 2);
}

#[test]
fn start_resets_elapsed_time_and_clears_pending_trigger() {
    let noop = || {};
    let platform = MockPlatform::new(1);
    let now = platform.now.clone();
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(platform);
    let id = registry.register_event(EventConfig::main("manual", &noop));

    now.set(1_000);
    registry.start(id, false);
    registry.trigger(id);
    now.set(3_450);
    assert_eq!(registry.snapshot(id).elapsed_since_start_ms, 2_450);

    registry.start(id, true);
    assert!(!registry.is_triggered(id));
    assert!(registry.snapshot(id).single);
    assert_eq!(registry.snapshot(id).elapsed_since_start_ms, 0);
}

#[test]
fn restart_zeroes_counters_and_keeps_debug_setting() {
    let hits = AtomicU32::new(0);
    let on_fire = || bump(&hits);
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let id = registry.register_event(EventConfig::main("manual", &on_fire));

    registry.start(id, false);
    registry.trigger(id);
    assert_eq!(registry.process_main_events(), 1);
    registry.disable_debug(id);
    let before = registry.snapshot(id);
    assert_eq!((before.trigger_count, before.process_count), (1, 1));

    registry.start(id, false);
    let after = registry.snapshot(id);
    assert_eq!((after.trigger_count, after.process_count), (0, 0));
    assert!(!after.debug_enabled);
    assert_eq!(count(&hits), 1);
}

#[test]
fn debug_flag_is_tracked_per_event() {
    let noop = || {};
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let quiet = registry.register_event(EventConfig::main("quiet", &noop));
    let chatty = registry.register_event(EventConfig::main("chatty", &noop));

    registry.disable_debug(quiet);
    assert!(!registry.snapshot(quiet).debug_enabled);
    assert!(registry.snapshot(chatty).debug_enabled);

    registry.enable_debug(quiet);
    assert!(registry.snapshot(quiet).debug_enabled);
}

#[test]
fn diagnostics_dump_lists_every_event() {
    let noop = || {};
    let platform = MockPlatform::new(1);
    let now = platform.now.clone();
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(platform);
    let heartbeat = registry.register_timer(
        EventConfig::main("heartbeat", &noop),
        1_000,
        MockCountdown::default(),
    );
    registry.register_event(EventConfig::new(&noop, ExecutionContext::Main));

    registry.start(heartbeat, false);
    registry.on_timer_expired(heartbeat);
    registry.on_timer_expired(heartbeat);
    registry.process_main_events();
    now.set(2_050);

    let mut out = String::new();
    registry.write_diagnostics(&mut out).unwrap();
    assert_eq!(
        out,
        "--------------------\n\
         Event diagnostics\n\
         heartbeat: triggered=2, processed=1, elapsedSinceStart=2.0s\n\
         EVENT1: triggered=0, processed=0, elapsedSinceStart=2.0s\n\
         --------------------\n"
    );

    let snapshots: Vec<EventSnapshot> = registry.snapshots().collect();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].name.given(), Some("heartbeat"));
}

thread_local! {
    static LOG_LINES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn capture(level: LogLevel, args: fmt::Arguments<'_>) {
    LOG_LINES.with(|lines| lines.borrow_mut().push(format!("{level}: {args}")));
}

fn take_log_lines() -> Vec<String> {
    LOG_LINES.with(|lines| lines.borrow_mut().drain(..).collect())
}

#[test]
fn disabled_debug_silences_only_that_event() {
    event_core::log::set_sink(Some(capture));
    let noop = || {};
    let quiet_timer = MockCountdown::default();
    let chatty_timer = MockCountdown::default();
    let mut registry: EventRegistry<'_, MockPlatform> = EventRegistry::new(MockPlatform::new(1));
    let quiet = registry.register_timer(EventConfig::main("quiet", &noop), 2, quiet_timer);
    let chatty = registry.register_timer(EventConfig::main("chatty", &noop), 50, chatty_timer);

    registry.disable_debug(quiet);
    take_log_lines();

    registry.start(quiet, false);
    registry.start(chatty, false);
    registry.on_timer_expired(quiet);
    registry.on_timer_expired(chatty);
    registry.process_main_events();
    registry.stop(quiet);
    registry.stop(chatty);

    let lines = take_log_lines();
    assert!(lines.iter().all(|line| !line.contains("quiet")), "{lines:#?}");
    assert!(lines.contains(&"debug: Event chatty start (50ms, continuous)".to_owned()));
    assert!(lines.contains(&"debug: Event chatty process".to_owned()));
    assert!(lines.contains(&"debug: Event chatty stop".to_owned()));

    registry.enable_debug(quiet);
    registry.start(quiet, true);
    let lines = take_log_lines();
    assert!(lines.contains(&"info: Event quiet: debug logging enabled".to_owned()));
    assert!(lines.contains(&"debug: Event quiet start (2ms, single)".to_owned()));
    assert!(lines.contains(&"warn: quiet timeout below recommended minimum of 6ms".to_owned()));
}

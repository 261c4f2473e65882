use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex};

use event_core::event::Callback;
use event_core::{
    Clock, EventConfig, EventId, EventKind, EventRegistry, ExecutionContext, IrqPriority, Level,
    LevelInput, LogLevel, Millis, Pattern, PatternProgress, Phase, TriggerMode,
};

use crate::command::{self, Command, HELP_LINES, SyntaxError};
use crate::sim::{SimButton, SimCountdown, SimPlatform, SimTimeline, TimerSlot};

/// EXTI line the simulated button is wired to.
pub const BUTTON_LINE: u8 = 0;

pub const HEARTBEAT_PERIOD_MS: Millis = 1_000;
pub const HEARTBEAT_JITTER_MS: Millis = 200;
pub const BLINK_PERIOD_MS: Millis = 250;

/// Tap, short pause, tap.
pub const TAP_WINDOW_MS: Millis = 400;
pub const TAP_GAP_MS: Millis = 150;

const HEARTBEAT: EventId = EventId::new(0);
const BUTTON: EventId = EventId::new(1);
const GESTURE: EventId = EventId::new(2);

type ActivityLog = Arc<Mutex<Vec<&'static str>>>;

thread_local! {
    static CORE_LOG: RefCell<Vec<(LogLevel, String)>> = const { RefCell::new(Vec::new()) };
}

/// Log sink for the registry and the matcher.
fn capture_core_log(level: LogLevel, args: fmt::Arguments<'_>) {
    CORE_LOG.with(|lines| lines.borrow_mut().push((level, args.to_string())));
}

fn take_core_log() -> Vec<(LogLevel, String)> {
    CORE_LOG.with(RefCell::take)
}

/// Failure of a well-formed or malformed console command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandError {
    Syntax(SyntaxError),
    UnknownEvent(EventId),
    NotATimer(EventId),
    NotMainContext(EventId),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Syntax(err) => write!(f, "syntax {err}"),
            CommandError::UnknownEvent(id) => write!(f, "unknown event {id}"),
            CommandError::NotATimer(id) => write!(f, "event {id} is not a timer event"),
            CommandError::NotMainContext(id) => {
                write!(f, "event {id} runs in immediate context")
            }
        }
    }
}

impl std::error::Error for CommandError {}

impl From<SyntaxError> for CommandError {
    fn from(err: SyntaxError) -> Self {
        CommandError::Syntax(err)
    }
}

/// Simulated board running the event registry and the double-tap matcher.
pub struct Session {
    timeline: SimTimeline,
    button: SimButton,
    registry: EventRegistry<'static, SimPlatform>,
    timer_routes: Vec<(TimerSlot, EventId)>,
    pattern: Pattern<SimButton, SimCountdown>,
    pattern_slot: TimerSlot,
    activity: ActivityLog,
    gestures: u32,
    trace: bool,
}

impl Session {
    /// Boots the simulated board. `seed` fixes the jitter sequence.
    pub fn new(seed: Option<u64>) -> Self {
        event_core::log::set_sink(Some(capture_core_log));
        let timeline = SimTimeline::new();
        let button = SimButton::new(BUTTON_LINE);
        let activity = ActivityLog::default();

        let mut registry = EventRegistry::new(SimPlatform::new(timeline.clone(), seed));
        let mut timer_routes = Vec::new();

        let countdown = timeline.countdown();
        timer_routes.push((countdown.slot(), HEARTBEAT));
        let heartbeat = registry.register_timer_with_jitter(
            EventConfig::main("heartbeat", report(&activity, "heartbeat")),
            HEARTBEAT_PERIOD_MS,
            HEARTBEAT_JITTER_MS,
            countdown,
        );

        let pressed = registry.register_interrupt(
            EventConfig::main("button", report(&activity, "button pressed")),
            button.clone(),
            TriggerMode::Falling,
            IrqPriority::Medium,
        );

        let gesture = registry.register_event(EventConfig::main(
            "gesture",
            report(&activity, "gesture handled"),
        ));

        let countdown = timeline.countdown();
        let blink_slot = countdown.slot();
        let blink = registry.register_timer(
            EventConfig::immediate("blink", report(&activity, "blink")),
            BLINK_PERIOD_MS,
            countdown,
        );
        timer_routes.push((blink_slot, blink));

        debug_assert_eq!([heartbeat, pressed, gesture], [HEARTBEAT, BUTTON, GESTURE]);

        registry.start(heartbeat, false);
        registry.start(pressed, false);
        registry.start(gesture, false);

        let countdown = timeline.countdown();
        let pattern_slot = countdown.slot();
        let mut pattern = Pattern::new(button.clone(), countdown);
        pattern.add_phase(tap_phase());
        pattern.add_phase(Phase::new(TAP_GAP_MS, true));
        pattern.add_phase(tap_phase());

        // Registration chatter is not interesting at the prompt.
        take_core_log();

        Self {
            timeline,
            button,
            registry,
            timer_routes,
            pattern,
            pattern_slot,
            activity,
            gestures: 0,
            trace: false,
        }
    }

    /// Runs one console line and returns the lines to print.
    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Err(err) = self.execute(line, &mut out) {
            out.push(format!("ERR {err}"));
        }
        self.run_main_loop(&mut out);
        out
    }

    /// Number of gestures recognised since boot.
    pub fn gestures(&self) -> u32 {
        self.gestures
    }

    pub fn now_ms(&self) -> Millis {
        self.timeline.now_ms()
    }

    fn execute(&mut self, line: &str, out: &mut Vec<String>) -> Result<(), CommandError> {
        match command::parse(line)? {
            Command::Press => self.drive(Level::Low, out),
            Command::Release => self.drive(Level::High, out),
            Command::Tap => {
                self.drive(Level::Low, out);
                self.drive(Level::High, out);
            }
            Command::Advance(ms) => self.advance(ms, out),
            Command::Dispatch => {
                let ran = self.registry.process_main_events();
                out.push(format!("dispatched {ran} event(s)"));
            }
            Command::Trigger(id) => {
                self.require_event(id)?;
                self.registry.trigger(id);
                out.push(format!("triggered {}", self.registry.name(id)));
            }
            Command::Start { id, single } => {
                self.require_event(id)?;
                self.registry.start(id, single);
                let mode = if single { "single" } else { "continuous" };
                out.push(format!("started {} ({mode})", self.registry.name(id)));
            }
            Command::Stop(id) => {
                self.require_event(id)?;
                self.registry.stop(id);
                out.push(format!("stopped {}", self.registry.name(id)));
            }
            Command::Pause(id) => {
                self.require_main_event(id)?;
                self.registry.pause(id);
                out.push(format!("paused {}", self.registry.name(id)));
            }
            Command::Resume(id) => {
                self.require_main_event(id)?;
                self.registry.resume(id);
                out.push(format!("resumed {}", self.registry.name(id)));
            }
            Command::Timeout { id, set } => {
                self.require_event(id)?;
                if self.registry.kind(id) != EventKind::Timer {
                    return Err(CommandError::NotATimer(id));
                }
                if let Some(ms) = set {
                    self.registry.set_timeout(id, ms);
                }
                out.push(format!(
                    "{} timeout {}ms (jitter up to {}ms)",
                    self.registry.name(id),
                    self.registry.timeout(id),
                    self.registry.jitter_max(id)
                ));
            }
            Command::Debug { id, enabled } => {
                self.require_event(id)?;
                if enabled {
                    self.registry.enable_debug(id);
                } else {
                    self.registry.disable_debug(id);
                }
                let state = if enabled { "on" } else { "off" };
                out.push(format!("debug logging {state} for {}", self.registry.name(id)));
            }
            Command::Trace(enabled) => {
                self.trace = enabled;
                let state = if enabled { "shown" } else { "hidden" };
                out.push(format!("debug lines {state}"));
            }
            Command::Diag => {
                out.extend(
                    self.registry
                        .diagnostics_report()
                        .lines()
                        .map(str::to_owned),
                );
            }
            Command::Pattern => out.push(self.pattern_summary()),
            Command::Status => self.status(out),
            Command::Help => out.extend(HELP_LINES.iter().map(|line| (*line).to_owned())),
        }
        Ok(())
    }

    fn require_event(&self, id: EventId) -> Result<(), CommandError> {
        if id.as_index() < self.registry.len() {
            Ok(())
        } else {
            Err(CommandError::UnknownEvent(id))
        }
    }

    fn require_main_event(&self, id: EventId) -> Result<(), CommandError> {
        self.require_event(id)?;
        if self.registry.snapshot(id).context == ExecutionContext::Main {
            Ok(())
        } else {
            Err(CommandError::NotMainContext(id))
        }
    }

    /// Changes the button level and delivers the edge to both consumers.
    fn drive(&mut self, level: Level, out: &mut Vec<String>) {
        if self.button.drive(level).is_none() {
            return;
        }
        out.push(self.stamp(&format!("button {level}")));

        if self.button.fires_on(level) {
            self.registry.on_interrupt(BUTTON_LINE);
        }
        let progress = self.pattern.on_input();
        self.note_progress(progress, out);
    }

    fn advance(&mut self, ms: Millis, out: &mut Vec<String>) {
        let until = self.timeline.now_ms().saturating_add(ms);
        while let Some(slot) = self.timeline.next_expiry(until) {
            self.route_expiry(slot, out);
            self.run_main_loop(out);
        }
        self.timeline.settle(until);
    }

    fn route_expiry(&mut self, slot: TimerSlot, out: &mut Vec<String>) {
        if slot == self.pattern_slot {
            let progress = self.pattern.on_deadline();
            self.note_progress(progress, out);
            return;
        }
        if let Some(&(_, id)) = self.timer_routes.iter().find(|(owner, _)| *owner == slot) {
            self.registry.on_timer_expired(id);
        }
    }

    /// One iteration of the firmware main loop: dispatch, then poll the
    /// matcher and hand a recognised gesture to its event.
    fn run_main_loop(&mut self, out: &mut Vec<String>) {
        self.registry.process_main_events();
        if self.pattern.check_complete() {
            self.gestures += 1;
            out.push(self.stamp("double tap recognised"));
            self.registry.trigger(GESTURE);
            self.registry.process_main_events();
        }
        self.drain_core_log(out);
        self.drain_activity(out);
    }

    /// Warnings and info lines always show; debug lines only with `trace on`.
    fn drain_core_log(&self, out: &mut Vec<String>) {
        for (level, text) in take_core_log() {
            if level > LogLevel::Debug || self.trace {
                out.push(self.stamp(&format!("{level}: {text}")));
            }
        }
    }

    fn drain_activity(&self, out: &mut Vec<String>) {
        let fired: Vec<&'static str> = match self.activity.lock() {
            Ok(mut log) => log.drain(..).collect(),
            Err(_) => return,
        };
        for name in fired {
            out.push(self.stamp(name));
        }
    }

    fn note_progress(&self, progress: PatternProgress, out: &mut Vec<String>) {
        let text = match progress {
            PatternProgress::Ignored => return,
            PatternProgress::Matched { phase, matched } => {
                format!("pattern phase {} matched {matched} level(s)", phase + 1)
            }
            PatternProgress::Mismatched { phase } => {
                format!("pattern phase {} saw an unexpected level", phase + 1)
            }
            PatternProgress::PhaseComplete { phase } => {
                format!("pattern phase {} complete, holding its window", phase + 1)
            }
            PatternProgress::PhaseStarted { phase } => {
                format!("pattern phase {} started", phase + 1)
            }
            PatternProgress::Complete => "pattern complete".to_owned(),
            PatternProgress::Reset(reason) => format!("pattern reset: {}", reason.label()),
        };
        out.push(self.stamp(&text));
    }

    fn pattern_summary(&self) -> String {
        let mut summary = String::new();
        // Writing into a `String` cannot fail.
        let _ = self.pattern.write_progress(&mut summary);
        format!(
            "{summary}; recognised={}, resets={}",
            self.gestures,
            self.pattern.reset_count()
        )
    }

    fn status(&self, out: &mut Vec<String>) {
        out.push(format!(
            "t={}ms button={} idle={}",
            self.timeline.now_ms(),
            self.button.level(),
            if self.registry.is_idle() { "yes" } else { "no" }
        ));
        for snapshot in self.registry.snapshots() {
            let mut line = format!(
                "  {} {} {} {:?}",
                snapshot.id,
                snapshot.name,
                snapshot.kind.label(),
                snapshot.context
            );
            if snapshot.kind == EventKind::Timer && self.registry.is_running(snapshot.id) {
                line.push_str(&format!(
                    " next in {}ms",
                    self.registry.time_remaining(snapshot.id)
                ));
            }
            if snapshot.paused {
                line.push_str(" paused");
            }
            if snapshot.triggered {
                line.push_str(" pending");
            }
            out.push(line);
        }
        out.push(format!("  {}", self.pattern_summary()));
    }

    fn stamp(&self, text: &str) -> String {
        format!("[{}ms] {text}", self.timeline.now_ms())
    }
}

fn tap_phase() -> Phase {
    Phase::new(TAP_WINDOW_MS, false)
        .with_state(Level::Low)
        .with_state(Level::High)
}

/// Callback that records `name` in the activity log. The closure is leaked
/// because the registry holds `'static` callbacks for the session lifetime.
fn report(activity: &ActivityLog, name: &'static str) -> Callback<'static> {
    let activity = Arc::clone(activity);
    Box::leak(Box::new(move || {
        if let Ok(mut log) = activity.lock() {
            log.push(name);
        }
    }))
}

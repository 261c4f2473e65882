//! Application wiring: which events exist, how the button and the software
//! timers reach them, and the double-click gesture.
//!
//! Everything here is platform agnostic so it runs under host tests; the
//! embassy runtime only owns the pins, the tick source and the tasks.

use core::fmt;

use event_core::event::Callback;
use event_core::{
    Clock, EventConfig, EventId, EventRegistry, IrqPriority, Level, Millis, Pattern, PatternError,
    PatternProgress, Phase, Platform, RegistryError, TriggerMode,
};
use heapless::Vec;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::board::{
    BUTTON_EXTI_LINE, CLICK_WINDOW_MS, DIAGNOSTICS_PERIOD_MS, HEARTBEAT_JITTER_MS,
    HEARTBEAT_PERIOD_MS,
};
use crate::button::{ButtonLine, ButtonPin};
use crate::console;
use crate::soft_timer::{SoftTimer, TimerWheel};

/// Event table size for the application.
pub const APP_EVENTS: usize = 8;

const TIMER_EVENTS: usize = 4;
const GESTURE_PHASES: usize = 2;
const CLICK_LEVELS: usize = 2;

/// Clock, countdowns, button line and jitter source of this board.
pub struct BoardPlatform<'a> {
    wheel: &'a TimerWheel,
    rng: SmallRng,
}

impl<'a> BoardPlatform<'a> {
    pub fn new(wheel: &'a TimerWheel, seed: u64) -> Self {
        Self {
            wheel,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Clock for BoardPlatform<'_> {
    fn now_ms(&self) -> Millis {
        self.wheel.now_ms()
    }
}

impl<'a> Platform for BoardPlatform<'a> {
    type Countdown = SoftTimer<'a>;
    type Line = ButtonLine<'a>;
    type Rng = SmallRng;

    fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }
}

pub type Registry<'a> = EventRegistry<'a, BoardPlatform<'a>, APP_EVENTS>;
pub type Gesture<'a> = Pattern<ButtonLine<'a>, SoftTimer<'a>, GESTURE_PHASES, CLICK_LEVELS>;

/// User callbacks for the application events.
#[derive(Clone, Copy)]
pub struct Handlers<'a> {
    pub heartbeat: Callback<'a>,
    pub button: Callback<'a>,
    pub gesture: Callback<'a>,
    pub diagnostics: Callback<'a>,
}

/// Identifiers of the application events.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AppEvents {
    pub heartbeat: EventId,
    pub button: EventId,
    pub gesture: EventId,
    pub diagnostics: EventId,
}

/// Reasons the application could not be assembled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetupError {
    Registry(RegistryError),
    Pattern(PatternError),
    TimersExhausted,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Registry(err) => write!(f, "event registration failed: {err}"),
            SetupError::Pattern(err) => write!(f, "gesture setup failed: {err}"),
            SetupError::TimersExhausted => f.write_str("no free software timer"),
        }
    }
}

impl From<RegistryError> for SetupError {
    fn from(err: RegistryError) -> Self {
        SetupError::Registry(err)
    }
}

impl From<PatternError> for SetupError {
    fn from(err: PatternError) -> Self {
        SetupError::Pattern(err)
    }
}

/// Registry, gesture matcher and the routing between them and the hardware.
pub struct App<'a> {
    registry: Registry<'a>,
    gesture: Gesture<'a>,
    gesture_timer: u32,
    timer_routes: Vec<(u32, EventId), TIMER_EVENTS>,
    events: AppEvents,
}

impl<'a> App<'a> {
    /// Registers the application events and builds the gesture.
    ///
    /// # Errors
    ///
    /// Fails when the event table, the gesture or the timer wheel is too small.
    pub fn new(
        wheel: &'a TimerWheel,
        pin: &'a ButtonPin,
        seed: u64,
        handlers: Handlers<'a>,
    ) -> Result<Self, SetupError> {
        let mut registry = Registry::new(BoardPlatform::new(wheel, seed));
        let mut timer_routes = Vec::new();

        let timer = wheel.timer().ok_or(SetupError::TimersExhausted)?;
        let heartbeat = registry.try_register_timer_with_jitter(
            EventConfig::main("heartbeat", handlers.heartbeat),
            HEARTBEAT_PERIOD_MS,
            HEARTBEAT_JITTER_MS,
            timer,
        )?;
        route(&mut timer_routes, timer.mask(), heartbeat)?;

        let button = registry.try_register_interrupt(
            EventConfig::main("button", handlers.button),
            ButtonLine::new(BUTTON_EXTI_LINE, pin),
            TriggerMode::Falling,
            IrqPriority::Medium,
        )?;

        let gesture = registry.try_register_event(EventConfig::main("gesture", handlers.gesture))?;

        let timer = wheel.timer().ok_or(SetupError::TimersExhausted)?;
        let diagnostics = registry.try_register_timer(
            EventConfig::main("diagnostics", handlers.diagnostics),
            DIAGNOSTICS_PERIOD_MS,
            timer,
        )?;
        route(&mut timer_routes, timer.mask(), diagnostics)?;

        let timer = wheel.timer().ok_or(SetupError::TimersExhausted)?;
        let mut pattern = Gesture::new(ButtonLine::new(BUTTON_EXTI_LINE, pin), timer);
        pattern.try_add_phase(click()?)?;
        pattern.try_add_phase(click()?)?;

        Ok(Self {
            registry,
            gesture: pattern,
            gesture_timer: timer.mask(),
            timer_routes,
            events: AppEvents {
                heartbeat,
                button,
                gesture,
                diagnostics,
            },
        })
    }

    /// Starts every event. The heartbeat runs quietly; its log line comes
    /// from the callback.
    pub fn start(&mut self) {
        let AppEvents {
            heartbeat,
            button,
            gesture,
            diagnostics,
        } = self.events;

        self.registry.disable_debug(heartbeat);
        self.registry.start(heartbeat, false);
        self.registry.start(button, false);
        self.registry.start(gesture, false);
        self.registry.start(diagnostics, false);
    }

    /// Routes the expiry bitmask of one wheel tick.
    pub fn on_timers_expired(&mut self, expired: u32) {
        if expired & self.gesture_timer != 0 {
            let progress = self.gesture.on_deadline();
            console::gesture(progress, self.registry.platform().now_ms());
        }
        for &(mask, id) in &self.timer_routes {
            if expired & mask != 0 {
                self.registry.on_timer_expired(id);
            }
        }
    }

    /// Delivers a button edge. `interrupt_enabled` tells whether the line
    /// interrupt accepted the edge; the gesture samples every edge.
    pub fn on_button_edge(&mut self, interrupt_enabled: bool) -> PatternProgress {
        if interrupt_enabled {
            self.registry.on_interrupt(BUTTON_EXTI_LINE);
        }
        let progress = self.gesture.on_input();
        console::gesture(progress, self.registry.platform().now_ms());
        progress
    }

    /// Main-loop half of one iteration: turns a completed gesture into its
    /// event and collects the callbacks due for dispatch. The caller runs
    /// them after releasing the critical section.
    pub fn service(&mut self) -> Vec<Callback<'a>, APP_EVENTS> {
        if self.gesture.check_complete() {
            self.registry.trigger(self.events.gesture);
        }
        self.registry.collect_main_events()
    }

    pub fn is_idle(&self) -> bool {
        self.registry.is_idle()
    }

    pub fn events(&self) -> AppEvents {
        self.events
    }

    pub fn registry(&self) -> &Registry<'a> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<'a> {
        &mut self.registry
    }

    pub fn gesture(&self) -> &Gesture<'a> {
        &self.gesture
    }
}

fn route(
    routes: &mut Vec<(u32, EventId), TIMER_EVENTS>,
    mask: u32,
    id: EventId,
) -> Result<(), SetupError> {
    routes
        .push((mask, id))
        .map_err(|_| SetupError::TimersExhausted)
}

/// Press then release inside one click window.
fn click() -> Result<Phase<CLICK_LEVELS>, PatternError> {
    let mut phase = Phase::new(CLICK_WINDOW_MS, false);
    phase.try_add_state(Level::Low)?;
    phase.try_add_state(Level::High)?;
    Ok(phase)
}

//! Fixed-capacity event table and its runtime.
//!
//! Triggers arrive from three directions: [`EventRegistry::on_timer_expired`]
//! (timer interrupt context), [`EventRegistry::on_interrupt`] (GPIO interrupt
//! context) and [`EventRegistry::trigger`] (any context). Main-context events
//! only latch a flag there; [`EventRegistry::process_main_events`] consumes
//! the flags from the main loop. Immediate-context events run their callback
//! on the spot.
//!
//! Contract violations (table overflow, unknown ids, timer queries on a
//! non-timer event, pausing an immediate event) panic. On the target that
//! halts the device, which is the intended response to a misconfigured build.

use core::fmt;

use heapless::Vec;
use rand::{Rng, RngCore};

use super::diagnostics::{self, EventDiagnostics, EventName, EventSnapshot};
use super::{
    Callback, EventConfig, EventId, EventKind, EventSource, ExecutionContext, InterruptSource,
    MAX_EVENTS, MIN_RECOMMENDED_TIMEOUT_MS, Platform, RegistryError, TimerSource,
};
use crate::level::{InterruptLine, IrqPriority, LineId, TriggerMode};
use crate::timing::{Countdown, Millis};

struct EventRecord<'a, C, L> {
    id: EventId,
    name: Option<&'static str>,
    context: ExecutionContext,
    callback: Callback<'a>,
    triggered: bool,
    paused: bool,
    single: bool,
    source: EventSource<C, L>,
    diagnostics: EventDiagnostics,
}

impl<'a, C, L> EventRecord<'a, C, L>
where
    C: Countdown,
    L: InterruptLine,
{
    fn new(id: EventId, config: EventConfig<'a>, source: EventSource<C, L>) -> Self {
        Self {
            id,
            name: config.name,
            context: config.context,
            callback: config.callback,
            triggered: false,
            paused: false,
            single: false,
            source,
            diagnostics: EventDiagnostics::new(),
        }
    }

    fn display_name(&self) -> EventName {
        EventName::new(self.id, self.name)
    }

    fn debug_enabled(&self) -> bool {
        self.diagnostics.debug_enabled
    }

    fn timer_running(&self) -> bool {
        match &self.source {
            EventSource::Timer(timer) => timer.countdown.is_running(),
            EventSource::General | EventSource::Interrupt(_) => false,
        }
    }

    fn timer(&self) -> &TimerSource<C> {
        match &self.source {
            EventSource::Timer(timer) => timer,
            EventSource::General | EventSource::Interrupt(_) => {
                panic!("event {} is not a timer event", self.id)
            }
        }
    }

    fn timer_mut(&mut self) -> &mut TimerSource<C> {
        let id = self.id;
        match &mut self.source {
            EventSource::Timer(timer) => timer,
            EventSource::General | EventSource::Interrupt(_) => {
                panic!("event {id} is not a timer event")
            }
        }
    }

    fn require_main_context(&self) {
        assert!(
            self.context == ExecutionContext::Main,
            "event {} is not a main-context event",
            self.id
        );
    }

    /// Latches or runs the event depending on its execution context.
    fn fire(&mut self) {
        match self.context {
            ExecutionContext::Main => {
                self.triggered = true;
                self.diagnostics.record_trigger();
            }
            ExecutionContext::Immediate => {
                self.diagnostics.record_trigger();
                self.diagnostics.record_process();
                (self.callback)();
            }
        }
    }

    /// Arms the underlying timer or interrupt source.
    fn arm<R: RngCore>(&mut self, rng: &mut R) {
        let name = self.display_name();
        let debug = self.debug_enabled();
        let single = self.single;

        match &mut self.source {
            EventSource::Timer(timer) => {
                if debug {
                    debug!(
                        "Event {} start ({}ms, {})",
                        name,
                        timer.timeout_ms,
                        if single { "single" } else { "continuous" }
                    );
                    if timer.timeout_ms < MIN_RECOMMENDED_TIMEOUT_MS {
                        warn!(
                            "{} timeout below recommended minimum of {}ms",
                            name, MIN_RECOMMENDED_TIMEOUT_MS
                        );
                    }
                }
                let offset = if timer.jitter_max_ms > 0 {
                    rng.gen_range(0..=timer.jitter_max_ms)
                } else {
                    0
                };
                timer
                    .countdown
                    .arm(timer.timeout_ms.saturating_add(offset));
            }
            EventSource::Interrupt(irq) => {
                irq.line.enable_interrupt(irq.mode, irq.priority);
                if debug {
                    debug!("Event {} activated (irq {})", name, irq.line.line_id());
                }
            }
            EventSource::General => {
                if debug {
                    debug!("Event {} start (general)", name);
                }
            }
        }
    }

    fn disarm(&mut self) {
        match &mut self.source {
            EventSource::Timer(timer) => timer.countdown.cancel(),
            EventSource::Interrupt(irq) => irq.line.disable_interrupt(),
            EventSource::General => {}
        }
    }

    fn snapshot(&self, elapsed_since_start_ms: Millis) -> EventSnapshot {
        EventSnapshot {
            id: self.id,
            name: self.display_name(),
            kind: self.source.kind(),
            context: self.context,
            triggered: self.triggered,
            paused: self.paused,
            single: self.single,
            debug_enabled: self.diagnostics.debug_enabled,
            trigger_count: self.diagnostics.trigger_count,
            process_count: self.diagnostics.process_count,
            elapsed_since_start_ms,
        }
    }
}

/// Event table plus the platform services it arms.
pub struct EventRegistry<'a, P, const N: usize = MAX_EVENTS>
where
    P: Platform,
{
    platform: P,
    events: Vec<EventRecord<'a, P::Countdown, P::Line>, N>,
}

impl<'a, P, const N: usize> EventRegistry<'a, P, N>
where
    P: Platform,
{
    /// Creates an empty registry. This is the initialization step; no event
    /// can be registered before it.
    pub const fn new(platform: P) -> Self {
        Self {
            platform,
            events: Vec::new(),
        }
    }

    /// Platform services used by the registry.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable access to the platform services.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Number of registered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Table capacity.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Identifiers of every registered event in registration order.
    pub fn ids(&self) -> impl Iterator<Item = EventId> + '_ {
        self.events.iter().map(|record| record.id)
    }

    /// Registers a manually triggered event.
    ///
    /// # Panics
    ///
    /// Panics when the table is full.
    pub fn register_event(&mut self, config: EventConfig<'a>) -> EventId {
        expect_registered(self.try_register_event(config))
    }

    /// Registers a timer event without jitter.
    ///
    /// # Panics
    ///
    /// Panics when the table is full.
    pub fn register_timer(
        &mut self,
        config: EventConfig<'a>,
        timeout_ms: Millis,
        countdown: P::Countdown,
    ) -> EventId {
        expect_registered(self.try_register_timer(config, timeout_ms, countdown))
    }

    /// Registers a timer event whose every arm adds a uniform random offset in
    /// `[0, jitter_max_ms]` to `timeout_ms`.
    ///
    /// # Panics
    ///
    /// Panics when the table is full.
    pub fn register_timer_with_jitter(
        &mut self,
        config: EventConfig<'a>,
        timeout_ms: Millis,
        jitter_max_ms: Millis,
        countdown: P::Countdown,
    ) -> EventId {
        expect_registered(self.try_register_timer_with_jitter(
            config,
            timeout_ms,
            jitter_max_ms,
            countdown,
        ))
    }

    /// Registers an event triggered by an edge interrupt on `line`.
    ///
    /// # Panics
    ///
    /// Panics when the table is full.
    pub fn register_interrupt(
        &mut self,
        config: EventConfig<'a>,
        line: P::Line,
        mode: TriggerMode,
        priority: IrqPriority,
    ) -> EventId {
        expect_registered(self.try_register_interrupt(config, line, mode, priority))
    }

    /// Fallible form of [`EventRegistry::register_event`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CapacityExhausted`] when the table is full.
    pub fn try_register_event(
        &mut self,
        config: EventConfig<'a>,
    ) -> Result<EventId, RegistryError> {
        self.insert(config, EventSource::General)
    }

    /// Fallible form of [`EventRegistry::register_timer`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CapacityExhausted`] when the table is full.
    pub fn try_register_timer(
        &mut self,
        config: EventConfig<'a>,
        timeout_ms: Millis,
        countdown: P::Countdown,
    ) -> Result<EventId, RegistryError> {
        self.try_register_timer_with_jitter(config, timeout_ms, 0, countdown)
    }

    /// Fallible form of [`EventRegistry::register_timer_with_jitter`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CapacityExhausted`] when the table is full.
    pub fn try_register_timer_with_jitter(
        &mut self,
        config: EventConfig<'a>,
        timeout_ms: Millis,
        jitter_max_ms: Millis,
        countdown: P::Countdown,
    ) -> Result<EventId, RegistryError> {
        self.insert(
            config,
            EventSource::Timer(TimerSource {
                countdown,
                timeout_ms,
                jitter_max_ms,
            }),
        )
    }

    /// Fallible form of [`EventRegistry::register_interrupt`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CapacityExhausted`] when the table is full.
    pub fn try_register_interrupt(
        &mut self,
        config: EventConfig<'a>,
        line: P::Line,
        mode: TriggerMode,
        priority: IrqPriority,
    ) -> Result<EventId, RegistryError> {
        self.insert(
            config,
            EventSource::Interrupt(InterruptSource {
                line,
                mode,
                priority,
            }),
        )
    }

    fn insert(
        &mut self,
        config: EventConfig<'a>,
        source: EventSource<P::Countdown, P::Line>,
    ) -> Result<EventId, RegistryError> {
        let full = RegistryError::CapacityExhausted { capacity: N };
        let raw = u8::try_from(self.events.len()).map_err(|_| full)?;
        let id = EventId::new(raw);
        let kind = source.kind();

        self.events
            .push(EventRecord::new(id, config, source))
            .map_err(|_| full)?;

        debug!(
            "Event {}[{}] registered ({})",
            EventName::new(id, config.name),
            raw,
            kind.label()
        );
        Ok(id)
    }

    fn record(&self, id: EventId) -> &EventRecord<'a, P::Countdown, P::Line> {
        match self.events.get(id.as_index()) {
            Some(record) => record,
            None => panic!("unknown event id {id}"),
        }
    }

    fn record_mut(&mut self, id: EventId) -> &mut EventRecord<'a, P::Countdown, P::Line> {
        match self.events.get_mut(id.as_index()) {
            Some(record) => record,
            None => panic!("unknown event id {id}"),
        }
    }

    /// Starts (or restarts) an event.
    ///
    /// Clears a pending trigger, restarts the diagnostics counters and clock,
    /// and
    /// arms the source: the countdown for timer events (with a fresh jitter
    /// draw), the edge interrupt for interrupt events. A `single` event
    /// disarms itself after one trigger instead of re-arming.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn start(&mut self, id: EventId, single: bool) {
        let now = self.platform.now_ms();
        let Self { platform, events } = self;
        let record = match events.get_mut(id.as_index()) {
            Some(record) => record,
            None => panic!("unknown event id {id}"),
        };

        record.triggered = false;
        record.single = single;
        record.diagnostics.restart(now);
        record.arm(platform.rng());
    }

    /// Stops an event: cancels its countdown or disables its interrupt.
    ///
    /// A trigger latched before the stop stays pending; call
    /// [`EventRegistry::clear_trigger`] afterwards for exactly-once semantics.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn stop(&mut self, id: EventId) {
        let record = self.record_mut(id);
        if record.debug_enabled() {
            debug!("Event {} stop", record.display_name());
        }
        record.disarm();
    }

    /// Configured timeout of a timer event.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id or a non-timer event.
    pub fn timeout(&self, id: EventId) -> Millis {
        self.record(id).timer().timeout_ms
    }

    /// Changes the timeout of a timer event.
    ///
    /// Like the underlying timer layer this cancels a pending countdown; the
    /// event must be started again. A latched trigger is cleared so it is not
    /// dispatched against the obsolete timeout.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id or a non-timer event.
    pub fn set_timeout(&mut self, id: EventId, timeout_ms: Millis) {
        let record = self.record_mut(id);
        if record.debug_enabled() {
            debug!("Event {} set timeout ({}ms)", record.display_name(), timeout_ms);
        }
        let timer = record.timer_mut();
        timer.countdown.cancel();
        timer.timeout_ms = timeout_ms;
        record.triggered = false;
    }

    /// Maximum jitter configured for a timer event.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id or a non-timer event.
    pub fn jitter_max(&self, id: EventId) -> Millis {
        self.record(id).timer().jitter_max_ms
    }

    /// Milliseconds before a timer event next fires.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id or a non-timer event.
    pub fn time_remaining(&self, id: EventId) -> Millis {
        self.record(id).timer().countdown.remaining_ms()
    }

    /// Returns `true` while a timer event's countdown is pending.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id or a non-timer event.
    pub fn is_running(&self, id: EventId) -> bool {
        self.record(id).timer().countdown.is_running()
    }

    /// Manually triggers an event of any kind.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn trigger(&mut self, id: EventId) {
        self.record_mut(id).fire();
    }

    /// Entry point for a countdown expiry of timer event `id`.
    ///
    /// Runs in timer interrupt context on the target. A continuous event is
    /// re-armed immediately, drawing a new jitter offset.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id or a non-timer event.
    pub fn on_timer_expired(&mut self, id: EventId) {
        let Self { platform, events } = self;
        let record = match events.get_mut(id.as_index()) {
            Some(record) => record,
            None => panic!("unknown event id {id}"),
        };
        assert!(
            record.source.kind() == EventKind::Timer,
            "event {id} is not a timer event"
        );

        record.fire();
        if !record.single {
            record.arm(platform.rng());
        }
    }

    /// Entry point for an edge interrupt on `line`.
    ///
    /// Triggers the first interrupt event bound to the line, in registration
    /// order, and returns its id. A single-shot event disables its interrupt
    /// after firing once.
    pub fn on_interrupt(&mut self, line: LineId) -> Option<EventId> {
        let record = self.events.iter_mut().find(|record| {
            matches!(&record.source, EventSource::Interrupt(irq) if irq.line.line_id() == line)
        })?;

        record.fire();
        if record.single
            && let EventSource::Interrupt(irq) = &mut record.source
        {
            irq.line.disable_interrupt();
        }
        Some(record.id)
    }

    /// Consumes every pending main-context trigger and returns the callbacks
    /// that qualify for dispatch, in registration order.
    ///
    /// Counters are updated here, so the caller only has to run the returned
    /// callbacks. This lets firmware release the critical section around the
    /// registry before running user code.
    pub fn collect_main_events(&mut self) -> Vec<Callback<'a>, N> {
        let mut due = Vec::new();

        for record in &mut self.events {
            if !record.triggered || record.paused {
                continue;
            }
            record.triggered = false;

            // A continuous timer stopped between trigger and dispatch is
            // dropped; everything else is processed.
            let kind = record.source.kind();
            if kind == EventKind::Interrupt
                || record.single
                || record.timer_running()
                || kind == EventKind::General
            {
                if record.debug_enabled() {
                    debug!("Event {} process", record.display_name());
                }
                record.diagnostics.record_process();
                // Capacity equals the table size.
                if due.push(record.callback).is_err() {
                    warn!("Event {} dropped: dispatch list full", record.display_name());
                }
            }
        }

        due
    }

    /// Main-loop dispatch pass. Returns the number of callbacks run.
    ///
    /// Callbacks run while the registry is borrowed; firmware that needs
    /// callbacks to reach the registry uses
    /// [`EventRegistry::collect_main_events`] instead.
    pub fn process_main_events(&mut self) -> usize {
        let due = self.collect_main_events();
        for callback in &due {
            callback();
        }
        due.len()
    }

    /// Suppresses dispatch of a main-context event. Triggers still latch.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id or an immediate-context event.
    pub fn pause(&mut self, id: EventId) {
        let record = self.record_mut(id);
        record.require_main_context();
        record.paused = true;
    }

    /// Re-enables dispatch of a paused main-context event.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id or an immediate-context event.
    pub fn resume(&mut self, id: EventId) {
        let record = self.record_mut(id);
        record.require_main_context();
        record.paused = false;
    }

    /// Drops a latched trigger without dispatching it.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn clear_trigger(&mut self, id: EventId) {
        self.record_mut(id).triggered = false;
    }

    /// Returns `true` when no event has a pending trigger, i.e. the host may
    /// enter a low-power state.
    pub fn is_idle(&self) -> bool {
        !self.events.iter().any(|record| record.triggered)
    }

    /// Returns `true` when `id` has a pending trigger.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn is_triggered(&self, id: EventId) -> bool {
        self.record(id).triggered
    }

    /// Kind the event was registered with.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn kind(&self, id: EventId) -> EventKind {
        self.record(id).source.kind()
    }

    /// Display name of the event.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn name(&self, id: EventId) -> EventName {
        self.record(id).display_name()
    }

    /// Enables debug logging for one event (the default).
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn enable_debug(&mut self, id: EventId) {
        let record = self.record_mut(id);
        record.diagnostics.debug_enabled = true;
        info!("Event {}: debug logging enabled", record.display_name());
    }

    /// Disables debug logging for one event, useful for high-frequency
    /// events whose logging would disturb timing.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn disable_debug(&mut self, id: EventId) {
        let record = self.record_mut(id);
        record.diagnostics.debug_enabled = false;
        info!("Event {}: debug logging disabled", record.display_name());
    }

    /// Diagnostics for one event.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn snapshot(&self, id: EventId) -> EventSnapshot {
        let record = self.record(id);
        record.snapshot(self.platform.elapsed_since(record.diagnostics.start_time_ms))
    }

    /// Diagnostics for every event in registration order.
    pub fn snapshots(&self) -> impl Iterator<Item = EventSnapshot> + '_ {
        self.events.iter().map(|record| {
            record.snapshot(self.platform.elapsed_since(record.diagnostics.start_time_ms))
        })
    }

    /// Writes the human-readable diagnostics dump.
    ///
    /// # Errors
    ///
    /// Propagates errors from `out`.
    pub fn write_diagnostics<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        diagnostics::write_report(out, self.snapshots())
    }

    /// Emits the diagnostics dump through the crate logger.
    pub fn log_diagnostics(&self) {
        info!("{}", diagnostics::DIAGNOSTICS_RULE);
        info!("{}", diagnostics::DIAGNOSTICS_TITLE);
        for snapshot in self.snapshots() {
            info!(
                "{}: triggered={}, processed={}, elapsedSinceStart={}ms",
                snapshot.name,
                snapshot.trigger_count,
                snapshot.process_count,
                snapshot.elapsed_since_start_ms
            );
        }
        info!("{}", diagnostics::DIAGNOSTICS_RULE);
    }

    /// Renders the diagnostics dump into an owned string.
    #[cfg(feature = "alloc")]
    pub fn diagnostics_report(&self) -> alloc::string::String {
        let mut out = alloc::string::String::new();
        // Writing into a `String` cannot fail.
        let _ = self.write_diagnostics(&mut out);
        out
    }
}

fn expect_registered(result: Result<EventId, RegistryError>) -> EventId {
    match result {
        Ok(id) => id,
        Err(err) => panic!("event registration failed: {err}"),
    }
}

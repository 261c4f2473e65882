use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Pull;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use event_core::{Clock, Shared};
use portable_atomic::{AtomicBool, Ordering};
use static_cell::StaticCell;

use crate::app::{App, Handlers};
use crate::board::IDLE_POLL_MS;
use crate::button::ButtonPin;
use crate::console;
use crate::soft_timer::TimerWheel;

mod button_task;
mod tick_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type SharedApp = Shared<App<'static>>;

pub(super) static WHEEL: TimerWheel = TimerWheel::new();
pub(super) static BUTTON: ButtonPin = ButtonPin::new();
/// Wakes the main loop after an expiry or a button edge.
pub(super) static WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static DIAGNOSTICS_DUE: AtomicBool = AtomicBool::new(false);
static APP: StaticCell<SharedApp> = StaticCell::new();

fn on_heartbeat() {
    console::event("heartbeat", WHEEL.now_ms());
}

fn on_button() {
    console::event("button", WHEEL.now_ms());
}

fn on_gesture() {
    console::event("double-click", WHEEL.now_ms());
}

// The dump needs the registry, which is borrowed while callbacks run.
fn on_diagnostics() {
    DIAGNOSTICS_DUE.store(true, Ordering::Release);
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals { PA0, EXTI0, .. } = hal::init(config);

    let seed = jitter_seed();
    defmt::info!("event firmware up, jitter seed {=u64:x}", seed);

    let handlers = Handlers {
        heartbeat: &on_heartbeat,
        button: &on_button,
        gesture: &on_gesture,
        diagnostics: &on_diagnostics,
    };
    let mut app = App::new(&WHEEL, &BUTTON, seed, handlers).expect("application setup");
    app.start();
    let app: &'static SharedApp = APP.init(Shared::new(app));

    let button = ExtiInput::new(PA0, EXTI0, Pull::Up);

    spawner
        .spawn(tick_task::run(app))
        .expect("failed to spawn tick task");
    spawner
        .spawn(button_task::run(app, button))
        .expect("failed to spawn button task");

    run_main_loop(app).await;
}

async fn run_main_loop(app: &'static SharedApp) -> ! {
    loop {
        let due = app.lock(App::service);
        for callback in &due {
            callback();
        }

        if DIAGNOSTICS_DUE.swap(false, Ordering::AcqRel) {
            app.lock(|app| app.registry().log_diagnostics());
        }

        if app.lock(|app| app.is_idle()) {
            select(WAKE.wait(), Timer::after(Duration::from_millis(IDLE_POLL_MS))).await;
        }
    }
}

/// Seeds the jitter source from the factory-programmed device id so boards
/// sharing a bus drift apart.
fn jitter_seed() -> u64 {
    let uid = hal::uid::uid();
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&uid[..8]);
    u64::from_le_bytes(bytes)
}

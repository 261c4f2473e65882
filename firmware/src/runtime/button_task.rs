use embassy_stm32::exti::ExtiInput;
use event_core::Level;

use super::{BUTTON, SharedApp, WAKE};

/// Mirrors button edges into the shared pin state and feeds them to the app.
#[embassy_executor::task]
pub async fn run(app: &'static SharedApp, mut button: ExtiInput<'static>) -> ! {
    loop {
        button.wait_for_any_edge().await;
        let level = Level::from(button.is_high());
        if let Some(interrupt_enabled) = BUTTON.record_edge(level) {
            app.lock(|app| {
                app.on_button_edge(interrupt_enabled);
            });
            WAKE.signal(());
        }
    }
}

use embassy_time::{Duration, Ticker};

use super::{SharedApp, WAKE, WHEEL};

/// Drives the software timer wheel from the embassy time driver.
#[embassy_executor::task]
pub async fn run(app: &'static SharedApp) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(1));
    loop {
        ticker.next().await;
        let expired = WHEEL.tick();
        if expired != 0 {
            app.lock(|app| app.on_timers_expired(expired));
            WAKE.signal(());
        }
    }
}

//! Background sweeper — purges expired OTP entries and prunes
//! subscriber-less broadcast channels on an interval.

use std::sync::Arc;
use std::time::Duration;

use formsmith_core::events::EventBus;
use formsmith_core::otp::OtpStore;

pub struct OtpSweeper {
    otp: Arc<OtpStore>,
    events: Arc<EventBus>,
    interval: Duration,
}

impl OtpSweeper {
    pub fn new(otp: Arc<OtpStore>, events: Arc<EventBus>, interval: Duration) -> Self {
        Self {
            otp,
            events,
            interval,
        }
    }

    /// Run the sweep loop. Never returns under normal operation; spawn
    /// it as a background task via `tokio::spawn`.
    pub async fn run(&self) {
        tracing::info!("OtpSweeper started (interval={:?})", self.interval);
        loop {
            tokio::time::sleep(self.interval).await;
            let swept = self.otp.sweep().await;
            let pruned = self.events.prune().await;
            if swept > 0 || pruned > 0 {
                tracing::debug!(swept, pruned, "sweep pass completed");
            }
        }
    }
}

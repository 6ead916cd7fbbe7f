use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info};

use crate::state::AppState;

pub mod reminders;

/// Long-running poll loop around the reminder batch. All state lives in
/// the `download_reminders` table, so the loop itself is stateless and
/// safe to restart at any point.
pub struct ReminderWorker {
    state: Arc<AppState>,
    poll_interval: Duration,
}

impl ReminderWorker {
    pub fn new(state: Arc<AppState>, poll_interval: Duration) -> Self {
        Self {
            state,
            poll_interval,
        }
    }

    pub async fn run(&self) {
        info!("reminder worker started");
        loop {
            match reminders::process_due_reminders(&self.state).await {
                Ok(outcome) if outcome.examined > 0 => {
                    info!(
                        examined = outcome.examined,
                        sent = outcome.sent,
                        failed = outcome.failed,
                        "processed reminder batch"
                    );
                }
                Ok(_) => sleep(self.poll_interval).await,
                Err(err) => {
                    error!(error = %err, "reminder batch failed");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }
}

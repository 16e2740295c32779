use std::sync::Arc;
use std::time::Duration;

use crate::matching::store;
use crate::AppState;

/// Periodic sweep giving the matching store forward progress: pending
/// requests past expiry become expired, and matched pairs that never
/// confirmed are released. Errors are logged and the loop keeps running.
pub fn spawn(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(state.config.sweep_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let mut conn = match state.db.get() {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "sweeper failed to get db connection");
                    continue;
                }
            };

            match store::expire_stale(&mut conn) {
                Ok(n) if n > 0 => tracing::debug!(count = n, "expired stale matching requests"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "failed to expire stale requests"),
            }

            match store::revert_stale_matches(&mut conn, state.config.confirm_timeout_secs) {
                Ok(n) if n > 0 => tracing::debug!(count = n, "released unconfirmed matches"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "failed to release unconfirmed matches"),
            }
        }
    })
}

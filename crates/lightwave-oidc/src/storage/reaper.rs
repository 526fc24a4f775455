use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{AuthSessionStore, AuthzCodeStore};

/// Starts a background task that evicts expired codes and sessions every
/// `interval`. Abort the returned handle to stop it.
pub fn start_reaper(
    codes: Arc<AuthzCodeStore>,
    sessions: Arc<AuthSessionStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let codes_removed = codes.purge_expired();
            let sessions_removed = sessions.purge_expired();
            if codes_removed > 0 || sessions_removed > 0 {
                tracing::debug!(
                    codes = codes_removed,
                    sessions = sessions_removed,
                    "Reaped expired authorization state"
                );
            }
        }
    })
}

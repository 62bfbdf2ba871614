//! Idle session reaping
//!
//! Periodic sweep that retires sessions whose last activity exceeds
//! the idle timeout. Reaping is purely a registry operation: the
//! sweep never calls out to any collaborator, and removal invalidates
//! the session's generation so in-flight handles become inert.

use crate::config::ReaperConfig;
use crate::session::{SessionRegistry, SessionState};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct SessionReaper {
    registry: Arc<SessionRegistry>,
    sweep_interval: Duration,
    idle_timeout: Duration,
}

impl SessionReaper {
    pub fn new(registry: Arc<SessionRegistry>, cfg: &ReaperConfig) -> Self {
        Self {
            registry,
            sweep_interval: Duration::from_secs(cfg.sweep_interval_secs),
            idle_timeout: Duration::from_secs(cfg.idle_timeout_secs),
        }
    }

    pub async fn run(self) {
        info!(
            "Session reaper started (sweep every {:?}, idle timeout {:?})",
            self.sweep_interval, self.idle_timeout
        );

        let mut ticker = tokio::time::interval(self.sweep_interval);
        // The first tick fires immediately; skip it so a fresh start
        // doesn't sweep before anything could have gone idle.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let reaped = self.sweep().await;
            if reaped > 0 {
                info!("Reaper sweep retired {} idle sessions", reaped);
            } else {
                debug!("Reaper sweep found no idle sessions");
            }
        }
    }

    /// One sweep over every registered session. Public so tests can
    /// drive sweeps directly without waiting out the interval.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut reaped = 0;

        for id in self.registry.session_ids() {
            let Some(handle) = self.registry.get(&id) else {
                continue;
            };

            let idle = handle
                .with(|s| (now - s.last_activity).to_std().unwrap_or_default())
                .await;
            let Some(idle) = idle else {
                continue;
            };

            if idle > self.idle_timeout {
                handle.with(|s| s.state = SessionState::Reaped).await;
                if self.registry.remove(&id) {
                    info!("Reaped idle session {} (idle {:?})", id, idle);
                    reaped += 1;
                }
            }
        }

        reaped
    }
}

//! Heartbeat - a joinable thread ticking a periodic trigger

use super::events::{SessionEvent, SessionEventSender};
use super::trigger::PeriodicTrigger;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Running heartbeat. The thread only touches the trigger, never the device.
pub struct Heartbeat {
    trigger: Arc<PeriodicTrigger>,
    thread: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Spawn the heartbeat thread.
    ///
    /// Every `period` the thread ticks a trigger reloading at `reload`, so
    /// `on_fire` runs once per `reload` periods. Action failures are logged
    /// and do not stop the heartbeat.
    pub fn start<F>(
        period: Duration,
        reload: NonZeroU32,
        mut on_fire: F,
        events: Option<SessionEventSender>,
    ) -> std::io::Result<Self>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        let fire_events = events.clone();
        let mut fired: u64 = 0;
        let trigger = Arc::new(PeriodicTrigger::new(reload, move || {
            fired += 1;
            let result = on_fire();
            if let Some(ref tx) = fire_events {
                tx.send(SessionEvent::HeartbeatFired { count: fired });
            }
            result
        }));

        let ticker = Arc::clone(&trigger);
        let thread = thread::Builder::new()
            .name("hidhub-heartbeat".to_string())
            .spawn(move || {
                // Sent from this thread so it precedes every HeartbeatFired
                if let Some(ref tx) = events {
                    tx.send(SessionEvent::HeartbeatStarted);
                }
                info!("Heartbeat thread started (period {:?}, reload {})", period, reload);

                while ticker.wait(period) {
                    if let Err(e) = ticker.tick() {
                        warn!("Heartbeat action failed: {:#}", e);
                    }
                }

                if let Some(ref tx) = events {
                    tx.send(SessionEvent::HeartbeatStopped);
                }
                info!("Heartbeat thread stopped");
            })?;

        Ok(Self {
            trigger,
            thread: Some(thread),
        })
    }

    /// Whether the thread has not yet been joined
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Ticks left before the next firing
    pub fn remaining(&self) -> u32 {
        self.trigger.remaining()
    }

    /// Stop the trigger and block until the thread has exited. Idempotent.
    pub fn stop(&mut self) {
        self.trigger.stop();
        if let Some(thread) = self.thread.take() {
            debug!("Joining heartbeat thread");
            if thread.join().is_err() {
                error!("Heartbeat thread panicked");
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

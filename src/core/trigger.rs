//! Periodic trigger - fires an action once every N ticks until stopped
//!
//! All state sits behind a single lock. The action runs while that lock is
//! held, so concurrent tickers can never double-fire or lose a firing.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

/// Action invoked when the counter reaches zero
pub type TriggerAction = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

struct TriggerState {
    remaining: u32,
    stopped: bool,
    action: TriggerAction,
}

pub struct PeriodicTrigger {
    start: NonZeroU32,
    state: Mutex<TriggerState>,
    /// Signalled by `stop()` to cut `wait()` short
    stop_signal: Condvar,
}

impl PeriodicTrigger {
    pub fn new<F>(start: NonZeroU32, action: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            start,
            state: Mutex::new(TriggerState {
                remaining: start.get(),
                stopped: false,
                action: Box::new(action),
            }),
            stop_signal: Condvar::new(),
        }
    }

    /// Decrement the counter; at zero run the action and reload.
    ///
    /// Returns the action's result when it fired, `Ok(())` otherwise.
    /// A stopped trigger never fires.
    pub fn tick(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if state.stopped {
            return Ok(());
        }

        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining > 0 {
            return Ok(());
        }

        let result = (state.action)();
        state.remaining = self.start.get();
        result
    }

    /// Whether the owner should keep ticking
    pub fn proceed(&self) -> bool {
        !self.state.lock().stopped
    }

    /// Reload the counter without firing
    pub fn reset(&self) {
        self.state.lock().remaining = self.start.get();
    }

    /// Stop for good. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        self.stop_signal.notify_all();
    }

    /// Block for up to `period`, returning early once stopped.
    ///
    /// Returns `proceed()` as observed on wake-up.
    pub fn wait(&self, period: Duration) -> bool {
        let deadline = Instant::now() + period;
        let mut state = self.state.lock();
        while !state.stopped {
            if self.stop_signal.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        !state.stopped
    }

    pub fn remaining(&self) -> u32 {
        self.state.lock().remaining
    }

    pub fn start(&self) -> NonZeroU32 {
        self.start
    }
}

impl fmt::Debug for PeriodicTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PeriodicTrigger")
            .field("start", &self.start)
            .field("remaining", &state.remaining)
            .field("stopped", &state.stopped)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(start: u32) -> (PeriodicTrigger, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let trigger = PeriodicTrigger::new(NonZeroU32::new(start).unwrap(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (trigger, fired)
    }

    #[test]
    fn test_fires_once_every_start_ticks() {
        let (trigger, fired) = counting(3);

        trigger.tick().unwrap();
        trigger.tick().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(trigger.remaining(), 1);

        trigger.tick().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(trigger.remaining(), 3);
    }

    #[test]
    fn test_start_of_one_fires_every_tick() {
        let (trigger, fired) = counting(1);
        for _ in 0..4 {
            trigger.tick().unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_stop_suppresses_firing() {
        let (trigger, fired) = counting(1);
        trigger.stop();
        for _ in 0..5 {
            trigger.tick().unwrap();
            assert!(!trigger.proceed());
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (trigger, _) = counting(2);
        assert!(trigger.proceed());
        trigger.stop();
        trigger.stop();
        assert!(!trigger.proceed());
    }

    #[test]
    fn test_reset_reloads_without_firing() {
        let (trigger, fired) = counting(3);
        trigger.tick().unwrap();
        trigger.tick().unwrap();
        trigger.reset();
        assert_eq!(trigger.remaining(), 3);

        trigger.tick().unwrap();
        trigger.tick().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        trigger.tick().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_action_still_reloads() {
        let trigger = PeriodicTrigger::new(NonZeroU32::new(2).unwrap(), || {
            anyhow::bail!("console unavailable")
        });
        trigger.tick().unwrap();
        let err = trigger.tick().unwrap_err();
        assert_eq!(err.to_string(), "console unavailable");
        assert_eq!(trigger.remaining(), 2);
    }

    #[test]
    fn test_wait_times_out_while_running() {
        let (trigger, _) = counting(1);
        let started = Instant::now();
        assert!(trigger.wait(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_returns_early_on_stop() {
        let (trigger, _) = counting(1);
        let trigger = Arc::new(trigger);
        let stopper = Arc::clone(&trigger);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            stopper.stop();
        });

        let started = Instant::now();
        assert!(!trigger.wait(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(30));
        handle.join().unwrap();
    }
}

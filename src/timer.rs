//! Cancellable single-shot timer for the keyboard auto-unlock.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

/// A deferred action that fires once after `delay` unless cancelled first.
///
/// `cancel` is race-safe against firing: whichever side takes the lock first
/// wins, and a cancelled timer never runs its action. The timer thread exits
/// either way.
pub struct AutoUnlockTimer {
    cancelled: Arc<(Mutex<bool>, Condvar)>,
}

impl AutoUnlockTimer {
    pub fn schedule<F>(delay: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new((Mutex::new(false), Condvar::new()));
        let state = Arc::clone(&cancelled);
        thread::spawn(move || {
            let (lock, cvar) = &*state;
            let guard = lock.lock().unwrap();
            let (guard, result) = cvar
                .wait_timeout_while(guard, delay, |cancelled| !*cancelled)
                .unwrap();
            if result.timed_out() && !*guard {
                drop(guard);
                action();
            }
        });
        Self { cancelled }
    }

    /// Cancel the timer. No effect on a timer that has already fired.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.cancelled;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
}

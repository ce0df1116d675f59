//! Keyboard suppression, unlock-chord tracking and the auto-unlock timer.
//!
//! While locked, every key event arrives through the suppression hook and is
//! fed into the pressed-key set; once `ctrl+alt+u` is held the coordinator's
//! `unlock_both` runs. A single-shot timer releases everything after the
//! configured duration if no manual unlock happens first.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::{InputBackend, KeyEvent, SuppressionHandle};
use crate::chord::{self, ChordKey, RawKey, UNLOCK_CHORD};
use crate::coordinator::LockCoordinator;
use crate::timer::AutoUnlockTimer;

struct Inner {
    handle: Option<Box<dyn SuppressionHandle>>,
    timer: Option<AutoUnlockTimer>,
    /// Lock-session counter. Bumped on every activation so a timer left over
    /// from an earlier session cannot unlock a later one.
    generation: u64,
}

pub struct KeyboardLock {
    backend: Arc<dyn InputBackend>,
    auto_unlock: Duration,
    inner: Mutex<Inner>,
    /// Chord symbols currently held. Only meaningful while locked; cleared
    /// on activation, after a chord fire, and on deactivation.
    pressed: Mutex<HashSet<ChordKey>>,
}

impl KeyboardLock {
    pub(crate) fn new(backend: Arc<dyn InputBackend>, auto_unlock: Duration) -> Self {
        Self {
            backend,
            auto_unlock,
            inner: Mutex::new(Inner {
                handle: None,
                timer: None,
                generation: 0,
            }),
            pressed: Mutex::new(HashSet::new()),
        }
    }

    /// Suppress keyboard input, install the key handlers and start the
    /// auto-unlock timer. No-op if already locked.
    pub(crate) fn activate(&self, coordinator: &Arc<LockCoordinator>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.handle.is_some() {
            debug!("keyboard already locked");
            return;
        }

        self.pressed.lock().unwrap().clear();
        inner.generation += 1;
        let generation = inner.generation;

        let weak = Arc::downgrade(coordinator);
        let on_event: Box<dyn Fn(KeyEvent) + Send + Sync> = Box::new(move |event| {
            let Some(coordinator) = weak.upgrade() else {
                return;
            };
            match event {
                KeyEvent::Down(raw) => coordinator.keyboard.on_key_down(&raw, &coordinator),
                KeyEvent::Up(raw) => coordinator.keyboard.on_key_up(&raw),
            }
        });
        inner.handle = Some(self.backend.grab_keyboard(on_event));

        let weak = Arc::downgrade(coordinator);
        inner.timer = Some(AutoUnlockTimer::schedule(self.auto_unlock, move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.auto_unlock(generation);
            }
        }));

        info!(
            auto_unlock_secs = self.auto_unlock.as_secs(),
            "keyboard locked"
        );
    }

    /// Cancel the timer and restore keyboard input. Blocks until the
    /// suppression hook has stopped delivering callbacks (except when called
    /// from the hook itself, i.e. the chord path). No-op if not locked.
    pub(crate) fn deactivate(&self) {
        self.release_session(None);
    }

    /// Deactivate only if the given lock session is still the current one.
    /// The generation is checked and the handle taken under the same lock,
    /// so a stale timer cannot release a session that started after it was
    /// scheduled. Returns whether anything was released.
    pub(crate) fn deactivate_if_generation(&self, generation: u64) -> bool {
        self.release_session(Some(generation))
    }

    fn release_session(&self, required_generation: Option<u64>) -> bool {
        let (handle, timer) = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(generation) = required_generation {
                if inner.generation != generation {
                    return false;
                }
            }
            (inner.handle.take(), inner.timer.take())
        };
        let Some(handle) = handle else {
            debug!("keyboard not locked");
            return false;
        };
        if let Some(timer) = timer {
            timer.cancel();
        }
        handle.release();
        self.pressed.lock().unwrap().clear();
        info!("keyboard unlocked");
        true
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().unwrap().handle.is_some()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.lock().unwrap().generation
    }

    fn on_key_down(&self, raw: &RawKey, coordinator: &Arc<LockCoordinator>) {
        let symbol = chord::normalize(raw).or_else(|| fallback_symbol(raw));
        debug!(?raw, ?symbol, "key press");

        let chord_complete = {
            let mut pressed = self.pressed.lock().unwrap();
            if let Some(symbol) = symbol {
                pressed.insert(symbol);
            }
            debug!(?pressed, "pressed set");
            let complete = UNLOCK_CHORD.iter().all(|k| pressed.contains(k));
            if complete {
                // Clear before unlocking so held keys cannot re-trigger on
                // key-repeat events.
                pressed.clear();
            }
            complete
        };

        if chord_complete {
            info!("unlock chord detected");
            coordinator.unlock_both();
        }
    }

    fn on_key_up(&self, raw: &RawKey) {
        if let Some(symbol) = chord::normalize(raw) {
            let mut pressed = self.pressed.lock().unwrap();
            if pressed.remove(&symbol) {
                debug!(?symbol, "key released");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pressed_symbols(&self) -> HashSet<ChordKey> {
        self.pressed.lock().unwrap().clone()
    }
}

/// Last-resort mapping for keys normalization cannot place: some platforms
/// report neither a character nor a usable code for the unlock letter while
/// ctrl+alt are held, so sniff the key's debug name for a literal `u`.
/// `Unknown(..)` is excluded because its variant name would always match.
fn fallback_symbol(raw: &RawKey) -> Option<ChordKey> {
    if matches!(raw.key, rdev::Key::Unknown(_)) {
        return None;
    }
    let name = format!("{:?}", raw.key).to_lowercase();
    if name.contains('u') {
        Some(ChordKey::Char('u'))
    } else {
        None
    }
}

//! Composes the two device locks behind `lock_both` / `unlock_both`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::InputBackend;
use crate::keyboard::KeyboardLock;
use crate::mouse::MouseLock;

/// Snapshot of which devices are currently locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    pub mouse_locked: bool,
    pub keyboard_locked: bool,
}

/// Owns both device locks. `unlock_both` is the single point of truth for
/// releasing everything and is reached from three paths: the global unlock
/// hotkey, the chord detector inside the keyboard hook, and the auto-unlock
/// timer. All three may race; the per-device idempotency makes that safe.
pub struct LockCoordinator {
    pub(crate) mouse: MouseLock,
    pub(crate) keyboard: KeyboardLock,
}

impl LockCoordinator {
    pub fn new(backend: Arc<dyn InputBackend>, auto_unlock: Duration) -> Arc<Self> {
        Arc::new(Self {
            mouse: MouseLock::new(Arc::clone(&backend)),
            keyboard: KeyboardLock::new(backend, auto_unlock),
        })
    }

    /// Suppress both devices. Mouse first, then keyboard; the order is fixed
    /// for determinism only.
    pub fn lock_both(self: &Arc<Self>) {
        self.mouse.activate();
        self.keyboard.activate(self);
    }

    /// Release both devices. Safe to call when neither, one, or both are
    /// locked, and from multiple threads at once.
    pub fn unlock_both(&self) {
        self.mouse.deactivate();
        self.keyboard.deactivate();
    }

    /// Timer expiry entry point. The keyboard is released only if the
    /// timer's session is still the current one — generation check and
    /// handle takeover happen atomically inside the keyboard lock, so a
    /// stale timer racing a manual unlock + re-lock cannot release the new
    /// session. The mouse is released only on that confirmed outcome.
    pub(crate) fn auto_unlock(&self, generation: u64) {
        if !self.keyboard.deactivate_if_generation(generation) {
            debug!(generation, "stale auto-unlock timer ignored");
            return;
        }
        info!("auto-unlock timer expired");
        self.mouse.deactivate();
    }

    pub fn state(&self) -> LockState {
        LockState {
            mouse_locked: self.mouse.is_locked(),
            keyboard_locked: self.keyboard.is_locked(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use std::thread;

    #[test]
    fn lock_both_locks_both_devices() {
        let backend = FakeBackend::new();
        let coordinator = LockCoordinator::new(Arc::new(backend.clone()), Duration::from_secs(60));
        coordinator.lock_both();
        assert_eq!(
            coordinator.state(),
            LockState {
                mouse_locked: true,
                keyboard_locked: true,
            }
        );
        assert_eq!(backend.mouse_grabs(), 1);
        assert_eq!(backend.keyboard_grabs(), 1);
    }

    #[test]
    fn repeated_lock_both_is_a_noop() {
        let backend = FakeBackend::new();
        let coordinator = LockCoordinator::new(Arc::new(backend.clone()), Duration::from_secs(60));
        coordinator.lock_both();
        coordinator.lock_both();
        assert_eq!(backend.mouse_grabs(), 1);
        assert_eq!(backend.keyboard_grabs(), 1);
    }

    #[test]
    fn unlock_both_without_a_lock_is_a_noop() {
        let backend = FakeBackend::new();
        let coordinator = LockCoordinator::new(Arc::new(backend.clone()), Duration::from_secs(60));
        coordinator.unlock_both();
        assert_eq!(backend.mouse_releases(), 0);
        assert_eq!(backend.keyboard_releases(), 0);
    }

    #[test]
    fn auto_unlock_releases_both_devices() {
        let backend = FakeBackend::new();
        let coordinator =
            LockCoordinator::new(Arc::new(backend.clone()), Duration::from_millis(30));
        coordinator.lock_both();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(
            coordinator.state(),
            LockState {
                mouse_locked: false,
                keyboard_locked: false,
            }
        );
        assert_eq!(backend.mouse_releases(), 1);
        assert_eq!(backend.keyboard_releases(), 1);
    }

    #[test]
    fn manual_unlock_cancels_the_timer() {
        let backend = FakeBackend::new();
        let coordinator =
            LockCoordinator::new(Arc::new(backend.clone()), Duration::from_millis(50));
        coordinator.lock_both();
        coordinator.unlock_both();
        thread::sleep(Duration::from_millis(300));
        // The timer elapsing later must not produce a second unlock.
        assert_eq!(backend.mouse_releases(), 1);
        assert_eq!(backend.keyboard_releases(), 1);
    }

    #[test]
    fn stale_generation_timer_is_ignored() {
        let backend = FakeBackend::new();
        let coordinator = LockCoordinator::new(Arc::new(backend.clone()), Duration::from_secs(60));
        coordinator.lock_both();
        let stale = coordinator.keyboard.generation() - 1;
        coordinator.auto_unlock(stale);
        assert_eq!(backend.mouse_releases(), 0);
        assert!(coordinator.keyboard.is_locked());
    }

    #[test]
    fn stale_timer_cannot_unlock_a_relocked_session() {
        let backend = FakeBackend::new();
        let coordinator = LockCoordinator::new(Arc::new(backend.clone()), Duration::from_secs(60));
        coordinator.lock_both();
        let first_session = coordinator.keyboard.generation();
        coordinator.unlock_both();
        coordinator.lock_both();

        // The first session's timer fires late, after the re-lock.
        coordinator.auto_unlock(first_session);

        assert!(coordinator.keyboard.is_locked());
        assert!(coordinator.mouse.is_locked());
        assert_eq!(backend.keyboard_releases(), 1);
        assert_eq!(backend.mouse_releases(), 1);
    }

    #[test]
    fn timer_firing_after_manual_unlock_is_inert() {
        let backend = FakeBackend::new();
        let coordinator = LockCoordinator::new(Arc::new(backend.clone()), Duration::from_secs(60));
        coordinator.lock_both();
        let session = coordinator.keyboard.generation();
        coordinator.unlock_both();

        // Same session, but nothing is locked anymore: no further releases.
        coordinator.auto_unlock(session);

        assert_eq!(backend.keyboard_releases(), 1);
        assert_eq!(backend.mouse_releases(), 1);
    }

    #[test]
    fn concurrent_unlocks_release_each_handle_once() {
        let backend = FakeBackend::new();
        let coordinator = LockCoordinator::new(Arc::new(backend.clone()), Duration::from_secs(60));
        coordinator.lock_both();

        // Hotkey, chord and timer paths all racing to unlock.
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                thread::spawn(move || coordinator.unlock_both())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(backend.mouse_releases(), 1);
        assert_eq!(backend.keyboard_releases(), 1);
        assert_eq!(
            coordinator.state(),
            LockState {
                mouse_locked: false,
                keyboard_locked: false,
            }
        );
    }

    #[test]
    fn relock_after_auto_unlock_works() {
        let backend = FakeBackend::new();
        let coordinator =
            LockCoordinator::new(Arc::new(backend.clone()), Duration::from_millis(30));
        coordinator.lock_both();
        thread::sleep(Duration::from_millis(300));
        coordinator.lock_both();
        assert_eq!(backend.mouse_grabs(), 2);
        assert!(coordinator.keyboard.is_locked());
    }
}

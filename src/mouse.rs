//! Pointer suppression with idempotent activate/deactivate.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::backend::{InputBackend, SuppressionHandle};

/// Owns the (at most one) live mouse suppression handle.
pub struct MouseLock {
    backend: Arc<dyn InputBackend>,
    handle: Mutex<Option<Box<dyn SuppressionHandle>>>,
}

impl MouseLock {
    pub(crate) fn new(backend: Arc<dyn InputBackend>) -> Self {
        Self {
            backend,
            handle: Mutex::new(None),
        }
    }

    /// Suppress mouse input. No-op if already locked.
    pub fn activate(&self) {
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            debug!("mouse already locked");
            return;
        }
        *handle = Some(self.backend.grab_mouse());
        info!("mouse locked");
    }

    /// Restore mouse input. No-op if not locked.
    ///
    /// The handle is taken under the lock but released outside it, so
    /// concurrent deactivations release it exactly once.
    pub fn deactivate(&self) {
        let released = self.handle.lock().unwrap().take();
        match released {
            Some(handle) => {
                handle.release();
                info!("mouse unlocked");
            }
            None => debug!("mouse not locked"),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.handle.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;

    #[test]
    fn activate_grabs_once() {
        let backend = FakeBackend::new();
        let lock = MouseLock::new(Arc::new(backend.clone()));
        lock.activate();
        assert!(lock.is_locked());
        assert_eq!(backend.mouse_grabs(), 1);
    }

    #[test]
    fn repeated_activate_is_a_noop() {
        let backend = FakeBackend::new();
        let lock = MouseLock::new(Arc::new(backend.clone()));
        lock.activate();
        lock.activate();
        assert_eq!(backend.mouse_grabs(), 1);
    }

    #[test]
    fn deactivate_releases_the_handle() {
        let backend = FakeBackend::new();
        let lock = MouseLock::new(Arc::new(backend.clone()));
        lock.activate();
        lock.deactivate();
        assert!(!lock.is_locked());
        assert_eq!(backend.mouse_releases(), 1);
    }

    #[test]
    fn deactivate_while_unlocked_is_a_noop() {
        let backend = FakeBackend::new();
        let lock = MouseLock::new(Arc::new(backend.clone()));
        lock.deactivate();
        assert_eq!(backend.mouse_releases(), 0);
    }
}

//! Global lock/unlock hotkey listener.
//!
//! Watches key events system-wide via `rdev::listen` in a background thread
//! and sends `HotkeyEvent`s over a channel to the main loop. This listener
//! never suppresses anything; it runs outside the grab so the unlock combo
//! stays reachable while general input is blocked.
//!
//! Combos are fixed: `ctrl+alt+L` locks, `ctrl+alt+U` unlocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use rdev::{listen, Event, EventType, Key};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events emitted by the hotkey listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Lock combo pressed (suppress both devices).
    Lock,
    /// Unlock combo pressed (restore both devices).
    Unlock,
}

/// Tracks which combo modifiers are held and maps trigger keys to events.
#[derive(Default)]
struct ComboTracker {
    ctrl: bool,
    alt: bool,
}

impl ComboTracker {
    fn on_event(&mut self, event_type: &EventType) -> Option<HotkeyEvent> {
        match event_type {
            EventType::KeyPress(key) => match key {
                Key::ControlLeft | Key::ControlRight => {
                    self.ctrl = true;
                    None
                }
                Key::Alt | Key::AltGr => {
                    self.alt = true;
                    None
                }
                Key::KeyL if self.ctrl && self.alt => Some(HotkeyEvent::Lock),
                Key::KeyU if self.ctrl && self.alt => Some(HotkeyEvent::Unlock),
                _ => None,
            },
            EventType::KeyRelease(key) => {
                match key {
                    Key::ControlLeft | Key::ControlRight => self.ctrl = false,
                    Key::Alt | Key::AltGr => self.alt = false,
                    _ => {}
                }
                None
            }
            _ => None,
        }
    }
}

/// Global hotkey listener using rdev for cross-platform key capture.
pub struct HotkeyListener {
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start listening in a background thread, sending `HotkeyEvent`s to the
    /// provided channel.
    pub fn start(&self, tx: mpsc::Sender<HotkeyEvent>) {
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        info!("starting hotkey listener (ctrl+alt+l / ctrl+alt+u)");

        thread::spawn(move || {
            let mut tracker = ComboTracker::default();
            let callback = move |event: Event| {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(hotkey) = tracker.on_event(&event.event_type) {
                    debug!(?hotkey, "hotkey triggered");
                    let _ = tx.blocking_send(hotkey);
                }
            };
            if let Err(e) = listen(callback) {
                warn!("hotkey listener error: {:?}", e);
            }
        });
    }

    /// Stop reacting to hotkeys. The rdev listen loop itself cannot be torn
    /// down; the callback just goes inert.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

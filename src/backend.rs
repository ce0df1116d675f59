//! Platform input suppression boundary.
//!
//! Captures and swallows input system-wide using `rdev` for cross-platform
//! support. The lock controllers only see the `InputBackend` /
//! `SuppressionHandle` traits, so tests can substitute a fake.
//!
//! Platform backends (all via `rdev::grab`):
//! - Windows: Win32 low-level hooks
//! - Linux: evdev (requires the `unstable_grab` feature and input-group access)
//! - macOS: Quartz event taps

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once, OnceLock};
use std::thread::{self, ThreadId};

use rdev::{Event, EventType};
use tracing::{error, info, trace};

use crate::chord::RawKey;

/// Key event delivered by the keyboard suppression hook.
#[derive(Debug, Clone)]
pub enum KeyEvent {
    Down(RawKey),
    Up(RawKey),
}

/// Live suppression of one device class. Exists from grab to release;
/// callers release explicitly rather than relying on drop.
pub trait SuppressionHandle: Send {
    /// Stop suppressing. For keyboard handles this blocks until no event
    /// callback is still running, unless called from the callback thread
    /// itself (the chord-unlock path), so that after release returns no
    /// handler can observe torn-down state.
    fn release(self: Box<Self>);
}

/// The platform facility that intercepts raw input and can block delivery.
pub trait InputBackend: Send + Sync {
    /// Begin swallowing all pointer input.
    fn grab_mouse(&self) -> Box<dyn SuppressionHandle>;

    /// Begin swallowing all key input, delivering each event to `on_event`.
    fn grab_keyboard(&self, on_event: Box<dyn Fn(KeyEvent) + Send + Sync>)
        -> Box<dyn SuppressionHandle>;
}

type KeyCallback = Arc<dyn Fn(KeyEvent) + Send + Sync>;

/// Shared state between the lock controllers and the resident grab thread.
struct GrabShared {
    started: Once,
    grab_thread: OnceLock<ThreadId>,
    mouse_suppressed: AtomicBool,
    /// Keyboard callback slot. `Some` while the keyboard is suppressed.
    keyboard_callback: Mutex<Option<KeyCallback>>,
    /// True while a callback is running. Set (under the slot lock) before a
    /// callback is invoked, cleared after; `keyboard_idle` is signalled on
    /// clear so a releasing thread can wait without spinning.
    keyboard_in_flight: Mutex<bool>,
    keyboard_idle: Condvar,
}

/// Production backend on `rdev::grab`.
///
/// rdev cannot unhook a grab, so a single grab thread is started lazily on
/// first use and stays resident for the life of the process, passing events
/// through while nothing is suppressed.
pub struct RdevBackend {
    shared: Arc<GrabShared>,
}

impl RdevBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(GrabShared {
                started: Once::new(),
                grab_thread: OnceLock::new(),
                mouse_suppressed: AtomicBool::new(false),
                keyboard_callback: Mutex::new(None),
                keyboard_in_flight: Mutex::new(false),
                keyboard_idle: Condvar::new(),
            }),
        }
    }

    fn ensure_grab_thread(&self) {
        let shared = Arc::clone(&self.shared);
        self.shared.started.call_once(move || {
            let loop_shared = Arc::clone(&shared);
            let handle = thread::spawn(move || run_grab_loop(loop_shared));
            let _ = shared.grab_thread.set(handle.thread().id());
            info!("input grab thread started");
        });
    }
}

impl InputBackend for RdevBackend {
    fn grab_mouse(&self) -> Box<dyn SuppressionHandle> {
        self.ensure_grab_thread();
        self.shared.mouse_suppressed.store(true, Ordering::Release);
        Box::new(MouseSuppression {
            shared: Arc::clone(&self.shared),
        })
    }

    fn grab_keyboard(
        &self,
        on_event: Box<dyn Fn(KeyEvent) + Send + Sync>,
    ) -> Box<dyn SuppressionHandle> {
        self.ensure_grab_thread();
        *self.shared.keyboard_callback.lock().unwrap() = Some(Arc::from(on_event));
        Box::new(KeyboardSuppression {
            shared: Arc::clone(&self.shared),
        })
    }
}

struct MouseSuppression {
    shared: Arc<GrabShared>,
}

impl SuppressionHandle for MouseSuppression {
    fn release(self: Box<Self>) {
        self.shared.mouse_suppressed.store(false, Ordering::Release);
    }
}

struct KeyboardSuppression {
    shared: Arc<GrabShared>,
}

impl SuppressionHandle for KeyboardSuppression {
    fn release(self: Box<Self>) {
        self.shared.keyboard_callback.lock().unwrap().take();
        // The grab thread marks a callback in-flight before dropping the slot
        // lock, so after the take above either no callback runs again or the
        // in-flight flag is already visible. Waiting it out gives the release
        // barrier; skipped on the grab thread itself, which would otherwise
        // wait on its own callback.
        let on_grab_thread = self.shared.grab_thread.get() == Some(&thread::current().id());
        if !on_grab_thread {
            let mut in_flight = self.shared.keyboard_in_flight.lock().unwrap();
            while *in_flight {
                in_flight = self.shared.keyboard_idle.wait(in_flight).unwrap();
            }
        }
    }
}

/// The resident grab loop. A grab failure (missing permissions, no display)
/// is fatal: suppression cannot work without it.
fn run_grab_loop(shared: Arc<GrabShared>) {
    let result = rdev::grab(move |event: Event| {
        let ch = event.name.as_ref().and_then(|s| s.chars().next());
        match event.event_type {
            EventType::KeyPress(key) => {
                match current_callback(&shared) {
                    Some(cb) => {
                        cb(KeyEvent::Down(RawKey::new(key, ch)));
                        callback_finished(&shared);
                        None
                    }
                    None => Some(event),
                }
            }
            EventType::KeyRelease(key) => {
                match current_callback(&shared) {
                    Some(cb) => {
                        cb(KeyEvent::Up(RawKey::new(key, ch)));
                        callback_finished(&shared);
                        None
                    }
                    None => Some(event),
                }
            }
            EventType::ButtonPress(_)
            | EventType::ButtonRelease(_)
            | EventType::MouseMove { .. }
            | EventType::Wheel { .. } => {
                if shared.mouse_suppressed.load(Ordering::Acquire) {
                    trace!("mouse event suppressed");
                    None
                } else {
                    Some(event)
                }
            }
        }
    });
    if let Err(e) = result {
        error!("input grab failed: {:?}", e);
        std::process::exit(1);
    }
}

/// Clone the keyboard callback out of the slot, marking it in-flight while
/// the slot lock is still held.
fn current_callback(shared: &GrabShared) -> Option<KeyCallback> {
    let slot = shared.keyboard_callback.lock().unwrap();
    let cb = slot.as_ref().cloned();
    if cb.is_some() {
        *shared.keyboard_in_flight.lock().unwrap() = true;
    }
    cb
}

fn callback_finished(shared: &GrabShared) {
    *shared.keyboard_in_flight.lock().unwrap() = false;
    shared.keyboard_idle.notify_all();
}

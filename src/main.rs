//! inputlock — keyboard/mouse kiosk lock.
//!
//! `ctrl+alt+L` suppresses all keyboard and mouse input system-wide;
//! `ctrl+alt+U` (or a 30 second timeout) restores it. This is the entry
//! point that wires the lock coordinator to the global hotkeys and runs the
//! main event loop until interrupted.

mod backend;
mod chord;
mod coordinator;
mod hotkey;
mod keyboard;
mod mouse;
mod timer;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use backend::RdevBackend;
use coordinator::LockCoordinator;
use hotkey::{HotkeyEvent, HotkeyListener};

/// Seconds until an active lock releases itself, as a safety net against
/// permanent lockout.
const AUTO_UNLOCK_SECONDS: u64 = 30;

#[tokio::main]
async fn main() {
    // Initialize tracing (respects RUST_LOG env, defaults to info).
    // Keystroke content only ever appears at debug level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let backend = Arc::new(RdevBackend::new());
    let coordinator =
        LockCoordinator::new(backend, Duration::from_secs(AUTO_UNLOCK_SECONDS));

    let (tx, mut hotkey_rx) = mpsc::channel(16);
    let listener = HotkeyListener::new();
    listener.start(tx);

    info!("ctrl+alt+l locks input, ctrl+alt+u unlocks, ctrl+c exits");

    loop {
        tokio::select! {
            event = hotkey_rx.recv() => {
                match event {
                    Some(HotkeyEvent::Lock) => coordinator.lock_both(),
                    Some(HotkeyEvent::Unlock) => coordinator.unlock_both(),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, releasing any active locks");
                break;
            }
        }
    }

    // Best-effort cleanup: both calls are no-ops when nothing is locked.
    coordinator.unlock_both();
    listener.stop();
    info!("inputlock stopped");
}

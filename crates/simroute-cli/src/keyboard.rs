//! Single-key cancellation.
//!
//! Puts the terminal in raw mode and watches for `q`, `Esc` or `Ctrl-C` on a
//! dedicated thread. The first cancel key is forwarded to the session's cancel
//! channel and the thread exits. Raw mode is restored when the listener drops.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use simroute_core::session::CancelSignal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct CancelListener {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    raw_mode: bool,
}

impl CancelListener {
    /// Starts listening on stdin. Without a terminal this is a no-op listener
    /// and only SIGINT can cancel.
    pub fn spawn(cancel: mpsc::Sender<CancelSignal>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let inactive = Self {
            shutdown: shutdown.clone(),
            handle: None,
            raw_mode: false,
        };

        if !std::io::stdin().is_terminal() {
            debug!("stdin is not a terminal, key cancellation disabled");
            return inactive;
        }
        if let Err(e) = enable_raw_mode() {
            warn!(error = %e, "Failed to enable raw mode, key cancellation disabled");
            return inactive;
        }

        let flag = shutdown.clone();
        let handle = std::thread::spawn(move || listen(cancel, flag));
        Self {
            shutdown,
            handle: Some(handle),
            raw_mode: true,
        }
    }

    /// Whether a key press can cancel the run.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for CancelListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if self.raw_mode {
            let _ = disable_raw_mode();
        }
    }
}

fn listen(cancel: mpsc::Sender<CancelSignal>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        match event::poll(POLL_INTERVAL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                warn!(error = %e, "Keyboard poll failed");
                return;
            }
        }
        match event::read() {
            Ok(Event::Key(key)) if is_cancel_key(&key) => {
                debug!(key = ?key.code, "Cancel key pressed");
                let _ = cancel.blocking_send(CancelSignal::Key);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Keyboard read failed");
                return;
            }
        }
    }
}

/// `q`, `Esc` and `Ctrl-C` cancel; key releases and repeats are ignored.
pub fn is_cancel_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

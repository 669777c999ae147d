//! Input event capture
//!
//! [`EventCapture`] owns the three event streams of a session while it is
//! being recorded. The host input subsystem never touches the buffers
//! directly: it is handed a [`CaptureSink`] on registration and pushes
//! notifications through it, possibly from several threads at once.
//!
//! Every append checks the capturing flag while holding its stream lock, and
//! `stop` clears the flag before taking each lock to copy. A notification is
//! therefore either in the snapshot or dropped, never both.

use crate::error::CaptureError;
use crate::types::{ClickEvent, KeyEvent, MovementEvent, Session};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Host input subsystem that emits pointer and key notifications.
///
/// Implementations forward their callbacks to the sink they are given on
/// `register` until `unregister` is called.
pub trait InputSource {
    fn register(&mut self, sink: CaptureSink) -> Result<(), CaptureError>;
    fn unregister(&mut self) -> Result<(), CaptureError>;
}

/// Current wall-clock time in epoch seconds
pub fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[derive(Debug, Default)]
struct CaptureBuffers {
    capturing: AtomicBool,
    movements: Mutex<Vec<MovementEvent>>,
    clicks: Mutex<Vec<ClickEvent>>,
    keystrokes: Mutex<Vec<KeyEvent>>,
    /// Press instants of keys not yet released
    pending_presses: Mutex<HashMap<String, f64>>,
}

impl CaptureBuffers {
    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.movements.lock().clear();
        self.clicks.lock().clear();
        self.keystrokes.lock().clear();
        self.pending_presses.lock().clear();
    }

    fn snapshot(&self) -> Session {
        Session::new(
            self.movements.lock().clone(),
            self.clicks.lock().clone(),
            self.keystrokes.lock().clone(),
        )
    }
}

/// Stream lengths at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureCounts {
    pub movements: usize,
    pub clicks: usize,
    pub keystrokes: usize,
}

impl CaptureCounts {
    pub fn total(&self) -> usize {
        self.movements + self.clicks + self.keystrokes
    }
}

/// Append-only handle given to the host input subsystem
#[derive(Debug, Clone)]
pub struct CaptureSink {
    buffers: Arc<CaptureBuffers>,
}

impl CaptureSink {
    /// Pointer moved to `(x, y)` at `t`
    pub fn on_move(&self, x: f64, y: f64, t: f64) {
        let mut movements = self.buffers.movements.lock();
        if self.buffers.is_capturing() {
            movements.push(MovementEvent::new(x, y, t));
        }
    }

    /// Button transition at `(x, y)`; only presses are recorded
    pub fn on_click(&self, x: f64, y: f64, t: f64, button: &str, pressed: bool) {
        if !pressed {
            return;
        }
        let mut clicks = self.buffers.clicks.lock();
        if self.buffers.is_capturing() {
            clicks.push(ClickEvent {
                x,
                y,
                t,
                button: button.to_string(),
            });
        }
    }

    /// Key went down. A repeated press of a held key restarts its hold.
    pub fn on_key_press(&self, key: &str, t: f64) {
        let mut pending = self.buffers.pending_presses.lock();
        if self.buffers.is_capturing() {
            pending.insert(key.to_string(), t);
        }
    }

    /// Key came up; emits a paired record if its press was seen
    pub fn on_key_release(&self, key: &str, t: f64) {
        let press = {
            let mut pending = self.buffers.pending_presses.lock();
            if !self.buffers.is_capturing() {
                return;
            }
            pending.remove(key)
        };

        let Some(pressed_at) = press else {
            return;
        };

        let mut keystrokes = self.buffers.keystrokes.lock();
        if self.buffers.is_capturing() {
            keystrokes.push(KeyEvent::Paired {
                key: key.to_string(),
                hold_time: Some(t - pressed_at),
                t: pressed_at,
            });
        }
    }

    /// Apply one decoded host notification
    pub fn dispatch(&self, notification: &HostNotification) {
        match notification {
            HostNotification::Move { x, y, t } => self.on_move(*x, *y, *t),
            HostNotification::Click {
                x,
                y,
                t,
                button,
                pressed,
            } => self.on_click(*x, *y, *t, button, *pressed),
            HostNotification::KeyDown { key, t } => self.on_key_press(key, *t),
            HostNotification::KeyUp { key, t } => self.on_key_release(key, *t),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.buffers.is_capturing()
    }

    /// Current stream lengths, each read under its lock
    pub fn counts(&self) -> CaptureCounts {
        CaptureCounts {
            movements: self.buffers.movements.lock().len(),
            clicks: self.buffers.clicks.lock().len(),
            keystrokes: self.buffers.keystrokes.lock().len(),
        }
    }
}

/// Serialized host notification, as produced by external input bridges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostNotification {
    Move {
        x: f64,
        y: f64,
        #[serde(rename = "timestamp")]
        t: f64,
    },
    Click {
        x: f64,
        y: f64,
        #[serde(rename = "timestamp")]
        t: f64,
        #[serde(default)]
        button: String,
        #[serde(default = "default_pressed")]
        pressed: bool,
    },
    KeyDown {
        key: String,
        #[serde(rename = "timestamp")]
        t: f64,
    },
    KeyUp {
        key: String,
        #[serde(rename = "timestamp")]
        t: f64,
    },
}

fn default_pressed() -> bool {
    true
}

/// Capture session over a host input source.
///
/// States: Idle → Capturing (`start`) → Idle (`stop`). Calling `start` while
/// capturing restarts with empty buffers.
pub struct EventCapture<S: InputSource> {
    source: S,
    buffers: Arc<CaptureBuffers>,
    registered: bool,
    started_at: Option<Instant>,
}

impl<S: InputSource> EventCapture<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffers: Arc::new(CaptureBuffers::default()),
            registered: false,
            started_at: None,
        }
    }

    /// Begin capturing.
    ///
    /// If the source cannot be registered the capture stays inactive and the
    /// error is returned; `stop` then yields an empty session.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.buffers.is_capturing() {
            tracing::info!("capture restarted, discarding buffered events");
            self.buffers.capturing.store(false, Ordering::SeqCst);
            self.unregister_source();
        }

        self.buffers.clear();
        self.buffers.capturing.store(true, Ordering::SeqCst);
        self.started_at = Some(Instant::now());

        let sink = self.sink();
        match self.source.register(sink) {
            Ok(()) => {
                self.registered = true;
                tracing::info!("capture started");
                Ok(())
            }
            Err(e) => {
                self.buffers.capturing.store(false, Ordering::SeqCst);
                tracing::error!(error = %e, "failed to register input listeners");
                Err(e)
            }
        }
    }

    /// Stop capturing and return the frozen session
    pub fn stop(&mut self) -> Session {
        self.buffers.capturing.store(false, Ordering::SeqCst);
        self.unregister_source();

        let session = self.buffers.snapshot();
        tracing::info!(
            movements = session.movements().len(),
            clicks = session.clicks().len(),
            keystrokes = session.keystrokes().len(),
            "capture stopped"
        );
        session
    }

    /// Handle for pushing notifications or polling progress
    pub fn sink(&self) -> CaptureSink {
        CaptureSink {
            buffers: Arc::clone(&self.buffers),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.buffers.is_capturing()
    }

    pub fn counts(&self) -> CaptureCounts {
        self.sink().counts()
    }

    /// Time since the last `start`, zero if never started
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// True once `elapsed` reaches `duration`
    pub fn is_due(&self, duration: Duration) -> bool {
        self.is_capturing() && self.elapsed() >= duration
    }

    fn unregister_source(&mut self) {
        if !self.registered {
            return;
        }
        if let Err(e) = self.source.unregister() {
            tracing::error!(error = %e, "error stopping input listeners");
        }
        self.registered = false;
    }
}

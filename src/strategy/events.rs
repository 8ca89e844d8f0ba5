//! Progress events and run control for the sweep engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStage {
    Validating,
    Claiming,
    Refreshing,
    Screening,
    Approving,
    Quoting,
    Simulating,
    Executing,
    Done,
}

impl fmt::Display for SweepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepStage::Validating => write!(f, "validating"),
            SweepStage::Claiming => write!(f, "claiming"),
            SweepStage::Refreshing => write!(f, "refreshing"),
            SweepStage::Screening => write!(f, "screening"),
            SweepStage::Approving => write!(f, "approving"),
            SweepStage::Quoting => write!(f, "quoting"),
            SweepStage::Simulating => write!(f, "simulating"),
            SweepStage::Executing => write!(f, "executing"),
            SweepStage::Done => write!(f, "done"),
        }
    }
}

/// Human-readable stage update for UI display.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub stage: SweepStage,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Fan-out of progress events. Sending with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, stage: SweepStage, message: impl Into<String>) {
        let event = ProgressEvent {
            stage,
            message: message.into(),
            at: Utc::now(),
        };
        debug!(stage = %event.stage, "{}", event.message);
        let _ = self.tx.send(event);
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation request. Only halts scheduling of batches not yet submitted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    requested: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Busy flag held for the duration of one sweep.
#[derive(Debug, Default)]
pub struct BusyFlag {
    busy: AtomicBool,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a guard, or `None` when another run holds the flag.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard { flag: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

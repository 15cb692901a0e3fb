//! # Scan Cancellation
//!
//! [`ScanControl`] is the caller-supplied handle that lets a long-running
//! traversal or transfer scan be cancelled or bounded by a deadline. Scans
//! call [`ScanControl::checkpoint`] between store round-trips and abort with
//! a [`ScanInterrupt`] the moment it fails. A scan either completes or
//! reports the interrupt; it never returns a partial result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a scan stopped before completing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanInterrupt {
    /// [`ScanControl::cancel`] was called.
    #[error("scan cancelled by caller")]
    Cancelled,
    /// The configured deadline passed.
    #[error("scan deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation flag plus optional deadline.
///
/// Clones share the flag: cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl ScanControl {
    /// A control that never interrupts unless cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A control that interrupts once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// A control that interrupts `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Request cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if the scan should stop now. Cancellation wins over the deadline.
    pub fn checkpoint(&self) -> Result<(), ScanInterrupt> {
        if self.is_cancelled() {
            return Err(ScanInterrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ScanInterrupt::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
